pub mod store;
pub mod types;
pub mod verifier;

pub use store::{MemorySettlementStore, SettlementStore};
pub use types::{AmountPolicy, PaymentClaim, PaymentRecord, PaymentStatus, Verdict};
pub use verifier::{PaymentVerifier, SettlementError, VerifierConfig};
