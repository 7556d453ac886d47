pub mod address;
pub mod amount;
pub mod error;
pub mod id;
pub mod reason;

pub use address::Address;
pub use amount::{TokenAmount, TOKEN_BASE_UNIT, TOKEN_DECIMALS};
pub use error::ParseError;
pub use id::{AgentId, DisputeId, EventId, TaskId, TxHash};
pub use reason::RejectReason;
