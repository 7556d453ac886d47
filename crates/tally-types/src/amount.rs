use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places of the settlement token (USDC-style 6-decimal stablecoin).
pub const TOKEN_DECIMALS: u32 = 6;
pub const TOKEN_BASE_UNIT: u128 = 1_000_000; // 10^6

/// An amount of the settlement token in base units (smallest currency unit).
///
/// u128 gives enough headroom for any realistic ERC-20 stablecoin balance;
/// decoded on-chain words that exceed it are rejected at the decoding layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: Self = Self(0);

    pub fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    pub fn from_tokens(tokens: f64) -> Self {
        Self((tokens * TOKEN_BASE_UNIT as f64) as u128)
    }

    pub fn to_base_units(&self) -> u128 {
        self.0
    }

    pub fn to_tokens(&self) -> f64 {
        self.0 as f64 / TOKEN_BASE_UNIT as f64
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(&self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(&self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(&self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(&self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// The smaller of the two amounts. Used when a slash cannot exceed the
    /// remaining stake.
    pub fn min(&self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.to_tokens())
    }
}
