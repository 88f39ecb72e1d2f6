// chain-core/src/types.rs

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// Block number/height
pub type BlockNumber = u64;

/// Timestamp in Unix epoch milliseconds. Fund-lock expiries are expressed in
/// this unit; 0 means "unlock immediately".
pub type Timestamp = u64;

/// Token amount (using BigUint for arbitrary precision)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(BigUint);

impl Amount {
    pub fn new(value: BigUint) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(BigUint::from(0u64))
    }

    pub fn from_u64(value: u64) -> Self {
        Self(BigUint::from(value))
    }

    pub fn from_tokens(tokens: u64) -> Self {
        // 1 token = 10^18 base units
        Self(BigUint::from(tokens) * BigUint::from(10u64).pow(18))
    }

    pub fn inner(&self) -> &BigUint {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == BigUint::from(0u64)
    }

    pub fn checked_add(&self, other: &Amount) -> Option<Amount> {
        Some(Amount(&self.0 + &other.0))
    }

    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        if self.0 < other.0 {
            None
        } else {
            Some(Amount(&self.0 - &other.0))
        }
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, other: Amount) -> Amount {
        Amount(&self.0 + &other.0)
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, other: Amount) -> Amount {
        Amount(&self.0 - &other.0)
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stake locked behind an agent registration or deposit
pub type StakeAmount = Amount;
