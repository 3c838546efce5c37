use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, FromRepr};

/// Status of an attester in the rollup's validator set.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
    FromRepr,
)]
#[repr(u8)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ValidatorStatus {
    /// Not registered.
    Unregistered = 0,
    /// Actively attesting.
    Validating = 1,
    /// Registered with insufficient stake.
    Living = 2,
    /// Withdrawal in progress.
    Exiting = 3,
}

/// An attester as read from the rollup contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorRecord {
    /// Attester identity.
    pub attester: Address,
    /// Effective stake.
    pub stake: U256,
    /// Attester status.
    pub status: ValidatorStatus,
    /// Address allowed to withdraw the stake.
    pub withdrawer: Address,
    /// Address proposing on behalf of the attester.
    pub proposer: Address,
}
