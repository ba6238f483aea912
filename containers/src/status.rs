use crate::{Bytes32, Uint64};
use serde::{Deserialize, Serialize};
use ssz_derive::Ssz;

/// Best chain a peer advertises when it connects.
#[derive(Clone, Debug, PartialEq, Eq, Ssz, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub best_hash: Bytes32,
    pub best_number: u64,
    pub total_difficulty: Uint64,
}

impl Status {
    pub fn new(best_hash: Bytes32, best_number: u64, total_difficulty: Uint64) -> Self {
        Self {
            best_hash,
            best_number,
            total_difficulty,
        }
    }
}
