use crate::Bytes32;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use ssz_derive::Ssz;

/// A block header as exchanged by the light protocol.
///
/// Only `number`, `hash` and `parent_hash` matter to header sync. The
/// remaining fields are carried so that the hash commits to something.
/// Fields are private: a header is immutable once built or received.
#[derive(Clone, Debug, PartialEq, Eq, Ssz, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    number: u64,
    hash: Bytes32,
    parent_hash: Bytes32,
    state_root: Bytes32,
    timestamp: u64,
}

impl BlockHeader {
    /// Build a header and compute its hash from the contents.
    pub fn new(number: u64, parent_hash: Bytes32, state_root: Bytes32, timestamp: u64) -> Self {
        let hash = compute_hash(number, &parent_hash, &state_root, timestamp);
        Self {
            number,
            hash,
            parent_hash,
            state_root,
            timestamp,
        }
    }

    /// Header as decoded from the wire, where the hash is carried alongside.
    pub fn with_hash(number: u64, hash: Bytes32, parent_hash: Bytes32) -> Self {
        Self {
            number,
            hash,
            parent_hash,
            state_root: Bytes32::zero(),
            timestamp: 0,
        }
    }

    pub fn genesis(state_root: Bytes32, timestamp: u64) -> Self {
        Self::new(0, Bytes32::zero(), state_root, timestamp)
    }

    /// Build the next header on top of this one.
    pub fn child(&self, state_root: Bytes32, timestamp: u64) -> Self {
        Self::new(self.number + 1, self.hash, state_root, timestamp)
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn hash(&self) -> Bytes32 {
        self.hash
    }

    pub fn parent_hash(&self) -> Bytes32 {
        self.parent_hash
    }

    pub fn state_root(&self) -> Bytes32 {
        self.state_root
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn is_genesis(&self) -> bool {
        self.number == 0
    }

    /// Check that the carried hash commits to the header contents.
    pub fn has_valid_hash(&self) -> bool {
        self.hash == compute_hash(self.number, &self.parent_hash, &self.state_root, self.timestamp)
    }
}

fn compute_hash(number: u64, parent_hash: &Bytes32, state_root: &Bytes32, timestamp: u64) -> Bytes32 {
    let mut hasher = Sha256::new();
    hasher.update(number.to_be_bytes());
    hasher.update(parent_hash.as_bytes());
    hasher.update(state_root.as_bytes());
    hasher.update(timestamp.to_be_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    Bytes32::from(digest)
}
