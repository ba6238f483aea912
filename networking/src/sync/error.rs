//! Header sync failure taxonomy.

use std::time::Duration;

use containers::Bytes32;
use libp2p_identity::PeerId;
use thiserror::Error;

/// Result type alias for header sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Failures that end the active sync session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    // === Peer protocol violations ===
    /// More headers than requested.
    #[error("too many headers: requested {requested}, received {received}")]
    TooManyHeaders { requested: u32, received: usize },

    /// First header of the batch is not the one asked for.
    #[error("unexpected first header: expected number {expected}, got {actual}")]
    UnexpectedFirstHeader { expected: u64, actual: u64 },

    /// Consecutive headers are not spaced as requested.
    #[error("incorrect spacing between headers {low} and {high}: expected skip {skip}")]
    IncorrectSpacing { low: u64, high: u64, skip: u32 },

    /// First pivot does not descend from the common ancestor.
    #[error("parent mismatch: header {number} does not descend from {expected}")]
    ParentMismatch { number: u64, expected: Bytes32 },

    /// Headers inside a subchain batch are not linked by parent hash.
    #[error("bad peer connection: header {number} breaks the parent chain")]
    BadPeerConnection { number: u64 },

    /// A completed subchain does not end on the lower pivot.
    #[error("bad subchain: ended on parent {actual}, expected {expected}")]
    BadSubchain { expected: Bytes32, actual: Bytes32 },

    /// Carried hash does not commit to the header contents.
    #[error("invalid header hash: header {number} carries {hash}")]
    InvalidHeaderHash { number: u64, hash: Bytes32 },

    /// Response does not have the shape of the request.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    // === Chain boundaries ===
    /// Backward scan reached genesis without a shared header.
    #[error("no common ancestor with peer")]
    NoCommonAncestor,

    /// Local chain has no header at a number the scan needs.
    #[error("local header {0} not found")]
    UnknownLocalHeader(u64),

    // === Controller ===
    #[error("no peer available for sync")]
    NoPeerAvailable,

    #[error("peer status unknown")]
    UnknownPeerStatus,

    #[error("sync session with {0} already running")]
    SessionInProgress(PeerId),

    #[error("gave up after {0} attempts")]
    AttemptsExhausted(u32),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl SyncError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse(reason.into())
    }

    /// Whether the failure is evidence of a misbehaving peer.
    pub fn is_peer_misbehavior(&self) -> bool {
        matches!(
            self,
            Self::TooManyHeaders { .. }
                | Self::UnexpectedFirstHeader { .. }
                | Self::IncorrectSpacing { .. }
                | Self::ParentMismatch { .. }
                | Self::BadPeerConnection { .. }
                | Self::BadSubchain { .. }
                | Self::InvalidHeaderHash { .. }
                | Self::MalformedResponse(_)
        )
    }

    /// Short label used for metrics and peer bookkeeping.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::TooManyHeaders { .. } => "too_many_headers",
            Self::UnexpectedFirstHeader { .. } => "unexpected_first_header",
            Self::IncorrectSpacing { .. } => "incorrect_spacing",
            Self::ParentMismatch { .. } => "parent_mismatch",
            Self::BadPeerConnection { .. } => "bad_peer_connection",
            Self::BadSubchain { .. } => "bad_subchain",
            Self::InvalidHeaderHash { .. } => "invalid_header_hash",
            Self::MalformedResponse(_) => "malformed_response",
            Self::NoCommonAncestor => "no_common_ancestor",
            Self::UnknownLocalHeader(_) => "unknown_local_header",
            Self::NoPeerAvailable => "no_peer_available",
            Self::UnknownPeerStatus => "unknown_peer_status",
            Self::SessionInProgress(_) => "session_in_progress",
            Self::AttemptsExhausted(_) => "attempts_exhausted",
            Self::Timeout(_) => "timeout",
        }
    }
}
