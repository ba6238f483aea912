use containers::Bytes32;

use crate::req_resp::HeadersRequest;

/// One bounded backward header fetch filling (part of) a gap.
///
/// Fetch `header_count` headers walking parent links back from `start_hash`.
/// The last header's parent must be `expected_terminal_parent_hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubchainRequest {
    pub start_hash: Bytes32,
    pub header_count: u32,
    pub expected_terminal_parent_hash: Bytes32,
}

impl SubchainRequest {
    pub fn new(start_hash: Bytes32, header_count: u32, expected_terminal_parent_hash: Bytes32) -> Self {
        Self {
            start_hash,
            header_count,
            expected_terminal_parent_hash,
        }
    }

    /// Backward, dense request for this subchain.
    pub fn to_request(&self) -> HeadersRequest {
        HeadersRequest::ByHash {
            start: self.start_hash,
            count: self.header_count,
            skip: 0,
            reverse: true,
        }
    }

    /// Remainder of this subchain after `received` headers ending on a
    /// header whose parent is `next_start`.
    pub fn continuation(&self, received: u32, next_start: Bytes32) -> Option<Self> {
        let remaining = self.header_count.checked_sub(received)?;
        (remaining > 0).then(|| Self::new(next_start, remaining, self.expected_terminal_parent_hash))
    }
}
