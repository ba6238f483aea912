use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use containers::{BlockHeader, Bytes32};
use libp2p_identity::PeerId;
use parking_lot::RwLock;
use tracing::debug;

use crate::sync::{HeaderRequester, LocalChain, SyncError};

/// Header request of the light protocol.
///
/// `skip` headers are omitted between two returned headers, `reverse`
/// walks towards genesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadersRequest {
    ByHash {
        start: Bytes32,
        count: u32,
        skip: u32,
        reverse: bool,
    },
    ByNumber {
        start: u64,
        count: u32,
        skip: u32,
        reverse: bool,
    },
}

impl HeadersRequest {
    pub fn count(&self) -> u32 {
        match self {
            HeadersRequest::ByHash { count, .. } | HeadersRequest::ByNumber { count, .. } => *count,
        }
    }

    pub fn skip(&self) -> u32 {
        match self {
            HeadersRequest::ByHash { skip, .. } | HeadersRequest::ByNumber { skip, .. } => *skip,
        }
    }

    pub fn reverse(&self) -> bool {
        match self {
            HeadersRequest::ByHash { reverse, .. } | HeadersRequest::ByNumber { reverse, .. } => {
                *reverse
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HeadersRequest::ByHash { .. } => "by_hash",
            HeadersRequest::ByNumber { .. } => "by_number",
        }
    }
}

impl fmt::Display for HeadersRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeadersRequest::ByHash {
                start,
                count,
                skip,
                reverse,
            } => write!(
                f,
                "HeadersByHash(start={}, count={count}, skip={skip}, reverse={reverse})",
                start.short()
            ),
            HeadersRequest::ByNumber {
                start,
                count,
                skip,
                reverse,
            } => write!(
                f,
                "HeadersByNumber(start={start}, count={count}, skip={skip}, reverse={reverse})"
            ),
        }
    }
}

/// Check that a response has the shape of the request that produced it.
pub fn validate_response(
    headers: &[BlockHeader],
    expected_count: u32,
    start_hash: Bytes32,
    skip: u32,
    reverse: bool,
) -> Result<(), SyncError> {
    let Some(first) = headers.first() else {
        return Err(SyncError::malformed("empty header batch"));
    };

    if headers.len() > expected_count as usize {
        return Err(SyncError::TooManyHeaders {
            requested: expected_count,
            received: headers.len(),
        });
    }

    if first.hash() != start_hash {
        return Err(SyncError::malformed(format!(
            "batch starts at {}, expected {}",
            first.hash().short(),
            start_hash.short()
        )));
    }

    let step = u64::from(skip) + 1;
    for pair in headers.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let expected = if reverse {
            prev.number().checked_sub(step)
        } else {
            prev.number().checked_add(step)
        };
        if expected != Some(cur.number()) {
            return Err(SyncError::IncorrectSpacing {
                low: prev.number().min(cur.number()),
                high: prev.number().max(cur.number()),
                skip,
            });
        }
    }

    check_header_hashes(headers)
}

/// Reject the first header whose carried hash does not match its contents.
pub fn check_header_hashes(headers: &[BlockHeader]) -> Result<(), SyncError> {
    match headers.iter().find(|header| !header.has_valid_hash()) {
        Some(forged) => Err(SyncError::InvalidHeaderHash {
            number: forged.number(),
            hash: forged.hash(),
        }),
        None => Ok(()),
    }
}

pub fn is_correct(
    headers: &[BlockHeader],
    expected_count: u32,
    start_hash: Bytes32,
    skip: u32,
    reverse: bool,
) -> bool {
    validate_response(headers, expected_count, start_hash, skip, reverse).is_ok()
}

/// Answer a header request from the local canonical chain.
///
/// Unknown or non-canonical start and a zero count yield nothing. Forward
/// walks stop at the local best; reverse walks never return genesis.
pub fn serve_headers<C: LocalChain + ?Sized>(
    chain: &C,
    request: &HeadersRequest,
    max_headers: u32,
) -> Vec<BlockHeader> {
    let count = request.count().min(max_headers);
    if count == 0 {
        return Vec::new();
    }

    let start = match request {
        HeadersRequest::ByHash { start, .. } => {
            let canonical = chain
                .header_by_hash(start)
                .filter(|header| chain.is_header_known(&header.hash()));
            match canonical {
                Some(header) => header.number(),
                None => return Vec::new(),
            }
        }
        HeadersRequest::ByNumber { start, .. } => *start,
    };

    let best = chain.best_header().number();
    let step = u64::from(request.skip()) + 1;
    let reverse = request.reverse();

    let mut headers = Vec::with_capacity(count as usize);
    let mut number = Some(start);

    while let Some(current) = number {
        if headers.len() == count as usize || current > best || (reverse && current == 0) {
            break;
        }
        let Some(header) = chain.header_by_number(current) else {
            break;
        };
        headers.push(header);

        number = if reverse {
            current.checked_sub(step)
        } else {
            current.checked_add(step)
        };
    }

    headers
}

/// Peer that answers header requests from its own chain in-process.
///
/// Used to run a sync session without a transport.
pub struct ServingPeer<C> {
    chain: Arc<RwLock<C>>,
    max_response_headers: u32,
}

impl<C: LocalChain> ServingPeer<C> {
    pub fn new(chain: Arc<RwLock<C>>, max_response_headers: u32) -> Self {
        Self {
            chain,
            max_response_headers,
        }
    }

    pub fn chain(&self) -> &Arc<RwLock<C>> {
        &self.chain
    }
}

#[async_trait]
impl<C: LocalChain + Send + Sync> HeaderRequester for ServingPeer<C> {
    async fn request_headers(
        &self,
        peer_id: PeerId,
        request: HeadersRequest,
    ) -> Option<Vec<BlockHeader>> {
        let headers = serve_headers(&*self.chain.read(), &request, self.max_response_headers);
        debug!(peer = %peer_id, %request, served = headers.len(), "Serving header request");
        Some(headers)
    }
}
