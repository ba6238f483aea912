/// Dense gap filling between the pivots of a start round.
///
/// Every pair of adjacent pivots `(low, high)` leaves a gap of
/// `high - low - 1` headers. Each gap is fetched backwards from
/// `high.parent_hash` and must end on a header whose parent is `low.hash`.
/// Gaps are processed from the highest one down.
use std::mem;

use containers::BlockHeader;
use libp2p_identity::PeerId;
use tracing::debug;

use super::{
    error::{Result, SyncError},
    states::SyncSignal,
    subchain::SubchainRequest,
};
use crate::req_resp::validate_response;

#[derive(Debug, Clone)]
pub struct FetchRound {
    peer_id: PeerId,
    target: u64,

    /// Requests not sent yet; the top is the next one
    pending: Vec<SubchainRequest>,

    /// Request whose response is awaited
    in_flight: Option<SubchainRequest>,

    /// Verified headers of the gap being filled
    downloaded: Vec<BlockHeader>,
}

impl FetchRound {
    pub fn new(peer_id: PeerId, sparse: &[BlockHeader], target: u64) -> Self {
        // pushed lowest first so that the highest gap is popped first
        let pending = sparse
            .windows(2)
            .filter_map(|pair| {
                let (low, high) = (&pair[0], &pair[1]);
                let gap = high.number().checked_sub(low.number())?.checked_sub(1)?;
                (gap > 0).then(|| SubchainRequest::new(high.parent_hash(), gap as u32, low.hash()))
            })
            .collect();

        Self {
            peer_id,
            target,
            pending,
            in_flight: None,
            downloaded: Vec::new(),
        }
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    pub fn pending(&self) -> &[SubchainRequest] {
        &self.pending
    }

    pub fn in_flight(&self) -> Option<&SubchainRequest> {
        self.in_flight.as_ref()
    }

    pub fn downloaded(&self) -> &[BlockHeader] {
        &self.downloaded
    }

    pub fn sync(&mut self) -> SyncSignal {
        if let Some(request) = &self.in_flight {
            return SyncSignal::SendHeaders(request.to_request());
        }
        self.send_next()
    }

    fn send_next(&mut self) -> SyncSignal {
        match self.pending.pop() {
            Some(request) => {
                self.in_flight = Some(request);
                SyncSignal::SendHeaders(request.to_request())
            }
            None => SyncSignal::SyncEnded,
        }
    }

    pub fn on_block_headers(
        &mut self,
        peer_id: PeerId,
        headers: Vec<BlockHeader>,
    ) -> Result<Vec<SyncSignal>> {
        if peer_id != self.peer_id {
            debug!(peer = %peer_id, "Ignoring headers from foreign peer");
            return Ok(Vec::new());
        }
        let Some(request) = self.in_flight.take() else {
            debug!(peer = %peer_id, "Ignoring unsolicited headers in fetch round");
            return Ok(Vec::new());
        };

        if headers.is_empty() {
            debug!(peer = %peer_id, start = %request.start_hash.short(), "Peer returned no subchain headers");
            self.in_flight = Some(request);
            return Ok(vec![SyncSignal::AttemptFailed]);
        }

        validate_response(&headers, request.header_count, request.start_hash, 0, true)?;

        for pair in headers.windows(2) {
            if pair[0].parent_hash() != pair[1].hash() {
                return Err(SyncError::BadPeerConnection {
                    number: pair[1].number(),
                });
            }
        }

        // non-empty, checked above
        let next_start = headers[headers.len() - 1].parent_hash();
        let continuation = request.continuation(headers.len() as u32, next_start);

        if continuation.is_none() && next_start != request.expected_terminal_parent_hash {
            return Err(SyncError::BadSubchain {
                expected: request.expected_terminal_parent_hash,
                actual: next_start,
            });
        }

        self.downloaded.extend(headers);

        let mut signals = Vec::with_capacity(2);
        match continuation {
            Some(next) => {
                debug!(
                    peer = %peer_id,
                    remaining = next.header_count,
                    "Partial subchain, queueing continuation"
                );
                self.pending.push(next);
            }
            None => {
                let gap = mem::take(&mut self.downloaded);
                debug!(peer = %peer_id, num_headers = gap.len(), "Gap filled");
                signals.push(SyncSignal::AddDownloadedHeaders(gap));
            }
        }

        signals.push(self.send_next());
        Ok(signals)
    }
}
