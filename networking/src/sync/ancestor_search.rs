/// Backward scan for the highest header shared with the peer.
///
/// The peer is asked for its headers at the numbers just below our working
/// header. The first one we know locally is the common ancestor. If none is
/// known the working header moves down by the batch size and the scan goes
/// on. It is a linear scan in bounded batches, so it always terminates on a
/// finite chain.
use containers::{BlockHeader, Bytes32};
use libp2p_identity::PeerId;
use tracing::{debug, warn};

use super::{
    config::MAX_REQUESTED_HEADERS,
    error::{Result, SyncError},
    local_chain::LocalChain,
    states::SyncSignal,
};
use crate::req_resp::{HeadersRequest, check_header_hashes};

#[derive(Debug, Clone)]
pub struct CommonAncestorSearch {
    peer_id: PeerId,
    hash: Bytes32,
    number: u64,

    /// Count asked for by the outstanding request
    in_flight: Option<u32>,
}

impl CommonAncestorSearch {
    pub fn new(peer_id: PeerId, hash: Bytes32, number: u64) -> Self {
        Self {
            peer_id,
            hash,
            number,
            in_flight: None,
        }
    }

    /// Number of the local header the scan currently starts from.
    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn hash(&self) -> Bytes32 {
        self.hash
    }

    fn requested_count(&self) -> u32 {
        // never reaches below number 1
        self.number.min(u64::from(MAX_REQUESTED_HEADERS)) as u32
    }

    pub fn sync(&mut self) -> SyncSignal {
        let count = self.requested_count();
        self.in_flight = Some(count);

        SyncSignal::SendHeaders(HeadersRequest::ByNumber {
            start: self.number,
            count,
            skip: 0,
            reverse: true,
        })
    }

    pub fn on_block_headers<C: LocalChain + ?Sized>(
        &mut self,
        peer_id: PeerId,
        headers: Vec<BlockHeader>,
        chain: &C,
    ) -> Result<Vec<SyncSignal>> {
        if peer_id != self.peer_id {
            debug!(peer = %peer_id, expected = %self.peer_id, "Ignoring headers from foreign peer");
            return Ok(Vec::new());
        }
        let Some(requested) = self.in_flight.take() else {
            debug!(peer = %peer_id, "Ignoring unsolicited headers");
            return Ok(Vec::new());
        };

        if headers.is_empty() {
            debug!(peer = %peer_id, number = self.number, "Peer returned no headers");
            return Ok(vec![SyncSignal::AttemptFailed]);
        }

        self.check_batch(&headers, requested)?;

        if let Some(ancestor) = headers.iter().find(|header| chain.is_header_known(&header.hash())) {
            debug!(
                peer = %peer_id,
                number = ancestor.number(),
                hash = %ancestor.hash().short(),
                "Common ancestor found"
            );
            return Ok(vec![SyncSignal::AncestorFound(ancestor.clone())]);
        }

        // bounded by `requested`, which never exceeds `number`
        let new_start = self.number - headers.len() as u64;

        if new_start == 0 {
            return self.reached_genesis(&headers, chain);
        }

        let next = chain
            .header_by_number(new_start)
            .ok_or(SyncError::UnknownLocalHeader(new_start))?;

        debug!(
            peer = %peer_id,
            from = self.number,
            to = new_start,
            "No known header in batch, continuing search"
        );

        self.hash = next.hash();
        self.number = next.number();
        Ok(vec![self.sync()])
    }

    fn check_batch(&self, headers: &[BlockHeader], requested: u32) -> Result<()> {
        if headers.len() > requested as usize {
            return Err(SyncError::TooManyHeaders {
                requested,
                received: headers.len(),
            });
        }

        let first = headers[0].number();
        if first != self.number {
            return Err(SyncError::UnexpectedFirstHeader {
                expected: self.number,
                actual: first,
            });
        }

        for pair in headers.windows(2) {
            if pair[1].number().checked_add(1) != Some(pair[0].number()) {
                return Err(SyncError::IncorrectSpacing {
                    low: pair[1].number(),
                    high: pair[0].number(),
                    skip: 0,
                });
            }
        }

        check_header_hashes(headers)
    }

    /// The scan walked down to number 1 without a match. Genesis is the
    /// ancestor only if the peer's header 1 builds on our genesis.
    fn reached_genesis<C: LocalChain + ?Sized>(
        &self,
        headers: &[BlockHeader],
        chain: &C,
    ) -> Result<Vec<SyncSignal>> {
        let genesis = chain
            .header_by_number(0)
            .ok_or(SyncError::UnknownLocalHeader(0))?;

        match headers.last() {
            Some(last) if last.number() == 1 && last.parent_hash() == genesis.hash() => {
                debug!(peer = %self.peer_id, "Search reached genesis, using it as ancestor");
                Ok(vec![SyncSignal::AncestorFound(genesis)])
            }
            _ => {
                warn!(peer = %self.peer_id, "Peer chain does not share our genesis");
                Err(SyncError::NoCommonAncestor)
            }
        }
    }
}
