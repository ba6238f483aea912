/// Sparse pivot probing from the common ancestor towards the target.
///
/// Pivots are requested ascending, `skip` headers apart, starting right
/// above the ancestor. With a zero skip the pivots are the whole range and
/// the round ends here.
use containers::BlockHeader;
use libp2p_identity::PeerId;
use tracing::debug;

use super::{
    error::{Result, SyncError},
    planner::PivotPlan,
    states::SyncSignal,
};
use crate::req_resp::{HeadersRequest, check_header_hashes};

#[derive(Debug, Clone)]
pub struct StartRound {
    peer_id: PeerId,
    start: BlockHeader,
    target: u64,
    plan: PivotPlan,
    sparse: Vec<BlockHeader>,
    in_flight: bool,
}

impl StartRound {
    pub fn new(peer_id: PeerId, start: BlockHeader, target: u64, plan: PivotPlan) -> Self {
        Self {
            peer_id,
            start,
            target,
            plan,
            sparse: Vec::with_capacity(plan.pivot_count as usize),
            in_flight: false,
        }
    }

    pub fn start(&self) -> &BlockHeader {
        &self.start
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    pub fn plan(&self) -> PivotPlan {
        self.plan
    }

    pub fn sparse(&self) -> &[BlockHeader] {
        &self.sparse
    }

    /// Number of the next pivot to ask for.
    pub fn next_start_number(&self) -> u64 {
        self.start.number() + 1 + self.sparse.len() as u64 * (u64::from(self.plan.skip) + 1)
    }

    fn wanted(&self) -> u32 {
        self.plan.pivot_count.saturating_sub(self.sparse.len() as u32)
    }

    pub fn sync(&mut self) -> SyncSignal {
        let count = self.wanted();
        if count == 0 {
            return self.completed();
        }

        self.in_flight = true;
        SyncSignal::SendHeaders(HeadersRequest::ByNumber {
            start: self.next_start_number(),
            count,
            skip: self.plan.skip,
            reverse: false,
        })
    }

    pub fn on_block_headers(
        &mut self,
        peer_id: PeerId,
        headers: Vec<BlockHeader>,
    ) -> Result<Vec<SyncSignal>> {
        if peer_id != self.peer_id || !self.in_flight {
            debug!(peer = %peer_id, "Ignoring unexpected headers in start round");
            return Ok(Vec::new());
        }
        self.in_flight = false;

        if headers.is_empty() {
            debug!(peer = %peer_id, next = self.next_start_number(), "Peer returned no pivots");
            return Ok(vec![SyncSignal::AttemptFailed]);
        }

        self.check_batch(&headers)?;
        self.sparse.extend(headers);

        debug!(
            peer = %peer_id,
            collected = self.sparse.len(),
            planned = self.plan.pivot_count,
            skip = self.plan.skip,
            "Pivots received"
        );

        if self.wanted() == 0 {
            Ok(vec![self.completed()])
        } else {
            Ok(vec![SyncSignal::AttemptFailed])
        }
    }

    fn check_batch(&self, headers: &[BlockHeader]) -> Result<()> {
        let wanted = self.wanted();
        if headers.len() > wanted as usize {
            return Err(SyncError::TooManyHeaders {
                requested: wanted,
                received: headers.len(),
            });
        }

        let expected = self.next_start_number();
        let first = &headers[0];
        if first.number() != expected {
            return Err(SyncError::UnexpectedFirstHeader {
                expected,
                actual: first.number(),
            });
        }

        let skip = self.plan.skip;
        for pair in headers.windows(2) {
            let (low, high) = (&pair[0], &pair[1]);
            let spacing = high.number().checked_sub(low.number()).and_then(|d| d.checked_sub(1));
            if spacing != Some(u64::from(skip)) {
                return Err(SyncError::IncorrectSpacing {
                    low: low.number(),
                    high: high.number(),
                    skip,
                });
            }
        }

        check_header_hashes(headers)?;

        // the previous pivot, or the ancestor for the first batch
        let anchor = self.sparse.last().unwrap_or(&self.start);
        if (self.sparse.is_empty() || self.plan.is_dense()) && first.parent_hash() != anchor.hash() {
            return Err(SyncError::ParentMismatch {
                number: first.number(),
                expected: anchor.hash(),
            });
        }

        // a dense range is never revisited by a fetch round
        if self.plan.is_dense() {
            for pair in headers.windows(2) {
                if pair[1].parent_hash() != pair[0].hash() {
                    return Err(SyncError::ParentMismatch {
                        number: pair[1].number(),
                        expected: pair[0].hash(),
                    });
                }
            }
        }

        Ok(())
    }

    fn completed(&self) -> SyncSignal {
        if self.plan.is_dense() {
            SyncSignal::StartRoundComplete(self.sparse.clone())
        } else {
            SyncSignal::BeginFetchRound(self.sparse.clone())
        }
    }
}
