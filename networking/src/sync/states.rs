/// Header sync state machine.
///
/// Exactly one state is active per session. `sync()` asks the active state
/// to (re)issue its request; `on_block_headers()` hands it the response.
/// States never call back into the controller: they return `SyncSignal`s
/// (or a `SyncError`) and the controller performs the transition.
use containers::{BlockHeader, Bytes32};
use libp2p_identity::PeerId;
use tracing::debug;

use super::{
    ancestor_search::CommonAncestorSearch,
    deciding::DecidingState,
    error::Result,
    fetch_round::FetchRound,
    local_chain::LocalChain,
    start_round::StartRound,
};
use crate::req_resp::HeadersRequest;

/// What a state asks the controller to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncSignal {
    /// Send this request to the session peer.
    SendHeaders(HeadersRequest),
    /// Look for the fork point, scanning back from this local header.
    StartAncestorSearch { hash: Bytes32, number: u64 },
    /// Highest header shared with the peer.
    AncestorFound(BlockHeader),
    /// The dense start round fetched the whole range; no fetch round follows.
    StartRoundComplete(Vec<BlockHeader>),
    /// All pivots collected; fill the gaps between them.
    BeginFetchRound(Vec<BlockHeader>),
    /// Peer returned less than asked. Retry or give up.
    AttemptFailed,
    /// A gap was fully downloaded and verified.
    AddDownloadedHeaders(Vec<BlockHeader>),
    /// Nothing left to fetch in this round.
    SyncEnded,
}

/// Discriminant of `SyncState`, used for transition rules and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Deciding,
    CommonAncestorSearch,
    StartRound,
    FetchRound,
    Round,
}

impl SyncPhase {
    /// Check if a transition to the target phase is valid.
    ///
    /// Any phase may fall back to Idle when the session is aborted.
    pub fn can_transition_to(&self, target: SyncPhase) -> bool {
        if target == SyncPhase::Idle {
            return true;
        }
        match self {
            SyncPhase::Idle | SyncPhase::Round => matches!(target, SyncPhase::Deciding),
            SyncPhase::Deciding => matches!(
                target,
                SyncPhase::CommonAncestorSearch | SyncPhase::StartRound
            ),
            SyncPhase::CommonAncestorSearch => matches!(target, SyncPhase::StartRound),
            SyncPhase::StartRound => matches!(
                target,
                SyncPhase::FetchRound | SyncPhase::Round | SyncPhase::Deciding
            ),
            SyncPhase::FetchRound => matches!(target, SyncPhase::Round | SyncPhase::Deciding),
        }
    }

    pub fn as_i64(&self) -> i64 {
        *self as i64
    }
}

#[derive(Debug, Default)]
pub enum SyncState {
    /// No session running.
    #[default]
    Idle,
    Deciding(DecidingState),
    CommonAncestorSearch(CommonAncestorSearch),
    StartRound(StartRound),
    FetchRound(FetchRound),
    /// Session finished. Placeholder until the next session starts.
    Round,
}

impl SyncState {
    pub fn phase(&self) -> SyncPhase {
        match self {
            SyncState::Idle => SyncPhase::Idle,
            SyncState::Deciding(_) => SyncPhase::Deciding,
            SyncState::CommonAncestorSearch(_) => SyncPhase::CommonAncestorSearch,
            SyncState::StartRound(_) => SyncPhase::StartRound,
            SyncState::FetchRound(_) => SyncPhase::FetchRound,
            SyncState::Round => SyncPhase::Round,
        }
    }

    /// Whether the state drives requests.
    pub fn is_active(&self) -> bool {
        !matches!(self, SyncState::Idle | SyncState::Round)
    }

    /// Headers collected by the active state and not handed over yet.
    pub fn collected(&self) -> usize {
        match self {
            SyncState::StartRound(state) => state.sparse().len(),
            SyncState::FetchRound(state) => state.downloaded().len(),
            _ => 0,
        }
    }

    /// (Re)issue the state's request.
    pub fn sync(&mut self) -> Option<SyncSignal> {
        match self {
            SyncState::Idle | SyncState::Round => None,
            SyncState::Deciding(state) => Some(state.sync()),
            SyncState::CommonAncestorSearch(state) => Some(state.sync()),
            SyncState::StartRound(state) => Some(state.sync()),
            SyncState::FetchRound(state) => Some(state.sync()),
        }
    }

    /// Interpret a header response.
    ///
    /// `Err` aborts the session. A response the state does not expect leaves
    /// it untouched and yields no signals.
    pub fn on_block_headers<C: LocalChain + ?Sized>(
        &mut self,
        peer_id: PeerId,
        headers: Vec<BlockHeader>,
        chain: &C,
    ) -> Result<Vec<SyncSignal>> {
        match self {
            SyncState::Idle | SyncState::Round | SyncState::Deciding(_) => {
                debug!(
                    peer = %peer_id,
                    phase = ?self.phase(),
                    num_headers = headers.len(),
                    "Ignoring headers, no request outstanding"
                );
                Ok(Vec::new())
            }
            SyncState::CommonAncestorSearch(state) => state.on_block_headers(peer_id, headers, chain),
            SyncState::StartRound(state) => state.on_block_headers(peer_id, headers),
            SyncState::FetchRound(state) => state.on_block_headers(peer_id, headers),
        }
    }
}
