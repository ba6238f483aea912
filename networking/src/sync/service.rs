use std::collections::VecDeque;
use std::sync::Arc;

use containers::{BlockHeader, Status};
use libp2p_identity::PeerId;
use metrics::SharedMetrics;
use parking_lot::{Mutex, RwLock};
/// Header sync controller.
///
/// `LightSyncService` owns the active `SyncState` and is the only component
/// that talks to the network and to the local chain. It interprets the
/// signals returned by the states:
/// - request signals are handed to the caller (or sent by `run`)
/// - transition signals swap in the next state
/// - failures abort the session and are reported against the peer
///
/// A session is made of rounds. Each round goes
/// Deciding -> CommonAncestorSearch -> StartRound -> FetchRound and imports
/// what it downloaded. New rounds start until the local best reaches the
/// peer's advertised best, a round makes no progress, or `max_rounds` is hit.
use tracing::{debug, info, warn};

use super::{
    ancestor_search::CommonAncestorSearch,
    config::SyncConfig,
    deciding::DecidingState,
    error::{Result, SyncError},
    fetch_round::FetchRound,
    local_chain::LocalChain,
    peer_manager::PeerManager,
    planner::plan_pivots,
    start_round::StartRound,
    states::{SyncPhase, SyncSignal, SyncState},
};
use crate::{req_resp::HeadersRequest, types::ConnectionState};

/// Network requester trait for fetching headers.
///
/// Abstracts the network layer to allow testing with mocks.
#[async_trait::async_trait]
pub trait HeaderRequester: Send + Sync {
    /// Send a header request to a peer.
    ///
    /// Returns the headers if successful, or None if the request failed.
    async fn request_headers(
        &self,
        peer_id: PeerId,
        request: HeadersRequest,
    ) -> Option<Vec<BlockHeader>>;
}

#[derive(Debug, Clone)]
struct Session {
    peer_id: PeerId,
    target: u64,
    rounds: u32,
    attempts: u32,
    imported: usize,
    /// Common ancestor of the current round
    round_ancestor: u64,
}

/// Outcome of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub peer_id: PeerId,
    pub target: u64,
    pub best_number: u64,
    pub rounds: u32,
    pub imported: usize,
}

impl SyncReport {
    pub fn reached_target(&self) -> bool {
        self.best_number >= self.target
    }
}

pub struct LightSyncService<N: HeaderRequester, C: LocalChain> {
    state: SyncState,
    network: N,
    chain: Arc<RwLock<C>>,
    peer_manager: Arc<Mutex<PeerManager>>,
    config: SyncConfig,
    metrics: Option<SharedMetrics>,
    session: Option<Session>,
    last_report: Option<SyncReport>,
}

impl<N: HeaderRequester, C: LocalChain> LightSyncService<N, C> {
    pub fn new(
        network: N,
        chain: Arc<RwLock<C>>,
        peer_manager: PeerManager,
        config: SyncConfig,
    ) -> Self {
        Self {
            state: SyncState::default(),
            network,
            chain,
            peer_manager: Arc::new(Mutex::new(peer_manager)),
            config,
            metrics: None,
            session: None,
            last_report: None,
        }
    }

    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Get current sync state.
    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn phase(&self) -> SyncPhase {
        self.state.phase()
    }

    pub fn chain(&self) -> &Arc<RwLock<C>> {
        &self.chain
    }

    pub fn peer_manager(&self) -> &Arc<Mutex<PeerManager>> {
        &self.peer_manager
    }

    /// Report of the last session that ended without error.
    pub fn last_report(&self) -> Option<&SyncReport> {
        self.last_report.as_ref()
    }

    /// Add a peer to the sync service.
    pub fn add_peer(&self, peer_id: PeerId, connection_state: ConnectionState) {
        let mut pm = self.peer_manager.lock();
        pm.add_peer(peer_id, connection_state);
        info!(peer = %peer_id, "Peer added to sync service");
    }

    /// Remove a peer from the sync service.
    ///
    /// Aborts the running session if it was with this peer.
    pub fn remove_peer(&mut self, peer_id: &PeerId) {
        self.peer_manager.lock().remove_peer(peer_id);
        info!(peer = %peer_id, "Peer removed from sync service");

        if self.session.as_ref().is_some_and(|s| s.peer_id == *peer_id) {
            warn!(peer = %peer_id, "Sync peer disconnected, aborting session");
            self.abort(SyncError::NoPeerAvailable);
        }
    }

    /// Update peer connection state.
    pub fn update_peer_connection(&self, peer_id: &PeerId, state: ConnectionState) {
        let mut pm = self.peer_manager.lock();
        pm.update_connection_state(peer_id, state);
    }

    /// Update peer chain status.
    pub fn update_peer_status(&self, peer_id: &PeerId, status: Status) {
        let best_number = status.best_number;
        let mut pm = self.peer_manager.lock();
        pm.update_status(peer_id, status);
        debug!(peer = %peer_id, best_number, "Updated peer status");
    }

    /// Start a session with `peer_id` and return its first request.
    ///
    /// The search for a fork point starts from our best header, or from our
    /// header at the peer's best number if we are ahead of it. A running
    /// session is left alone and the call fails.
    pub fn start_sync(&mut self, peer_id: PeerId) -> Result<Option<HeadersRequest>> {
        if let Some(active) = &self.session {
            warn!(peer = %peer_id, active = %active.peer_id, "Sync session already running");
            return Err(SyncError::SessionInProgress(active.peer_id));
        }

        let target = {
            let pm = self.peer_manager.lock();
            let peer = pm.get_peer(&peer_id).ok_or(SyncError::NoPeerAvailable)?;
            if !peer.is_connected() {
                return Err(SyncError::NoPeerAvailable);
            }
            peer.status
                .as_ref()
                .map(|status| status.best_number)
                .ok_or(SyncError::UnknownPeerStatus)?
        };

        let best = self.chain.read().best_header().number();
        info!(peer = %peer_id, local_best = best, target, "Starting header sync");

        self.session = Some(Session {
            peer_id,
            target,
            rounds: 0,
            attempts: 0,
            imported: 0,
            round_ancestor: 0,
        });
        self.last_report = None;

        if let Some(metrics) = &self.metrics {
            metrics.set_peer_best_number(target as i64);
            metrics.set_local_best_number(best as i64);
        }

        match self.begin_round(peer_id, target) {
            Ok(signal) => self.drive(signal.into_iter().collect()),
            Err(err) => Err(self.abort(err)),
        }
    }

    /// Start a session with the best available peer.
    pub fn sync_with_best_peer(&mut self) -> Result<(PeerId, Option<HeadersRequest>)> {
        let peer_id = self
            .peer_manager
            .lock()
            .select_best_peer()
            .map(|peer| peer.peer_id)
            .ok_or(SyncError::NoPeerAvailable)?;

        let request = self.start_sync(peer_id)?;
        Ok((peer_id, request))
    }

    /// Ask the active state to (re)issue its request.
    pub fn sync(&mut self) -> Result<Option<HeadersRequest>> {
        let signals = self.state.sync().into_iter().collect();
        self.drive(signals)
    }

    /// Hand a header response to the active state.
    ///
    /// Returns the next request to send, if any. A response the state does
    /// not expect is ignored and yields no request. A short batch that
    /// still added headers does not count against the attempt budget.
    pub fn on_block_headers(
        &mut self,
        peer_id: PeerId,
        headers: Vec<BlockHeader>,
    ) -> Result<Option<HeadersRequest>> {
        let collected = self.state.collected();
        let result = {
            let chain = self.chain.read();
            self.state.on_block_headers(peer_id, headers, &*chain)
        };

        if self.state.collected() > collected {
            if let Some(session) = self.session.as_mut() {
                session.attempts = 0;
            }
        }

        match result {
            Ok(signals) => self.drive(signals),
            Err(err) => Err(self.abort(err)),
        }
    }

    /// The outstanding request failed without a response.
    pub fn on_request_timeout(&mut self) -> Result<Option<HeadersRequest>> {
        self.retry(SyncError::Timeout(self.config.request_timeout()))
    }

    /// Run a whole session against `peer_id`.
    pub async fn run(&mut self, peer_id: PeerId) -> Result<SyncReport> {
        let mut next = self.start_sync(peer_id)?;

        while let Some(request) = next {
            self.peer_manager.lock().on_request_start(&peer_id);

            let response = tokio::time::timeout(
                self.config.request_timeout(),
                self.network.request_headers(peer_id, request),
            )
            .await;

            next = match response {
                Ok(Some(headers)) => {
                    self.peer_manager.lock().on_request_complete(&peer_id);
                    self.on_block_headers(peer_id, headers)?
                }
                Ok(None) => {
                    self.peer_manager
                        .lock()
                        .on_request_failure(&peer_id, "no_response");
                    self.retry(SyncError::AttemptsExhausted(self.config.max_attempts))?
                }
                Err(_) => {
                    self.peer_manager.lock().on_request_failure(&peer_id, "timeout");
                    self.on_request_timeout()?
                }
            };
        }

        match self.last_report.clone() {
            Some(report) => Ok(report),
            // an active state always has a request to send
            None => Err(self.abort(SyncError::NoPeerAvailable)),
        }
    }

    /// Enter Deciding for a new round and return its first signal.
    fn begin_round(&mut self, peer_id: PeerId, target: u64) -> Result<Option<SyncSignal>> {
        let from = {
            let chain = self.chain.read();
            let best = chain.best_header();
            if best.number() > target {
                chain
                    .header_by_number(target)
                    .ok_or(SyncError::UnknownLocalHeader(target))?
            } else {
                best
            }
        };

        self.transition(SyncState::Deciding(DecidingState::new(peer_id, from)));
        Ok(self.state.sync())
    }

    fn drive(&mut self, signals: Vec<SyncSignal>) -> Result<Option<HeadersRequest>> {
        let mut queue: VecDeque<SyncSignal> = signals.into();
        let mut request = None;

        while let Some(signal) = queue.pop_front() {
            match self.handle_signal(signal) {
                Ok(Some(SyncSignal::SendHeaders(next))) => request = Some(next),
                Ok(Some(other)) => queue.push_back(other),
                Ok(None) => {}
                Err(err) => return Err(self.abort(err)),
            }
        }

        if let Some(request) = &request {
            debug!(%request, phase = ?self.phase(), "Sending header request");
            if let Some(metrics) = &self.metrics {
                metrics.inc_header_requests(request.kind());
            }
        }

        Ok(request)
    }

    /// Perform what one signal asks for. Returns the follow-up signal, if any.
    fn handle_signal(&mut self, signal: SyncSignal) -> Result<Option<SyncSignal>> {
        let Some(session) = self.session.clone() else {
            debug!(?signal, "Dropping signal outside of a session");
            return Ok(None);
        };
        let peer_id = session.peer_id;

        match signal {
            SyncSignal::SendHeaders(request) => Ok(Some(SyncSignal::SendHeaders(request))),

            SyncSignal::StartAncestorSearch { hash, number } => {
                debug!(peer = %peer_id, number, hash = %hash.short(), "Starting ancestor search");
                self.transition(SyncState::CommonAncestorSearch(CommonAncestorSearch::new(
                    peer_id, hash, number,
                )));
                Ok(self.state.sync())
            }

            SyncSignal::AncestorFound(ancestor) => {
                let distance = session.target.saturating_sub(ancestor.number());
                if let Some(session) = self.session.as_mut() {
                    session.round_ancestor = ancestor.number();
                }
                let plan = plan_pivots(distance);
                info!(
                    peer = %peer_id,
                    ancestor = ancestor.number(),
                    target = session.target,
                    skip = plan.skip,
                    pivots = plan.pivot_count,
                    "Common ancestor found, starting round"
                );
                self.transition(SyncState::StartRound(StartRound::new(
                    peer_id,
                    ancestor,
                    session.target,
                    plan,
                )));
                Ok(self.state.sync())
            }

            SyncSignal::StartRoundComplete(headers) => {
                self.import(headers);
                self.end_round()
            }

            SyncSignal::BeginFetchRound(sparse) => {
                debug!(peer = %peer_id, pivots = sparse.len(), "Pivots collected, starting fetch round");
                let fetch = FetchRound::new(peer_id, &sparse, session.target);
                self.import(sparse);
                self.transition(SyncState::FetchRound(fetch));
                Ok(self.state.sync())
            }

            SyncSignal::AttemptFailed => self.attempt_failed(SyncError::AttemptsExhausted(
                self.config.max_attempts,
            )),

            SyncSignal::AddDownloadedHeaders(headers) => {
                self.import(headers);
                Ok(None)
            }

            SyncSignal::SyncEnded => self.end_round(),
        }
    }

    fn retry(&mut self, cause: SyncError) -> Result<Option<HeadersRequest>> {
        match self.attempt_failed(cause) {
            Ok(signal) => self.drive(signal.into_iter().collect()),
            Err(err) => Err(self.abort(err)),
        }
    }

    /// Count a failed attempt; re-issue the request or give up with `cause`.
    fn attempt_failed(&mut self, cause: SyncError) -> Result<Option<SyncSignal>> {
        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };
        session.attempts += 1;

        if session.attempts >= self.config.max_attempts {
            return Err(cause);
        }

        debug!(
            peer = %session.peer_id,
            attempt = session.attempts,
            max_attempts = self.config.max_attempts,
            "Attempt failed, retrying"
        );
        Ok(self.state.sync())
    }

    fn end_round(&mut self) -> Result<Option<SyncSignal>> {
        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };
        session.rounds += 1;
        let session = session.clone();

        let best = self.chain.read().best_header().number();
        if let Some(metrics) = &self.metrics {
            metrics.inc_sync_rounds();
            metrics.set_local_best_number(best as i64);
        }

        info!(
            peer = %session.peer_id,
            round = session.rounds,
            best,
            target = session.target,
            "Sync round finished"
        );

        if best >= session.target {
            self.finish(best);
            return Ok(None);
        }
        if best <= session.round_ancestor {
            warn!(peer = %session.peer_id, best, "Round made no progress, ending session");
            self.finish(best);
            return Ok(None);
        }
        if session.rounds >= self.config.max_rounds {
            warn!(peer = %session.peer_id, rounds = session.rounds, "Round limit reached, ending session");
            self.finish(best);
            return Ok(None);
        }

        self.begin_round(session.peer_id, session.target)
    }

    fn finish(&mut self, best: u64) {
        let Some(session) = self.session.take() else {
            return;
        };

        let report = SyncReport {
            peer_id: session.peer_id,
            target: session.target,
            best_number: best,
            rounds: session.rounds,
            imported: session.imported,
        };
        info!(
            peer = %report.peer_id,
            best = report.best_number,
            target = report.target,
            rounds = report.rounds,
            imported = report.imported,
            "Header sync finished"
        );

        self.last_report = Some(report);
        self.transition(SyncState::Round);
    }

    /// End the session with `err`. Returns it for propagation.
    fn abort(&mut self, err: SyncError) -> SyncError {
        let peer_id = self.session.take().map(|session| session.peer_id);

        warn!(peer = ?peer_id, phase = ?self.phase(), error = %err, "Header sync aborted");

        if let Some(metrics) = &self.metrics {
            metrics.inc_sync_failures(err.reason());
        }
        if let Some(peer_id) = peer_id.filter(|_| err.is_peer_misbehavior()) {
            self.peer_manager
                .lock()
                .report_misbehaviour(&peer_id, err.reason());
        }

        self.transition(SyncState::Idle);
        err
    }

    fn import(&mut self, headers: Vec<BlockHeader>) {
        if headers.is_empty() {
            return;
        }

        let imported = self.chain.write().import_headers(headers);
        if let Some(session) = self.session.as_mut() {
            session.imported += imported;
            session.attempts = 0;
        }
        if let Some(metrics) = &self.metrics {
            metrics.inc_headers_imported(imported as u64);
        }
    }

    fn transition(&mut self, next: SyncState) {
        let (from, to) = (self.state.phase(), next.phase());
        if !from.can_transition_to(to) {
            warn!(?from, ?to, "Unexpected sync phase transition");
        } else {
            debug!(?from, ?to, "Sync phase transition");
        }

        self.state = next;
        if let Some(session) = self.session.as_mut() {
            session.attempts = 0;
        }
        if let Some(metrics) = &self.metrics {
            metrics.set_sync_phase(to.as_i64());
        }
    }
}
