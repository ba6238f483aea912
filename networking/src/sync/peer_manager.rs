use crate::types::ConnectionState;
use containers::Status;
use libp2p_identity::PeerId;
/// Peer manager for sync operations.
///
/// Tracks peer chain status and selects the peer to sync from.
use std::collections::HashMap;
use tracing::{debug, warn};

/// Sync-specific peer state.
///
/// Wraps peer information with sync-specific state: chain status, request
/// tracking and how often the peer broke the protocol.
#[derive(Debug, Clone)]
pub struct SyncPeer {
    pub peer_id: PeerId,
    pub connection_state: ConnectionState,
    pub status: Option<Status>,
    pub requests_in_flight: usize,
    pub failed_requests: u32,
    pub misbehaviours: u32,
}

impl SyncPeer {
    pub fn new(peer_id: PeerId, connection_state: ConnectionState) -> Self {
        Self {
            peer_id,
            connection_state,
            status: None,
            requests_in_flight: 0,
            failed_requests: 0,
            misbehaviours: 0,
        }
    }

    /// Check if peer is connected.
    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }

    /// Check if peer is available for a new session.
    ///
    /// A session keeps one request in flight, so a peer that is still
    /// answering one is busy.
    pub fn is_available(&self) -> bool {
        self.is_connected() && self.requests_in_flight == 0
    }

    /// Check if peer claims to have the header at `number`.
    pub fn has_number(&self, number: u64) -> bool {
        self.status
            .as_ref()
            .is_some_and(|status| status.best_number >= number)
    }

    /// Mark that a request has been sent to this peer.
    pub fn on_request_start(&mut self) {
        self.requests_in_flight += 1;
    }

    /// Mark that a request has completed.
    pub fn on_request_complete(&mut self) {
        self.requests_in_flight = self.requests_in_flight.saturating_sub(1);
    }
}

/// Peer manager for sync operations.
///
/// Tracks peer chain status and request bookkeeping, and selects the peer
/// a session runs against.
#[derive(Debug, Default, Clone)]
pub struct PeerManager {
    peers: HashMap<PeerId, SyncPeer>,
}

impl PeerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer to the manager.
    pub fn add_peer(
        &mut self,
        peer_id: PeerId,
        connection_state: ConnectionState,
    ) -> &mut SyncPeer {
        self.peers
            .entry(peer_id)
            .or_insert_with(|| SyncPeer::new(peer_id, connection_state))
    }

    /// Remove a peer from the manager.
    pub fn remove_peer(&mut self, peer_id: &PeerId) -> Option<SyncPeer> {
        self.peers.remove(peer_id)
    }

    /// Get a peer by ID.
    pub fn get_peer(&self, peer_id: &PeerId) -> Option<&SyncPeer> {
        self.peers.get(peer_id)
    }

    /// Update peer connection state.
    pub fn update_connection_state(&mut self, peer_id: &PeerId, state: ConnectionState) {
        if let Some(peer) = self.peers.get_mut(peer_id) {
            peer.connection_state = state;
        }
    }

    /// Update peer chain status.
    pub fn update_status(&mut self, peer_id: &PeerId, status: Status) {
        if let Some(peer) = self.peers.get_mut(peer_id) {
            peer.status = Some(status);
        }
    }

    /// Select the peer to sync from.
    ///
    /// Among available peers with a known status, the one with the highest
    /// total difficulty wins; ties go to the longer chain.
    pub fn select_best_peer(&self) -> Option<&SyncPeer> {
        self.peers
            .values()
            .filter(|peer| peer.is_available())
            .filter_map(|peer| peer.status.as_ref().map(|status| (peer, status)))
            .max_by_key(|(_, status)| (status.total_difficulty, status.best_number))
            .map(|(peer, _)| peer)
    }

    /// Mark that a request has been sent to a peer.
    pub fn on_request_start(&mut self, peer_id: &PeerId) {
        if let Some(peer) = self.peers.get_mut(peer_id) {
            peer.on_request_start();
        }
    }

    /// Mark that a request has completed successfully.
    pub fn on_request_complete(&mut self, peer_id: &PeerId) {
        if let Some(peer) = self.peers.get_mut(peer_id) {
            peer.on_request_complete();
        }
    }

    /// Mark that a request has failed.
    pub fn on_request_failure(&mut self, peer_id: &PeerId, reason: &str) {
        if let Some(peer) = self.peers.get_mut(peer_id) {
            peer.on_request_complete();
            peer.failed_requests += 1;
            debug!(peer = %peer_id, reason, failed = peer.failed_requests, "Request failed");
        }
    }

    /// Record a protocol violation. Acting on it is left to peer scoring.
    pub fn report_misbehaviour(&mut self, peer_id: &PeerId, reason: &str) {
        if let Some(peer) = self.peers.get_mut(peer_id) {
            peer.misbehaviours += 1;
            warn!(peer = %peer_id, reason, count = peer.misbehaviours, "Peer misbehaved during sync");
        }
    }

    /// Get all tracked peers.
    pub fn get_all_peers(&self) -> impl Iterator<Item = &SyncPeer> {
        self.peers.values()
    }
}
