/// Header sync for the light client.
///
/// Catches the local header chain up with a peer's advertised best header.
///
/// - **Planner**: decides how many pivots to probe and how far apart
/// - **States**: one per phase of a round, driven by the service
/// - **Header Cache**: in-memory local chain that keeps orphans until connected
/// - **Peer Manager**: tracks peer chain status and selects the sync peer
/// - **Sync Service**: owns the active state and performs every transition
///
/// ## Round
///
/// 1. Deciding: pick the local header the fork point search starts from
/// 2. CommonAncestorSearch: scan back until a header both sides share
/// 3. StartRound: fetch sparse pivots above the ancestor
/// 4. FetchRound: fill the gaps between pivots, highest gap first
///
/// Short distances are fetched densely by StartRound and skip step 4.
pub mod ancestor_search;
pub mod config;
pub mod deciding;
pub mod error;
pub mod fetch_round;
pub mod header_cache;
pub mod local_chain;
pub mod peer_manager;
pub mod planner;
pub mod service;
pub mod start_round;
pub mod states;
pub mod subchain;

pub use config::*;
pub use error::SyncError;
pub use header_cache::HeaderCache;
pub use local_chain::LocalChain;
pub use peer_manager::{PeerManager, SyncPeer};
pub use planner::{PivotPlan, plan_pivots};
pub use service::{HeaderRequester, LightSyncService, SyncReport};
pub use states::{SyncPhase, SyncSignal, SyncState};
pub use subchain::SubchainRequest;

#[cfg(test)]
pub(crate) mod tests;
