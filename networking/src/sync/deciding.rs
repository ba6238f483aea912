use containers::BlockHeader;
use libp2p_identity::PeerId;
use tracing::debug;

use super::states::SyncSignal;

/// Entry state of a round: decide where the search for a fork point starts.
///
/// A local chain that is only genesis has nothing to search, genesis is the
/// ancestor. Otherwise the search starts from the best local header.
#[derive(Debug, Clone)]
pub struct DecidingState {
    peer_id: PeerId,
    best: BlockHeader,
}

impl DecidingState {
    pub fn new(peer_id: PeerId, best: BlockHeader) -> Self {
        Self { peer_id, best }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn sync(&self) -> SyncSignal {
        if self.best.is_genesis() {
            debug!(peer = %self.peer_id, "Local chain at genesis, skipping ancestor search");
            return SyncSignal::AncestorFound(self.best.clone());
        }

        SyncSignal::StartAncestorSearch {
            hash: self.best.hash(),
            number: self.best.number(),
        }
    }
}
