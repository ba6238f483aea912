/// In-memory header store with orphan tracking.
///
/// Headers can arrive out of order: a fetch round downloads gaps from the
/// highest one down, so most headers land before their parents. Such
/// headers are kept as orphans and connected as soon as the parent chain
/// reaches them.
use std::collections::{BTreeMap, HashMap, HashSet};

use containers::{BlockHeader, Bytes32};
use tracing::debug;

use super::local_chain::LocalChain;

#[derive(Debug, Clone)]
pub struct HeaderCache {
    /// Every stored header, connected or not
    headers: HashMap<Bytes32, BlockHeader>,

    /// Headers that descend from genesis through stored headers
    connected: HashSet<Bytes32>,

    /// Waiting children of each missing parent (parent hash -> child hashes)
    orphans: HashMap<Bytes32, HashSet<Bytes32>>,

    /// Canonical chain by number
    canonical: BTreeMap<u64, Bytes32>,
}

impl HeaderCache {
    pub fn new(genesis: BlockHeader) -> Self {
        let hash = genesis.hash();
        let mut cache = Self {
            headers: HashMap::new(),
            connected: HashSet::new(),
            orphans: HashMap::new(),
            canonical: BTreeMap::new(),
        };
        cache.canonical.insert(genesis.number(), hash);
        cache.connected.insert(hash);
        cache.headers.insert(hash, genesis);
        cache
    }

    /// Add a header to the cache.
    ///
    /// Returns false if it was already stored. A header whose parent is
    /// connected is connected immediately, together with any orphans that
    /// were waiting on it. It becomes the canonical head only if it is
    /// higher than the current best.
    pub fn add_header(&mut self, header: BlockHeader) -> bool {
        let hash = header.hash();
        if self.headers.contains_key(&hash) {
            return false;
        }

        let parent_hash = header.parent_hash();
        self.headers.insert(hash, header);

        if self.connected.contains(&parent_hash) {
            self.connect(hash);
        } else {
            self.orphans.entry(parent_hash).or_default().insert(hash);
        }

        true
    }

    fn connect(&mut self, root: Bytes32) {
        let mut pending = vec![root];

        while let Some(hash) = pending.pop() {
            self.connected.insert(hash);
            self.set_canonical_head(hash);

            if let Some(children) = self.orphans.remove(&hash) {
                pending.extend(children);
            }
        }
    }

    fn set_canonical_head(&mut self, head: Bytes32) {
        let Some(number) = self.headers.get(&head).map(BlockHeader::number) else {
            return;
        };
        if self.canonical.keys().next_back().is_some_and(|best| *best >= number) {
            return;
        }

        let mut current = head;
        while let Some(header) = self.headers.get(&current) {
            if self.canonical.get(&header.number()) == Some(&current) {
                break;
            }
            self.canonical.insert(header.number(), current);
            if header.is_genesis() {
                break;
            }
            current = header.parent_hash();
        }
    }

    /// Check if a header exists in the cache.
    pub fn contains(&self, hash: &Bytes32) -> bool {
        self.headers.contains_key(hash)
    }

    /// Check if a stored header still waits for its parent chain.
    pub fn is_orphan(&self, hash: &Bytes32) -> bool {
        self.headers.contains_key(hash) && !self.connected.contains(hash)
    }

    /// Get all orphan header hashes.
    pub fn get_orphans(&self) -> Vec<Bytes32> {
        self.orphans.values().flatten().copied().collect()
    }

    /// Parents that orphans are waiting for and that are not stored.
    pub fn get_missing_parents(&self) -> Vec<Bytes32> {
        self.orphans
            .keys()
            .filter(|parent| !self.headers.contains_key(parent))
            .copied()
            .collect()
    }

    /// Get the number of stored headers.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Genesis is always present, so this only holds for a fresh cache.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl LocalChain for HeaderCache {
    fn best_header(&self) -> BlockHeader {
        self.canonical
            .values()
            .next_back()
            .and_then(|hash| self.headers.get(hash))
            .cloned()
            .unwrap_or_default()
    }

    fn header_by_number(&self, number: u64) -> Option<BlockHeader> {
        self.canonical
            .get(&number)
            .and_then(|hash| self.headers.get(hash))
            .cloned()
    }

    fn header_by_hash(&self, hash: &Bytes32) -> Option<BlockHeader> {
        self.headers.get(hash).cloned()
    }

    fn import_headers(&mut self, headers: Vec<BlockHeader>) -> usize {
        let total = headers.len();
        let imported = headers
            .into_iter()
            .filter(|header| self.add_header(header.clone()))
            .count();

        debug!(
            total,
            imported,
            orphans = self.get_orphans().len(),
            best = self.best_header().number(),
            "Imported headers"
        );

        imported
    }
}
