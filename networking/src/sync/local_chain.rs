use containers::{BlockHeader, Bytes32};

/// Local header chain as seen by header sync.
///
/// Lookups answer for the canonical chain only. `import_headers` is the
/// persistence side: it accepts headers in any order and is expected to
/// connect them once their parents are present.
pub trait LocalChain {
    /// Highest canonical header. There is always at least a genesis.
    fn best_header(&self) -> BlockHeader;

    /// Canonical header at `number`, if any.
    fn header_by_number(&self, number: u64) -> Option<BlockHeader>;

    /// Any stored header with this hash, canonical or not.
    fn header_by_hash(&self, hash: &Bytes32) -> Option<BlockHeader>;

    /// Whether the header is part of the local canonical chain.
    fn is_header_known(&self, hash: &Bytes32) -> bool {
        self.header_by_hash(hash)
            .and_then(|header| self.header_by_number(header.number()))
            .is_some_and(|canonical| canonical.hash() == *hash)
    }

    /// Store downloaded headers. Returns how many were new.
    fn import_headers(&mut self, headers: Vec<BlockHeader>) -> usize;
}
