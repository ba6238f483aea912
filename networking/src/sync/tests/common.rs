use containers::{BlockHeader, Bytes32};

use crate::sync::{HeaderCache, LocalChain};

pub fn genesis() -> BlockHeader {
    BlockHeader::genesis(Bytes32::zero(), 0)
}

/// `count` headers on top of `parent`. Different salts give different forks.
pub fn extend(parent: &BlockHeader, count: u64, salt: u8) -> Vec<BlockHeader> {
    let mut headers = Vec::with_capacity(count as usize);
    let mut tip = parent.clone();
    for _ in 0..count {
        let next = tip.child(Bytes32::from([salt; 32]), (tip.number() + 1) * 12);
        headers.push(next.clone());
        tip = next;
    }
    headers
}

/// Canonical chain `0..=best`. Equal lengths give identical chains.
pub fn build_chain(best: u64) -> HeaderCache {
    let genesis = genesis();
    let mut chain = HeaderCache::new(genesis.clone());
    chain.import_headers(extend(&genesis, best, 0));
    chain
}

/// Chain that shares `0..=fork_at` with `base` and continues to `best` on its own.
pub fn fork_chain(base: &HeaderCache, fork_at: u64, best: u64, salt: u8) -> HeaderCache {
    let mut chain = HeaderCache::new(base.header_by_number(0).unwrap());
    chain.import_headers(range(base, 1, fork_at));
    let tip = chain.best_header();
    chain.import_headers(extend(&tip, best - fork_at, salt));
    chain
}

/// Chain of `best` headers on a genesis nobody else has.
pub fn foreign_chain(best: u64) -> HeaderCache {
    let genesis = BlockHeader::genesis(Bytes32::from([0xff; 32]), 1);
    let mut chain = HeaderCache::new(genesis.clone());
    chain.import_headers(extend(&genesis, best, 0));
    chain
}

/// Canonical headers `from..=to`, ascending.
pub fn range(chain: &HeaderCache, from: u64, to: u64) -> Vec<BlockHeader> {
    (from..=to)
        .map(|number| chain.header_by_number(number).unwrap())
        .collect()
}

/// Canonical headers `to..=from`, descending.
pub fn range_rev(chain: &HeaderCache, from: u64, to: u64) -> Vec<BlockHeader> {
    let mut headers = range(chain, to, from);
    headers.reverse();
    headers
}

pub fn at(chain: &HeaderCache, number: u64) -> BlockHeader {
    chain.header_by_number(number).unwrap()
}

/// Header that keeps the hash and parent link of `header` but not its contents.
pub fn forge(header: &BlockHeader) -> BlockHeader {
    BlockHeader::with_hash(header.number(), header.hash(), header.parent_hash())
}

pub fn numbers(headers: &[BlockHeader]) -> Vec<u64> {
    headers.iter().map(BlockHeader::number).collect()
}
