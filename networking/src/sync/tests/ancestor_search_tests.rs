use crate::req_resp::{HeadersRequest, serve_headers};
use crate::sync::ancestor_search::CommonAncestorSearch;
use crate::sync::tests::common::*;
use crate::sync::{HeaderCache, SyncError, SyncSignal};
use containers::BlockHeader;
use libp2p_identity::PeerId;
use pretty_assertions::assert_eq;

fn search_from(chain: &HeaderCache, peer_id: PeerId, number: u64) -> CommonAncestorSearch {
    let header = at(chain, number);
    CommonAncestorSearch::new(peer_id, header.hash(), header.number())
}

fn expect_request(signal: SyncSignal) -> HeadersRequest {
    match signal {
        SyncSignal::SendHeaders(request) => request,
        other => panic!("expected a request, got {other:?}"),
    }
}

#[test]
fn test_request_is_backward_and_bounded() {
    let local = build_chain(300);
    let mut search = search_from(&local, PeerId::random(), 300);

    assert_eq!(
        expect_request(search.sync()),
        HeadersRequest::ByNumber {
            start: 300,
            count: 192,
            skip: 0,
            reverse: true,
        }
    );

    let mut short = search_from(&local, PeerId::random(), 7);
    assert_eq!(expect_request(short.sync()).count(), 7);
}

#[test]
fn test_shared_tip_is_ancestor() {
    let local = build_chain(300);
    let peer = build_chain(300);
    let peer_id = PeerId::random();
    let mut search = search_from(&local, peer_id, 300);

    let request = expect_request(search.sync());
    let signals = search
        .on_block_headers(peer_id, serve_headers(&peer, &request, 192), &local)
        .unwrap();

    assert_eq!(signals, vec![SyncSignal::AncestorFound(at(&local, 300))]);
}

#[test]
fn test_scan_moves_down_by_batch_size() {
    let local = build_chain(300);
    let peer = fork_chain(&local, 20, 400, 7);
    let peer_id = PeerId::random();
    let mut search = search_from(&local, peer_id, 300);

    let request = expect_request(search.sync());
    let batch = serve_headers(&peer, &request, 192);
    assert_eq!(batch.len(), 192);

    let signals = search.on_block_headers(peer_id, batch, &local).unwrap();
    assert_eq!(search.number(), 300 - 192);
    assert_eq!(search.hash(), at(&local, 108).hash());
    assert_eq!(
        signals,
        vec![SyncSignal::SendHeaders(HeadersRequest::ByNumber {
            start: 108,
            count: 108,
            skip: 0,
            reverse: true,
        })]
    );

    let request = expect_request(signals[0].clone());
    let signals = search
        .on_block_headers(peer_id, serve_headers(&peer, &request, 192), &local)
        .unwrap();
    assert_eq!(signals, vec![SyncSignal::AncestorFound(at(&local, 20))]);
}

#[test]
fn test_fork_at_genesis_yields_genesis() {
    let local = build_chain(10);
    let peer = fork_chain(&local, 0, 30, 3);
    let peer_id = PeerId::random();
    let mut search = search_from(&local, peer_id, 10);

    let request = expect_request(search.sync());
    let signals = search
        .on_block_headers(peer_id, serve_headers(&peer, &request, 192), &local)
        .unwrap();

    assert_eq!(signals, vec![SyncSignal::AncestorFound(at(&local, 0))]);
}

#[test]
fn test_foreign_genesis_has_no_common_ancestor() {
    let local = build_chain(10);
    let peer = foreign_chain(50);
    let peer_id = PeerId::random();
    let mut search = search_from(&local, peer_id, 10);

    let request = expect_request(search.sync());
    let result = search.on_block_headers(peer_id, serve_headers(&peer, &request, 192), &local);

    assert_eq!(result, Err(SyncError::NoCommonAncestor));
}

#[test]
fn test_oversized_batch_rejected() {
    let local = build_chain(20);
    let peer_id = PeerId::random();
    let mut search = search_from(&local, peer_id, 5);
    search.sync();

    let result = search.on_block_headers(peer_id, range_rev(&local, 6, 1), &local);
    assert_eq!(
        result,
        Err(SyncError::TooManyHeaders {
            requested: 5,
            received: 6,
        })
    );
}

#[test]
fn test_batch_must_start_at_requested_number() {
    let local = build_chain(20);
    let peer_id = PeerId::random();
    let mut search = search_from(&local, peer_id, 5);
    search.sync();

    let result = search.on_block_headers(peer_id, range_rev(&local, 4, 1), &local);
    assert_eq!(
        result,
        Err(SyncError::UnexpectedFirstHeader {
            expected: 5,
            actual: 4,
        })
    );
}

#[test]
fn test_batch_must_descend_by_one() {
    let local = build_chain(20);
    let peer_id = PeerId::random();
    let mut search = search_from(&local, peer_id, 5);
    search.sync();

    let headers: Vec<BlockHeader> = vec![at(&local, 5), at(&local, 3)];
    let result = search.on_block_headers(peer_id, headers, &local);
    assert_eq!(
        result,
        Err(SyncError::IncorrectSpacing {
            low: 3,
            high: 5,
            skip: 0,
        })
    );
}

#[test]
fn test_forged_known_hash_is_not_an_ancestor() {
    let local = build_chain(20);
    let peer_id = PeerId::random();
    let mut search = search_from(&local, peer_id, 20);
    search.sync();

    let forged: Vec<BlockHeader> = range_rev(&local, 20, 1).iter().map(forge).collect();
    let result = search.on_block_headers(peer_id, forged, &local);
    assert_eq!(
        result,
        Err(SyncError::InvalidHeaderHash {
            number: 20,
            hash: at(&local, 20).hash(),
        })
    );
}

#[test]
fn test_empty_batch_retries_same_request() {
    let local = build_chain(20);
    let peer_id = PeerId::random();
    let mut search = search_from(&local, peer_id, 20);
    let first = expect_request(search.sync());

    let signals = search.on_block_headers(peer_id, Vec::new(), &local).unwrap();
    assert_eq!(signals, vec![SyncSignal::AttemptFailed]);
    assert_eq!(search.number(), 20);
    assert_eq!(expect_request(search.sync()), first);
}

#[test]
fn test_unexpected_responses_are_ignored() {
    let local = build_chain(20);
    let peer = build_chain(20);
    let peer_id = PeerId::random();
    let mut search = search_from(&local, peer_id, 20);

    // nothing requested yet
    let signals = search
        .on_block_headers(peer_id, range_rev(&peer, 20, 1), &local)
        .unwrap();
    assert!(signals.is_empty());

    search.sync();
    let signals = search
        .on_block_headers(PeerId::random(), range_rev(&peer, 20, 1), &local)
        .unwrap();
    assert!(signals.is_empty());

    // the real response is still expected
    let signals = search
        .on_block_headers(peer_id, range_rev(&peer, 20, 1), &local)
        .unwrap();
    assert_eq!(signals, vec![SyncSignal::AncestorFound(at(&local, 20))]);
}
