use crate::req_resp::{HeadersRequest, serve_headers};
use crate::sync::start_round::StartRound;
use crate::sync::tests::common::*;
use crate::sync::{SyncError, SyncSignal, plan_pivots};
use libp2p_identity::PeerId;
use pretty_assertions::assert_eq;

fn request_of(signal: SyncSignal) -> HeadersRequest {
    match signal {
        SyncSignal::SendHeaders(request) => request,
        other => panic!("expected a request, got {other:?}"),
    }
}

#[test]
fn test_zero_distance_completes_immediately() {
    let chain = build_chain(100);
    let mut round = StartRound::new(PeerId::random(), at(&chain, 100), 100, plan_pivots(0));

    assert_eq!(round.sync(), SyncSignal::StartRoundComplete(Vec::new()));
    assert!(round.sparse().is_empty());
}

#[test]
fn test_sparse_pivots_from_ancestor() {
    let peer = build_chain(400);
    let peer_id = PeerId::random();
    let mut round = StartRound::new(peer_id, at(&peer, 10), 400, plan_pivots(390));

    let request = request_of(round.sync());
    assert_eq!(
        request,
        HeadersRequest::ByNumber {
            start: 11,
            count: 3,
            skip: 192,
            reverse: false,
        }
    );

    let pivots = serve_headers(&peer, &request, 192);
    assert_eq!(numbers(&pivots), vec![11, 204, 397]);

    let signals = round.on_block_headers(peer_id, pivots.clone()).unwrap();
    assert_eq!(signals, vec![SyncSignal::BeginFetchRound(pivots)]);
}

#[test]
fn test_partial_batch_continues_at_next_pivot() {
    let peer = build_chain(400);
    let peer_id = PeerId::random();
    let mut round = StartRound::new(peer_id, at(&peer, 10), 400, plan_pivots(390));

    let request = request_of(round.sync());
    let signals = round
        .on_block_headers(peer_id, serve_headers(&peer, &request, 1))
        .unwrap();
    assert_eq!(signals, vec![SyncSignal::AttemptFailed]);
    assert_eq!(numbers(round.sparse()), vec![11]);
    assert_eq!(round.next_start_number(), 204);

    let request = request_of(round.sync());
    assert_eq!(
        request,
        HeadersRequest::ByNumber {
            start: 204,
            count: 2,
            skip: 192,
            reverse: false,
        }
    );

    let signals = round
        .on_block_headers(peer_id, serve_headers(&peer, &request, 192))
        .unwrap();
    assert_eq!(
        signals,
        vec![SyncSignal::BeginFetchRound(vec![
            at(&peer, 11),
            at(&peer, 204),
            at(&peer, 397),
        ])]
    );
}

#[test]
fn test_dense_range_needs_no_fetch_round() {
    let peer = build_chain(400);
    let peer_id = PeerId::random();
    let mut round = StartRound::new(peer_id, at(&peer, 390), 400, plan_pivots(10));

    let request = request_of(round.sync());
    assert_eq!(
        request,
        HeadersRequest::ByNumber {
            start: 391,
            count: 10,
            skip: 0,
            reverse: false,
        }
    );

    let signals = round
        .on_block_headers(peer_id, serve_headers(&peer, &request, 192))
        .unwrap();
    assert_eq!(
        signals,
        vec![SyncSignal::StartRoundComplete(range(&peer, 391, 400))]
    );
}

#[test]
fn test_first_pivot_must_descend_from_ancestor() {
    let local = build_chain(10);
    let peer = fork_chain(&local, 5, 400, 4);
    let peer_id = PeerId::random();
    let mut round = StartRound::new(peer_id, at(&local, 10), 400, plan_pivots(390));

    let request = request_of(round.sync());
    let result = round.on_block_headers(peer_id, serve_headers(&peer, &request, 192));

    assert_eq!(
        result,
        Err(SyncError::ParentMismatch {
            number: 11,
            expected: at(&local, 10).hash(),
        })
    );
}

#[test]
fn test_dense_batch_must_be_linked() {
    let peer = build_chain(400);
    let other = fork_chain(&peer, 394, 400, 9);
    let peer_id = PeerId::random();
    let mut round = StartRound::new(peer_id, at(&peer, 390), 400, plan_pivots(10));
    round.sync();

    let mut headers = range(&peer, 391, 400);
    headers[5] = at(&other, 396);

    let result = round.on_block_headers(peer_id, headers);
    assert_eq!(
        result,
        Err(SyncError::ParentMismatch {
            number: 396,
            expected: at(&peer, 395).hash(),
        })
    );
}

#[test]
fn test_forged_pivots_rejected() {
    let peer = build_chain(400);
    let peer_id = PeerId::random();
    let mut round = StartRound::new(peer_id, at(&peer, 10), 400, plan_pivots(390));

    let request = request_of(round.sync());
    let forged: Vec<_> = serve_headers(&peer, &request, 192).iter().map(forge).collect();

    let result = round.on_block_headers(peer_id, forged);
    assert_eq!(
        result,
        Err(SyncError::InvalidHeaderHash {
            number: 11,
            hash: at(&peer, 11).hash(),
        })
    );
    assert!(round.sparse().is_empty());
}

#[test]
fn test_wrong_spacing_rejected() {
    let peer = build_chain(400);
    let peer_id = PeerId::random();
    let mut round = StartRound::new(peer_id, at(&peer, 10), 400, plan_pivots(390));
    round.sync();

    let result = round.on_block_headers(peer_id, vec![at(&peer, 11), at(&peer, 205)]);
    assert_eq!(
        result,
        Err(SyncError::IncorrectSpacing {
            low: 11,
            high: 205,
            skip: 192,
        })
    );
}

#[test]
fn test_too_many_pivots_rejected() {
    let peer = build_chain(800);
    let peer_id = PeerId::random();
    let mut round = StartRound::new(peer_id, at(&peer, 10), 400, plan_pivots(390));
    round.sync();

    let headers = vec![at(&peer, 11), at(&peer, 204), at(&peer, 397), at(&peer, 590)];
    let result = round.on_block_headers(peer_id, headers);
    assert_eq!(
        result,
        Err(SyncError::TooManyHeaders {
            requested: 3,
            received: 4,
        })
    );
}

#[test]
fn test_wrong_first_pivot_rejected() {
    let peer = build_chain(400);
    let peer_id = PeerId::random();
    let mut round = StartRound::new(peer_id, at(&peer, 10), 400, plan_pivots(390));
    round.sync();

    let result = round.on_block_headers(peer_id, vec![at(&peer, 12)]);
    assert_eq!(
        result,
        Err(SyncError::UnexpectedFirstHeader {
            expected: 11,
            actual: 12,
        })
    );
}

#[test]
fn test_redelivered_batch_leaves_pivots_untouched() {
    let peer = build_chain(400);
    let peer_id = PeerId::random();
    let mut round = StartRound::new(peer_id, at(&peer, 10), 400, plan_pivots(390));

    let request = request_of(round.sync());
    let pivots = serve_headers(&peer, &request, 192);
    round.on_block_headers(peer_id, pivots.clone()).unwrap();

    let signals = round.on_block_headers(peer_id, pivots.clone()).unwrap();
    assert!(signals.is_empty());
    assert_eq!(round.sparse(), pivots.as_slice());

    let signals = round.on_block_headers(PeerId::random(), pivots).unwrap();
    assert!(signals.is_empty());
}
