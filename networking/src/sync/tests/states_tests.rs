use crate::req_resp::HeadersRequest;
use crate::sync::deciding::DecidingState;
use crate::sync::start_round::StartRound;
use crate::sync::tests::common::*;
use crate::sync::{SyncPhase, SyncSignal, SyncState, plan_pivots};
use libp2p_identity::PeerId;
use pretty_assertions::assert_eq;
use rstest::rstest;

#[test]
fn test_idle_and_round_do_nothing() {
    let chain = build_chain(5);
    let peer_id = PeerId::random();

    for mut state in [SyncState::Idle, SyncState::Round] {
        assert!(!state.is_active());
        assert_eq!(state.sync(), None);
        let signals = state
            .on_block_headers(peer_id, range(&chain, 1, 5), &chain)
            .unwrap();
        assert!(signals.is_empty());
    }
}

#[test]
fn test_default_state_is_idle() {
    assert_eq!(SyncState::default().phase(), SyncPhase::Idle);
}

#[test]
fn test_deciding_at_genesis_skips_search() {
    let chain = build_chain(0);
    let deciding = DecidingState::new(PeerId::random(), at(&chain, 0));

    assert_eq!(deciding.sync(), SyncSignal::AncestorFound(at(&chain, 0)));
}

#[test]
fn test_deciding_starts_search_from_best() {
    let chain = build_chain(42);
    let best = at(&chain, 42);
    let mut state = SyncState::Deciding(DecidingState::new(PeerId::random(), best.clone()));

    assert_eq!(
        state.sync(),
        Some(SyncSignal::StartAncestorSearch {
            hash: best.hash(),
            number: 42,
        })
    );

    // a pure dispatch state never takes a response
    let signals = state
        .on_block_headers(PeerId::random(), range(&chain, 1, 3), &chain)
        .unwrap();
    assert!(signals.is_empty());
}

#[test]
fn test_state_dispatches_to_active_phase() {
    let chain = build_chain(20);
    let peer_id = PeerId::random();
    let mut state = SyncState::StartRound(StartRound::new(
        peer_id,
        at(&chain, 10),
        20,
        plan_pivots(10),
    ));

    assert!(state.is_active());
    assert_eq!(
        state.sync(),
        Some(SyncSignal::SendHeaders(HeadersRequest::ByNumber {
            start: 11,
            count: 10,
            skip: 0,
            reverse: false,
        }))
    );

    let signals = state
        .on_block_headers(peer_id, range(&chain, 11, 20), &chain)
        .unwrap();
    assert_eq!(signals, vec![SyncSignal::StartRoundComplete(range(&chain, 11, 20))]);
}

#[rstest]
#[case(SyncPhase::Idle, SyncPhase::Deciding, true)]
#[case(SyncPhase::Idle, SyncPhase::FetchRound, false)]
#[case(SyncPhase::Deciding, SyncPhase::CommonAncestorSearch, true)]
#[case(SyncPhase::Deciding, SyncPhase::StartRound, true)]
#[case(SyncPhase::CommonAncestorSearch, SyncPhase::StartRound, true)]
#[case(SyncPhase::CommonAncestorSearch, SyncPhase::FetchRound, false)]
#[case(SyncPhase::StartRound, SyncPhase::FetchRound, true)]
#[case(SyncPhase::StartRound, SyncPhase::Round, true)]
#[case(SyncPhase::FetchRound, SyncPhase::Deciding, true)]
#[case(SyncPhase::FetchRound, SyncPhase::StartRound, false)]
#[case(SyncPhase::Round, SyncPhase::Deciding, true)]
#[case(SyncPhase::FetchRound, SyncPhase::Idle, true)]
fn test_phase_transitions(#[case] from: SyncPhase, #[case] to: SyncPhase, #[case] allowed: bool) {
    assert_eq!(from.can_transition_to(to), allowed);
}
