use std::rc::Rc;

use duet_session::{
    media::{LocalStream, MediaKind},
    negotiator::{NegotiationError, NegotiationState, SessionNegotiator},
    participants::{Participant, RegistryEvent, Role},
    peer::{HandleId, PeerConnection, PeerEvent},
    platform::{
        IceCandidate, MediaStreamTrack, PeerConnectionState,
        RtcPeerConnectionError, RtcPeerConnectionEvent, SdpType,
    },
    reconnect::{Reaction, ReconnectionController},
    session::{HandleParams, HandleSlot, SessionHandle},
    signaling::{OutboundMessage, SignalingTransport as _},
};
use futures::{channel::mpsc, StreamExt as _};

use crate::{
    if_let_next, local,
    mock::{MockPeerFactory, MockTrack, MockTransport, PeerCall},
    settle,
};

fn candidate(n: usize) -> IceCandidate {
    IceCandidate {
        candidate: format!("candidate:{}", n),
        sdp_m_line_index: Some(0),
        sdp_mid: Some("0".to_owned()),
    }
}

async fn new_peer(
    factory: &MockPeerFactory,
    local_stream: Option<&LocalStream>,
) -> (Rc<PeerConnection>, mpsc::UnboundedReceiver<PeerEvent>) {
    let (tx, rx) = mpsc::unbounded();
    let peer = PeerConnection::new(HandleId(1), factory, &[], local_stream, tx)
        .await
        .unwrap();
    (peer, rx)
}

async fn connected_transport() -> Rc<MockTransport> {
    let transport = MockTransport::new();
    transport.connect().await.unwrap();
    transport
}

#[tokio::test]
async fn buffered_candidates_are_applied_before_live_ones() {
    local(async {
        let factory = MockPeerFactory::new();
        let (peer, _events) = new_peer(&factory, None).await;

        for n in 1..=3 {
            peer.add_ice_candidate(candidate(n)).await.unwrap();
        }
        assert_eq!(peer.buffered_ice_candidates(), 3);
        assert!(factory.peer(1).applied_candidates().is_empty());

        peer.set_remote_offer("v=0".to_owned()).await.unwrap();
        assert_eq!(peer.flush_ice_candidates().await, 3);
        for n in 4..=5 {
            peer.add_ice_candidate(candidate(n)).await.unwrap();
        }

        assert_eq!(peer.buffered_ice_candidates(), 0);
        assert_eq!(
            factory.peer(1).applied_candidates(),
            (1..=5).map(|n| format!("candidate:{}", n)).collect::<Vec<_>>(),
        );
    })
    .await;
}

#[tokio::test]
async fn attaches_local_tracks_on_creation() {
    local(async {
        let factory = MockPeerFactory::new();
        let audio: Rc<dyn MediaStreamTrack> = MockTrack::new(MediaKind::Audio);
        let video: Rc<dyn MediaStreamTrack> = MockTrack::new(MediaKind::Video);
        let stream = LocalStream::new(vec![audio, video]);

        let (_peer, _events) = new_peer(&factory, Some(&stream)).await;

        assert_eq!(
            factory.peer(1).calls(),
            vec![
                PeerCall::AddTrack(MediaKind::Audio),
                PeerCall::AddTrack(MediaKind::Video),
            ],
        );
    })
    .await;
}

#[tokio::test]
async fn closed_peer_rejects_operations() {
    local(async {
        let factory = MockPeerFactory::new();
        let (peer, _events) = new_peer(&factory, None).await;

        peer.close();
        peer.close();

        assert!(peer.is_closed());
        assert_eq!(factory.peer(1).calls(), vec![PeerCall::Close]);
        let err = peer.create_and_set_local_offer().await.unwrap_err();
        assert_eq!(err.into_inner(), RtcPeerConnectionError::Closed);
        let err = peer.add_ice_candidate(candidate(1)).await.unwrap_err();
        assert_eq!(err.into_inner(), RtcPeerConnectionError::Closed);
        assert_eq!(peer.flush_ice_candidates().await, 0);
    })
    .await;
}

#[tokio::test]
async fn forwards_platform_events_with_handle_id() {
    local(async {
        let factory = MockPeerFactory::new();
        let (peer, mut events) = new_peer(&factory, None).await;

        factory.peer(1).emit(RtcPeerConnectionEvent::ConnectionStateChange(
            PeerConnectionState::Connected,
        ));
        factory
            .peer(1)
            .emit(RtcPeerConnectionEvent::IceCandidate(candidate(7)));

        if_let_next! {
            PeerEvent::ConnectionStateChanged { handle_id, state } = events {
                assert_eq!(handle_id, HandleId(1));
                assert_eq!(state, PeerConnectionState::Connected);
            }
        }
        if_let_next! {
            PeerEvent::IceCandidateDiscovered { candidate: c, .. } = events {
                assert_eq!(c, candidate(7));
            }
        }

        peer.close();
        factory
            .peer(1)
            .emit(RtcPeerConnectionEvent::IceCandidate(candidate(8)));
        settle().await;
        assert!(events.next().await.is_none());
    })
    .await;
}

#[tokio::test]
async fn initiator_creates_single_offer_per_handle() {
    local(async {
        let factory = MockPeerFactory::new();
        let transport = connected_transport().await;
        let (peer, _events) = new_peer(&factory, None).await;
        let negotiator = SessionNegotiator::new(
            Role::Initiator,
            "host-1".into(),
            peer,
            transport.clone(),
        );

        assert!(negotiator.initiate().await.unwrap());
        assert!(!negotiator.initiate().await.unwrap());

        assert_eq!(negotiator.state(), NegotiationState::HaveLocalOffer);
        assert_eq!(factory.peer(1).offers_created(), 1);
        assert_eq!(transport.sent_offers(), vec![factory.peer(1).offer_sdp()]);
        assert!(negotiator.is_own_description(&factory.peer(1).offer_sdp()));
    })
    .await;
}

#[tokio::test]
async fn responder_never_initiates() {
    local(async {
        let factory = MockPeerFactory::new();
        let transport = connected_transport().await;
        let (peer, _events) = new_peer(&factory, None).await;
        let negotiator = SessionNegotiator::new(
            Role::Responder,
            "guest-1".into(),
            peer,
            transport.clone(),
        );

        let err = negotiator.initiate().await.unwrap_err();

        assert_eq!(err.into_inner(), NegotiationError::NotInitiator);
        assert_eq!(factory.peer(1).offers_created(), 0);
        assert!(transport.sent().is_empty());
    })
    .await;
}

#[tokio::test]
async fn roles_reject_descriptions_of_their_own_kind() {
    local(async {
        let factory = MockPeerFactory::new();
        let transport = connected_transport().await;

        let (peer, _events) = new_peer(&factory, None).await;
        let initiator = SessionNegotiator::new(
            Role::Initiator,
            "host-1".into(),
            peer,
            transport.clone(),
        );
        let err = initiator
            .on_offer_received("v=0".to_owned())
            .await
            .unwrap_err();
        assert_eq!(
            err.into_inner(),
            NegotiationError::UnexpectedOffer(Role::Initiator),
        );

        let (peer, _events) = new_peer(&factory, None).await;
        let responder = SessionNegotiator::new(
            Role::Responder,
            "guest-1".into(),
            peer,
            transport.clone(),
        );
        let err = responder
            .on_answer_received("v=0".to_owned())
            .await
            .unwrap_err();
        assert_eq!(
            err.into_inner(),
            NegotiationError::UnexpectedAnswer(Role::Responder),
        );

        assert_eq!(factory.peer(1).remote_descriptions(), 0);
        assert_eq!(factory.peer(2).remote_descriptions(), 0);
        assert!(transport.sent().is_empty());
    })
    .await;
}

#[tokio::test]
async fn responder_flushes_candidates_right_after_remote_offer() {
    local(async {
        let factory = MockPeerFactory::new();
        let transport = connected_transport().await;
        let (peer, _events) = new_peer(&factory, None).await;
        for n in 1..=3 {
            peer.add_ice_candidate(candidate(n)).await.unwrap();
        }
        let negotiator = SessionNegotiator::new(
            Role::Responder,
            "guest-1".into(),
            peer,
            transport.clone(),
        );

        negotiator
            .on_offer_received("offer-x".to_owned())
            .await
            .unwrap();

        assert_eq!(
            factory.peer(1).calls(),
            vec![
                PeerCall::SetRemoteDescription(SdpType::Offer(
                    "offer-x".to_owned()
                )),
                PeerCall::AddIceCandidate("candidate:1".to_owned()),
                PeerCall::AddIceCandidate("candidate:2".to_owned()),
                PeerCall::AddIceCandidate("candidate:3".to_owned()),
                PeerCall::CreateAnswer,
            ],
        );
        assert_eq!(negotiator.state(), NegotiationState::Stable);
        assert_eq!(
            transport.sent(),
            vec![
                OutboundMessage::Answer {
                    sdp: factory.peer(1).answer_sdp(),
                },
                OutboundMessage::ParticipantJoined {
                    role: Role::Responder,
                    participant_id: "guest-1".into(),
                },
            ],
        );

        assert!(negotiator.is_own_description(&factory.peer(1).answer_sdp()));
        assert!(!negotiator.is_own_description("offer-x"));

        let err = negotiator
            .on_offer_received("offer-y".to_owned())
            .await
            .unwrap_err();
        assert_eq!(err.into_inner(), NegotiationError::OfferAlreadyApplied);
    })
    .await;
}

#[tokio::test]
async fn initiator_requires_offer_before_answer() {
    local(async {
        let factory = MockPeerFactory::new();
        let transport = connected_transport().await;
        let (peer, _events) = new_peer(&factory, None).await;
        let negotiator = SessionNegotiator::new(
            Role::Initiator,
            "host-1".into(),
            peer,
            transport,
        );

        let err = negotiator
            .on_answer_received("answer-x".to_owned())
            .await
            .unwrap_err();
        assert_eq!(
            err.into_inner(),
            NegotiationError::AnswerWithoutOffer(NegotiationState::Idle),
        );

        negotiator.initiate().await.unwrap();
        negotiator
            .on_answer_received("answer-x".to_owned())
            .await
            .unwrap();
        assert_eq!(negotiator.state(), NegotiationState::Stable);
        assert!(negotiator.take_join_ack());
        assert!(!negotiator.take_join_ack());
    })
    .await;
}

fn joined(id: &str, role: Role) -> RegistryEvent {
    RegistryEvent::Joined(Participant {
        id: id.into(),
        display_name: None,
        role,
        joined_at: chrono::Utc::now(),
        active: true,
    })
}

#[tokio::test]
async fn rebuild_closes_predecessor_first() {
    local(async {
        let factory = MockPeerFactory::new();
        let transport = connected_transport().await;
        let (tx, _rx) = mpsc::unbounded();
        let slot = HandleSlot::default();
        let reconnection =
            ReconnectionController::new(Role::Initiator, "host-1".into());

        for _ in 0..3 {
            let event = joined("guest-1", Role::Responder);
            let current = slot.current();
            assert_eq!(
                reconnection.react(&event, current.as_deref()),
                Reaction::Rebuild,
            );

            let params = HandleParams {
                role: Role::Initiator,
                local_id: "host-1".into(),
                factory: factory.as_ref(),
                ice_servers: &[],
                local_stream: None,
                transport: transport.clone(),
                peer_events: tx.clone(),
            };
            let handle = reconnection
                .rebuild(&slot, |id| {
                    assert_eq!(factory.open(), 0);
                    SessionHandle::new(id, params)
                })
                .await
                .unwrap();

            assert_eq!(factory.open(), 1);
            assert!(slot.is_current(handle.id()));
        }

        assert_eq!(factory.created(), 3);
        assert!(reconnection.teardown(&slot));
        assert!(!reconnection.teardown(&slot));
        assert_eq!(factory.open(), 0);
    })
    .await;
}

#[tokio::test]
async fn acknowledged_join_does_not_rebuild() {
    local(async {
        let factory = MockPeerFactory::new();
        let transport = connected_transport().await;
        let (tx, _rx) = mpsc::unbounded();
        let slot = HandleSlot::default();
        let reconnection =
            ReconnectionController::new(Role::Initiator, "host-1".into());
        let params = HandleParams {
            role: Role::Initiator,
            local_id: "host-1".into(),
            factory: factory.as_ref(),
            ice_servers: &[],
            local_stream: None,
            transport: transport.clone(),
            peer_events: tx,
        };
        let handle = reconnection
            .rebuild(&slot, |id| SessionHandle::new(id, params))
            .await
            .unwrap();
        handle.negotiator().initiate().await.unwrap();
        handle
            .negotiator()
            .on_answer_received("answer-x".to_owned())
            .await
            .unwrap();

        let event = joined("guest-1", Role::Responder);
        assert_eq!(
            reconnection.react(&event, Some(handle.as_ref())),
            Reaction::AcknowledgeJoin,
        );
        assert_eq!(
            reconnection.react(&event, Some(handle.as_ref())),
            Reaction::Rebuild,
        );
        assert_eq!(
            reconnection.react(&RegistryEvent::Kicked("host-1".into()), None),
            Reaction::ForceDisconnect,
        );
        assert_eq!(
            reconnection.react(&RegistryEvent::Kicked("guest-1".into()), None),
            Reaction::Ignore,
        );
        assert_eq!(
            reconnection.react(&joined("host-2", Role::Initiator), None),
            Reaction::Ignore,
        );
    })
    .await;
}
