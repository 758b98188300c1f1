use std::rc::Rc;

use duet_session::{
    media::MediaMode,
    negotiator::{NegotiationError, NegotiationState},
    participants::Role,
    platform::{
        self, IceCandidate, MediaStreamTrack as _, PeerConnectionState,
        RtcPeerConnectionError, RtcPeerConnectionEvent, SdpType,
    },
    signaling::{OutboundMessage, SignalingMessage, TransportError},
    ConnectionState, SessionConfig, SessionController, SessionError,
};
use futures::StreamExt as _;

use crate::{
    local,
    mock::{
        MockMediaDevices, MockPeerFactory, MockTrack, MockTransport, PeerCall,
    },
    settle, wait_for,
};

/// One side of a session with its mocked platform.
struct Side {
    session: Rc<SessionController>,
    devices: Rc<MockMediaDevices>,
    factory: Rc<MockPeerFactory>,
    transport: Rc<MockTransport>,
}

impl Side {
    fn new(
        role: Role,
        id: &str,
        devices: Rc<MockMediaDevices>,
        transport: Rc<MockTransport>,
    ) -> Self {
        let factory = MockPeerFactory::new();
        let session = SessionController::new(
            SessionConfig {
                session_id: "s-1".into(),
                participant_id: id.into(),
                display_name: None,
                role,
                ice_servers: Vec::new(),
            },
            devices.clone(),
            factory.clone(),
            transport.clone(),
        );
        Self {
            session: Rc::new(session),
            devices,
            factory,
            transport,
        }
    }

    fn initiator() -> Self {
        Self::new(
            Role::Initiator,
            "host-1",
            MockMediaDevices::new(true, true),
            MockTransport::new(),
        )
    }

    fn responder() -> Self {
        Self::new(
            Role::Responder,
            "guest-1",
            MockMediaDevices::new(true, true),
            MockTransport::new(),
        )
    }

    fn state(&self) -> ConnectionState {
        self.session.connection_state()
    }

    /// Starts the session and waits until its initial handle is built.
    async fn start(&self) {
        let created = self.factory.created();
        self.session.start().await;
        assert_eq!(self.state(), ConnectionState::Connected);
        wait_for("initial handle", || self.factory.created() > created).await;
    }

    /// Delivers the provided message and lets the session process it.
    async fn receive(&self, msg: SignalingMessage) {
        self.transport.deliver(msg);
        settle().await;
    }
}

fn joined(id: &str, role: Role) -> SignalingMessage {
    SignalingMessage::ParticipantJoined {
        participant_id: id.into(),
        role,
        display_name: Some("Guest".to_owned()),
    }
}

fn candidate(n: usize) -> IceCandidate {
    IceCandidate {
        candidate: format!("candidate:{}", n),
        sdp_m_line_index: Some(0),
        sdp_mid: Some("0".to_owned()),
    }
}

#[tokio::test]
async fn responder_join_leads_both_sides_to_negotiate() {
    local(async {
        let (host_link, guest_link) = MockTransport::pair();
        let host = Side::new(
            Role::Initiator,
            "host-1",
            MockMediaDevices::new(true, true),
            host_link,
        );
        let guest = Side::new(
            Role::Responder,
            "guest-1",
            MockMediaDevices::new(true, true),
            guest_link,
        );

        host.start().await;
        assert!(host.transport.sent_offers().is_empty());

        guest.start().await;
        wait_for("join acknowledgement", || {
            host.factory.created() == 2
                && host.factory.peer(2).remote_descriptions() == 1
                && host.transport.sent().len() == 1
                && guest.transport.sent().len() == 3
        })
        .await;
        settle().await;

        let host_peer = host.factory.peer(2);
        let guest_peer = guest.factory.peer(1);
        assert!(host.factory.peer(1).is_closed());
        assert_eq!(host.factory.created(), 2);
        assert_eq!(host.transport.sent_offers(), vec![host_peer.offer_sdp()]);
        assert_eq!(
            guest.transport.sent_answers(),
            vec![guest_peer.answer_sdp()],
        );
        assert_eq!(
            guest_peer.position(|c| matches!(
                c,
                PeerCall::SetRemoteDescription(SdpType::Offer(_))
            )),
            guest_peer
                .position(|c| *c == PeerCall::CreateAnswer)
                .map(|p| p - 1),
        );
        assert!(host_peer
            .calls()
            .contains(&PeerCall::SetRemoteDescription(SdpType::Answer(
                guest_peer.answer_sdp()
            ))));
        assert_eq!(host.state(), ConnectionState::Connected);
        assert_eq!(guest.state(), ConnectionState::Connected);
        assert_eq!(host.session.error(), None);
        assert_eq!(guest.session.error(), None);

        host_peer.emit(RtcPeerConnectionEvent::IceCandidate(candidate(1)));
        wait_for("candidate exchange", || {
            guest_peer.applied_candidates() == vec!["candidate:1".to_owned()]
        })
        .await;

        host_peer.emit(RtcPeerConnectionEvent::ConnectionStateChange(
            PeerConnectionState::Connected,
        ));
        settle().await;
        assert_eq!(host.state(), ConnectionState::Connected);
        assert_eq!(host.factory.open(), 1);
        assert_eq!(guest.factory.open(), 1);
    })
    .await;
}

#[tokio::test]
async fn text_mode_session_still_connects() {
    local(async {
        let host = Side::new(
            Role::Initiator,
            "host-1",
            MockMediaDevices::new(false, false),
            MockTransport::new(),
        );
        host.session
            .add_participant("guest-1".into(), Role::Responder, None);

        host.start().await;
        wait_for("offer", || host.transport.sent_offers().len() == 1).await;

        assert_eq!(host.session.media_mode(), MediaMode::Text);
        assert!(host.session.local_stream().is_none());
        assert_eq!(host.state(), ConnectionState::Connected);
        assert_eq!(host.factory.peer(1).calls(), vec![PeerCall::CreateOffer]);
    })
    .await;
}

#[tokio::test]
async fn local_tracks_are_attached_before_offer() {
    local(async {
        let host = Side::initiator();
        host.session
            .add_participant("guest-1".into(), Role::Responder, None);

        host.start().await;
        wait_for("offer", || host.transport.sent_offers().len() == 1).await;

        let peer = host.factory.peer(1);
        let offer = peer.position(|c| *c == PeerCall::CreateOffer).unwrap();
        let tracks = peer
            .calls()
            .iter()
            .filter(|c| matches!(c, PeerCall::AddTrack(_)))
            .count();
        assert_eq!(host.session.media_mode(), MediaMode::Video);
        assert_eq!(tracks, 2);
        assert_eq!(offer, 2);
    })
    .await;
}

#[tokio::test]
async fn unreachable_signaling_keeps_local_preview() {
    local(async {
        let host = Side::initiator();
        host.transport.fail_with(TransportError::Unreachable(
            platform::Error::new("503"),
        ));

        host.session.start().await;
        settle().await;

        assert_eq!(host.state(), ConnectionState::Offline);
        assert_eq!(
            host.session.error(),
            Some(SessionError::Transport(TransportError::Unreachable(
                platform::Error::new("503")
            ))),
        );
        let preview = host.session.local_stream().unwrap();
        assert!(!preview.is_stopped());
        assert_eq!(host.session.media_mode(), MediaMode::Video);
        assert!(host.transport.sent().is_empty());
        assert_eq!(host.factory.created(), 0);
    })
    .await;
}

#[tokio::test]
async fn mode_and_error_changes_are_observable() {
    local(async {
        let host = Side::initiator();
        let mut modes = host.session.on_media_mode_change();
        let mut errors = host.session.on_error();
        host.transport.fail_with(TransportError::NoCredentials);

        host.session.start().await;
        host.session.stop();

        assert_eq!(modes.next().await, Some(MediaMode::Text));
        assert_eq!(modes.next().await, Some(MediaMode::Video));
        assert_eq!(modes.next().await, Some(MediaMode::Text));
        assert_eq!(errors.next().await, Some(None));
        assert_eq!(
            errors.next().await,
            Some(Some(SessionError::Transport(TransportError::NoCredentials))),
        );
    })
    .await;
}

#[tokio::test]
async fn responder_applies_early_candidates_after_offer() {
    local(async {
        let guest = Side::responder();
        guest.start().await;

        for n in 1..=3 {
            guest
                .receive(SignalingMessage::IceCandidate {
                    candidate: candidate(n),
                })
                .await;
        }
        assert!(guest.factory.peer(1).applied_candidates().is_empty());

        guest
            .receive(SignalingMessage::Offer {
                sdp: "offer-x".to_owned(),
            })
            .await;

        let calls = guest.factory.peer(1).calls();
        let remote = calls
            .iter()
            .position(|c| {
                *c == PeerCall::SetRemoteDescription(SdpType::Offer(
                    "offer-x".to_owned(),
                ))
            })
            .unwrap();
        assert_eq!(
            calls[remote + 1..remote + 5].to_vec(),
            vec![
                PeerCall::AddIceCandidate("candidate:1".to_owned()),
                PeerCall::AddIceCandidate("candidate:2".to_owned()),
                PeerCall::AddIceCandidate("candidate:3".to_owned()),
                PeerCall::CreateAnswer,
            ],
        );
        assert_eq!(
            guest.transport.sent()[1..].to_vec(),
            vec![
                OutboundMessage::Answer {
                    sdp: guest.factory.peer(1).answer_sdp(),
                },
                OutboundMessage::ParticipantJoined {
                    role: Role::Responder,
                    participant_id: "guest-1".into(),
                },
            ],
        );
    })
    .await;
}

#[tokio::test]
async fn initiator_applies_early_candidates_after_answer() {
    local(async {
        let host = Side::initiator();
        host.session
            .add_participant("guest-1".into(), Role::Responder, None);
        host.start().await;
        wait_for("offer", || host.transport.sent_offers().len() == 1).await;

        for n in 1..=3 {
            host.receive(SignalingMessage::IceCandidate {
                candidate: candidate(n),
            })
            .await;
        }
        host.receive(SignalingMessage::Answer {
            sdp: "answer-x".to_owned(),
        })
        .await;

        let calls = host.factory.peer(1).calls();
        let remote = calls
            .iter()
            .position(|c| matches!(c, PeerCall::SetRemoteDescription(_)))
            .unwrap();
        assert_eq!(
            calls[remote..].to_vec(),
            vec![
                PeerCall::SetRemoteDescription(SdpType::Answer(
                    "answer-x".to_owned()
                )),
                PeerCall::AddIceCandidate("candidate:1".to_owned()),
                PeerCall::AddIceCandidate("candidate:2".to_owned()),
                PeerCall::AddIceCandidate("candidate:3".to_owned()),
            ],
        );
        assert_eq!(host.session.error(), None);
    })
    .await;
}

#[tokio::test]
async fn responder_rejoin_rebuilds_connection() {
    local(async {
        let host = Side::initiator();
        host.start().await;

        host.receive(joined("guest-1", Role::Responder)).await;
        assert_eq!(host.factory.created(), 2);
        host.receive(SignalingMessage::Answer {
            sdp: "answer-x".to_owned(),
        })
        .await;
        host.receive(joined("guest-1", Role::Responder)).await;
        assert_eq!(host.factory.created(), 2);
        assert_eq!(host.transport.sent_offers().len(), 1);

        host.receive(joined("guest-1", Role::Responder)).await;

        assert_eq!(host.factory.created(), 3);
        assert!(host.factory.peer(2).is_closed());
        assert_eq!(host.factory.open(), 1);
        assert_eq!(
            host.transport.sent_offers(),
            vec![
                host.factory.peer(2).offer_sdp(),
                host.factory.peer(3).offer_sdp(),
            ],
        );
        assert_eq!(host.state(), ConnectionState::Connected);
    })
    .await;
}

#[tokio::test]
async fn repeated_offer_rebuilds_responder_connection() {
    local(async {
        let guest = Side::responder();
        guest.start().await;

        guest
            .receive(SignalingMessage::Offer {
                sdp: "offer-a".to_owned(),
            })
            .await;
        wait_for("first answer", || guest.transport.sent_answers().len() == 1)
            .await;
        guest
            .receive(SignalingMessage::Offer {
                sdp: "offer-b".to_owned(),
            })
            .await;
        wait_for("second answer", || {
            guest.transport.sent_answers().len() == 2
        })
        .await;

        assert_eq!(guest.factory.created(), 2);
        assert!(guest.factory.peer(1).is_closed());
        assert_eq!(guest.factory.open(), 1);
        assert!(guest
            .factory
            .peer(2)
            .position(|c| {
                *c == PeerCall::SetRemoteDescription(SdpType::Offer(
                    "offer-b".to_owned(),
                ))
            })
            .is_some());
        assert_eq!(
            guest.transport.sent_answers(),
            vec![
                guest.factory.peer(1).answer_sdp(),
                guest.factory.peer(2).answer_sdp(),
            ],
        );
        assert_eq!(guest.session.error(), None);
    })
    .await;
}

#[tokio::test]
async fn joins_never_leave_more_than_one_open_connection() {
    local(async {
        let host = Side::initiator();
        host.start().await;

        for n in 0..5 {
            let id = format!("guest-{}", n % 2);
            host.receive(joined(&id, Role::Responder)).await;
            assert!(host.factory.open() <= 1);
        }

        assert_eq!(host.factory.open(), 1);
        assert_eq!(host.factory.created(), 6);
        let active: Vec<_> = host
            .session
            .participants()
            .into_iter()
            .filter(|p| p.active)
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id.0, "guest-0");
        assert_eq!(host.session.participants().len(), 1);
    })
    .await;
}

#[tokio::test]
async fn self_kick_disconnects_mid_negotiation() {
    local(async {
        let host = Side::initiator();
        host.start().await;
        host.receive(joined("guest-1", Role::Responder)).await;
        assert_eq!(host.transport.sent_offers().len(), 1);

        host.receive(SignalingMessage::ParticipantKicked {
            participant_id: "host-1".into(),
        })
        .await;

        assert_eq!(host.state(), ConnectionState::Disconnected);
        assert_eq!(host.factory.open(), 0);
        assert!(host.session.participants().is_empty());
        assert!(host.session.local_stream().is_none());
        assert_eq!(host.session.media_mode(), MediaMode::Text);
        for track in host.devices.acquired() {
            assert_eq!(track.stops(), 1);
        }

        host.receive(SignalingMessage::Answer {
            sdp: "answer-x".to_owned(),
        })
        .await;
        assert_eq!(host.state(), ConnectionState::Disconnected);
        assert_eq!(host.factory.open(), 0);
    })
    .await;
}

#[tokio::test]
async fn self_kick_disconnects_failed_session() {
    local(async {
        let guest = Side::responder();
        guest.start().await;
        guest
            .factory
            .peer(1)
            .emit(RtcPeerConnectionEvent::ConnectionStateChange(
                PeerConnectionState::Failed,
            ));
        settle().await;
        assert_eq!(guest.state(), ConnectionState::Failed);

        guest
            .receive(SignalingMessage::ParticipantKicked {
                participant_id: "guest-1".into(),
            })
            .await;

        assert_eq!(guest.state(), ConnectionState::Disconnected);
        assert!(guest.factory.peer(1).is_closed());
    })
    .await;
}

#[tokio::test]
async fn counterpart_kick_only_deactivates_it() {
    local(async {
        let host = Side::initiator();
        host.start().await;
        host.receive(joined("guest-1", Role::Responder)).await;

        host.receive(SignalingMessage::ParticipantKicked {
            participant_id: "guest-1".into(),
        })
        .await;

        assert_eq!(host.state(), ConnectionState::Connected);
        assert_eq!(host.factory.open(), 1);
        let participants = host.session.participants();
        assert_eq!(participants.len(), 1);
        assert!(!participants[0].active);
        assert_eq!(participants[0].display_name.as_deref(), Some("Guest"));
    })
    .await;
}

#[tokio::test]
async fn stop_during_media_acquisition_discards_media() {
    local(async {
        let host = Side::initiator();
        let gate = host.devices.hold();

        let session = Rc::clone(&host.session);
        let starting =
            tokio::task::spawn_local(async move { session.start().await });
        wait_for("capture request", || host.devices.requests().len() == 1)
            .await;
        assert_eq!(host.state(), ConnectionState::Connecting);

        host.session.stop();
        drop(gate);
        starting.await.unwrap();
        settle().await;

        assert_eq!(host.state(), ConnectionState::Disconnected);
        assert!(host.session.local_stream().is_none());
        assert_eq!(host.session.media_mode(), MediaMode::Text);
        assert_eq!(host.transport.connects(), 0);
        assert!(!host.devices.acquired().is_empty());
        for track in host.devices.acquired() {
            assert_eq!(track.stops(), 1);
        }
    })
    .await;
}

#[tokio::test]
async fn stop_during_offer_creation_drops_stale_offer() {
    local(async {
        let host = Side::initiator();
        let gate = host.factory.hold_sdp();
        host.session
            .add_participant("guest-1".into(), Role::Responder, None);
        host.start().await;
        wait_for("offer creation", || {
            host.factory.peer(1).offers_created() == 1
        })
        .await;

        host.session.stop();
        host.session.start().await;
        assert_eq!(host.state(), ConnectionState::Connected);
        drop(gate);
        wait_for("fresh offer", || host.transport.sent_offers().len() == 1)
            .await;
        settle().await;

        assert_eq!(
            host.transport.sent_offers(),
            vec![host.factory.peer(2).offer_sdp()],
        );
        assert!(host.factory.peer(1).is_closed());
        assert_eq!(host.factory.open(), 1);
        assert_eq!(host.session.error(), None);
    })
    .await;
}

#[tokio::test]
async fn stop_during_answer_creation_drops_stale_answer() {
    local(async {
        let guest = Side::responder();
        let gate = guest.factory.hold_sdp();
        guest.start().await;
        guest.transport.deliver(SignalingMessage::Offer {
            sdp: "offer-x".to_owned(),
        });
        wait_for("answer creation", || {
            guest.factory.peer(1).answers_created() == 1
        })
        .await;

        guest.session.stop();
        guest.session.start().await;
        drop(gate);
        wait_for("fresh handle", || guest.factory.created() == 2).await;
        settle().await;

        assert!(guest.transport.sent_answers().is_empty());
        assert!(guest.factory.peer(1).is_closed());
        assert_eq!(guest.factory.open(), 1);
        assert_eq!(guest.session.error(), None);
        assert_eq!(guest.state(), ConnectionState::Connected);
    })
    .await;
}

#[tokio::test]
async fn stop_releases_everything_once() {
    local(async {
        let host = Side::initiator();
        host.session
            .add_participant("guest-1".into(), Role::Responder, None);
        host.start().await;

        host.session.stop();
        host.session.stop();
        settle().await;

        assert_eq!(host.state(), ConnectionState::Disconnected);
        assert_eq!(host.factory.open(), 0);
        assert!(host.transport.disconnects() >= 1);
        for track in host.devices.acquired() {
            assert_eq!(track.stops(), 1);
        }
        assert_eq!(host.session.toggle_video(), None);
    })
    .await;
}

#[tokio::test]
async fn start_is_idempotent_and_restartable() {
    local(async {
        let host = Side::initiator();
        host.start().await;
        host.session.start().await;
        settle().await;
        assert_eq!(host.transport.connects(), 1);
        assert_eq!(host.factory.created(), 1);

        host.session.stop();
        host.start().await;

        assert_eq!(host.transport.connects(), 2);
        assert_eq!(host.factory.created(), 2);
        assert_eq!(host.factory.open(), 1);
        assert_eq!(host.state(), ConnectionState::Connected);
    })
    .await;
}

#[tokio::test]
async fn toggles_flip_local_tracks() {
    local(async {
        let host = Side::initiator();
        host.start().await;

        assert_eq!(host.session.toggle_video(), Some(false));
        assert_eq!(host.session.toggle_audio(), Some(false));
        assert_eq!(host.session.toggle_video(), Some(true));

        let stream = host.session.local_stream().unwrap();
        let enabled: Vec<_> =
            stream.tracks().iter().map(|t| (t.kind(), t.enabled())).collect();
        assert!(enabled.contains(&(duet_session::MediaKind::Video, true)));
        assert!(enabled.contains(&(duet_session::MediaKind::Audio, false)));

        let muted = Side::new(
            Role::Initiator,
            "host-2",
            MockMediaDevices::new(false, false),
            MockTransport::new(),
        );
        muted.start().await;
        assert_eq!(muted.session.toggle_video(), None);
        assert_eq!(muted.session.toggle_audio(), None);
    })
    .await;
}

#[tokio::test]
async fn transport_loss_goes_offline_until_restarted() {
    local(async {
        let host = Side::initiator();
        host.start().await;
        host.receive(joined("guest-1", Role::Responder)).await;

        host.transport.lose_connection();
        wait_for("offline", || host.state() == ConnectionState::Offline).await;

        assert_eq!(
            host.session.error(),
            Some(SessionError::Transport(TransportError::Disconnected)),
        );
        assert_eq!(host.factory.open(), 0);

        host.start().await;
        wait_for("offer", || host.transport.sent_offers().len() == 2).await;
        assert_eq!(host.state(), ConnectionState::Connected);
        assert_eq!(host.session.error(), None);
        assert_eq!(host.factory.open(), 1);
    })
    .await;
}

#[tokio::test]
async fn peer_states_map_to_connection_state() {
    local(async {
        let host = Side::initiator();
        host.start().await;
        host.receive(joined("guest-1", Role::Responder)).await;
        let (stale, live) = (host.factory.peer(1), host.factory.peer(2));
        let mut states = host.session.on_connection_state_change();
        assert_eq!(states.next().await, Some(ConnectionState::Connected));

        stale.emit(RtcPeerConnectionEvent::ConnectionStateChange(
            PeerConnectionState::Failed,
        ));
        live.emit(RtcPeerConnectionEvent::ConnectionStateChange(
            PeerConnectionState::Disconnected,
        ));
        settle().await;
        assert_eq!(host.state(), ConnectionState::Connected);

        live.emit(RtcPeerConnectionEvent::ConnectionStateChange(
            PeerConnectionState::Failed,
        ));
        assert_eq!(states.next().await, Some(ConnectionState::Failed));

        live.emit(RtcPeerConnectionEvent::ConnectionStateChange(
            PeerConnectionState::Connected,
        ));
        assert_eq!(states.next().await, Some(ConnectionState::Connected));
    })
    .await;
}

#[tokio::test]
async fn remote_tracks_are_published() {
    local(async {
        let host = Side::initiator();
        host.start().await;
        host.receive(joined("guest-1", Role::Responder)).await;
        let mut tracks = host.session.on_remote_track();

        let track = MockTrack::new(duet_session::MediaKind::Video);
        host.factory
            .peer(2)
            .emit(RtcPeerConnectionEvent::Track(track.clone()));

        let received = tracks.next().await.unwrap();
        assert_eq!(received.id(), track.id());
        assert_eq!(host.session.remote_tracks().len(), 1);

        host.receive(joined("guest-1", Role::Responder)).await;
        assert!(host.session.remote_tracks().is_empty());
    })
    .await;
}

#[tokio::test]
async fn negotiation_failures_are_advisory() {
    local(async {
        let host = Side::initiator();
        host.start().await;

        host.receive(SignalingMessage::Answer {
            sdp: "answer-x".to_owned(),
        })
        .await;

        assert_eq!(
            host.session.error(),
            Some(SessionError::Negotiation(
                NegotiationError::AnswerWithoutOffer(NegotiationState::Idle)
            )),
        );
        assert_eq!(host.state(), ConnectionState::Connected);
        assert_eq!(host.factory.open(), 1);

        host.factory.fail();
        host.receive(joined("guest-1", Role::Responder)).await;
        assert!(matches!(
            host.session.error(),
            Some(SessionError::PeerConnection(
                RtcPeerConnectionError::CreatePeer(_)
            )),
        ));
        assert_eq!(host.state(), ConnectionState::Connected);
    })
    .await;
}

#[tokio::test]
async fn echoes_of_own_descriptions_are_ignored() {
    local(async {
        let host = Side::initiator();
        host.session
            .add_participant("guest-1".into(), Role::Responder, None);
        host.start().await;
        wait_for("offer", || host.transport.sent_offers().len() == 1).await;

        host.receive(SignalingMessage::Offer {
            sdp: host.factory.peer(1).offer_sdp(),
        })
        .await;

        assert_eq!(host.factory.created(), 1);
        assert_eq!(host.factory.peer(1).remote_descriptions(), 0);
        assert_eq!(host.session.error(), None);

        let guest = Side::responder();
        guest.start().await;
        guest
            .receive(SignalingMessage::Offer {
                sdp: "offer-x".to_owned(),
            })
            .await;
        wait_for("answer", || guest.transport.sent_answers().len() == 1)
            .await;

        guest
            .receive(SignalingMessage::Answer {
                sdp: guest.factory.peer(1).answer_sdp(),
            })
            .await;

        assert_eq!(guest.factory.created(), 1);
        assert_eq!(guest.factory.peer(1).remote_descriptions(), 1);
        assert_eq!(guest.session.error(), None);
    })
    .await;
}

#[tokio::test]
async fn foreign_descriptions_of_own_kind_are_reported() {
    local(async {
        let host = Side::initiator();
        let guest = Side::responder();
        host.start().await;
        guest.start().await;

        host.receive(SignalingMessage::Offer {
            sdp: "offer-x".to_owned(),
        })
        .await;
        guest
            .receive(SignalingMessage::Answer {
                sdp: "answer-x".to_owned(),
            })
            .await;

        assert_eq!(
            host.session.error(),
            Some(SessionError::Negotiation(
                NegotiationError::UnexpectedOffer(Role::Initiator)
            )),
        );
        assert_eq!(
            guest.session.error(),
            Some(SessionError::Negotiation(
                NegotiationError::UnexpectedAnswer(Role::Responder)
            )),
        );
        assert_eq!(host.factory.peer(1).remote_descriptions(), 0);
        assert_eq!(guest.factory.peer(1).remote_descriptions(), 0);
        assert_eq!(host.state(), ConnectionState::Connected);
        assert_eq!(guest.state(), ConnectionState::Connected);
    })
    .await;
}
