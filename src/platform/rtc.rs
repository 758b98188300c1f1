//! [`RtcPeerConnection`] implementation on top of the [`webrtc`] crate.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    sync::Arc,
};

use ::webrtc::{
    api::{
        interceptor_registry::register_default_interceptors,
        media_engine::{MediaEngine, MIME_TYPE_OPUS, MIME_TYPE_VP8},
        APIBuilder, API,
    },
    ice_transport::{
        ice_candidate::{RTCIceCandidate, RTCIceCandidateInit},
        ice_server::RTCIceServer,
    },
    interceptor::registry::Registry,
    peer_connection::{
        configuration::RTCConfiguration,
        peer_connection_state::RTCPeerConnectionState,
        sdp::session_description::RTCSessionDescription, RTCPeerConnection,
    },
    rtp_transceiver::{
        rtp_codec::{RTCRtpCodecCapability, RTPCodecType},
        rtp_receiver::RTCRtpReceiver,
        RTCRtpTransceiver,
    },
    track::{
        track_local::{
            track_local_static_sample::TrackLocalStaticSample, TrackLocal,
        },
        track_remote::TrackRemote,
    },
};
use async_trait::async_trait;
use futures::{stream::LocalBoxStream, StreamExt as _};
use tokio::sync::mpsc;
use tracerr::Traced;

use crate::{
    media::MediaKind,
    platform::{
        self, IceCandidate, IceServer, MediaStreamTrack, PeerConnectionState,
        RtcPeerConnection, RtcPeerConnectionError as Error,
        RtcPeerConnectionEvent, RtcPeerConnectionFactory, SdpType,
    },
};

impl From<::webrtc::Error> for platform::Error {
    fn from(e: ::webrtc::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<RTCPeerConnectionState> for PeerConnectionState {
    fn from(state: RTCPeerConnectionState) -> Self {
        match state {
            RTCPeerConnectionState::Connecting => Self::Connecting,
            RTCPeerConnectionState::Connected => Self::Connected,
            RTCPeerConnectionState::Disconnected => Self::Disconnected,
            RTCPeerConnectionState::Failed => Self::Failed,
            RTCPeerConnectionState::Closed => Self::Closed,
            _ => Self::New,
        }
    }
}

/// [`RtcPeerConnectionFactory`] sharing one configured [`API`] instance.
pub struct WebRtcPeerConnectionFactory(API);

impl WebRtcPeerConnectionFactory {
    /// Creates a new [`WebRtcPeerConnectionFactory`] with the default codecs
    /// and interceptors registered.
    ///
    /// # Errors
    ///
    /// If the media engine cannot be configured.
    pub fn new() -> Result<Self, platform::Error> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry =
            register_default_interceptors(Registry::new(), &mut media_engine)?;

        Ok(Self(
            APIBuilder::new()
                .with_media_engine(media_engine)
                .with_interceptor_registry(registry)
                .build(),
        ))
    }
}

#[async_trait(?Send)]
impl RtcPeerConnectionFactory for WebRtcPeerConnectionFactory {
    async fn create(
        &self,
        ice_servers: &[IceServer],
    ) -> Result<Rc<dyn RtcPeerConnection>, Traced<Error>> {
        let config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..RTCIceServer::default()
                })
                .collect(),
            ..RTCConfiguration::default()
        };
        let peer = self
            .0
            .new_peer_connection(config)
            .await
            .map_err(|e| tracerr::new!(Error::CreatePeer(e.into())))?;

        Ok(Rc::new(WebRtcPeerConnection::new(Arc::new(peer))))
    }
}

/// Events produced by the [`webrtc`] handlers, which are required to be
/// [`Send`].
enum RawEvent {
    Candidate(RTCIceCandidateInit),
    Track(Arc<TrackRemote>),
    State(RTCPeerConnectionState),
}

/// [`RtcPeerConnection`] backed by a [`RTCPeerConnection`].
struct WebRtcPeerConnection {
    peer: Arc<RTCPeerConnection>,
    events: RefCell<Option<mpsc::UnboundedReceiver<RawEvent>>>,
}

impl WebRtcPeerConnection {
    /// Wraps the provided [`RTCPeerConnection`] and binds its handlers.
    fn new(peer: Arc<RTCPeerConnection>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let candidates = tx.clone();
        peer.on_ice_candidate(Box::new(
            move |candidate: Option<RTCIceCandidate>| {
                let tx = candidates.clone();
                Box::pin(async move {
                    let candidate = match candidate {
                        Some(c) => c,
                        None => return,
                    };
                    match candidate.to_json() {
                        Ok(init) => {
                            let _ = tx.send(RawEvent::Candidate(init));
                        }
                        Err(e) => {
                            log::error!("Failed to serialize candidate: {}", e);
                        }
                    }
                })
            },
        ));

        let tracks = tx.clone();
        peer.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _: Arc<RTCRtpReceiver>,
                  _: Arc<RTCRtpTransceiver>| {
                let _ = tracks.send(RawEvent::Track(track));
                Box::pin(async {})
            },
        ));

        peer.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                let _ = tx.send(RawEvent::State(state));
                Box::pin(async {})
            },
        ));

        Self {
            peer,
            events: RefCell::new(Some(rx)),
        }
    }
}

#[async_trait(?Send)]
impl RtcPeerConnection for WebRtcPeerConnection {
    fn on_event(&self) -> LocalBoxStream<'static, RtcPeerConnectionEvent> {
        let rx = match self.events.borrow_mut().take() {
            Some(rx) => rx,
            None => return Box::pin(futures::stream::empty()),
        };
        Box::pin(
            futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|ev| (ev, rx))
            })
            .map(|ev| match ev {
                RawEvent::Candidate(init) => {
                    RtcPeerConnectionEvent::IceCandidate(IceCandidate {
                        candidate: init.candidate,
                        sdp_m_line_index: init.sdp_mline_index,
                        sdp_mid: init.sdp_mid,
                    })
                }
                RawEvent::Track(track) => RtcPeerConnectionEvent::Track(
                    Rc::new(RemoteTrack::new(track)),
                ),
                RawEvent::State(state) => {
                    RtcPeerConnectionEvent::ConnectionStateChange(state.into())
                }
            }),
        )
    }

    async fn add_track(
        &self,
        track: Rc<dyn MediaStreamTrack>,
    ) -> Result<(), Traced<Error>> {
        let mime_type = match track.kind() {
            MediaKind::Audio => MIME_TYPE_OPUS,
            MediaKind::Video => MIME_TYPE_VP8,
        };
        let local = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: mime_type.to_owned(),
                ..RTCRtpCodecCapability::default()
            },
            track.id(),
            "duet".to_owned(),
        ));
        self.peer
            .add_track(local as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| tracerr::new!(Error::AddTrack(e.into())))?;
        Ok(())
    }

    async fn create_and_set_offer(&self) -> Result<String, Traced<Error>> {
        let offer = self
            .peer
            .create_offer(None)
            .await
            .map_err(|e| tracerr::new!(Error::CreateOffer(e.into())))?;
        let sdp = offer.sdp.clone();
        self.peer
            .set_local_description(offer)
            .await
            .map_err(|e| tracerr::new!(Error::SetLocalDescription(e.into())))?;
        Ok(sdp)
    }

    async fn create_and_set_answer(&self) -> Result<String, Traced<Error>> {
        let answer = self
            .peer
            .create_answer(None)
            .await
            .map_err(|e| tracerr::new!(Error::CreateAnswer(e.into())))?;
        let sdp = answer.sdp.clone();
        self.peer
            .set_local_description(answer)
            .await
            .map_err(|e| tracerr::new!(Error::SetLocalDescription(e.into())))?;
        Ok(sdp)
    }

    async fn set_remote_description(
        &self,
        sdp: SdpType,
    ) -> Result<(), Traced<Error>> {
        let desc = match sdp {
            SdpType::Offer(sdp) => RTCSessionDescription::offer(sdp),
            SdpType::Answer(sdp) => RTCSessionDescription::answer(sdp),
        }
        .map_err(|e| tracerr::new!(Error::SetRemoteDescription(e.into())))?;
        self.peer
            .set_remote_description(desc)
            .await
            .map_err(|e| tracerr::new!(Error::SetRemoteDescription(e.into())))
    }

    async fn add_ice_candidate(
        &self,
        candidate: &IceCandidate,
    ) -> Result<(), Traced<Error>> {
        self.peer
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate.clone(),
                sdp_mid: candidate.sdp_mid.clone(),
                sdp_mline_index: candidate.sdp_m_line_index,
                username_fragment: None,
            })
            .await
            .map_err(|e| tracerr::new!(Error::AddIceCandidate(e.into())))
    }

    fn close(&self) {
        let peer = Arc::clone(&self.peer);
        platform::spawn(async move {
            if let Err(e) = peer.close().await {
                log::warn!("Failed to close RTCPeerConnection: {}", e);
            }
        });
    }
}

/// Track received from the remote side.
#[derive(Debug)]
struct RemoteTrack {
    id: String,
    kind: MediaKind,
    enabled: Cell<bool>,
}

impl RemoteTrack {
    fn new(track: Arc<TrackRemote>) -> Self {
        let kind = match track.kind() {
            RTPCodecType::Audio => MediaKind::Audio,
            _ => MediaKind::Video,
        };
        Self {
            id: track.id(),
            kind,
            enabled: Cell::new(true),
        }
    }
}

impl MediaStreamTrack for RemoteTrack {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn enabled(&self) -> bool {
        self.enabled.get()
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    fn stop(&self) {}
}
