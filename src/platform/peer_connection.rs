use std::rc::Rc;

use async_trait::async_trait;
use derive_more::Display;
use futures::stream::LocalBoxStream;
use serde::{Deserialize, Serialize};
use tracerr::Traced;

use crate::platform::{self, MediaStreamTrack};

/// [RTCIceServer][1] representation.
///
/// [1]: https://w3.org/TR/webrtc/#rtciceserver-dictionary
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IceServer {
    /// URLs of this server (`stun:` or `turn:` schemes).
    pub urls: Vec<String>,

    /// Username for authentication on a TURN server.
    #[serde(default)]
    pub username: Option<String>,

    /// Credential for authentication on a TURN server.
    #[serde(default)]
    pub credential: Option<String>,
}

impl IceServer {
    /// Creates a credential-less [`IceServer`] reachable by the provided URL.
    pub fn stun<S: Into<String>>(url: S) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// [RTCIceCandidate][1] representation.
///
/// [1]: https://w3.org/TR/webrtc/#rtcicecandidate-interface
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IceCandidate {
    /// [`candidate` field][2] of the discovered [RTCIceCandidate][1].
    ///
    /// [1]: https://w3.org/TR/webrtc/#dom-rtcicecandidate
    /// [2]: https://w3.org/TR/webrtc/#dom-rtcicecandidate-candidate
    pub candidate: String,

    /// [`sdpMLineIndex` field][2] of the discovered [RTCIceCandidate][1].
    ///
    /// [1]: https://w3.org/TR/webrtc/#dom-rtcicecandidate
    /// [2]: https://w3.org/TR/webrtc/#dom-rtcicecandidate-sdpmlineindex
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_m_line_index: Option<u16>,

    /// [`sdpMid` field][2] of the discovered [RTCIceCandidate][1].
    ///
    /// [1]: https://w3.org/TR/webrtc/#dom-rtcicecandidate
    /// [2]: https://w3.org/TR/webrtc/#dom-rtcicecandidate-sdpmid
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
}

/// Representation of [RTCSdpType].
///
/// [RTCSdpType]: https://w3.org/TR/webrtc/#dom-rtcsdptype
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SdpType {
    /// [`offer` type][1] of SDP.
    ///
    /// [1]: https://w3.org/TR/webrtc/#dom-rtcsdptype-offer
    Offer(String),

    /// [`answer` type][1] of SDP.
    ///
    /// [1]: https://w3.org/TR/webrtc/#dom-rtcsdptype-answer
    Answer(String),
}

/// [RTCPeerConnectionState][1] representation.
///
/// [1]: https://w3.org/TR/webrtc/#dom-rtcpeerconnectionstate
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum PeerConnectionState {
    /// At least one of the connection's ICE transports is in the `new`
    /// state, and none of them are in one of the transitional states.
    #[display(fmt = "new")]
    New,

    /// At least one of the connection's ICE transports is establishing.
    #[display(fmt = "connecting")]
    Connecting,

    /// Every ICE transport used by the connection is in use.
    #[display(fmt = "connected")]
    Connected,

    /// At least one of the connection's ICE transports lost its
    /// connectivity. May recover on its own.
    #[display(fmt = "disconnected")]
    Disconnected,

    /// At least one of the connection's ICE transports failed.
    #[display(fmt = "failed")]
    Failed,

    /// The connection is closed.
    #[display(fmt = "closed")]
    Closed,
}

/// Events emitted by a [`RtcPeerConnection`].
#[derive(Debug)]
pub enum RtcPeerConnectionEvent {
    /// A new local [`IceCandidate`] was gathered.
    IceCandidate(IceCandidate),

    /// A new remote track was received.
    Track(Rc<dyn MediaStreamTrack>),

    /// [`PeerConnectionState`] of the connection changed.
    ConnectionStateChange(PeerConnectionState),
}

/// Errors that may occur during signaling between this and remote
/// [RTCPeerConnection][1] and event handlers setting errors.
///
/// [1]: https://w3.org/TR/webrtc/#dom-rtcpeerconnection
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum RtcPeerConnectionError {
    /// Occurs when a remote candidate cannot be added to the
    /// [RTCPeerConnection][1]'s remote description.
    ///
    /// [1]: https://w3.org/TR/webrtc/#dom-rtcpeerconnection
    #[display(fmt = "Failed to add ICE candidate: {}", _0)]
    AddIceCandidate(platform::Error),

    /// Occurs when a local track cannot be attached to the connection.
    #[display(fmt = "Failed to add local track: {}", _0)]
    AddTrack(platform::Error),

    /// Occurs when an operation is requested on a closed connection.
    #[display(fmt = "PeerConnection is closed")]
    Closed,

    /// Occurs when an SDP answer cannot be obtained.
    #[display(fmt = "Failed to create SDP answer: {}", _0)]
    CreateAnswer(platform::Error),

    /// Occurs when a new [`RtcPeerConnection`] cannot be created.
    #[display(fmt = "Failed to create PeerConnection: {}", _0)]
    CreatePeer(platform::Error),

    /// Occurs when an SDP offer cannot be obtained.
    #[display(fmt = "Failed to create SDP offer: {}", _0)]
    CreateOffer(platform::Error),

    /// Occurs when the local description cannot be applied.
    #[display(fmt = "Failed to set local SDP description: {}", _0)]
    SetLocalDescription(platform::Error),

    /// Occurs when the remote description cannot be applied.
    #[display(fmt = "Failed to set remote SDP description: {}", _0)]
    SetRemoteDescription(platform::Error),
}

/// Platform [RTCPeerConnection][1].
///
/// [1]: https://w3.org/TR/webrtc/#dom-rtcpeerconnection
#[async_trait(?Send)]
pub trait RtcPeerConnection {
    /// Returns the [`LocalBoxStream`] of [`RtcPeerConnectionEvent`]s.
    ///
    /// The stream can be taken only once. Subsequent calls return an
    /// already finished stream.
    fn on_event(&self) -> LocalBoxStream<'static, RtcPeerConnectionEvent>;

    /// Attaches the provided local track to this connection.
    async fn add_track(
        &self,
        track: Rc<dyn MediaStreamTrack>,
    ) -> Result<(), Traced<RtcPeerConnectionError>>;

    /// Obtains an SDP offer and sets it as the local description.
    ///
    /// Returns the created SDP.
    async fn create_and_set_offer(
        &self,
    ) -> Result<String, Traced<RtcPeerConnectionError>>;

    /// Obtains an SDP answer and sets it as the local description.
    ///
    /// Returns the created SDP.
    async fn create_and_set_answer(
        &self,
    ) -> Result<String, Traced<RtcPeerConnectionError>>;

    /// Applies the provided SDP as the remote description.
    async fn set_remote_description(
        &self,
        sdp: SdpType,
    ) -> Result<(), Traced<RtcPeerConnectionError>>;

    /// Adds a remote [`IceCandidate`].
    async fn add_ice_candidate(
        &self,
        candidate: &IceCandidate,
    ) -> Result<(), Traced<RtcPeerConnectionError>>;

    /// Closes this connection. Idempotent.
    fn close(&self);
}

/// Factory of platform [`RtcPeerConnection`]s.
#[async_trait(?Send)]
pub trait RtcPeerConnectionFactory {
    /// Creates a new [`RtcPeerConnection`] using the provided ICE servers.
    async fn create(
        &self,
        ice_servers: &[IceServer],
    ) -> Result<Rc<dyn RtcPeerConnection>, Traced<RtcPeerConnectionError>>;
}
