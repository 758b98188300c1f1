//! Pub/sub signaling between the two sides of a session.

mod message;
pub mod stomp;
mod transport;

use async_trait::async_trait;
use derive_more::Display;
use futures::stream::LocalBoxStream;
use tracerr::Traced;

use crate::platform;

#[doc(inline)]
pub use self::{
    message::{OutboundMessage, SessionId, SignalingMessage},
    transport::{StompSignalingTransport, TransportSettings},
};

/// [`SignalingTransport`] states.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum TransportState {
    /// Connection is being established.
    #[display(fmt = "connecting")]
    Connecting,

    /// Connection is established and the session topic is subscribed.
    #[display(fmt = "connected")]
    Connected,

    /// There is no connection.
    #[display(fmt = "offline")]
    Offline,
}

/// Errors that may occur when connecting a [`SignalingTransport`].
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum TransportError {
    /// No credentials are available to authenticate with.
    #[display(fmt = "No auth token is available")]
    NoCredentials,

    /// Liveness probe of the signaling service failed.
    #[display(fmt = "Signaling service is unreachable: {}", _0)]
    Unreachable(platform::Error),

    /// Socket cannot be opened.
    #[display(fmt = "Failed to create signaling socket: {}", _0)]
    CreateSocket(platform::Error),

    /// Frame cannot be written to the socket.
    #[display(fmt = "Failed to send signaling frame: {}", _0)]
    SendFrame(platform::Error),

    /// Server did not accept the session in time.
    #[display(fmt = "Signaling handshake timed out")]
    HandshakeTimeout,

    /// Server refused the session.
    #[display(fmt = "Signaling handshake rejected: {}", _0)]
    Rejected(String),

    /// Server violated the wire protocol.
    #[display(fmt = "Signaling protocol violation: {}", _0)]
    Protocol(String),

    /// Socket was closed before the session was accepted.
    #[display(fmt = "Signaling socket closed: {}", _0)]
    Closed(String),

    /// Transport was disconnected while connecting.
    #[display(fmt = "Signaling transport was disconnected")]
    Disconnected,
}

/// Source of the bearer token used to authenticate signaling sessions.
pub trait TokenProvider {
    /// Returns the current token, if any.
    fn current_token(&self) -> Option<String>;
}

/// [`TokenProvider`] returning a token known upfront.
#[derive(Clone, Debug, Default)]
pub struct StaticTokenProvider(Option<String>);

impl StaticTokenProvider {
    /// Creates a new [`StaticTokenProvider`] of the provided token.
    #[inline]
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.is_empty()))
    }
}

impl TokenProvider for StaticTokenProvider {
    #[inline]
    fn current_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Authenticated pub/sub connection carrying [`SignalingMessage`]s of a
/// single session.
#[async_trait(?Send)]
pub trait SignalingTransport {
    /// Connects and subscribes to the session topic.
    ///
    /// Resolves immediately if already connected.
    ///
    /// # Errors
    ///
    /// With a [`TransportError`] if no [`TransportState::Connected`] state
    /// can be reached. The transport is [`TransportState::Offline`] then.
    async fn connect(&self) -> Result<(), Traced<TransportError>>;

    /// Publishes the provided [`OutboundMessage`].
    ///
    /// Does nothing unless [`TransportState::Connected`].
    fn send(&self, msg: OutboundMessage);

    /// Returns the [`LocalBoxStream`] of the received [`SignalingMessage`]s.
    fn subscribe(&self) -> LocalBoxStream<'static, SignalingMessage>;

    /// Subscribes to the [`TransportState`] changes.
    ///
    /// The current state is emitted first.
    fn on_state_change(&self) -> LocalBoxStream<'static, TransportState>;

    /// Returns the current [`TransportState`].
    fn state(&self) -> TransportState;

    /// Closes the connection, going [`TransportState::Offline`].
    fn disconnect(&self);
}
