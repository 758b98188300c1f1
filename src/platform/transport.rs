use std::{rc::Rc, time::Duration};

use async_trait::async_trait;
use futures::stream::LocalBoxStream;
use url::Url;

use crate::platform;

/// Event received from a [`SignalingSocket`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SocketEvent {
    /// Text message.
    Message(String),

    /// The socket was closed with the provided reason.
    Closed(String),
}

/// Text-framed bidirectional socket.
pub trait SignalingSocket {
    /// Sends the provided text message.
    ///
    /// # Errors
    ///
    /// If the socket is already closed.
    fn send(&self, text: String) -> Result<(), platform::Error>;

    /// Returns the [`LocalBoxStream`] of received [`SocketEvent`]s.
    ///
    /// The stream can be taken only once. It ends after a
    /// [`SocketEvent::Closed`].
    fn on_message(&self) -> LocalBoxStream<'static, SocketEvent>;

    /// Closes this socket. Idempotent.
    fn close(&self);
}

/// Opens [`SignalingSocket`]s.
#[async_trait(?Send)]
pub trait SocketFactory {
    /// Opens a new [`SignalingSocket`] to the provided [`Url`].
    ///
    /// # Errors
    ///
    /// If the connection cannot be established.
    async fn connect(
        &self,
        url: &Url,
    ) -> Result<Rc<dyn SignalingSocket>, platform::Error>;
}

/// Cheap liveness check of the signaling service.
#[async_trait(?Send)]
pub trait HealthProbe {
    /// Checks that the service behind the provided [`Url`] answers within
    /// the provided `timeout`.
    ///
    /// # Errors
    ///
    /// If the service is unreachable, too slow or unhealthy.
    async fn probe(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> Result<(), platform::Error>;
}
