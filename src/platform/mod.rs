//! Platform-specific functionality.
//!
//! Everything the session layer needs from the outside world is expressed
//! as a trait here, so sessions can be driven by the native backends below
//! or by in-process mocks.

mod headless;
mod http;
mod media;
mod peer_connection;
mod rtc;
mod transport;
mod websocket;

use std::{future::Future, time::Duration};

use derive_more::Display;

#[doc(inline)]
pub use self::{
    headless::HeadlessMediaDevices,
    http::HttpHealthProbe,
    media::{MediaDevices, MediaStreamTrack},
    peer_connection::{
        IceCandidate, IceServer, PeerConnectionState, RtcPeerConnection,
        RtcPeerConnectionError, RtcPeerConnectionEvent,
        RtcPeerConnectionFactory, SdpType,
    },
    rtc::WebRtcPeerConnectionFactory,
    transport::{HealthProbe, SignalingSocket, SocketEvent, SocketFactory},
    websocket::WebSocketFactory,
};

/// Error reported by a platform backend.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[display(fmt = "{}", _0)]
pub struct Error(String);

impl Error {
    /// Creates a new [`Error`] with the provided message.
    #[inline]
    pub fn new<S: Into<String>>(msg: S) -> Self {
        Self(msg.into())
    }
}

impl From<&str> for Error {
    #[inline]
    fn from(msg: &str) -> Self {
        Self(msg.to_owned())
    }
}

impl From<String> for Error {
    #[inline]
    fn from(msg: String) -> Self {
        Self(msg)
    }
}

/// Runs a Rust [`Future`] on the current thread.
///
/// Must be called inside a [`tokio::task::LocalSet`].
#[inline]
pub fn spawn<F>(task: F)
where
    F: Future<Output = ()> + 'static,
{
    drop(tokio::task::spawn_local(task));
}

/// Resolves the provided [`Future`], giving up once the provided [`Duration`]
/// elapses.
///
/// Returns [`None`] on timeout.
pub async fn timeout<F: Future>(limit: Duration, fut: F) -> Option<F::Output> {
    tokio::time::timeout(limit, fut).await.ok()
}
