//! [`SignalingTransport`] over STOMP frames carried by a text socket.

use std::{cell::RefCell, rc::Rc, time::Duration};

use async_trait::async_trait;
use futures::{
    channel::mpsc,
    future,
    stream::{LocalBoxStream, StreamExt as _},
};
use medea_reactive::ObservableCell;
use tracerr::Traced;
use url::Url;

use crate::{
    platform::{self, HealthProbe, SignalingSocket, SocketEvent, SocketFactory},
    signaling::{
        stomp::{Command, Frame},
        OutboundMessage, SessionId, SignalingMessage, SignalingTransport,
        TokenProvider, TransportError, TransportState,
    },
    utils::{Epoch, TaskHandle},
};

/// ID of the single subscription of a transport.
const SUBSCRIPTION_ID: &str = "sub-0";

/// Settings of a [`StompSignalingTransport`].
#[derive(Clone, Debug)]
pub struct TransportSettings {
    /// STOMP-over-WebSocket endpoint.
    pub url: Url,

    /// Endpoint of the pre-connect liveness probe.
    pub health_url: Url,

    /// Session whose topic is subscribed.
    pub session_id: SessionId,

    /// Maximum duration of the liveness probe.
    pub probe_timeout: Duration,

    /// Maximum duration of opening the socket and receiving `CONNECTED`.
    pub handshake_timeout: Duration,

    /// Prefix of subscribed destinations.
    pub subscribe_prefix: String,

    /// Prefix of published destinations.
    pub publish_prefix: String,
}

impl TransportSettings {
    /// Destination of the inbound session topic.
    pub fn topic(&self) -> String {
        format!(
            "{}session/{}/webrtc",
            self.subscribe_prefix, self.session_id,
        )
    }

    /// Destination the provided [`OutboundMessage`] is published to.
    pub fn destination(&self, msg: &OutboundMessage) -> String {
        format!(
            "{}session/{}/{}",
            self.publish_prefix,
            self.session_id,
            msg.destination(),
        )
    }
}

/// Inner state of a [`StompSignalingTransport`].
struct Inner {
    settings: TransportSettings,
    tokens: Rc<dyn TokenProvider>,
    probe: Rc<dyn HealthProbe>,
    sockets: Rc<dyn SocketFactory>,

    /// Socket of the current connection.
    socket: RefCell<Option<Rc<dyn SignalingSocket>>>,

    /// Task reading frames of the current connection.
    reader: RefCell<Option<TaskHandle>>,

    /// Subscribers of the received [`SignalingMessage`]s.
    subs: RefCell<Vec<mpsc::UnboundedSender<SignalingMessage>>>,

    state: ObservableCell<TransportState>,

    /// Connection attempts counter, bumped by every connect and disconnect.
    attempt: Epoch,
}

/// [`SignalingTransport`] speaking STOMP 1.2 over a [`SignalingSocket`].
///
/// The bearer token of the [`TokenProvider`] is sent in the `CONNECT`
/// frame, so it never appears in URLs.
pub struct StompSignalingTransport(Rc<Inner>);

impl StompSignalingTransport {
    /// Creates a new disconnected [`StompSignalingTransport`].
    pub fn new(
        settings: TransportSettings,
        tokens: Rc<dyn TokenProvider>,
        probe: Rc<dyn HealthProbe>,
        sockets: Rc<dyn SocketFactory>,
    ) -> Self {
        Self(Rc::new(Inner {
            settings,
            tokens,
            probe,
            sockets,
            socket: RefCell::new(None),
            reader: RefCell::new(None),
            subs: RefCell::new(Vec::new()),
            state: ObservableCell::new(TransportState::Offline),
            attempt: Epoch::default(),
        }))
    }
}

impl Inner {
    /// Fails if the connection attempt `attempt` has been superseded.
    fn ensure_attempt(
        &self,
        attempt: u64,
    ) -> Result<(), Traced<TransportError>> {
        if self.attempt.is_current(attempt) {
            Ok(())
        } else {
            Err(tracerr::new!(TransportError::Disconnected))
        }
    }

    /// Probes the service, opens the socket, authenticates and subscribes.
    async fn establish(
        self: &Rc<Self>,
        attempt: u64,
    ) -> Result<(), Traced<TransportError>> {
        let token = self
            .tokens
            .current_token()
            .ok_or_else(|| tracerr::new!(TransportError::NoCredentials))?;

        self.probe
            .probe(&self.settings.health_url, self.settings.probe_timeout)
            .await
            .map_err(TransportError::Unreachable)
            .map_err(tracerr::wrap!())?;
        self.ensure_attempt(attempt)?;

        let (socket, events) = platform::timeout(
            self.settings.handshake_timeout,
            self.open_session(attempt, &token),
        )
        .await
        .ok_or_else(|| tracerr::new!(TransportError::HandshakeTimeout))??;

        let topic = self.settings.topic();
        socket
            .send(Frame::subscribe(SUBSCRIPTION_ID, &topic).encode())
            .map_err(TransportError::SendFrame)
            .map_err(tracerr::wrap!())?;

        self.spawn_reader(events);
        self.state.set(TransportState::Connected);
        log::info!("Signaling connected, subscribed to {}", topic);

        Ok(())
    }

    /// Opens the socket and awaits the server accepting the session.
    async fn open_session(
        &self,
        attempt: u64,
        token: &str,
    ) -> Result<
        (Rc<dyn SignalingSocket>, LocalBoxStream<'static, SocketEvent>),
        Traced<TransportError>,
    > {
        let socket = self
            .sockets
            .connect(&self.settings.url)
            .await
            .map_err(TransportError::CreateSocket)
            .map_err(tracerr::wrap!())?;
        if let Err(e) = self.ensure_attempt(attempt) {
            socket.close();
            return Err(e);
        }
        self.socket.replace(Some(Rc::clone(&socket)));

        let mut events = socket.on_message();
        let host = self.settings.url.host_str().unwrap_or("localhost");
        socket
            .send(Frame::connect(host, token).encode())
            .map_err(TransportError::SendFrame)
            .map_err(tracerr::wrap!())?;

        let frame = next_frame(&mut events).await?;
        self.ensure_attempt(attempt)?;
        match frame.command {
            Command::Connected => Ok((socket, events)),
            Command::Error => {
                let reason = frame.header("message").unwrap_or(&frame.body);
                Err(tracerr::new!(TransportError::Rejected(reason.to_owned())))
            }
            cmd => Err(tracerr::new!(TransportError::Protocol(format!(
                "expected CONNECTED frame, got {}",
                cmd,
            )))),
        }
    }

    /// Spawns the task dispatching the frames of the current connection.
    fn spawn_reader(
        self: &Rc<Self>,
        mut events: LocalBoxStream<'static, SocketEvent>,
    ) {
        let weak = Rc::downgrade(self);
        let (reader, abort) = future::abortable(async move {
            while let Some(event) = events.next().await {
                let this = match weak.upgrade() {
                    Some(this) => this,
                    None => return,
                };
                match event {
                    SocketEvent::Message(text) => match Frame::decode(&text) {
                        Ok(Some(frame)) => {
                            if !this.on_frame(frame) {
                                this.shutdown();
                                return;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            log::error!("Signaling protocol violation: {}", e);
                            this.shutdown();
                            return;
                        }
                    },
                    SocketEvent::Closed(reason) => {
                        log::warn!("Signaling socket closed: {}", reason);
                        this.shutdown();
                        return;
                    }
                }
            }
            if let Some(this) = weak.upgrade() {
                this.shutdown();
            }
        });
        platform::spawn(async move {
            let _ = reader.await;
        });
        self.reader.replace(Some(TaskHandle::from(abort)));
    }

    /// Handles a [`Frame`] received on an established connection.
    ///
    /// Returns `false` if the connection must be dropped.
    fn on_frame(&self, frame: Frame) -> bool {
        match frame.command {
            Command::Message => {
                if frame
                    .header("subscription")
                    .map_or(false, |id| id != SUBSCRIPTION_ID)
                {
                    log::debug!("Skipping a message of a foreign subscription");
                    return true;
                }
                match serde_json::from_str::<SignalingMessage>(&frame.body) {
                    Ok(msg) => {
                        log::debug!("Received `{}` message", msg.kind());
                        self.subs.borrow_mut().retain(|sub| {
                            sub.unbounded_send(msg.clone()).is_ok()
                        });
                    }
                    Err(e) => {
                        log::error!("Failed to parse signaling message: {}", e);
                    }
                }
                true
            }
            Command::Receipt => true,
            Command::Error => {
                log::error!(
                    "Signaling server reported an error: {}",
                    frame.header("message").unwrap_or(&frame.body),
                );
                false
            }
            cmd => {
                log::error!("Signaling protocol violation: unexpected {}", cmd);
                false
            }
        }
    }

    /// Drops the current connection, going [`TransportState::Offline`].
    fn shutdown(&self) {
        drop(self.reader.replace(None));
        if let Some(socket) = self.socket.replace(None) {
            socket.close();
        }
        self.state.set(TransportState::Offline);
    }
}

/// Awaits the first non-heart-beat [`Frame`] of the provided socket events.
async fn next_frame(
    events: &mut LocalBoxStream<'static, SocketEvent>,
) -> Result<Frame, Traced<TransportError>> {
    while let Some(event) = events.next().await {
        match event {
            SocketEvent::Message(text) => match Frame::decode(&text) {
                Ok(Some(frame)) => return Ok(frame),
                Ok(None) => {}
                Err(e) => {
                    return Err(tracerr::new!(TransportError::Protocol(
                        e.to_string()
                    )));
                }
            },
            SocketEvent::Closed(reason) => {
                return Err(tracerr::new!(TransportError::Closed(reason)));
            }
        }
    }
    Err(tracerr::new!(TransportError::Closed(
        "socket stream ended".to_owned()
    )))
}

#[async_trait(?Send)]
impl SignalingTransport for StompSignalingTransport {
    async fn connect(&self) -> Result<(), Traced<TransportError>> {
        match self.0.state.get() {
            TransportState::Connected => return Ok(()),
            TransportState::Connecting => {
                let mut changes = self.0.state.subscribe();
                while let Some(state) = changes.next().await {
                    match state {
                        TransportState::Connected => return Ok(()),
                        TransportState::Offline => break,
                        TransportState::Connecting => {}
                    }
                }
                return Err(tracerr::new!(TransportError::Disconnected));
            }
            TransportState::Offline => {}
        }

        let attempt = self.0.attempt.bump();
        self.0.state.set(TransportState::Connecting);

        let result = self.0.establish(attempt).await;
        if let Err(e) = &result {
            log::warn!("Failed to connect signaling: {}", e);
            if self.0.attempt.is_current(attempt) {
                self.0.shutdown();
            }
        }
        result
    }

    fn send(&self, msg: OutboundMessage) {
        let state = self.0.state.get();
        if state != TransportState::Connected {
            log::warn!(
                "Dropping `{}` message, signaling is {}",
                msg.destination(),
                state,
            );
            return;
        }

        let destination = self.0.settings.destination(&msg);
        let frame = Frame::send(&destination, msg.body().to_string());
        if let Some(socket) = self.0.socket.borrow().as_ref() {
            if let Err(e) = socket.send(frame.encode()) {
                log::error!("{}", TransportError::SendFrame(e));
            }
        }
    }

    fn subscribe(&self) -> LocalBoxStream<'static, SignalingMessage> {
        let (tx, rx) = mpsc::unbounded();
        self.0.subs.borrow_mut().push(tx);
        Box::pin(rx)
    }

    fn on_state_change(&self) -> LocalBoxStream<'static, TransportState> {
        self.0.state.subscribe()
    }

    fn state(&self) -> TransportState {
        self.0.state.get()
    }

    fn disconnect(&self) {
        self.0.attempt.bump();
        if self.0.state.get() == TransportState::Connected {
            if let Some(socket) = self.0.socket.borrow().as_ref() {
                let _ = socket.send(Frame::disconnect().encode());
            }
        }
        self.0.shutdown();
    }
}

impl Drop for StompSignalingTransport {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}
