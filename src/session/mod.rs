//! Facade driving a two-party session end to end.

mod handle;

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use derive_more::{Display, From};
use futures::{
    channel::mpsc,
    future,
    stream::{self, LocalBoxStream, StreamExt as _},
};
use medea_reactive::ObservableCell;
use tracerr::Traced;

use crate::{
    media::{LocalStream, MediaKind, MediaManager, MediaMode},
    negotiator::{NegotiationError, NegotiationState},
    participants::{
        Participant, ParticipantId, ParticipantRegistry, RegistryEvent, Role,
    },
    peer::PeerEvent,
    platform::{
        self, IceCandidate, IceServer, MediaDevices, MediaStreamTrack,
        PeerConnectionState, RtcPeerConnectionError, RtcPeerConnectionFactory,
    },
    reconnect::{Reaction, ReconnectionController},
    signaling::{
        OutboundMessage, SessionId, SignalingMessage, SignalingTransport,
        TransportError, TransportState,
    },
    utils::{Epoch, TaskHandle},
};

#[doc(inline)]
pub use self::handle::{HandleParams, HandleSlot, SessionHandle};

/// State of a session as seen by its consumer.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ConnectionState {
    /// Session is being started.
    #[display(fmt = "connecting")]
    Connecting,

    /// Signaling is connected and the peers negotiate or exchange media.
    #[display(fmt = "connected")]
    Connected,

    /// Session is not running.
    #[display(fmt = "disconnected")]
    Disconnected,

    /// Signaling service is unreachable or the connection was lost.
    #[display(fmt = "offline")]
    Offline,

    /// Peer connection failed.
    #[display(fmt = "failed")]
    Failed,
}

impl ConnectionState {
    /// Maps a [`PeerConnectionState`] reported by the live connection.
    ///
    /// Returns [`None`] for the states leaving the [`ConnectionState`]
    /// unchanged.
    pub fn from_peer(state: PeerConnectionState) -> Option<Self> {
        match state {
            PeerConnectionState::Connected => Some(Self::Connected),
            PeerConnectionState::Failed => Some(Self::Failed),
            PeerConnectionState::Closed => Some(Self::Disconnected),
            PeerConnectionState::New
            | PeerConnectionState::Connecting
            | PeerConnectionState::Disconnected => None,
        }
    }
}

impl Default for ConnectionState {
    #[inline]
    fn default() -> Self {
        Self::Disconnected
    }
}

/// Failure reported through [`SessionController::error`].
///
/// None of them stops the session on its own.
#[derive(Clone, Debug, Display, Eq, From, PartialEq)]
pub enum SessionError {
    /// Signaling failed to connect or was lost.
    #[display(fmt = "{}", _0)]
    Transport(TransportError),

    /// Offer/answer exchange failed.
    #[display(fmt = "{}", _0)]
    Negotiation(NegotiationError),

    /// Peer connection cannot be created or refused a remote candidate.
    #[display(fmt = "{}", _0)]
    PeerConnection(RtcPeerConnectionError),
}

/// Parameters of a session, fixed for the lifetime of a
/// [`SessionController`].
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// ID of the negotiated session.
    pub session_id: SessionId,

    /// ID of the local participant.
    pub participant_id: ParticipantId,

    /// Name of the local participant shown to the other side.
    pub display_name: Option<String>,

    /// [`Role`] of the local participant.
    pub role: Role,

    /// ICE servers used by every peer connection of the session.
    pub ice_servers: Vec<IceServer>,
}

/// Work processed one by one by the command loop of a session.
#[derive(Debug)]
enum Command {
    /// Signaling got connected: create the connection and announce
    /// ourselves or start negotiating.
    Establish,

    /// Process a message received from the session topic.
    Signaling(SignalingMessage),
}

/// Anything the event loop of a session reacts to.
enum Event {
    Message(SignalingMessage),
    Transport(TransportState),
    Peer(PeerEvent),
}

struct Inner {
    config: SessionConfig,

    media: MediaManager,

    factory: Rc<dyn RtcPeerConnectionFactory>,

    transport: Rc<dyn SignalingTransport>,

    registry: ParticipantRegistry,

    reconnection: ReconnectionController,

    /// Live [`SessionHandle`].
    handles: HandleSlot,

    /// Acquired local media, shared by all the handles of a run.
    local_stream: RefCell<Option<Rc<LocalStream>>>,

    connection_state: ObservableCell<ConnectionState>,

    media_mode: ObservableCell<MediaMode>,

    error: ObservableCell<Option<SessionError>>,

    /// Current run of the session. Bumped on every start and teardown.
    epoch: Epoch,

    commands: mpsc::UnboundedSender<(u64, Command)>,

    peer_events: mpsc::UnboundedSender<PeerEvent>,

    remote_track_subs:
        RefCell<Vec<mpsc::UnboundedSender<Rc<dyn MediaStreamTrack>>>>,
}

/// Two-party WebRTC session of the local participant.
///
/// Owns the acquired local media, the signaling transport and the single
/// live [`SessionHandle`]. Nothing it exposes returns an error: failures are
/// reflected in [`ConnectionState`], [`MediaMode`] and
/// [`SessionController::error`].
///
/// Must be created inside a [`tokio::task::LocalSet`].
pub struct SessionController {
    inner: Rc<Inner>,
    _tasks: Vec<TaskHandle>,
}

impl SessionController {
    /// Creates a new stopped [`SessionController`].
    pub fn new(
        config: SessionConfig,
        devices: Rc<dyn MediaDevices>,
        factory: Rc<dyn RtcPeerConnectionFactory>,
        transport: Rc<dyn SignalingTransport>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded();
        let (peer_events_tx, peer_events_rx) = mpsc::unbounded();

        let events = stream::select(
            transport.subscribe().map(Event::Message),
            stream::select(
                transport.on_state_change().map(Event::Transport),
                peer_events_rx.map(Event::Peer),
            ),
        )
        .boxed_local();

        let inner = Rc::new(Inner {
            registry: ParticipantRegistry::new(config.participant_id.clone()),
            reconnection: ReconnectionController::new(
                config.role,
                config.participant_id.clone(),
            ),
            config,
            media: MediaManager::new(devices),
            factory,
            transport,
            handles: HandleSlot::default(),
            local_stream: RefCell::new(None),
            connection_state: ObservableCell::new(ConnectionState::default()),
            media_mode: ObservableCell::new(MediaMode::default()),
            error: ObservableCell::new(None),
            epoch: Epoch::default(),
            commands: commands_tx,
            peer_events: peer_events_tx,
            remote_track_subs: RefCell::new(Vec::new()),
        });

        let tasks = vec![
            spawn_task(Inner::run_events(Rc::downgrade(&inner), events)),
            spawn_task(Inner::run_commands(Rc::downgrade(&inner), commands_rx)),
        ];

        Self {
            inner,
            _tasks: tasks,
        }
    }

    /// Starts the session: acquires local media, connects signaling and
    /// begins negotiating once the counterpart is known.
    ///
    /// Does nothing while [`ConnectionState::Connecting`] or
    /// [`ConnectionState::Connected`]. An unreachable signaling service ends
    /// up in [`ConnectionState::Offline`] with the local media kept for
    /// preview.
    pub async fn start(&self) {
        self.inner.start().await;
    }

    /// Stops the session: closes the peer connection, releases local media
    /// and disconnects signaling.
    ///
    /// Any suspended step of the stopped run is discarded.
    pub fn stop(&self) {
        self.inner.teardown();
        log::info!("Session stopped");
    }

    /// Flips the local video track.
    ///
    /// Returns whether the track is enabled now, or [`None`] if no video was
    /// acquired.
    pub fn toggle_video(&self) -> Option<bool> {
        self.inner.toggle(MediaKind::Video)
    }

    /// Flips the local audio track.
    ///
    /// Returns whether the track is enabled now, or [`None`] if no audio was
    /// acquired.
    pub fn toggle_audio(&self) -> Option<bool> {
        self.inner.toggle(MediaKind::Audio)
    }

    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection_state.get()
    }

    /// Subscribes to [`ConnectionState`] changes. The current state is
    /// emitted first.
    #[inline]
    pub fn on_connection_state_change(
        &self,
    ) -> LocalBoxStream<'static, ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    #[inline]
    pub fn media_mode(&self) -> MediaMode {
        self.inner.media_mode.get()
    }

    /// Subscribes to [`MediaMode`] changes. The current mode is emitted
    /// first.
    #[inline]
    pub fn on_media_mode_change(&self) -> LocalBoxStream<'static, MediaMode> {
        self.inner.media_mode.subscribe()
    }

    /// Returns the last [`SessionError`] of the current run.
    #[inline]
    pub fn error(&self) -> Option<SessionError> {
        self.inner.error.get()
    }

    /// Subscribes to [`SessionController::error`] changes.
    #[inline]
    pub fn on_error(&self) -> LocalBoxStream<'static, Option<SessionError>> {
        self.inner.error.subscribe()
    }

    /// Returns all the remote participants known to this session.
    #[inline]
    pub fn participants(&self) -> Vec<Participant> {
        self.inner.registry.all()
    }

    /// Registers a counterpart known out of band, as if its join was
    /// received.
    pub fn add_participant(
        &self,
        id: ParticipantId,
        role: Role,
        display_name: Option<String>,
    ) {
        let inner = &self.inner;
        if inner.connection_state.get() == ConnectionState::Connected {
            inner.enqueue(
                inner.epoch.current(),
                Command::Signaling(SignalingMessage::ParticipantJoined {
                    participant_id: id,
                    role,
                    display_name,
                }),
            );
        } else {
            drop(inner.registry.join(id, role, display_name));
        }
    }

    /// Returns the acquired [`LocalStream`], if any.
    #[inline]
    pub fn local_stream(&self) -> Option<Rc<LocalStream>> {
        self.inner.local_stream.borrow().clone()
    }

    /// Returns the tracks received on the live connection.
    pub fn remote_tracks(&self) -> Vec<Rc<dyn MediaStreamTrack>> {
        self.inner
            .handles
            .current()
            .map(|h| h.remote_tracks())
            .unwrap_or_default()
    }

    /// Subscribes to the tracks received from the remote side.
    pub fn on_remote_track(
        &self,
    ) -> LocalBoxStream<'static, Rc<dyn MediaStreamTrack>> {
        let (tx, rx) = mpsc::unbounded();
        self.inner.remote_track_subs.borrow_mut().push(tx);
        Box::pin(rx)
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

/// Spawns the provided [`Future`] as an abortable task.
///
/// [`Future`]: std::future::Future
fn spawn_task<F>(task: F) -> TaskHandle
where
    F: std::future::Future<Output = ()> + 'static,
{
    let (task, abort) = future::abortable(task);
    platform::spawn(async move {
        let _ = task.await;
    });
    TaskHandle::from(abort)
}

impl Inner {
    async fn start(&self) {
        match self.connection_state.get() {
            ConnectionState::Connecting | ConnectionState::Connected => {
                log::debug!("Session is started already");
                return;
            }
            ConnectionState::Disconnected
            | ConnectionState::Offline
            | ConnectionState::Failed => {}
        }

        self.reconnection.teardown(&self.handles);
        let epoch = self.epoch.bump();
        self.error.set(None);
        self.connection_state.set(ConnectionState::Connecting);
        log::info!(
            "Starting session {} as {}",
            self.config.session_id,
            self.config.role,
        );

        let (stream, mode) = self.media.acquire().await;
        if !self.epoch.is_current(epoch) {
            if let Some(stream) = stream {
                stream.stop();
                log::debug!("Released media acquired by a stopped session");
            }
            return;
        }
        if let Some(previous) =
            self.local_stream.replace(stream.map(Rc::new))
        {
            previous.stop();
        }
        self.media_mode.set(mode);

        let connected = self.transport.connect().await;
        if !self.epoch.is_current(epoch) {
            return;
        }
        match connected {
            Ok(()) => {
                self.connection_state.set(ConnectionState::Connected);
                self.enqueue(epoch, Command::Establish);
            }
            Err(e) => {
                log::error!("{}", e);
                self.error.set(Some(e.into_inner().into()));
                self.connection_state.set(ConnectionState::Offline);
            }
        }
    }

    /// Stops the current run, going [`ConnectionState::Disconnected`].
    fn teardown(&self) {
        self.epoch.bump();
        self.reconnection.teardown(&self.handles);
        if let Some(stream) = self.local_stream.replace(None) {
            stream.stop();
        }
        self.transport.disconnect();
        self.media_mode.set(MediaMode::Text);
        self.connection_state.set(ConnectionState::Disconnected);
    }

    fn toggle(&self, kind: MediaKind) -> Option<bool> {
        let enabled = self.local_stream.borrow().as_ref()?.toggle(kind)?;
        log::debug!("Local {} track enabled: {}", kind, enabled);
        Some(enabled)
    }

    fn enqueue(&self, epoch: u64, cmd: Command) {
        if self.commands.unbounded_send((epoch, cmd)).is_err() {
            log::error!("Session command loop is gone");
        }
    }

    /// Records the provided error unless it belongs to a stale run.
    fn report<E>(&self, epoch: u64, err: Traced<E>)
    where
        E: Into<SessionError> + std::fmt::Display,
    {
        if !self.epoch.is_current(epoch) {
            log::debug!("Discarding error of a stopped run: {}", err);
            return;
        }
        log::error!("{}", err);
        self.error.set(Some(err.into_inner().into()));
    }

    /// Dispatches [`Event`]s until the session is dropped.
    async fn run_events(
        weak: Weak<Self>,
        mut events: LocalBoxStream<'static, Event>,
    ) {
        let mut transport_state = TransportState::Offline;
        while let Some(event) = events.next().await {
            let this = match weak.upgrade() {
                Some(this) => this,
                None => break,
            };
            match event {
                Event::Message(msg) => this.on_message(msg),
                Event::Transport(state) => {
                    let previous = transport_state;
                    transport_state = state;
                    if previous == TransportState::Connected
                        && state == TransportState::Offline
                        && this.transport.state() == TransportState::Offline
                    {
                        this.on_transport_lost();
                    }
                }
                Event::Peer(event) => this.on_peer_event(event),
            }
        }
    }

    /// Executes [`Command`]s one by one until the session is dropped.
    async fn run_commands(
        weak: Weak<Self>,
        mut commands: mpsc::UnboundedReceiver<(u64, Command)>,
    ) {
        while let Some((epoch, cmd)) = commands.next().await {
            let this = match weak.upgrade() {
                Some(this) => this,
                None => break,
            };
            if !this.epoch.is_current(epoch) {
                log::debug!("Skipping {:?} of a stopped run", cmd);
                continue;
            }
            this.execute(epoch, cmd).await;
        }
    }

    fn on_message(&self, msg: SignalingMessage) {
        match self.connection_state.get() {
            ConnectionState::Disconnected | ConnectionState::Offline => {
                log::debug!("Ignoring {} message, session is idle", msg.kind());
                return;
            }
            ConnectionState::Connecting
            | ConnectionState::Connected
            | ConnectionState::Failed => {
                log::debug!("Received {} message", msg.kind());
            }
        }
        if let SignalingMessage::ParticipantKicked { participant_id } = msg {
            let event = self.registry.kick(participant_id);
            let handle = self.handles.current();
            if self.reconnection.react(&event, handle.as_deref())
                == Reaction::ForceDisconnect
            {
                log::warn!("Local participant was removed from the session");
                self.registry.clear();
                self.teardown();
            }
            return;
        }
        self.enqueue(self.epoch.current(), Command::Signaling(msg));
    }

    fn on_transport_lost(&self) {
        match self.connection_state.get() {
            ConnectionState::Connecting
            | ConnectionState::Connected
            | ConnectionState::Failed => {}
            ConnectionState::Disconnected | ConnectionState::Offline => return,
        }
        log::warn!("Signaling connection lost");
        self.epoch.bump();
        self.reconnection.teardown(&self.handles);
        self.error
            .set(Some(SessionError::Transport(TransportError::Disconnected)));
        self.connection_state.set(ConnectionState::Offline);
    }

    fn on_peer_event(&self, event: PeerEvent) {
        let handle = match self.handles.current() {
            Some(h) if h.id() == event.handle_id() => h,
            _ => {
                log::debug!(
                    "Ignoring event of superseded PeerConnection [id = {}]",
                    event.handle_id(),
                );
                return;
            }
        };
        match event {
            PeerEvent::IceCandidateDiscovered { candidate, .. } => {
                if let Some(candidate) = handle.hold_local_candidate(candidate)
                {
                    self.send_candidates(vec![candidate]);
                }
            }
            PeerEvent::NewRemoteTrack { track, .. } => {
                log::info!("Received remote {} track", track.kind());
                handle.add_remote_track(Rc::clone(&track));
                self.remote_track_subs.borrow_mut().retain(|sub| {
                    sub.unbounded_send(Rc::clone(&track)).is_ok()
                });
            }
            PeerEvent::ConnectionStateChanged { state, .. } => {
                log::debug!("PeerConnection state: {}", state);
                if let Some(state) = ConnectionState::from_peer(state) {
                    self.connection_state.set(state);
                }
            }
        }
    }

    fn send_candidates(&self, candidates: Vec<IceCandidate>) {
        for candidate in candidates {
            self.transport.send(OutboundMessage::IceCandidate(candidate));
        }
    }

    async fn execute(&self, epoch: u64, cmd: Command) {
        match cmd {
            Command::Establish => self.establish(epoch).await,
            Command::Signaling(SignalingMessage::Offer { sdp }) => {
                self.on_offer(epoch, sdp).await;
            }
            Command::Signaling(SignalingMessage::Answer { sdp }) => {
                self.on_answer(epoch, sdp).await;
            }
            Command::Signaling(SignalingMessage::IceCandidate {
                candidate,
            }) => {
                self.on_remote_candidate(epoch, candidate).await;
            }
            Command::Signaling(SignalingMessage::ParticipantJoined {
                participant_id,
                role,
                display_name,
            }) => {
                self.on_joined(epoch, participant_id, role, display_name)
                    .await;
            }
            Command::Signaling(SignalingMessage::ParticipantKicked {
                ..
            }) => {}
        }
    }

    async fn establish(&self, epoch: u64) {
        let handle = match self.ensure_handle(epoch).await {
            Some(handle) => handle,
            None => return,
        };
        match self.config.role {
            Role::Initiator => {
                if self.registry.active(Role::Responder).is_some() {
                    self.initiate(epoch, &handle).await;
                } else {
                    log::info!("Waiting for the responder to join");
                }
            }
            Role::Responder => {
                self.transport.send(OutboundMessage::ParticipantJoined {
                    role: Role::Responder,
                    participant_id: self.config.participant_id.clone(),
                });
            }
        }
    }

    async fn on_offer(&self, epoch: u64, sdp: String) {
        let mut handle = match self.ensure_handle(epoch).await {
            Some(handle) => handle,
            None => return,
        };
        if handle.negotiator().is_own_description(&sdp) {
            log::debug!("Ignoring echo of the local Offer");
            return;
        }
        if self.config.role == Role::Responder
            && handle.negotiator().state() != NegotiationState::Idle
        {
            log::info!("Offer of a rebuilt initiator, rebuilding");
            handle = match self.rebuild(epoch).await {
                Some(handle) => handle,
                None => return,
            };
        }

        match handle.negotiator().on_offer_received(sdp).await {
            Ok(()) => self.send_candidates(handle.release_local_candidates()),
            Err(e) => self.report(epoch, e),
        }
    }

    async fn on_answer(&self, epoch: u64, sdp: String) {
        let handle = match self.ensure_handle(epoch).await {
            Some(handle) => handle,
            None => return,
        };
        if handle.negotiator().is_own_description(&sdp) {
            log::debug!("Ignoring echo of the local Answer");
            return;
        }
        if let Err(e) = handle.negotiator().on_answer_received(sdp).await {
            self.report(epoch, e);
        }
    }

    async fn on_remote_candidate(&self, epoch: u64, candidate: IceCandidate) {
        let handle = match self.ensure_handle(epoch).await {
            Some(handle) => handle,
            None => return,
        };
        if let Err(e) = handle.peer().add_ice_candidate(candidate).await {
            self.report(epoch, e);
        }
    }

    async fn on_joined(
        &self,
        epoch: u64,
        id: ParticipantId,
        role: Role,
        display_name: Option<String>,
    ) {
        let event = match self.registry.join(id, role, display_name) {
            Some(event) => event,
            None => return,
        };
        if let RegistryEvent::Joined(participant) = &event {
            log::info!(
                "Participant {} joined as {}",
                participant.id,
                participant.role,
            );
        }

        let current = self.handles.current();
        match self.reconnection.react(&event, current.as_deref()) {
            Reaction::Rebuild => {
                if let Some(handle) = self.rebuild(epoch).await {
                    self.initiate(epoch, &handle).await;
                }
            }
            Reaction::AcknowledgeJoin => {
                log::debug!("Responder acknowledged the negotiated connection");
            }
            Reaction::ForceDisconnect | Reaction::Ignore => {}
        }
    }

    async fn initiate(&self, epoch: u64, handle: &SessionHandle) {
        match handle.negotiator().initiate().await {
            Ok(true) => self.send_candidates(handle.release_local_candidates()),
            Ok(false) => {}
            Err(e) => self.report(epoch, e),
        }
    }

    /// Returns the live [`SessionHandle`], creating one if there is none.
    async fn ensure_handle(&self, epoch: u64) -> Option<Rc<SessionHandle>> {
        match self.handles.current() {
            Some(handle) => Some(handle),
            None => self.rebuild(epoch).await,
        }
    }

    /// Replaces the live [`SessionHandle`] with a fresh one.
    ///
    /// Returns [`None`] if it cannot be created or the run was stopped
    /// meanwhile.
    async fn rebuild(&self, epoch: u64) -> Option<Rc<SessionHandle>> {
        let local_stream = self.local_stream.borrow().clone();
        let params = HandleParams {
            role: self.config.role,
            local_id: self.config.participant_id.clone(),
            factory: self.factory.as_ref(),
            ice_servers: &self.config.ice_servers,
            local_stream: local_stream.as_deref(),
            transport: Rc::clone(&self.transport),
            peer_events: self.peer_events.clone(),
        };

        let rebuilt = self
            .reconnection
            .rebuild(&self.handles, |id| SessionHandle::new(id, params))
            .await;
        match rebuilt {
            Ok(handle) => {
                if self.epoch.is_current(epoch) {
                    Some(handle)
                } else {
                    self.reconnection.teardown(&self.handles);
                    None
                }
            }
            Err(e) => {
                self.report(epoch, e);
                None
            }
        }
    }
}
