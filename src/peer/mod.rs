//! Wrapper around a platform [`RtcPeerConnection`] owned by a single
//! negotiation.

mod ice_buffer;

use std::{cell::Cell, rc::Rc};

use derive_more::Display;
use futures::{channel::mpsc, future, StreamExt as _};
use tracerr::Traced;

use crate::{
    media::LocalStream,
    platform::{
        self, IceCandidate, IceServer, MediaStreamTrack, PeerConnectionState,
        RtcPeerConnection, RtcPeerConnectionError, RtcPeerConnectionEvent,
        RtcPeerConnectionFactory, SdpType,
    },
    utils::TaskHandle,
};

#[doc(inline)]
pub use self::ice_buffer::IceCandidateBuffer;

/// ID of a [`PeerConnection`], unique during the whole lifetime of a session.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub struct HandleId(pub u64);

/// Events emitted by a [`PeerConnection`].
#[derive(Debug)]
pub enum PeerEvent {
    /// [`RtcPeerConnection`] discovered a new local ICE candidate.
    IceCandidateDiscovered {
        handle_id: HandleId,
        candidate: IceCandidate,
    },

    /// [`RtcPeerConnection`] received a new remote track.
    NewRemoteTrack {
        handle_id: HandleId,
        track: Rc<dyn MediaStreamTrack>,
    },

    /// [`PeerConnectionState`] of the [`RtcPeerConnection`] changed.
    ConnectionStateChanged {
        handle_id: HandleId,
        state: PeerConnectionState,
    },
}

impl PeerEvent {
    /// Returns [`HandleId`] of the [`PeerConnection`] emitted this event.
    pub fn handle_id(&self) -> HandleId {
        match self {
            Self::IceCandidateDiscovered { handle_id, .. }
            | Self::NewRemoteTrack { handle_id, .. }
            | Self::ConnectionStateChanged { handle_id, .. } => *handle_id,
        }
    }
}

/// Single [`RtcPeerConnection`] together with the remote ICE candidates
/// waiting for its remote description.
///
/// Once closed, every operation fails with
/// [`RtcPeerConnectionError::Closed`] and no more [`PeerEvent`]s are emitted.
pub struct PeerConnection {
    id: HandleId,

    /// Underlying [`RtcPeerConnection`].
    peer: Rc<dyn RtcPeerConnection>,

    ice_candidates: IceCandidateBuffer,

    closed: Cell<bool>,

    /// Task forwarding [`RtcPeerConnectionEvent`]s as [`PeerEvent`]s.
    events_task: Cell<Option<TaskHandle>>,
}

impl PeerConnection {
    /// Creates a new [`PeerConnection`] with all the tracks of the provided
    /// [`LocalStream`] attached.
    ///
    /// [`PeerEvent`]s of the created connection are sent to `peer_events`.
    ///
    /// # Errors
    ///
    /// If the platform connection cannot be created, or any local track
    /// cannot be attached. The platform connection is closed in the latter
    /// case.
    pub async fn new(
        id: HandleId,
        factory: &dyn RtcPeerConnectionFactory,
        ice_servers: &[IceServer],
        local_stream: Option<&LocalStream>,
        peer_events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Rc<Self>, Traced<RtcPeerConnectionError>> {
        let peer = factory
            .create(ice_servers)
            .await
            .map_err(tracerr::wrap!())?;

        if let Some(stream) = local_stream {
            for track in stream.tracks() {
                if let Err(e) = peer.add_track(Rc::clone(track)).await {
                    peer.close();
                    return Err(tracerr::new!(e));
                }
            }
        }

        let this = Rc::new(Self {
            id,
            peer,
            ice_candidates: IceCandidateBuffer::new(),
            closed: Cell::new(false),
            events_task: Cell::new(None),
        });
        this.spawn_events_forwarder(peer_events);

        Ok(this)
    }

    /// Spawns the task converting [`RtcPeerConnectionEvent`]s into
    /// [`PeerEvent`]s of this [`PeerConnection`].
    fn spawn_events_forwarder(&self, tx: mpsc::UnboundedSender<PeerEvent>) {
        let handle_id = self.id;
        let mut events = self.peer.on_event();
        let (forwarder, abort) = future::abortable(async move {
            while let Some(event) = events.next().await {
                let event = match event {
                    RtcPeerConnectionEvent::IceCandidate(candidate) => {
                        PeerEvent::IceCandidateDiscovered {
                            handle_id,
                            candidate,
                        }
                    }
                    RtcPeerConnectionEvent::Track(track) => {
                        PeerEvent::NewRemoteTrack { handle_id, track }
                    }
                    RtcPeerConnectionEvent::ConnectionStateChange(state) => {
                        PeerEvent::ConnectionStateChanged { handle_id, state }
                    }
                };
                if tx.unbounded_send(event).is_err() {
                    break;
                }
            }
        });
        platform::spawn(async move {
            let _ = forwarder.await;
        });
        self.events_task.set(Some(TaskHandle::from(abort)));
    }

    /// Returns [`HandleId`] of this [`PeerConnection`].
    #[inline]
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Indicates whether this [`PeerConnection`] has been closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn ensure_open(&self) -> Result<(), Traced<RtcPeerConnectionError>> {
        if self.closed.get() {
            Err(tracerr::new!(RtcPeerConnectionError::Closed))
        } else {
            Ok(())
        }
    }

    /// Creates an SDP offer and applies it as the local description.
    ///
    /// # Errors
    ///
    /// If this [`PeerConnection`] is closed, or the platform fails.
    pub async fn create_and_set_local_offer(
        &self,
    ) -> Result<String, Traced<RtcPeerConnectionError>> {
        self.ensure_open()?;
        let sdp = self
            .peer
            .create_and_set_offer()
            .await
            .map_err(tracerr::wrap!())?;
        self.ensure_open()?;
        Ok(sdp)
    }

    /// Creates an SDP answer and applies it as the local description.
    ///
    /// # Errors
    ///
    /// If this [`PeerConnection`] is closed, or the platform fails.
    pub async fn create_and_set_local_answer(
        &self,
    ) -> Result<String, Traced<RtcPeerConnectionError>> {
        self.ensure_open()?;
        let sdp = self
            .peer
            .create_and_set_answer()
            .await
            .map_err(tracerr::wrap!())?;
        self.ensure_open()?;
        Ok(sdp)
    }

    /// Applies the provided SDP offer as the remote description.
    ///
    /// # Errors
    ///
    /// If this [`PeerConnection`] is closed, or the platform fails.
    pub async fn set_remote_offer(
        &self,
        sdp: String,
    ) -> Result<(), Traced<RtcPeerConnectionError>> {
        self.set_remote_description(SdpType::Offer(sdp)).await
    }

    /// Applies the provided SDP answer as the remote description.
    ///
    /// # Errors
    ///
    /// If this [`PeerConnection`] is closed, or the platform fails.
    pub async fn set_remote_answer(
        &self,
        sdp: String,
    ) -> Result<(), Traced<RtcPeerConnectionError>> {
        self.set_remote_description(SdpType::Answer(sdp)).await
    }

    async fn set_remote_description(
        &self,
        sdp: SdpType,
    ) -> Result<(), Traced<RtcPeerConnectionError>> {
        self.ensure_open()?;
        self.peer
            .set_remote_description(sdp)
            .await
            .map_err(tracerr::wrap!())?;
        self.ensure_open()
    }

    /// Adds the provided remote [`IceCandidate`].
    ///
    /// The candidate is buffered until [`PeerConnection::flush_ice_candidates`]
    /// is called.
    ///
    /// # Errors
    ///
    /// If this [`PeerConnection`] is closed, or the platform rejects the
    /// candidate.
    pub async fn add_ice_candidate(
        &self,
        candidate: IceCandidate,
    ) -> Result<(), Traced<RtcPeerConnectionError>> {
        self.ensure_open()?;
        if let Some(candidate) = self.ice_candidates.offer(candidate) {
            self.peer
                .add_ice_candidate(&candidate)
                .await
                .map_err(tracerr::wrap!())?;
        }
        Ok(())
    }

    /// Applies all the buffered remote [`IceCandidate`]s in their arrival
    /// order. Must be called right after the remote description is set.
    ///
    /// Returns the number of applied candidates.
    pub async fn flush_ice_candidates(&self) -> usize {
        if self.closed.get() {
            return 0;
        }
        self.ice_candidates.flush(self.peer.as_ref()).await
    }

    /// Number of remote candidates waiting for the remote description.
    #[inline]
    pub fn buffered_ice_candidates(&self) -> usize {
        self.ice_candidates.len()
    }

    /// Closes this [`PeerConnection`]. Idempotent.
    pub fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        drop(self.events_task.take());
        self.peer.close();
        log::debug!("PeerConnection [id = {}] closed", self.id);
    }
}

impl Drop for PeerConnection {
    fn drop(&mut self) {
        self.close();
    }
}
