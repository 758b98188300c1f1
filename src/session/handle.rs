//! Live negotiation unit of a session.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use futures::channel::mpsc;
use tracerr::Traced;

use crate::{
    media::LocalStream,
    negotiator::SessionNegotiator,
    participants::{ParticipantId, Role},
    peer::{HandleId, PeerConnection, PeerEvent},
    platform::{
        IceCandidate, IceServer, MediaStreamTrack, RtcPeerConnectionError,
        RtcPeerConnectionFactory,
    },
    signaling::SignalingTransport,
};

/// [`PeerConnection`] of a session together with its [`SessionNegotiator`]
/// and the remote tracks it received.
///
/// Never mutated into another connection: a reconnection replaces the whole
/// [`SessionHandle`].
pub struct SessionHandle {
    peer: Rc<PeerConnection>,
    negotiator: SessionNegotiator,
    remote_tracks: RefCell<Vec<Rc<dyn MediaStreamTrack>>>,

    /// Local candidates gathered before the local description was published.
    held_candidates: RefCell<Vec<IceCandidate>>,

    /// Whether the local description was published.
    described: Cell<bool>,
}

/// Everything needed to build a [`SessionHandle`].
pub struct HandleParams<'a> {
    pub role: Role,
    pub local_id: ParticipantId,
    pub factory: &'a dyn RtcPeerConnectionFactory,
    pub ice_servers: &'a [IceServer],
    pub local_stream: Option<&'a LocalStream>,
    pub transport: Rc<dyn SignalingTransport>,
    pub peer_events: mpsc::UnboundedSender<PeerEvent>,
}

impl SessionHandle {
    /// Creates a new [`SessionHandle`] with the provided [`HandleId`].
    ///
    /// # Errors
    ///
    /// If the underlying [`PeerConnection`] cannot be created.
    pub async fn new(
        id: HandleId,
        params: HandleParams<'_>,
    ) -> Result<Self, Traced<RtcPeerConnectionError>> {
        let peer = PeerConnection::new(
            id,
            params.factory,
            params.ice_servers,
            params.local_stream,
            params.peer_events,
        )
        .await
        .map_err(tracerr::wrap!())?;
        let negotiator = SessionNegotiator::new(
            params.role,
            params.local_id,
            Rc::clone(&peer),
            params.transport,
        );
        log::debug!("SessionHandle [id = {}] created", id);

        Ok(Self {
            peer,
            negotiator,
            remote_tracks: RefCell::new(Vec::new()),
            held_candidates: RefCell::new(Vec::new()),
            described: Cell::new(false),
        })
    }

    #[inline]
    pub fn id(&self) -> HandleId {
        self.peer.id()
    }

    #[inline]
    pub fn peer(&self) -> &Rc<PeerConnection> {
        &self.peer
    }

    #[inline]
    pub fn negotiator(&self) -> &SessionNegotiator {
        &self.negotiator
    }

    /// Holds back the provided local [`IceCandidate`] until the local
    /// description is published.
    ///
    /// Returns the candidate back if it may be published right away.
    pub fn hold_local_candidate(
        &self,
        candidate: IceCandidate,
    ) -> Option<IceCandidate> {
        if self.described.get() {
            Some(candidate)
        } else {
            self.held_candidates.borrow_mut().push(candidate);
            None
        }
    }

    /// Marks the local description as published and returns the held back
    /// local candidates in their gathering order.
    pub fn release_local_candidates(&self) -> Vec<IceCandidate> {
        self.described.set(true);
        self.held_candidates.replace(Vec::new())
    }

    /// Records a track received from the remote side.
    pub fn add_remote_track(&self, track: Rc<dyn MediaStreamTrack>) {
        self.remote_tracks.borrow_mut().push(track);
    }

    /// Returns the tracks received from the remote side.
    pub fn remote_tracks(&self) -> Vec<Rc<dyn MediaStreamTrack>> {
        self.remote_tracks.borrow().clone()
    }

    /// Indicates whether this [`SessionHandle`] has been closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.peer.is_closed()
    }

    /// Closes the underlying [`PeerConnection`]. Idempotent.
    ///
    /// Local tracks stay untouched, as they outlive the handle.
    pub fn close(&self) {
        self.peer.close();
        self.remote_tracks.borrow_mut().clear();
    }
}

/// Owner of the single live [`SessionHandle`] of a session.
#[derive(Default)]
pub struct HandleSlot {
    current: RefCell<Option<Rc<SessionHandle>>>,
    last_id: Cell<u64>,
}

impl HandleSlot {
    /// Returns the live [`SessionHandle`], if any.
    pub fn current(&self) -> Option<Rc<SessionHandle>> {
        self.current.borrow().clone()
    }

    /// Indicates whether the provided [`HandleId`] belongs to the live
    /// [`SessionHandle`].
    pub fn is_current(&self, id: HandleId) -> bool {
        self.current.borrow().as_ref().map_or(false, |h| h.id() == id)
    }

    /// Allocates a never used [`HandleId`].
    pub fn next_id(&self) -> HandleId {
        let id = self.last_id.get() + 1;
        self.last_id.set(id);
        HandleId(id)
    }

    /// Removes the live [`SessionHandle`] out of this slot.
    pub fn take(&self) -> Option<Rc<SessionHandle>> {
        self.current.borrow_mut().take()
    }

    /// Puts the provided [`SessionHandle`] into this slot.
    ///
    /// # Panics
    ///
    /// If a live [`SessionHandle`] is in the slot already.
    pub fn set(&self, handle: Rc<SessionHandle>) {
        let mut current = self.current.borrow_mut();
        assert!(
            current.as_ref().map_or(true, |h| h.is_closed()),
            "live SessionHandle must be closed before its replacement",
        );
        *current = Some(handle);
    }
}
