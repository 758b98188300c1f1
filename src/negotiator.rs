//! Role-aware SDP offer/answer exchange over a single [`PeerConnection`].

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use derive_more::{Display, From};
use tracerr::Traced;

use crate::{
    participants::{ParticipantId, Role},
    peer::PeerConnection,
    platform::RtcPeerConnectionError,
    signaling::{OutboundMessage, SignalingTransport},
};

/// Offer/answer progress of a [`SessionNegotiator`].
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum NegotiationState {
    /// Nothing was exchanged yet.
    #[display(fmt = "idle")]
    Idle,

    /// Local offer is sent and an answer is awaited.
    #[display(fmt = "have-local-offer")]
    HaveLocalOffer,

    /// Remote offer is applied and the local answer is being produced.
    #[display(fmt = "have-remote-offer")]
    HaveRemoteOffer,

    /// Both descriptions are applied.
    #[display(fmt = "stable")]
    Stable,
}

/// Errors that may occur during an offer/answer exchange.
#[derive(Clone, Debug, Display, Eq, From, PartialEq)]
pub enum NegotiationError {
    /// Offer received by a side which never answers.
    #[display(fmt = "Offer cannot be applied by {}", _0)]
    #[from(ignore)]
    UnexpectedOffer(Role),

    /// Answer received by a side which never offers.
    #[display(fmt = "Answer cannot be applied by {}", _0)]
    #[from(ignore)]
    UnexpectedAnswer(Role),

    /// Answer received while no local offer is outstanding.
    #[display(fmt = "Answer received in `{}` state", _0)]
    #[from(ignore)]
    AnswerWithoutOffer(NegotiationState),

    /// Second offer received on a connection which has applied one already.
    #[display(fmt = "Remote offer is already applied")]
    #[from(ignore)]
    OfferAlreadyApplied,

    /// Side which never offers was asked to initiate.
    #[display(fmt = "Only the initiator may create offers")]
    #[from(ignore)]
    NotInitiator,

    /// [`PeerConnection`] failed to perform a negotiation step.
    #[display(fmt = "{}", _0)]
    PeerConnection(RtcPeerConnectionError),
}

/// Drives the offer/answer exchange of one [`PeerConnection`] according to
/// the local [`Role`].
///
/// Only [`Role::Initiator`] creates offers and only [`Role::Responder`]
/// answers them. Messages of the wrong direction are rejected without
/// touching the [`PeerConnection`].
pub struct SessionNegotiator {
    role: Role,

    local_id: ParticipantId,

    /// [`PeerConnection`] being negotiated.
    peer: Rc<PeerConnection>,

    /// Transport publishing the produced descriptions.
    transport: Rc<dyn SignalingTransport>,

    state: Cell<NegotiationState>,

    /// Whether [`SessionNegotiator::initiate`] has been called already.
    initiated: Cell<bool>,

    /// Whether an answer was applied and the counterpart's join announcement
    /// following it has not been seen yet.
    join_ack_pending: Cell<bool>,

    /// Last description published by this [`SessionNegotiator`].
    local_sdp: RefCell<Option<String>>,
}

impl SessionNegotiator {
    /// Creates a new [`SessionNegotiator`] of the provided [`PeerConnection`].
    pub fn new(
        role: Role,
        local_id: ParticipantId,
        peer: Rc<PeerConnection>,
        transport: Rc<dyn SignalingTransport>,
    ) -> Self {
        Self {
            role,
            local_id,
            peer,
            transport,
            state: Cell::new(NegotiationState::Idle),
            initiated: Cell::new(false),
            join_ack_pending: Cell::new(false),
            local_sdp: RefCell::new(None),
        }
    }

    /// Returns the current [`NegotiationState`].
    #[inline]
    pub fn state(&self) -> NegotiationState {
        self.state.get()
    }

    /// Indicates whether the provided SDP is the one this
    /// [`SessionNegotiator`] published last.
    pub fn is_own_description(&self, sdp: &str) -> bool {
        self.local_sdp.borrow().as_deref() == Some(sdp)
    }

    /// Starts the negotiation by creating and publishing an offer.
    ///
    /// Runs at most once: returns `false` without doing anything if called
    /// again.
    ///
    /// # Errors
    ///
    /// With [`NegotiationError::NotInitiator`] for [`Role::Responder`], or if
    /// the offer cannot be created.
    pub async fn initiate(&self) -> Result<bool, Traced<NegotiationError>> {
        if self.role != Role::Initiator {
            return Err(tracerr::new!(NegotiationError::NotInitiator));
        }
        if self.initiated.replace(true) {
            log::debug!("Negotiation is initiated already");
            return Ok(false);
        }

        let sdp = self
            .peer
            .create_and_set_local_offer()
            .await
            .map_err(tracerr::map_from_and_wrap!())?;
        self.state.set(NegotiationState::HaveLocalOffer);
        self.local_sdp.replace(Some(sdp.clone()));
        self.transport.send(OutboundMessage::Offer { sdp });
        log::debug!("Offer of PeerConnection [id = {}] sent", self.peer.id());

        Ok(true)
    }

    /// Applies the remote offer, publishes the answer and announces the local
    /// participant.
    ///
    /// # Errors
    ///
    /// With [`NegotiationError::UnexpectedOffer`] for [`Role::Initiator`],
    /// with [`NegotiationError::OfferAlreadyApplied`] on repeated offers, or
    /// if any step of the [`PeerConnection`] fails.
    pub async fn on_offer_received(
        &self,
        sdp: String,
    ) -> Result<(), Traced<NegotiationError>> {
        if self.role != Role::Responder {
            return Err(tracerr::new!(NegotiationError::UnexpectedOffer(
                self.role
            )));
        }
        if self.state.get() != NegotiationState::Idle {
            return Err(tracerr::new!(NegotiationError::OfferAlreadyApplied));
        }

        self.state.set(NegotiationState::HaveRemoteOffer);
        self.peer
            .set_remote_offer(sdp)
            .await
            .map_err(tracerr::map_from_and_wrap!())?;
        let flushed = self.peer.flush_ice_candidates().await;
        log::debug!("Applied {} buffered ICE candidates", flushed);

        let answer = self
            .peer
            .create_and_set_local_answer()
            .await
            .map_err(tracerr::map_from_and_wrap!())?;
        self.state.set(NegotiationState::Stable);
        self.local_sdp.replace(Some(answer.clone()));

        self.transport.send(OutboundMessage::Answer { sdp: answer });
        self.transport.send(OutboundMessage::ParticipantJoined {
            role: self.role,
            participant_id: self.local_id.clone(),
        });

        Ok(())
    }

    /// Applies the remote answer to the outstanding local offer.
    ///
    /// # Errors
    ///
    /// With [`NegotiationError::UnexpectedAnswer`] for [`Role::Responder`],
    /// with [`NegotiationError::AnswerWithoutOffer`] if no offer is
    /// outstanding, or if the [`PeerConnection`] rejects the answer.
    pub async fn on_answer_received(
        &self,
        sdp: String,
    ) -> Result<(), Traced<NegotiationError>> {
        if self.role != Role::Initiator {
            return Err(tracerr::new!(NegotiationError::UnexpectedAnswer(
                self.role
            )));
        }
        let state = self.state.get();
        if state != NegotiationState::HaveLocalOffer {
            return Err(tracerr::new!(NegotiationError::AnswerWithoutOffer(
                state
            )));
        }

        self.peer
            .set_remote_answer(sdp)
            .await
            .map_err(tracerr::map_from_and_wrap!())?;
        let flushed = self.peer.flush_ice_candidates().await;
        log::debug!("Applied {} buffered ICE candidates", flushed);

        self.state.set(NegotiationState::Stable);
        self.join_ack_pending.set(true);

        Ok(())
    }

    /// Consumes the pending acknowledgement of an applied answer.
    ///
    /// Returns `true` exactly once after every applied answer.
    #[inline]
    pub fn take_join_ack(&self) -> bool {
        self.join_ack_pending.replace(false)
    }
}
