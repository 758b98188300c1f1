//! Two-party WebRTC session negotiation over a STOMP signaling service.
//!
//! A [`SessionController`] drives one session between an initiator (host)
//! and a responder (guest): it acquires local media, connects the
//! [`SignalingTransport`], negotiates a single peer connection and rebuilds
//! it whenever the counterpart rejoins.

#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

pub mod conf;
pub mod logging;
pub mod media;
pub mod negotiator;
pub mod participants;
pub mod peer;
pub mod platform;
pub mod reconnect;
pub mod session;
pub mod signaling;
pub mod utils;

#[doc(inline)]
pub use self::{
    media::{LocalStream, MediaKind, MediaMode},
    negotiator::{NegotiationError, NegotiationState, SessionNegotiator},
    participants::{Participant, ParticipantId, Role},
    session::{ConnectionState, SessionConfig, SessionController, SessionError},
    signaling::{
        SessionId, SignalingMessage, SignalingTransport,
        StompSignalingTransport, TransportError, TransportState,
    },
};
