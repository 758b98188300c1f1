//! Messages exchanged over the session topic.

use derive_more::{Display, From};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;

use crate::{
    participants::{ParticipantId, Role},
    platform::IceCandidate,
};

/// ID of a negotiated session.
#[derive(
    Clone, Debug, Deserialize, Display, Eq, From, Hash, PartialEq, Serialize,
)]
#[from(forward)]
#[serde(transparent)]
pub struct SessionId(pub String);

/// Message received from the session topic.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SignalingMessage {
    /// SDP offer of the initiator.
    Offer {
        /// Offered SDP.
        #[serde(alias = "offer", deserialize_with = "deserialize_sdp")]
        sdp: String,
    },

    /// SDP answer of the responder.
    Answer {
        /// Answered SDP.
        #[serde(alias = "answer", deserialize_with = "deserialize_sdp")]
        sdp: String,
    },

    /// ICE candidate gathered by the remote side.
    IceCandidate {
        /// Gathered candidate.
        candidate: IceCandidate,
    },

    /// A participant (re)joined the session.
    #[serde(rename_all = "camelCase")]
    ParticipantJoined {
        /// ID of the joined participant.
        participant_id: ParticipantId,

        /// [`Role`] of the joined participant.
        role: Role,

        /// Name shown to the other side.
        #[serde(default)]
        display_name: Option<String>,
    },

    /// A participant was removed from the session.
    #[serde(rename_all = "camelCase")]
    ParticipantKicked {
        /// ID of the removed participant.
        participant_id: ParticipantId,
    },
}

impl SignalingMessage {
    /// Returns the wire name of this message type, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Offer { .. } => "Offer",
            Self::Answer { .. } => "Answer",
            Self::IceCandidate { .. } => "IceCandidate",
            Self::ParticipantJoined { .. } => "ParticipantJoined",
            Self::ParticipantKicked { .. } => "ParticipantKicked",
        }
    }
}

/// SDP either as a bare string or as a [RTCSessionDescriptionInit][1].
///
/// [1]: https://w3.org/TR/webrtc/#dom-rtcsessiondescriptioninit
#[derive(Deserialize)]
#[serde(untagged)]
enum SdpRepr {
    Raw(String),
    Description { sdp: String },
}

fn deserialize_sdp<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match SdpRepr::deserialize(d)? {
        SdpRepr::Raw(sdp) | SdpRepr::Description { sdp } => sdp,
    })
}

/// Message published by the local side.
#[derive(Clone, Debug, PartialEq)]
pub enum OutboundMessage {
    /// Local SDP offer.
    Offer {
        /// Offered SDP.
        sdp: String,
    },

    /// Local SDP answer.
    Answer {
        /// Answered SDP.
        sdp: String,
    },

    /// Locally gathered [`IceCandidate`].
    IceCandidate(IceCandidate),

    /// Announcement of the local participant.
    ParticipantJoined {
        /// [`Role`] of the local participant.
        role: Role,

        /// ID of the local participant.
        participant_id: ParticipantId,
    },
}

impl OutboundMessage {
    /// Returns the last segment of the destination of this message.
    pub fn destination(&self) -> &'static str {
        match self {
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate(_) => "ice-candidate",
            Self::ParticipantJoined { .. } => "participant-joined",
        }
    }

    /// Serializes the body of this message.
    pub fn body(&self) -> serde_json::Value {
        match self {
            Self::Offer { sdp } => json!({
                "offer": { "type": "offer", "sdp": sdp }
            }),
            Self::Answer { sdp } => json!({
                "answer": { "type": "answer", "sdp": sdp }
            }),
            Self::IceCandidate(candidate) => json!({ "candidate": candidate }),
            Self::ParticipantJoined {
                role,
                participant_id,
            } => json!({
                "role": role,
                "participantId": participant_id
            }),
        }
    }
}
