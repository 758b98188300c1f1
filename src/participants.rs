//! Bookkeeping of the session counterpart.

use std::{cell::RefCell, convert::TryFrom};

use chrono::{DateTime, Utc};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// ID of a session participant.
#[derive(
    Clone, Debug, Deserialize, Display, Eq, From, Hash, PartialEq, Serialize,
)]
#[from(forward)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

/// Side of the two-party session.
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    /// Host side, the one which creates offers.
    #[display(fmt = "initiator")]
    Initiator,

    /// Guest side, the one which answers.
    #[display(fmt = "responder")]
    Responder,
}

impl Role {
    /// Parses a domain role name.
    ///
    /// `host` and `pb` map to [`Role::Initiator`], `guest` maps to
    /// [`Role::Responder`].
    pub fn from_domain(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "host" | "pb" | "initiator" => Some(Self::Initiator),
            "guest" | "responder" => Some(Self::Responder),
            _ => None,
        }
    }

    /// Returns the domain name of this [`Role`] used on the wire.
    pub fn as_domain(self) -> &'static str {
        match self {
            Self::Initiator => "host",
            Self::Responder => "guest",
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::from_domain(&name)
            .ok_or_else(|| format!("unknown role `{}`", name))
    }
}

impl From<Role> for String {
    #[inline]
    fn from(role: Role) -> Self {
        role.as_domain().to_owned()
    }
}

/// Remote side of the session.
#[derive(Clone, Debug, PartialEq)]
pub struct Participant {
    /// ID of this participant.
    pub id: ParticipantId,

    /// Name shown to the other side.
    pub display_name: Option<String>,

    /// [`Role`] of this participant.
    pub role: Role,

    /// Moment of the last join of this participant.
    pub joined_at: DateTime<Utc>,

    /// `false` once this participant has been removed.
    pub active: bool,
}

/// Structured event raised by the [`ParticipantRegistry`].
#[derive(Clone, Debug, PartialEq)]
pub enum RegistryEvent {
    /// A remote participant (re)joined.
    Joined(Participant),

    /// A participant was removed from the session.
    Kicked(ParticipantId),
}

/// Registry of the remote participants of a two-party session.
///
/// At most one participant per [`Role`] is known at a time.
#[derive(Debug)]
pub struct ParticipantRegistry {
    local_id: ParticipantId,
    participants: RefCell<Vec<Participant>>,
}

impl ParticipantRegistry {
    /// Creates a new empty [`ParticipantRegistry`] of the local participant
    /// with the provided [`ParticipantId`].
    pub fn new(local_id: ParticipantId) -> Self {
        Self {
            local_id,
            participants: RefCell::new(Vec::new()),
        }
    }

    /// Indicates whether the provided [`ParticipantId`] is the local one.
    #[inline]
    pub fn is_local(&self, id: &ParticipantId) -> bool {
        &self.local_id == id
    }

    /// Records a join of a remote participant.
    ///
    /// Any previous participant of the same [`Role`] is forgotten.
    /// Returns [`None`] for an echo of the local participant's own join.
    pub fn join(
        &self,
        id: ParticipantId,
        role: Role,
        display_name: Option<String>,
    ) -> Option<RegistryEvent> {
        if self.is_local(&id) {
            return None;
        }

        let mut participants = self.participants.borrow_mut();
        participants.retain(|p| p.role != role && p.id != id);

        let participant = Participant {
            id,
            display_name,
            role,
            joined_at: Utc::now(),
            active: true,
        };
        participants.push(participant.clone());
        Some(RegistryEvent::Joined(participant))
    }

    /// Records removal of the participant with the provided
    /// [`ParticipantId`].
    ///
    /// A remote participant is only marked inactive, until another one of
    /// its [`Role`] joins.
    pub fn kick(&self, id: ParticipantId) -> RegistryEvent {
        for p in self
            .participants
            .borrow_mut()
            .iter_mut()
            .filter(|p| p.id == id)
        {
            p.active = false;
        }
        RegistryEvent::Kicked(id)
    }

    /// Returns the active participant of the provided [`Role`].
    pub fn active(&self, role: Role) -> Option<Participant> {
        self.participants
            .borrow()
            .iter()
            .find(|p| p.active && p.role == role)
            .cloned()
    }

    /// Returns all the known participants.
    pub fn all(&self) -> Vec<Participant> {
        self.participants.borrow().clone()
    }

    /// Forgets all the participants.
    pub fn clear(&self) {
        self.participants.borrow_mut().clear();
    }
}
