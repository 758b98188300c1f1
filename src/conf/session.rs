//! Settings of the session to join.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use crate::{
    participants::Role,
    platform::IceServer,
    session::SessionConfig,
};

/// Settings of the session to join.
#[derive(Clone, Debug, Deserialize, Serialize, SmartDefault)]
#[serde(default)]
pub struct Session {
    /// ID of the session.
    #[default("default")]
    pub id: Cow<'static, str>,

    /// ID of the local participant.
    #[default("host-1")]
    pub participant_id: Cow<'static, str>,

    /// Name of the local participant shown to the other side.
    pub display_name: Option<Cow<'static, str>>,

    /// Role of the local participant, `host` or `guest`.
    ///
    /// Defaults to `host`.
    #[default(Role::Initiator)]
    pub role: Role,

    /// Bearer token authenticating the signaling session.
    pub token: Option<Cow<'static, str>>,
}

impl Session {
    /// Builds [`SessionConfig`] of this session using the provided ICE
    /// servers.
    pub fn config(&self, ice_servers: Vec<IceServer>) -> SessionConfig {
        SessionConfig {
            session_id: self.id.to_string().into(),
            participant_id: self.participant_id.to_string().into(),
            display_name: self.display_name.as_ref().map(|n| n.to_string()),
            role: self.role,
            ice_servers,
        }
    }

    /// Returns the configured bearer token, if any.
    pub fn token(&self) -> Option<String> {
        self.token.as_ref().map(|t| t.to_string())
    }
}
