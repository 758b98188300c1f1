//! Signaling service settings.

use std::{borrow::Cow, time::Duration};

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use url::Url;

use crate::signaling::{SessionId, TransportSettings};

/// Signaling service settings.
#[derive(Clone, Debug, Deserialize, Serialize, SmartDefault)]
#[serde(default)]
pub struct Signaling {
    /// STOMP-over-WebSocket endpoint of the signaling service.
    ///
    /// Defaults to `ws://127.0.0.1:8080/ws`.
    #[default("ws://127.0.0.1:8080/ws")]
    pub url: Cow<'static, str>,

    /// Endpoint probed with HTTP `GET` before connecting.
    ///
    /// Defaults to `http://127.0.0.1:8080/health`.
    #[default("http://127.0.0.1:8080/health")]
    pub health_url: Cow<'static, str>,

    /// Maximum duration of the liveness probe.
    #[default(Duration::from_secs(3))]
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,

    /// Maximum duration between opening the socket and the server accepting
    /// the session.
    #[default(Duration::from_secs(10))]
    #[serde(with = "humantime_serde")]
    pub handshake_timeout: Duration,

    /// Prefix of the subscribed destinations.
    #[default("/topic/")]
    pub subscribe_prefix: Cow<'static, str>,

    /// Prefix of the published destinations.
    #[default("/app/")]
    pub publish_prefix: Cow<'static, str>,
}

impl Signaling {
    /// Builds [`TransportSettings`] of the provided session.
    ///
    /// # Errors
    ///
    /// If [`Signaling::url`] or [`Signaling::health_url`] is not a valid URL.
    pub fn settings(
        &self,
        session_id: SessionId,
    ) -> Result<TransportSettings, url::ParseError> {
        Ok(TransportSettings {
            url: Url::parse(&self.url)?,
            health_url: Url::parse(&self.health_url)?,
            session_id,
            probe_timeout: self.probe_timeout,
            handshake_timeout: self.handshake_timeout,
            subscribe_prefix: self.subscribe_prefix.to_string(),
            publish_prefix: self.publish_prefix.to_string(),
        })
    }
}
