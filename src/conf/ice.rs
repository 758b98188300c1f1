//! [ICE] servers settings.
//!
//! [ICE]: https://webrtcglossary.com/ice

use std::borrow::Cow;

use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use smart_default::SmartDefault;

use crate::platform::IceServer;

/// [ICE] servers settings.
///
/// [ICE]: https://webrtcglossary.com/ice
#[derive(Clone, Debug, Deserialize, Serialize, SmartDefault)]
#[serde(default)]
pub struct Ice {
    /// List of [STUN]/[TURN] servers every peer connection uses.
    ///
    /// Defaults to two public Google [STUN] servers.
    ///
    /// [STUN]: https://webrtcglossary.com/stun
    /// [TURN]: https://webrtcglossary.com/turn
    #[default(Server::public_stun())]
    pub servers: Vec<Server>,
}

impl Ice {
    /// Returns the configured servers as [`IceServer`]s.
    pub fn ice_servers(&self) -> Vec<IceServer> {
        self.servers.iter().map(IceServer::from).collect()
    }
}

/// [STUN]/[TURN] server settings.
///
/// [STUN]: https://webrtcglossary.com/stun
/// [TURN]: https://webrtcglossary.com/turn
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Server {
    /// URLs of this [TURN]/[STUN] server.
    ///
    /// [STUN]: https://webrtcglossary.com/stun
    /// [TURN]: https://webrtcglossary.com/turn
    #[serde(deserialize_with = "Server::parse_urls")]
    pub urls: Vec<Cow<'static, str>>,

    /// Username to use during the authentication process.
    #[serde(default)]
    pub username: Option<Cow<'static, str>>,

    /// The credential to use when logging into the server.
    #[serde(default)]
    pub credential: Option<Cow<'static, str>>,
}

impl Server {
    /// Public Google [STUN] servers.
    ///
    /// [STUN]: https://webrtcglossary.com/stun
    fn public_stun() -> Vec<Self> {
        ["stun:stun.l.google.com:19302", "stun:stun1.l.google.com:19302"]
            .iter()
            .map(|url| Self {
                urls: vec![Cow::Borrowed(*url)],
                username: None,
                credential: None,
            })
            .collect()
    }

    /// Parses [`Server::urls`] from the provided [`Deserializer`] as CSV
    /// (comma-separated values) string or list of them.
    ///
    /// # Errors
    ///
    /// - If cannot parse CSV strings.
    /// - If parsed [`Server::urls`] is empty or contains empty values.
    fn parse_urls<'de, D>(d: D) -> Result<Vec<Cow<'static, str>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde_json as json;

        let split = |urls: String| -> Vec<Cow<'static, str>> {
            urls.split(',').map(|u| u.trim().to_owned().into()).collect()
        };

        let out: Vec<Cow<'static, str>> = match json::Value::deserialize(d)? {
            json::Value::String(urls) => split(urls),
            json::Value::Array(list) => {
                let mut out = Vec::new();
                for val in list {
                    match val {
                        json::Value::String(urls) => out.extend(split(urls)),
                        _ => return Err(D::Error::custom("Unexpected value")),
                    }
                }
                out
            }
            _ => return Err(D::Error::custom("Unexpected value")),
        };

        if out.is_empty() || out.iter().any(|url| url.is_empty()) {
            return Err(D::Error::custom("Empty values are not allowed"));
        }

        Ok(out)
    }
}

impl From<&Server> for IceServer {
    fn from(server: &Server) -> Self {
        Self {
            urls: server.urls.iter().map(|u| u.to_string()).collect(),
            username: server.username.as_ref().map(|u| u.to_string()),
            credential: server.credential.as_ref().map(|c| c.to_string()),
        }
    }
}
