//! [`HealthProbe`] implementation on top of [`reqwest`].

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::platform::{self, HealthProbe};

/// [`HealthProbe`] issuing a plain HTTP `GET` request.
#[derive(Clone, Debug, Default)]
pub struct HttpHealthProbe(reqwest::Client);

impl HttpHealthProbe {
    /// Creates a new [`HttpHealthProbe`] with a default [`reqwest::Client`].
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait(?Send)]
impl HealthProbe for HttpHealthProbe {
    async fn probe(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> Result<(), platform::Error> {
        let resp = self
            .0
            .get(url.as_str())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| platform::Error::new(e.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(platform::Error::new(format!(
                "health check responded with {}",
                resp.status(),
            )))
        }
    }
}
