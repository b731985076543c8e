//! JSON-over-HTTPS plumbing shared by the hosted providers.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::error;

/// How the API key travels with each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyPlacement {
    /// `Authorization: Bearer <key>`.
    Bearer,
    /// A service-specific header carrying the raw key.
    #[cfg_attr(not(feature = "gemini"), allow(dead_code))]
    Header(&'static str),
}

/// Authenticated client for one endpoint of one service.
pub(crate) struct ServiceClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    placement: KeyPlacement,
    service: &'static str,
}

impl ServiceClient {
    pub(crate) fn new(service: &'static str, url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            api_key,
            placement: KeyPlacement::Bearer,
            service,
        }
    }

    #[cfg_attr(not(feature = "gemini"), allow(dead_code))]
    pub(crate) fn with_key_placement(mut self, placement: KeyPlacement) -> Self {
        self.placement = placement;
        self
    }

    /// POST `body` and decode the response as `R`.
    ///
    /// Failures come back as a message for the caller to wrap in its own error variant;
    /// `detail` extracts the service's error text from a non-success body.
    pub(crate) async fn post<B, R>(
        &self,
        body: &B,
        detail: fn(&str) -> Option<String>,
    ) -> Result<R, String>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = self.client.post(&self.url).json(body);
        let request = match self.placement {
            KeyPlacement::Bearer => request.bearer_auth(&self.api_key),
            KeyPlacement::Header(name) => request.header(name, &self.api_key),
        };

        let response = request.send().await.map_err(|e| {
            error!(service = self.service, error = %e, "request failed");
            format!("request failed: {e}")
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(service = self.service, %status, "service returned an error");
            let message = detail(&text).unwrap_or(text);
            return Err(format!("{status}: {message}"));
        }

        response.json::<R>().await.map_err(|e| {
            error!(service = self.service, error = %e, "unexpected response body");
            format!("unexpected response body: {e}")
        })
    }
}

/// Resolve the endpoint base, dropping any trailing slash.
pub(crate) fn base_url(configured: Option<&str>, default: &str) -> String {
    configured.unwrap_or(default).trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_base_wins_and_loses_its_trailing_slash() {
        let configured = base_url(Some("http://localhost:8080/v1/"), "https://x");
        assert_eq!(configured, "http://localhost:8080/v1");
        assert_eq!(base_url(None, "https://x"), "https://x");
    }
}
