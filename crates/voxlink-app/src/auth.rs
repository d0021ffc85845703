//! Private channel authorization over HTTP.

use serde::Deserialize;
use voxlink_core::config::SessionConfig;
use voxlink_core::sync::{ChannelAuthorizer, ChannelError, NoAuth};

/// Body returned by the auth endpoint.
#[derive(Debug, Deserialize)]
struct AuthResponse {
    auth: String,
}

/// Asks an HTTP endpoint to sign subscriptions.
///
/// Posts `socket_id` and `channel_name` as form data and expects
/// `{"auth": "<key>:<signature>"}` back, like any Pusher auth endpoint.
pub struct HttpAuthorizer {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl HttpAuthorizer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl ChannelAuthorizer for HttpAuthorizer {
    fn authorize(&self, socket_id: &str, channel: &str) -> Result<Option<String>, ChannelError> {
        log::debug!("Requesting auth for {} from {}", channel, self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("socket_id", socket_id), ("channel_name", channel)])
            .send()
            .map_err(|e| ChannelError::Auth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Auth(format!("endpoint returned {}", status)));
        }

        let body: AuthResponse = response.json().map_err(|e| ChannelError::Auth(e.to_string()))?;
        Ok(Some(body.auth))
    }
}

/// Authorizer for a session: HTTP when an endpoint is configured, none otherwise.
pub fn authorizer_for(config: &SessionConfig) -> Box<dyn ChannelAuthorizer> {
    match &config.auth_endpoint {
        Some(endpoint) => Box::new(HttpAuthorizer::new(endpoint.clone())),
        None => {
            log::info!("No auth endpoint configured; subscribing without auth");
            Box::new(NoAuth)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_auth_response() {
        let body: AuthResponse = serde_json::from_str(r#"{"auth":"key:abc123"}"#).unwrap();
        assert_eq!(body.auth, "key:abc123");
        assert!(serde_json::from_str::<AuthResponse>(r#"{"token":"x"}"#).is_err());
    }

    #[test]
    fn test_authorizer_without_endpoint() {
        let authorizer = authorizer_for(&SessionConfig::default());
        assert_eq!(authorizer.authorize("1.2", "private-cs410").unwrap(), None);
    }

    #[test]
    fn test_unreachable_endpoint_fails() {
        let authorizer = HttpAuthorizer::new("http://127.0.0.1:9/auth");
        assert!(matches!(
            authorizer.authorize("1.2", "private-cs410"),
            Err(ChannelError::Auth(_))
        ));
    }
}
