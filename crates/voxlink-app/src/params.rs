//! Page URL parameters overriding the session config.

use voxlink_core::config::SessionConfig;

/// Session overrides from the page URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParams {
    /// Channel name (without `private-`)
    pub channel: Option<String>,
    /// Websocket server (e.g., "localhost:3030")
    pub server: Option<String>,
    /// Volume to name exports after
    pub volume: Option<String>,
}

impl UrlParams {
    /// Parse a query string or hash fragment like `?channel=lab&server=localhost:3030`.
    pub fn parse(s: &str) -> Self {
        let s = s.trim_start_matches(['?', '#']);
        let mut params = Self::default();

        for pair in s.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            match key {
                "channel" => params.channel = Some(value.to_string()),
                "server" => params.server = Some(value.to_string()),
                "volume" => params.volume = Some(value.to_string()),
                _ => {}
            }
        }
        params
    }

    /// Fill unset fields from `other`.
    pub fn or(self, other: Self) -> Self {
        Self {
            channel: self.channel.or(other.channel),
            server: self.server.or(other.server),
            volume: self.volume.or(other.volume),
        }
    }

    /// Apply the overrides to a config.
    pub fn apply(&self, config: &mut SessionConfig) {
        if let Some(channel) = &self.channel {
            config.channel = channel.clone();
        }
        if let Some(server) = &self.server {
            config.host = Some(server_url(server));
        }
        if let Some(volume) = &self.volume {
            config.volume_url = Some(volume.clone());
        }
    }
}

/// Websocket base URL for a server parameter; `ws://` unless a scheme is given.
pub fn server_url(server: &str) -> String {
    let server = server.trim().trim_end_matches('/');
    if server.starts_with("ws://") || server.starts_with("wss://") {
        server.to_string()
    } else {
        format!("ws://{}", server)
    }
}
