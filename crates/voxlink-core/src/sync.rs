//! Pub/sub channel transport.
//!
//! Speaks the subset of the Pusher websocket protocol (version 7) a client of a
//! private channel needs: connection handshake, authenticated subscribe,
//! ping/pong, and client events. Frames look like
//!
//! ```json
//! { "event": "pusher:subscribe", "data": { "channel": "private-cs410", "auth": "key:sig" } }
//! { "event": "client-undo", "channel": "private-cs410", "data": {} }
//! ```

use crate::protocol::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

pub const PUSHER_CONNECTION_ESTABLISHED: &str = "pusher:connection_established";
pub const PUSHER_SUBSCRIBE: &str = "pusher:subscribe";
pub const PUSHER_UNSUBSCRIBE: &str = "pusher:unsubscribe";
pub const PUSHER_SUBSCRIPTION_SUCCEEDED: &str = "pusher:subscription_succeeded";
pub const PUSHER_INTERNAL_SUBSCRIPTION_SUCCEEDED: &str = "pusher_internal:subscription_succeeded";
pub const PUSHER_PING: &str = "pusher:ping";
pub const PUSHER_PONG: &str = "pusher:pong";
pub const PUSHER_ERROR: &str = "pusher:error";

/// Protocol revision announced to the server.
pub const PUSHER_PROTOCOL_VERSION: u8 = 7;

/// Channel transport errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("not connected")]
    NotConnected,
    #[error("send failed: {0}")]
    Send(String),
    #[error("channel authorization failed: {0}")]
    Auth(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("frame encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Outbound side of a subscribed channel.
pub trait Channel {
    /// Trigger a client event on the channel.
    fn trigger(&mut self, event: &str, data: &Value) -> Result<(), ChannelError>;
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn trigger(&mut self, event: &str, data: &Value) -> Result<(), ChannelError> {
        (**self).trigger(event, data)
    }
}

/// Signs private channel subscriptions.
pub trait ChannelAuthorizer: Send {
    /// Auth token for subscribing `socket_id` to `channel`; `None` subscribes
    /// without one.
    fn authorize(&self, socket_id: &str, channel: &str) -> Result<Option<String>, ChannelError>;
}

impl<A: ChannelAuthorizer + ?Sized> ChannelAuthorizer for Box<A> {
    fn authorize(&self, socket_id: &str, channel: &str) -> Result<Option<String>, ChannelError> {
        (**self).authorize(socket_id, channel)
    }
}

/// Subscribes without an auth token (local relays).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl ChannelAuthorizer for NoAuth {
    fn authorize(&self, _socket_id: &str, _channel: &str) -> Result<Option<String>, ChannelError> {
        Ok(None)
    }
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Subscribed,
    Error,
}

/// Events from the channel transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Socket open and handshake done
    Connected { socket_id: String },
    /// Subscription to the channel confirmed
    Subscribed { channel: String },
    /// Client event from another subscriber
    Message { event: String, data: Value },
    /// Socket closed
    Disconnected,
    /// Error reported by the server or the socket. `code` is the Pusher
    /// error code when the server sent one.
    Error { message: String, code: Option<u16> },
}

impl TransportEvent {
    /// Whether the connection is gone after this event.
    ///
    /// Pusher codes 4000-4299 close the connection; 4300 and up report a
    /// rejected request on a live connection. Socket errors carry no code.
    pub fn is_fatal(&self) -> bool {
        match self {
            TransportEvent::Disconnected => true,
            TransportEvent::Error { code, .. } => code.is_none_or(|code| code < 4300),
            _ => false,
        }
    }
}

/// A Pusher protocol frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PusherFrame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl PusherFrame {
    pub fn new(event: impl Into<String>, channel: Option<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            channel,
            data,
        }
    }

    /// Subscription request for `channel`.
    pub fn subscribe(channel: &str, auth: Option<String>) -> Self {
        let mut data = json!({ "channel": channel });
        if let Some(auth) = auth {
            data["auth"] = Value::String(auth);
        }
        Self::new(PUSHER_SUBSCRIBE, None, data)
    }

    /// Client event on `channel`.
    pub fn client_event(channel: &str, event: &str, data: Value) -> Self {
        Self::new(event, Some(channel.to_string()), data)
    }

    /// Server frame. `data` is carried as a JSON string, as Pusher servers do.
    pub fn server_event(event: &str, channel: Option<String>, data: &Value) -> Self {
        Self::new(event, channel, Value::String(data.to_string()))
    }

    pub fn pong() -> Self {
        Self::new(PUSHER_PONG, None, json!({}))
    }

    /// Parse a frame. String `data` holding JSON is unwrapped, since servers
    /// double-encode their payloads.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        let mut frame: PusherFrame = serde_json::from_str(text)?;
        if let Value::String(inner) = &frame.data {
            if let Ok(parsed) = serde_json::from_str::<Value>(inner) {
                frame.data = parsed;
            }
        }
        Ok(frame)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn is_client_event(&self) -> bool {
        self.event.starts_with("client-")
    }

    /// Socket id from a `pusher:connection_established` frame.
    pub fn socket_id(&self) -> Option<&str> {
        self.data.get("socket_id").and_then(Value::as_str)
    }

    /// Map a server frame to a transport event. Pings and unrelated frames
    /// yield `None`.
    pub fn into_transport_event(self) -> Option<TransportEvent> {
        match self.event.as_str() {
            PUSHER_CONNECTION_ESTABLISHED => self.socket_id().map(|socket_id| TransportEvent::Connected {
                socket_id: socket_id.to_string(),
            }),
            PUSHER_INTERNAL_SUBSCRIPTION_SUCCEEDED | PUSHER_SUBSCRIPTION_SUCCEEDED => {
                Some(TransportEvent::Subscribed {
                    channel: self.channel.unwrap_or_default(),
                })
            }
            PUSHER_ERROR => {
                let message = self
                    .data
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                let code = self
                    .data
                    .get("code")
                    .and_then(Value::as_u64)
                    .and_then(|code| u16::try_from(code).ok());
                Some(TransportEvent::Error { message, code })
            }
            _ if self.is_client_event() => Some(TransportEvent::Message {
                event: self.event,
                data: self.data,
            }),
            _ => None,
        }
    }
}

// ============================================================================
// Native Channel Client
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
mod native_client {
    use super::*;
    use std::net::TcpStream;
    use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::stream::MaybeTlsStream;
    use tungstenite::{Message, WebSocket, connect};
    use url::Url;

    /// At most the first 100 characters of a frame.
    pub(super) fn log_preview(text: &str) -> &str {
        text.char_indices().nth(100).map_or(text, |(i, _)| &text[..i])
    }

    /// Commands sent to the socket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// Channel client for native platforms.
    ///
    /// The socket runs on a background thread; events are handed over through
    /// a queue drained by `poll_events()`.
    pub struct NativeChannel {
        channel: String,
        state: ConnectionState,
        events: Vec<TransportEvent>,
        cmd_tx: Option<Sender<WsCommand>>,
        event_rx: Option<Receiver<TransportEvent>>,
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeChannel {
        /// Create a disconnected client for `channel`.
        pub fn new(channel: impl Into<String>) -> Self {
            Self {
                channel: channel.into(),
                state: ConnectionState::Disconnected,
                events: Vec::new(),
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        /// Connect to a Pusher-compatible server and subscribe once the
        /// handshake completes.
        pub fn connect<A>(&mut self, url: &str, authorizer: A) -> Result<(), ChannelError>
        where
            A: ChannelAuthorizer + 'static,
        {
            if self.cmd_tx.is_some() {
                return Err(ChannelError::Send("already connected".to_string()));
            }

            let parsed_url = Url::parse(url).map_err(|e| ChannelError::InvalidUrl(e.to_string()))?;
            if parsed_url.scheme() != "ws" && parsed_url.scheme() != "wss" {
                return Err(ChannelError::InvalidUrl(format!(
                    "unsupported scheme: {}",
                    parsed_url.scheme()
                )));
            }

            self.state = ConnectionState::Connecting;

            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<TransportEvent>();
            let url = url.to_string();
            let channel_name = self.channel.clone();

            let handle = thread::spawn(move || {
                log::info!("Channel thread: connecting to {}", url);
                match connect(url.as_str()) {
                    Ok((mut socket, response)) => {
                        log::info!("Channel socket connected, status: {}", response.status());
                        set_timeouts(&mut socket);
                        run_socket(&mut socket, &channel_name, &authorizer, &cmd_rx, &event_tx);
                        log::info!("Channel thread exiting");
                        let _ = event_tx.send(TransportEvent::Disconnected);
                    }
                    Err(e) => {
                        log::error!("Channel connection failed: {}", e);
                        let _ = event_tx.send(TransportEvent::Error {
                            message: format!("Connection failed: {}", e),
                            code: None,
                        });
                    }
                }
            });

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);
            Ok(())
        }

        /// Disconnect from the server.
        pub fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.state = ConnectionState::Disconnected;
        }

        /// Poll for pending events (non-blocking).
        pub fn poll_events(&mut self) -> Vec<TransportEvent> {
            if let Some(ref rx) = self.event_rx {
                while let Ok(event) = rx.try_recv() {
                    match &event {
                        TransportEvent::Connected { .. } => self.state = ConnectionState::Connected,
                        TransportEvent::Subscribed { .. } => self.state = ConnectionState::Subscribed,
                        TransportEvent::Disconnected => self.state = ConnectionState::Disconnected,
                        TransportEvent::Error { .. } if event.is_fatal() => self.state = ConnectionState::Error,
                        TransportEvent::Error { .. } => {}
                        TransportEvent::Message { .. } => {}
                    }
                    self.events.push(event);
                }
            }
            std::mem::take(&mut self.events)
        }

        pub fn state(&self) -> ConnectionState {
            self.state
        }

        pub fn channel(&self) -> &str {
            &self.channel
        }

        pub fn is_subscribed(&self) -> bool {
            self.state == ConnectionState::Subscribed
        }
    }

    impl Channel for NativeChannel {
        fn trigger(&mut self, event: &str, data: &Value) -> Result<(), ChannelError> {
            let Some(ref tx) = self.cmd_tx else {
                return Err(ChannelError::NotConnected);
            };
            let frame = PusherFrame::client_event(&self.channel, event, data.clone()).encode()?;
            tx.send(WsCommand::Send(frame))
                .map_err(|e| ChannelError::Send(e.to_string()))
        }
    }

    impl Drop for NativeChannel {
        fn drop(&mut self) {
            self.disconnect();
        }
    }

    /// Short read timeouts keep the loop responsive to outgoing commands.
    fn set_timeouts(socket: &mut WebSocket<MaybeTlsStream<TcpStream>>) {
        let tcp = match socket.get_mut() {
            MaybeTlsStream::Plain(tcp) => tcp,
            MaybeTlsStream::Rustls(tls) => tls.get_mut(),
            #[allow(unreachable_patterns)]
            _ => {
                log::debug!("Unknown stream type - using default timeout handling");
                return;
            }
        };
        let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
        let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
    }

    fn run_socket<A: ChannelAuthorizer>(
        socket: &mut WebSocket<MaybeTlsStream<TcpStream>>,
        channel_name: &str,
        authorizer: &A,
        cmd_rx: &Receiver<WsCommand>,
        event_tx: &Sender<TransportEvent>,
    ) {
        loop {
            match cmd_rx.try_recv() {
                Ok(WsCommand::Send(msg)) => {
                    log::debug!("Channel sending: {}", log_preview(&msg));
                    if let Err(e) = socket.send(Message::Text(msg)) {
                        log::error!("Channel send error: {}", e);
                        return;
                    }
                }
                Ok(WsCommand::Close) => {
                    log::info!("Channel close requested");
                    let _ = socket.close(None);
                    return;
                }
                Err(TryRecvError::Disconnected) => {
                    log::info!("Channel command queue disconnected");
                    return;
                }
                Err(TryRecvError::Empty) => {}
            }

            let txt = match socket.read() {
                Ok(Message::Text(txt)) => txt,
                Ok(Message::Ping(data)) => {
                    let _ = socket.send(Message::Pong(data));
                    continue;
                }
                Ok(Message::Close(_)) => {
                    log::info!("Channel received close frame");
                    return;
                }
                Ok(_) => continue,
                Err(tungstenite::Error::Io(ref e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    log::error!("Channel read error: {}", e);
                    return;
                }
            };

            log::debug!("Channel received: {}", log_preview(&txt));
            let frame = match PusherFrame::decode(&txt) {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("Failed to parse frame: {}", e);
                    continue;
                }
            };

            if frame.event == PUSHER_PING {
                if let Ok(pong) = PusherFrame::pong().encode() {
                    let _ = socket.send(Message::Text(pong));
                }
                continue;
            }

            let Some(event) = frame.into_transport_event() else {
                continue;
            };

            if let TransportEvent::Connected { socket_id } = &event {
                let subscribe = authorizer
                    .authorize(socket_id, channel_name)
                    .map(|auth| PusherFrame::subscribe(channel_name, auth));
                let _ = event_tx.send(event.clone());
                match subscribe.and_then(|frame| Ok(frame.encode()?)) {
                    Ok(text) => {
                        log::info!("Subscribing to {}", channel_name);
                        if let Err(e) = socket.send(Message::Text(text)) {
                            log::error!("Subscribe send error: {}", e);
                            return;
                        }
                    }
                    Err(e) => {
                        log::error!("Subscription to {} failed: {}", channel_name, e);
                        let _ = event_tx.send(TransportEvent::Error { message: e.to_string(), code: None });
                        return;
                    }
                }
                continue;
            }

            if event_tx.send(event).is_err() {
                return;
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native_client::NativeChannel;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_frame() {
        let frame = PusherFrame::subscribe("private-cs410", Some("key:sig".to_string()));
        let json: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(json["event"], "pusher:subscribe");
        assert_eq!(json["data"]["channel"], "private-cs410");
        assert_eq!(json["data"]["auth"], "key:sig");
        assert!(json.get("channel").is_none());
    }

    #[test]
    fn test_subscribe_without_auth() {
        let frame = PusherFrame::subscribe("private-cs410", None);
        assert!(frame.data.get("auth").is_none());
    }

    #[test]
    fn test_decode_unwraps_string_data() {
        let text = r#"{"event":"pusher:connection_established","data":"{\"socket_id\":\"123.456\",\"activity_timeout\":120}"}"#;
        let frame = PusherFrame::decode(text).unwrap();
        assert_eq!(frame.socket_id(), Some("123.456"));
        assert_eq!(
            frame.into_transport_event(),
            Some(TransportEvent::Connected { socket_id: "123.456".to_string() })
        );
    }

    #[test]
    fn test_internal_subscription_succeeded() {
        let text = r#"{"event":"pusher_internal:subscription_succeeded","channel":"private-cs410","data":"{}"}"#;
        let event = PusherFrame::decode(text).unwrap().into_transport_event();
        assert_eq!(event, Some(TransportEvent::Subscribed { channel: "private-cs410".to_string() }));
    }

    #[test]
    fn test_client_event_with_object_data() {
        let text = r#"{"event":"client-undo","channel":"private-cs410","data":{}}"#;
        let event = PusherFrame::decode(text).unwrap().into_transport_event();
        assert_eq!(
            event,
            Some(TransportEvent::Message { event: "client-undo".to_string(), data: json!({}) })
        );
    }

    #[test]
    fn test_error_frame() {
        let text = r#"{"event":"pusher:error","data":{"message":"Auth failed","code":4009}}"#;
        let event = PusherFrame::decode(text).unwrap().into_transport_event();
        assert_eq!(
            event,
            Some(TransportEvent::Error { message: "Auth failed".to_string(), code: Some(4009) })
        );
    }

    #[test]
    fn test_error_severity() {
        let rejected = r#"{"event":"pusher:error","data":{"message":"Client event rejected","code":4301}}"#;
        let event = PusherFrame::decode(rejected).unwrap().into_transport_event().unwrap();
        assert!(!event.is_fatal());

        let closing = r#"{"event":"pusher:error","data":{"message":"Over quota","code":4004}}"#;
        assert!(PusherFrame::decode(closing).unwrap().into_transport_event().unwrap().is_fatal());

        assert!(TransportEvent::Error { message: "Connection failed".to_string(), code: None }.is_fatal());
        assert!(TransportEvent::Disconnected.is_fatal());
        assert!(!TransportEvent::Subscribed { channel: "private-cs410".to_string() }.is_fatal());
    }

    #[test]
    fn test_ping_is_not_an_event() {
        let frame = PusherFrame::decode(r#"{"event":"pusher:ping","data":{}}"#).unwrap();
        assert!(frame.into_transport_event().is_none());
    }

    #[test]
    fn test_no_auth() {
        assert_eq!(NoAuth.authorize("1.2", "private-x").unwrap(), None);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_native_trigger_requires_connection() {
        let mut channel = NativeChannel::new("private-cs410");
        assert!(matches!(
            channel.trigger("client-undo", &json!({})),
            Err(ChannelError::NotConnected)
        ));
        assert_eq!(channel.state(), ConnectionState::Disconnected);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_log_preview_respects_char_boundaries() {
        use super::native_client::log_preview;

        let frame = format!(r#"{{"event":"client-x","data":{{"n":"{}"}}}}"#, "é".repeat(100));
        let preview = log_preview(&frame);
        assert_eq!(preview.chars().count(), 100);
        assert!(frame.starts_with(preview));
        assert_eq!(log_preview("short"), "short");
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_native_rejects_http_url() {
        let mut channel = NativeChannel::new("private-cs410");
        assert!(matches!(
            channel.connect("http://localhost:3030/app/key", NoAuth),
            Err(ChannelError::InvalidUrl(_))
        ));
    }
}
