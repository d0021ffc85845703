//! Channel relay state and per-connection protocol handling.

use dashmap::DashMap;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use voxlink_core::sync::{
    PUSHER_CONNECTION_ESTABLISHED, PUSHER_ERROR, PUSHER_INTERNAL_SUBSCRIPTION_SUCCEEDED, PUSHER_PING,
    PUSHER_SUBSCRIBE, PUSHER_UNSUBSCRIBE, PusherFrame,
};

pub const CHANNEL_CAPACITY: usize = 256;
/// Seconds of silence after which clients should ping.
pub const ACTIVITY_TIMEOUT: u64 = 120;

/// Pusher error code for messages the server will not process.
const ERROR_REJECTED: u16 = 4301;

/// A relayed frame and the socket it came from.
type Relayed = (String, String);

/// Channel state
struct ChannelRoom {
    tx: broadcast::Sender<Relayed>,
    members: HashSet<String>,
}

impl ChannelRoom {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            members: HashSet::new(),
        }
    }
}

/// Shared relay state
#[derive(Default)]
pub struct RelayState {
    channels: DashMap<String, ChannelRoom>,
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a socket to a channel, creating the channel if needed.
    pub fn subscribe(&self, channel: &str, socket_id: &str) -> broadcast::Receiver<Relayed> {
        let mut room = self.channels.entry(channel.to_string()).or_insert_with(ChannelRoom::new);
        room.members.insert(socket_id.to_string());
        room.tx.subscribe()
    }

    /// Remove a socket from a channel. Empty channels are dropped.
    pub fn unsubscribe(&self, channel: &str, socket_id: &str) {
        if let Some(mut room) = self.channels.get_mut(channel) {
            room.members.remove(socket_id);
        }
        // Re-checked under the shard lock; a subscriber may have joined since.
        self.channels.remove_if(channel, |_, room| room.members.is_empty());
    }

    /// Send a frame to every subscriber of a channel. Returns the number of
    /// receivers, the sender included.
    pub fn publish(&self, channel: &str, from: &str, frame: String) -> usize {
        match self.channels.get(channel) {
            Some(room) => room.tx.send((from.to_string(), frame)).unwrap_or(0),
            None => 0,
        }
    }

    pub fn member_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, |room| room.members.len())
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

/// New Pusher-style socket id (`<digits>.<digits>`).
pub fn new_socket_id() -> String {
    let id = Uuid::new_v4().as_u128();
    format!("{}.{}", (id >> 64) as u32, id as u32)
}

fn error_frame(message: &str, code: Option<u16>) -> PusherFrame {
    PusherFrame::new(PUSHER_ERROR, None, json!({ "message": message, "code": code }))
}

fn encode(frame: &PusherFrame) -> Option<String> {
    match frame.encode() {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("Failed to encode {}: {}", frame.event, e);
            None
        }
    }
}

/// Protocol state of one websocket connection.
///
/// Frames from other subscribers arrive on `outbox`; replies to this socket's
/// own frames are returned from [`Connection::handle_text`].
pub struct Connection {
    socket_id: String,
    state: Arc<RelayState>,
    outbox: mpsc::UnboundedSender<String>,
    subscriptions: HashMap<String, JoinHandle<()>>,
}

impl Connection {
    pub fn new(state: Arc<RelayState>, outbox: mpsc::UnboundedSender<String>) -> Self {
        Self {
            socket_id: new_socket_id(),
            state,
            outbox,
            subscriptions: HashMap::new(),
        }
    }

    pub fn socket_id(&self) -> &str {
        &self.socket_id
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.subscriptions.contains_key(channel)
    }

    /// Handshake frame sent when the socket opens.
    pub fn established(&self) -> Option<String> {
        let data = json!({ "socket_id": self.socket_id, "activity_timeout": ACTIVITY_TIMEOUT });
        encode(&PusherFrame::server_event(PUSHER_CONNECTION_ESTABLISHED, None, &data))
    }

    /// Handle a text frame from the socket. Returns frames to send back.
    ///
    /// Must be called within a tokio runtime.
    pub fn handle_text(&mut self, text: &str) -> Vec<String> {
        let frame = match PusherFrame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Invalid frame from {}: {}", self.socket_id, e);
                return encode(&error_frame(&format!("Invalid frame: {}", e), None))
                    .into_iter()
                    .collect();
            }
        };

        let reply = match frame.event.as_str() {
            PUSHER_PING => Some(PusherFrame::pong()),
            PUSHER_SUBSCRIBE => self.handle_subscribe(&frame.data),
            PUSHER_UNSUBSCRIBE => {
                if let Some(channel) = frame.data.get("channel").and_then(Value::as_str) {
                    self.unsubscribe(channel);
                }
                None
            }
            _ if frame.is_client_event() => self.relay(frame),
            other => {
                debug!("Ignoring {} from {}", other, self.socket_id);
                None
            }
        };
        reply.as_ref().and_then(encode).into_iter().collect()
    }

    fn handle_subscribe(&mut self, data: &Value) -> Option<PusherFrame> {
        let Some(channel) = data.get("channel").and_then(Value::as_str) else {
            return Some(error_frame("Subscribe without channel", Some(ERROR_REJECTED)));
        };
        if channel.starts_with("private-") && data.get("auth").is_none() {
            // Signatures are not verified here; a missing one only gets noted.
            debug!("{} subscribing to {} without auth", self.socket_id, channel);
        }
        self.subscribe(channel);
        Some(PusherFrame::server_event(
            PUSHER_INTERNAL_SUBSCRIPTION_SUCCEEDED,
            Some(channel.to_string()),
            &json!({}),
        ))
    }

    fn subscribe(&mut self, channel: &str) {
        if self.is_subscribed(channel) {
            return;
        }
        let mut rx = self.state.subscribe(channel, &self.socket_id);
        let outbox = self.outbox.clone();
        let socket_id = self.socket_id.clone();
        let forwarder = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok((from, frame)) => {
                        // Don't echo back to sender
                        if from != socket_id && outbox.send(frame).is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("{} lagging, dropped {} frames", socket_id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        self.subscriptions.insert(channel.to_string(), forwarder);
        info!(
            "{} subscribed to {} ({} members)",
            self.socket_id,
            channel,
            self.state.member_count(channel)
        );
    }

    fn unsubscribe(&mut self, channel: &str) {
        if let Some(forwarder) = self.subscriptions.remove(channel) {
            forwarder.abort();
            self.state.unsubscribe(channel, &self.socket_id);
            info!("{} unsubscribed from {}", self.socket_id, channel);
        }
    }

    fn relay(&self, frame: PusherFrame) -> Option<PusherFrame> {
        let Some(channel) = frame.channel.as_deref().filter(|c| self.is_subscribed(c)) else {
            return Some(error_frame(
                &format!("{} sent on a channel it is not subscribed to", frame.event),
                Some(ERROR_REJECTED),
            ));
        };
        let channel = channel.to_string();
        let event = frame.event.clone();
        let text = encode(&frame)?;
        let receivers = self.state.publish(&channel, &self.socket_id, text);
        debug!("{} relayed {} on {} to {} sockets", self.socket_id, event, channel, receivers.saturating_sub(1));
        None
    }

    /// Leave all channels.
    pub fn close(&mut self) {
        let channels: Vec<String> = self.subscriptions.keys().cloned().collect();
        for channel in channels {
            self.unsubscribe(&channel);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
