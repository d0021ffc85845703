//! Session messenger: protocol messages in and out of the channel.

use crate::protocol::{ProtocolError, ProtocolMessage};
use crate::sync::{Channel, ChannelError};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Owns the channel handle and translates protocol messages to channel events.
pub struct Messenger<C: Channel> {
    channel: C,
    /// Number of messages triggered successfully.
    sent: usize,
}

impl<C: Channel> Messenger<C> {
    pub fn new(channel: C) -> Self {
        Self { channel, sent: 0 }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Encode and trigger a message on the channel.
    pub fn send(&mut self, msg: &ProtocolMessage) -> Result<(), ChannelError> {
        let payload = msg.payload()?;
        self.channel.trigger(msg.event_name(), &payload)?;
        self.sent += 1;
        log::debug!("Sent {}", msg.event_name());
        Ok(())
    }

    /// Decode a channel event into a protocol message.
    pub fn receive(&self, event: &str, data: Value) -> Result<ProtocolMessage, ProtocolError> {
        ProtocolMessage::decode(event, data)
    }
}

// ============================================================================
// In-memory channel
// ============================================================================

type Inbox = VecDeque<(String, Value)>;

/// In-process pub/sub hub.
///
/// Every event triggered by one endpoint is delivered to all other endpoints,
/// in trigger order. Used to run several sessions against each other without a
/// server.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    inboxes: Rc<RefCell<Vec<Inbox>>>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an endpoint to the hub.
    pub fn join(&self) -> LoopbackChannel {
        let mut inboxes = self.inboxes.borrow_mut();
        inboxes.push(VecDeque::new());
        LoopbackChannel {
            id: inboxes.len() - 1,
            hub: self.clone(),
            connected: true,
        }
    }
}

/// One endpoint of a [`LoopbackHub`].
pub struct LoopbackChannel {
    id: usize,
    hub: LoopbackHub,
    connected: bool,
}

impl LoopbackChannel {
    /// Take the events delivered to this endpoint.
    pub fn take_inbox(&mut self) -> Vec<(String, Value)> {
        let mut inboxes = self.hub.inboxes.borrow_mut();
        inboxes
            .get_mut(self.id)
            .map(|inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }

    /// Simulate a dropped connection: triggers fail until reconnected.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl Channel for LoopbackChannel {
    fn trigger(&mut self, event: &str, data: &Value) -> Result<(), ChannelError> {
        if !self.connected {
            return Err(ChannelError::NotConnected);
        }
        let mut inboxes = self.hub.inboxes.borrow_mut();
        for (id, inbox) in inboxes.iter_mut().enumerate() {
            if id != self.id {
                inbox.push_back((event.to_string(), data.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{EVENT_UNDO, ViewChange};
    use crate::engine::SliceType;

    #[test]
    fn test_loopback_does_not_echo() {
        let hub = LoopbackHub::new();
        let mut a = hub.join();
        let mut b = hub.join();
        let mut c = hub.join();

        a.trigger(EVENT_UNDO, &serde_json::json!({})).unwrap();

        assert!(a.take_inbox().is_empty());
        assert_eq!(b.take_inbox().len(), 1);
        assert_eq!(c.take_inbox().len(), 1);
    }

    #[test]
    fn test_messenger_round_trip_through_hub() {
        let hub = LoopbackHub::new();
        let mut sender = Messenger::new(hub.join());
        let mut receiver = Messenger::new(hub.join());

        let msg = ProtocolMessage::ViewChange(ViewChange { view_number: SliceType::Sagittal });
        sender.send(&msg).unwrap();
        assert_eq!(sender.sent(), 1);

        let inbox = receiver.channel_mut().take_inbox();
        let (event, data) = inbox.into_iter().next().unwrap();
        assert_eq!(event, "client-set-slicetype");
        assert_eq!(receiver.receive(&event, data).unwrap(), msg);
    }

    #[test]
    fn test_messenger_send_failure() {
        let hub = LoopbackHub::new();
        let mut channel = hub.join();
        channel.set_connected(false);
        let mut messenger = Messenger::new(channel);

        assert!(matches!(messenger.send(&ProtocolMessage::Undo), Err(ChannelError::NotConnected)));
        assert_eq!(messenger.sent(), 0);
    }
}
