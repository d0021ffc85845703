//! Binds a session to its drawing engine and channel.

use crate::collaboration::Messenger;
use crate::config::SessionConfig;
use crate::engine::DrawingEngine;
use crate::join::Instant;
use crate::protocol::{ProtocolError, ProtocolMessage};
use crate::session::{Effect, Session, SessionEvent, UiEffect};
use crate::sync::{Channel, TransportEvent};
use serde_json::Value;

/// Feeds events into a [`Session`] and carries out its effects.
///
/// Sends go out through the [`Messenger`]; UI effects are handed back to the
/// host. Send failures are logged and dropped, except that a failed sync
/// request also hides the loading indicator.
pub struct InteractionController<E: DrawingEngine, C: Channel> {
    session: Session,
    engine: E,
    messenger: Messenger<C>,
}

impl<E: DrawingEngine, C: Channel> InteractionController<E, C> {
    pub fn new(config: &SessionConfig, mut engine: E, channel: C) -> Self {
        let session = Session::new(config);
        session.install(&mut engine);
        Self {
            session,
            engine,
            messenger: Messenger::new(channel),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn messenger(&self) -> &Messenger<C> {
        &self.messenger
    }

    pub fn messenger_mut(&mut self) -> &mut Messenger<C> {
        &mut self.messenger
    }

    /// Handle a session event.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<UiEffect> {
        let effects = self.session.handle(&mut self.engine, event);
        self.execute(effects)
    }

    /// Handle a raw channel event from a peer.
    pub fn handle_remote(&mut self, event: &str, data: Value) -> Vec<UiEffect> {
        match self.messenger.receive(event, data) {
            Ok(msg) => self.handle(SessionEvent::Remote(msg)),
            Err(ProtocolError::UnknownEvent(name)) => {
                log::debug!("Ignoring event {}", name);
                Vec::new()
            }
            Err(e) => {
                log::warn!("Rejected {} payload: {}", event, e);
                Vec::new()
            }
        }
    }

    /// Handle an event from the channel transport.
    pub fn handle_transport(&mut self, event: TransportEvent, now: Instant) -> Vec<UiEffect> {
        match event {
            TransportEvent::Connected { socket_id } => {
                log::info!("Connected with socket id {}", socket_id);
                Vec::new()
            }
            TransportEvent::Subscribed { channel } => {
                log::info!("Subscribed to {}", channel);
                self.handle(SessionEvent::Subscribed { now })
            }
            TransportEvent::Message { event, data } => self.handle_remote(&event, data),
            TransportEvent::Disconnected => {
                log::warn!("Disconnected from channel");
                Vec::new()
            }
            TransportEvent::Error { message, .. } => {
                log::error!("Channel error: {}", message);
                Vec::new()
            }
        }
    }

    /// Advance the join wait.
    pub fn tick(&mut self, now: Instant) -> Vec<UiEffect> {
        self.handle(SessionEvent::Tick { now })
    }

    fn execute(&mut self, effects: Vec<Effect>) -> Vec<UiEffect> {
        let mut ui = Vec::new();
        for effect in effects {
            match effect {
                Effect::Send(msg) => {
                    if let Err(e) = self.messenger.send(&msg) {
                        log::error!("Failed to send {}: {}", msg.event_name(), e);
                        if matches!(msg, ProtocolMessage::SyncRequest(_)) {
                            ui.push(UiEffect::HideLoading);
                        }
                    }
                }
                Effect::Ui(effect) => ui.push(effect),
            }
        }
        ui
    }
}
