//! Headless session participant.
//!
//! Joins the channel with a [`HeadlessEngine`], keeps the shared draw history,
//! and answers sync requests so late joiners can catch up even when no viewer
//! is open.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use voxlink_core::config::{ConfigError, SessionConfig};
use voxlink_core::sync::{ChannelAuthorizer, ChannelError, NativeChannel, TransportEvent};
use voxlink_core::{HeadlessEngine, Instant, InteractionController, UiEffect};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "VOXLINK_CONFIG";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum PeerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("channel closed: {0}")]
    Closed(String),
}

/// Config file to load: first argument, then `$VOXLINK_CONFIG`, then the
/// per-user default.
pub fn config_path(arg: Option<String>, env: Option<String>) -> Option<PathBuf> {
    arg.or(env)
        .map(PathBuf::from)
        .or_else(SessionConfig::default_path)
}

pub struct Peer {
    controller: InteractionController<HeadlessEngine, NativeChannel>,
    url: String,
}

impl Peer {
    pub fn new(config: &SessionConfig) -> Self {
        let channel = NativeChannel::new(config.channel_name());
        Self {
            controller: InteractionController::new(config, HeadlessEngine::new(), channel),
            url: config.socket_url(),
        }
    }

    pub fn controller(&self) -> &InteractionController<HeadlessEngine, NativeChannel> {
        &self.controller
    }

    pub fn connect<A: ChannelAuthorizer + 'static>(&mut self, authorizer: A) -> Result<(), PeerError> {
        log::info!("Connecting to {}", self.url);
        self.controller.messenger_mut().channel_mut().connect(&self.url, authorizer)?;
        Ok(())
    }

    /// Drain transport events and advance the join wait.
    ///
    /// Returns an error once the channel has closed.
    pub fn step(&mut self, now: Instant) -> Result<(), PeerError> {
        let events = self.controller.messenger_mut().channel_mut().poll_events();
        for event in events {
            self.handle_event(event, now)?;
        }
        log_effects(&self.controller.tick(now));
        Ok(())
    }

    /// Feed one transport event to the controller. Fails on events that end
    /// the connection.
    pub fn handle_event(&mut self, event: TransportEvent, now: Instant) -> Result<(), PeerError> {
        let closed = match &event {
            TransportEvent::Error { message, .. } if event.is_fatal() => Some(message.clone()),
            TransportEvent::Disconnected => Some("disconnected".to_string()),
            _ => None,
        };
        let is_message = matches!(event, TransportEvent::Message { .. });
        let effects = self.controller.handle_transport(event, now);
        log_effects(&effects);
        if is_message {
            log::info!("History: {} strokes", self.controller.session().history().len());
        }
        match closed {
            Some(reason) => Err(PeerError::Closed(reason)),
            None => Ok(()),
        }
    }

    /// Run until the channel closes.
    pub fn run(&mut self) -> Result<(), PeerError> {
        loop {
            self.step(Instant::now())?;
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn log_effects(effects: &[UiEffect]) {
    for effect in effects {
        match effect {
            UiEffect::ShowLoading => log::info!("Waiting for session state"),
            UiEffect::HideLoading => log::info!("Session state ready"),
            other => log::debug!("{:?}", other),
        }
    }
}
