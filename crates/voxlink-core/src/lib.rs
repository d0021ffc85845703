//! VoxLink Core Library
//!
//! Platform-agnostic session logic for collaborative annotation of volume
//! scans: strokes, replay, the peer protocol and join synchronization.

pub mod collaboration;
pub mod config;
pub mod controller;
pub mod engine;
pub mod export;
pub mod input;
pub mod join;
pub mod palette;
pub mod protocol;
pub mod replay;
pub mod session;
pub mod shortcuts;
pub mod stroke;
pub mod sync;
pub mod tools;

pub use collaboration::{LoopbackChannel, LoopbackHub, Messenger};
pub use config::{ConfigError, SessionConfig};
pub use controller::InteractionController;
pub use engine::{DragMode, DrawingEngine, HeadlessEngine, SliceType};
pub use input::{KeyEvent, Modifiers, PointerEvent, WheelEvent};
pub use join::{Duration, Instant, JoinState, JoinSynchronizer};
pub use palette::{Palette, PenColor};
pub use protocol::{ProtocolError, ProtocolMessage};
pub use replay::{apply_stroke, replay_stroke};
pub use session::{Effect, Session, SessionEvent, UiEffect};
pub use shortcuts::{Action, ShortcutRegistry};
pub use stroke::{DrawHistory, PenLabel, Stroke, VoxelPoint};
pub use sync::{Channel, ChannelAuthorizer, ChannelError, ConnectionState, NoAuth, TransportEvent};
pub use tools::{DrawingMode, ToolManager};

#[cfg(not(target_arch = "wasm32"))]
pub use sync::NativeChannel;
