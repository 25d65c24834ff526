//! Typed messages for driving a streaming session.
//!
//! This crate defines the command, event, and state types exchanged between
//! the session engine and whatever embeds it, plus the bounded channel
//! constructors for them.

mod commands;
mod events;
mod state;
mod types;

pub use commands::SessionCommand;
pub use events::SessionEvent;
pub use state::SessionState;
pub use types::{BroadcastEvent, BroadcastStatus, CaptureConfig, IngestionStream};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for commands (embedder → session).
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Channel capacity for events (session → embedder).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates a bounded command channel.
pub fn command_channel() -> (Sender<SessionCommand>, Receiver<SessionCommand>) {
    crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY)
}

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<SessionEvent>, Receiver<SessionEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}
