//! Events sent from the session to the embedding layer.

use serde::{Deserialize, Serialize};

use crate::state::SessionState;
use crate::types::BroadcastEvent;

/// Events that the session can send to the embedding layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Session loop is running and accepting commands.
    Ready,

    /// Session state has changed.
    StateChanged {
        /// Previous state.
        previous: Box<SessionState>,

        /// Current state.
        current: Box<SessionState>,
    },

    /// Microphone capture is running.
    CaptureStarted,

    /// Microphone capture has stopped; no further frames are delivered.
    CaptureStopped,

    /// A broadcast and its bound ingestion stream were provisioned.
    Provisioned(BroadcastEvent),

    /// Point-in-time snapshot of pending broadcast events.
    PendingEvents(Vec<BroadcastEvent>),

    /// The broadcast is live.
    Live { broadcast_id: String },

    /// The go-live wait was cancelled before the transition was issued.
    GoLiveCancelled { broadcast_id: String },

    /// The broadcast is complete.
    Ended { broadcast_id: String },

    /// An operation failed.
    Error {
        /// Error message.
        message: String,

        /// Whether the session can keep running.
        recoverable: bool,
    },

    /// Session has shut down.
    Shutdown,
}
