//! Session state machine types.

use serde::{Deserialize, Serialize};

/// The current state of a streaming session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No capture running, no broadcast in flight.
    #[default]
    Idle,

    /// Microphone capture is running; no broadcast is live.
    Capturing,

    /// Settle delay in progress before the live transition.
    GoingLive {
        /// Broadcast being taken live.
        broadcast_id: String,
    },

    /// Broadcast is live, capture still running.
    Live {
        /// Live broadcast id.
        broadcast_id: String,
    },
}

impl SessionState {
    /// Returns true if the session is idle.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if a broadcast is live.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }

    /// Returns true if microphone capture is running in this state.
    pub fn capture_running(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Capturing => "Capturing",
            Self::GoingLive { .. } => "GoingLive",
            Self::Live { .. } => "Live",
        }
    }
}
