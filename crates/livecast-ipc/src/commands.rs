//! Commands sent from the embedding layer to the session.

use serde::{Deserialize, Serialize};

use crate::types::CaptureConfig;

/// Commands that the embedding layer can send to the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionCommand {
    /// Start microphone capture with the given configuration.
    StartCapture { config: CaptureConfig },

    /// Stop microphone capture.
    StopCapture,

    /// Provision a broadcast with its bound ingestion stream.
    Provision { title: String, description: String },

    /// Request a snapshot of pending (upcoming) broadcast events.
    ListEvents,

    /// Transition the given broadcast to live after the settle delay.
    GoLive { broadcast_id: String },

    /// Transition the given broadcast to complete.
    EndEvent { broadcast_id: String },

    /// Shut down the session completely.
    Shutdown,
}
