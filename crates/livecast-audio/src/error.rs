//! Error types for the audio module.

use thiserror::Error;

/// Errors that can occur during microphone capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Microphone permission is not granted.
    #[error("microphone permission not granted")]
    PermissionDenied,

    /// The computed read-buffer size is unusable.
    #[error("invalid capture buffer size: {0} bytes")]
    InvalidBufferSize(usize),

    /// No frame sink registered before start.
    #[error("no frame sink registered")]
    NoSink,

    /// Capture already started.
    #[error("audio capture already started")]
    AlreadyStarted,

    /// Audio device could not be opened.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// A single device read failed.
    #[error("device read failed: {0}")]
    ReadFailed(String),
}
