//! Common types shared across the session boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Microphone capture configuration.
///
/// Immutable once a capture session starts. Capture is mono 16-bit PCM; only
/// the rate varies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Sample rate in Hz.
    pub sample_rate_hz: u32,

    /// Number of channels.
    pub channel_count: u16,

    /// Bits per sample.
    pub bit_depth: u16,
}

impl CaptureConfig {
    /// Mono 16-bit config at the given rate.
    pub fn mono_16(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz,
            channel_count: 1,
            bit_depth: 16,
        }
    }

    /// Width of one sample in bytes.
    pub fn bytes_per_sample(&self) -> usize {
        (self.bit_depth / 8) as usize
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::mono_16(44_100)
    }
}

/// Lifecycle status of a broadcast event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BroadcastStatus {
    /// Scheduled but not yet live.
    Upcoming,

    /// Currently streaming.
    Live,

    /// Finished. Terminal.
    Complete,
}

/// A broadcast event as seen by the embedding layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastEvent {
    /// Provider-assigned broadcast id.
    pub id: String,

    /// Event title.
    pub title: String,

    /// Scheduled start time (UTC).
    pub scheduled_start: DateTime<Utc>,

    /// Full ingestion endpoint, when a bound stream was resolved.
    pub ingestion_address: Option<String>,

    /// Public watch page URL.
    pub watch_url: String,

    /// Thumbnail image URL.
    pub thumbnail_url: String,

    /// Current lifecycle status.
    pub status: BroadcastStatus,
}

/// An ingestion stream resource, bound 1:1 to a broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionStream {
    /// Provider-assigned stream id.
    pub id: String,

    /// Base ingestion address, without the stream name.
    pub ingestion_address: String,

    /// Stream name appended to the base address.
    pub stream_name: String,
}

impl IngestionStream {
    /// Full endpoint the encoder pushes to: `{ingestion_address}/{stream_name}`.
    pub fn endpoint(&self) -> String {
        format!("{}/{}", self.ingestion_address, self.stream_name)
    }
}
