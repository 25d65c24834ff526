//! Resource types for the streaming provider.

use chrono::{DateTime, Utc};

use livecast_ipc::{BroadcastEvent, BroadcastStatus};

/// Base URL of the public watch page for a broadcast.
const WATCH_URL_BASE: &str = "https://www.youtube.com/watch?v=";

/// Base URL for broadcast thumbnails.
const THUMBNAIL_URL_BASE: &str = "https://i.ytimg.com/vi/";

/// Request to create a broadcast resource.
#[derive(Debug, Clone)]
pub struct NewBroadcast {
    /// Event title.
    pub title: String,

    /// Event description.
    pub description: String,

    /// Scheduled start. Must be in the future; the provider rejects
    /// past-dated starts.
    pub scheduled_start: DateTime<Utc>,
}

/// Request to create an ingestion stream resource.
#[derive(Debug, Clone)]
pub struct NewStream {
    /// Stream title.
    pub title: String,
}

/// A broadcast resource as returned by the provider.
#[derive(Debug, Clone)]
pub struct BroadcastResource {
    /// Provider-assigned broadcast id.
    pub id: String,

    /// Event title.
    pub title: String,

    /// Scheduled start time (UTC).
    pub scheduled_start: DateTime<Utc>,

    /// Id of the ingestion stream bound to this broadcast, if any.
    pub bound_stream_id: Option<String>,

    /// Current lifecycle status.
    pub status: BroadcastStatus,
}

impl BroadcastResource {
    /// Convert to the embedder-facing event shape. The ingestion address is
    /// attached separately once the bound stream has been resolved.
    pub fn into_event(self) -> BroadcastEvent {
        let watch_url = watch_url(&self.id);
        let thumbnail_url = thumbnail_url(&self.id);
        BroadcastEvent {
            id: self.id,
            title: self.title,
            scheduled_start: self.scheduled_start,
            ingestion_address: None,
            watch_url,
            thumbnail_url,
            status: self.status,
        }
    }
}

/// Target status for a broadcast transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStatus {
    /// Monitor-only test phase.
    Testing,

    /// Publicly live.
    Live,

    /// Finished.
    Complete,
}

impl TransitionStatus {
    /// Wire value for the transition call.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Testing => "testing",
            Self::Live => "live",
            Self::Complete => "complete",
        }
    }
}

/// Public watch page for a broadcast.
pub fn watch_url(broadcast_id: &str) -> String {
    format!("{WATCH_URL_BASE}{broadcast_id}")
}

/// Default thumbnail for a broadcast.
pub fn thumbnail_url(broadcast_id: &str) -> String {
    format!("{THUMBNAIL_URL_BASE}{broadcast_id}/default.jpg")
}
