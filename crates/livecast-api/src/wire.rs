//! JSON wire format for the provider's REST surface.
//!
//! Field names follow the provider's camelCase schema; everything here is
//! private to the client, which converts to and from the resource types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use livecast_ipc::{BroadcastStatus, IngestionStream};

use crate::error::ApiError;
use crate::models::{BroadcastResource, NewBroadcast, NewStream};

pub(crate) const PRIVACY_UNLISTED: &str = "unlisted";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BroadcastInsert {
    pub snippet: BroadcastSnippet,
    pub status: BroadcastStatusBody,
    pub content_details: BroadcastContentDetails,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BroadcastSnippet {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub scheduled_start_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BroadcastStatusBody {
    pub privacy_status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BroadcastContentDetails {
    pub monitor_stream: MonitorStream,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MonitorStream {
    pub enable_monitor_stream: bool,
}

impl BroadcastInsert {
    pub fn from_spec(spec: &NewBroadcast) -> Self {
        Self {
            snippet: BroadcastSnippet {
                title: spec.title.clone(),
                description: (!spec.description.is_empty()).then(|| spec.description.clone()),
                scheduled_start_time: spec.scheduled_start,
            },
            status: BroadcastStatusBody {
                privacy_status: PRIVACY_UNLISTED,
            },
            content_details: BroadcastContentDetails {
                monitor_stream: MonitorStream {
                    enable_monitor_stream: false,
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StreamInsert {
    pub snippet: StreamSnippet,
    pub cdn: CdnSpec,
}

#[derive(Debug, Serialize)]
pub(crate) struct StreamSnippet {
    pub title: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CdnSpec {
    pub resolution: &'static str,
    pub frame_rate: &'static str,
    pub ingestion_type: &'static str,
}

impl StreamInsert {
    pub fn from_spec(spec: &NewStream) -> Self {
        Self {
            snippet: StreamSnippet {
                title: spec.title.clone(),
            },
            cdn: CdnSpec {
                resolution: "variable",
                frame_rate: "variable",
                ingestion_type: "rtmp",
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BroadcastItem {
    pub id: String,
    pub snippet: BroadcastSnippet,
    #[serde(default)]
    pub content_details: Option<BroadcastItemDetails>,
    #[serde(default)]
    pub status: Option<BroadcastItemStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BroadcastItemDetails {
    #[serde(default)]
    pub bound_stream_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BroadcastItemStatus {
    #[serde(default)]
    pub life_cycle_status: Option<String>,
}

impl BroadcastItem {
    pub fn into_resource(self) -> BroadcastResource {
        let status = self
            .status
            .and_then(|status| status.life_cycle_status)
            .map(|value| status_from_wire(&value))
            .unwrap_or(BroadcastStatus::Upcoming);

        BroadcastResource {
            id: self.id,
            title: self.snippet.title,
            scheduled_start: self.snippet.scheduled_start_time,
            bound_stream_id: self.content_details.and_then(|details| details.bound_stream_id),
            status,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamItem {
    pub id: String,
    pub cdn: CdnInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CdnInfo {
    pub ingestion_info: IngestionInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IngestionInfo {
    pub ingestion_address: String,
    pub stream_name: String,
}

impl StreamItem {
    pub fn into_stream(self) -> IngestionStream {
        IngestionStream {
            id: self.id,
            ingestion_address: self.cdn.ingestion_info.ingestion_address,
            stream_name: self.cdn.ingestion_info.stream_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    pub code: i64,
    pub message: String,
}

/// Map the provider's lifecycle status string onto the event status enum.
pub(crate) fn status_from_wire(value: &str) -> BroadcastStatus {
    match value {
        "live" | "liveStarting" | "testing" | "testStarting" => BroadcastStatus::Live,
        "complete" | "revoked" => BroadcastStatus::Complete,
        _ => BroadcastStatus::Upcoming,
    }
}

/// Provider query value for a broadcast status filter.
pub(crate) fn status_filter(status: BroadcastStatus) -> &'static str {
    match status {
        BroadcastStatus::Upcoming => "upcoming",
        BroadcastStatus::Live => "active",
        BroadcastStatus::Complete => "completed",
    }
}

/// Map a non-success response body onto the error taxonomy.
pub(crate) fn error_from_body(status: u16, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => ApiError::Api {
            code: envelope.error.code,
            message: envelope.error.message,
        },
        Err(_) => ApiError::Unexpected(format!("HTTP {status}: {body}")),
    }
}
