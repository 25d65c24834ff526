//! Streaming provider client.
//!
//! Resource-oriented operations against the provider's REST surface: create
//! a broadcast, create an ingestion stream, bind them, list broadcasts by
//! status, look up streams, and transition broadcast status.

mod client;
mod error;
mod models;
mod wire;

pub use client::{HttpApiClient, StreamingApi, DEFAULT_API_BASE};
pub use error::ApiError;
pub use models::{
    thumbnail_url, watch_url, BroadcastResource, NewBroadcast, NewStream, TransitionStatus,
};

/// Result type for provider calls.
pub type ApiResult<T> = Result<T, ApiError>;
