//! Provider client: synchronous contract and its HTTP implementation.

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tokio::runtime::Runtime;
use tracing::{debug, instrument};
use url::Url;

use livecast_ipc::{BroadcastStatus, IngestionStream};

use crate::error::ApiError;
use crate::models::{BroadcastResource, NewBroadcast, NewStream, TransitionStatus};
use crate::wire;
use crate::ApiResult;

/// Default REST base for the provider.
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Synchronous contract for the streaming provider.
///
/// Calls are sequential on the calling thread. Nothing here retries: a blind
/// retry of a create operation could duplicate remote resources, so retry
/// policy belongs to the caller.
pub trait StreamingApi: Send {
    /// Create a broadcast resource.
    fn create_broadcast(&self, spec: &NewBroadcast) -> ApiResult<BroadcastResource>;

    /// Create an ingestion stream resource.
    fn create_stream(&self, spec: &NewStream) -> ApiResult<IngestionStream>;

    /// Bind a stream to a broadcast.
    fn bind(&self, broadcast_id: &str, stream_id: &str) -> ApiResult<()>;

    /// List broadcasts with the given status, in provider order.
    fn list_broadcasts(&self, status: BroadcastStatus) -> ApiResult<Vec<BroadcastResource>>;

    /// Look up a stream by id. `None` when the provider returns no items.
    fn get_stream(&self, stream_id: &str) -> ApiResult<Option<IngestionStream>>;

    /// Transition a broadcast to the given status.
    fn transition(&self, status: TransitionStatus, broadcast_id: &str) -> ApiResult<()>;
}

/// HTTP client for the provider's REST surface.
///
/// Owns a private tokio runtime and blocks on each call, so the public
/// surface stays synchronous. Authentication is a ready bearer token;
/// acquiring and refreshing it is the embedder's concern.
pub struct HttpApiClient {
    http: Client,
    runtime: Runtime,
    base: Url,
    access_token: String,
}

impl HttpApiClient {
    /// Create a client against `base_url`, authenticating with `access_token`.
    pub fn new(base_url: &str, access_token: String) -> ApiResult<Self> {
        let base = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        let runtime = Runtime::new().map_err(ApiError::Io)?;

        Ok(Self {
            http: Client::new(),
            runtime,
            base,
            access_token,
        })
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        let joined = format!("{}/{}", self.base.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|e| ApiError::InvalidUrl(e.to_string()))
    }

    /// Execute a call and decode its JSON response.
    fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        self.runtime.block_on(async {
            let response = request.bearer_auth(&self.access_token).send().await?;
            let status = response.status();
            let body = response.text().await?;

            if !status.is_success() {
                return Err(wire::error_from_body(status.as_u16(), &body));
            }

            serde_json::from_str(&body)
                .map_err(|e| ApiError::Unexpected(format!("undecodable response: {e}")))
        })
    }

    /// Execute a call whose response body is irrelevant.
    fn execute_unit(&self, request: RequestBuilder) -> ApiResult<()> {
        self.runtime.block_on(async {
            let response = request.bearer_auth(&self.access_token).send().await?;
            let status = response.status();

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(wire::error_from_body(status.as_u16(), &body));
            }

            Ok(())
        })
    }
}

impl StreamingApi for HttpApiClient {
    #[instrument(name = "create_broadcast", skip(self, spec), fields(title = %spec.title))]
    fn create_broadcast(&self, spec: &NewBroadcast) -> ApiResult<BroadcastResource> {
        let url = self.endpoint("liveBroadcasts")?;
        let request = self
            .http
            .post(url)
            .query(&[("part", "snippet,status,contentDetails")])
            .json(&wire::BroadcastInsert::from_spec(spec));

        let item: wire::BroadcastItem = self.execute(request)?;
        debug!(id = %item.id, "broadcast created");
        Ok(item.into_resource())
    }

    #[instrument(name = "create_stream", skip(self, spec), fields(title = %spec.title))]
    fn create_stream(&self, spec: &NewStream) -> ApiResult<IngestionStream> {
        let url = self.endpoint("liveStreams")?;
        let request = self
            .http
            .post(url)
            .query(&[("part", "snippet,cdn")])
            .json(&wire::StreamInsert::from_spec(spec));

        let item: wire::StreamItem = self.execute(request)?;
        debug!(id = %item.id, "stream created");
        Ok(item.into_stream())
    }

    #[instrument(name = "bind_stream", skip(self))]
    fn bind(&self, broadcast_id: &str, stream_id: &str) -> ApiResult<()> {
        let url = self.endpoint("liveBroadcasts/bind")?;
        let request = self.http.post(url).query(&[
            ("id", broadcast_id),
            ("streamId", stream_id),
            ("part", "id,contentDetails"),
        ]);

        self.execute_unit(request)
    }

    fn list_broadcasts(&self, status: BroadcastStatus) -> ApiResult<Vec<BroadcastResource>> {
        let url = self.endpoint("liveBroadcasts")?;
        let request = self.http.get(url).query(&[
            ("part", "id,snippet,contentDetails,status"),
            ("broadcastStatus", wire::status_filter(status)),
        ]);

        let envelope: wire::ListEnvelope<wire::BroadcastItem> = self.execute(request)?;
        Ok(envelope
            .items
            .into_iter()
            .map(|item| item.into_resource())
            .collect())
    }

    fn get_stream(&self, stream_id: &str) -> ApiResult<Option<IngestionStream>> {
        let url = self.endpoint("liveStreams")?;
        let request = self
            .http
            .get(url)
            .query(&[("part", "cdn"), ("id", stream_id)]);

        let envelope: wire::ListEnvelope<wire::StreamItem> = self.execute(request)?;
        Ok(envelope
            .items
            .into_iter()
            .next()
            .map(|item| item.into_stream()))
    }

    #[instrument(name = "broadcast_transition", skip(self))]
    fn transition(&self, status: TransitionStatus, broadcast_id: &str) -> ApiResult<()> {
        let url = self.endpoint("liveBroadcasts/transition")?;
        let request = self.http.post(url).query(&[
            ("broadcastStatus", status.as_str()),
            ("id", broadcast_id),
            ("part", "status"),
        ]);

        self.execute_unit(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(matches!(
            HttpApiClient::new("not a url", "token".to_string()),
            Err(ApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let client = HttpApiClient::new("https://api.example.com/v3/", "token".to_string())
            .expect("client should build");

        let url = client.endpoint("liveBroadcasts").expect("valid endpoint");
        assert_eq!(url.as_str(), "https://api.example.com/v3/liveBroadcasts");
    }
}
