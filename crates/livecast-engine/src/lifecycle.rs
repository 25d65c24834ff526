//! Broadcast lifecycle state machine.
//!
//! Sequences the provider calls for one broadcast: provision (create
//! broadcast, create stream, bind), enumerate pending events, transition to
//! live after the settle delay, transition to complete.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use livecast_api::{ApiError, NewBroadcast, NewStream, StreamingApi, TransitionStatus};
use livecast_ipc::{BroadcastEvent, BroadcastStatus};

use crate::clock::Clock;

/// Lead applied to the scheduled start at provision time; the provider
/// rejects starts dated in the past.
pub const SCHEDULE_LEAD: Duration = Duration::from_secs(5);

/// Mandatory wait before the live transition, so the ingestion pipeline is
/// already receiving data when the provider checks it.
pub const SETTLE_DELAY: Duration = Duration::from_secs(10);

/// Granularity at which the settle delay polls its cancellation token.
const SETTLE_TICK: Duration = Duration::from_millis(100);

/// Cooperative cancellation for the go-live wait.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an unarmed token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Re-arm the token for a new operation.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Where in the provision sequence a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    /// Creating the broadcast resource.
    CreateBroadcast,

    /// Creating the ingestion stream resource.
    CreateStream,

    /// Binding the stream to the broadcast.
    Bind,
}

impl ProvisionStep {
    /// Returns the display name for this step.
    pub fn name(self) -> &'static str {
        match self {
            Self::CreateBroadcast => "broadcast creation",
            Self::CreateStream => "stream creation",
            Self::Bind => "stream binding",
        }
    }
}

/// Errors from lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A provision step failed; no partial state is kept.
    #[error("provisioning failed during {}: {source}", .step.name())]
    Provision {
        /// The step that failed.
        step: ProvisionStep,
        #[source]
        source: ApiError,
    },

    /// A provider call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The go-live wait was cancelled before the transition was issued.
    #[error("go-live cancelled during settle delay")]
    Cancelled,

    /// The operation is not valid in the current state.
    #[error("cannot {action} while {from}")]
    InvalidTransition {
        /// State the lifecycle was in.
        from: &'static str,
        /// Operation that was attempted.
        action: &'static str,
    },
}

/// Lifecycle position of the broadcast this instance is driving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    /// Nothing provisioned yet.
    Unprovisioned,

    /// Broadcast and stream exist and are bound; not yet live.
    Provisioned {
        /// Provisioned broadcast id.
        broadcast_id: String,
        /// Bound ingestion stream id.
        stream_id: String,
    },

    /// The live transition has been issued.
    Live {
        /// Live broadcast id.
        broadcast_id: String,
    },

    /// The broadcast is complete. Terminal.
    Complete,
}

impl LifecycleState {
    /// Returns true if the broadcast is live.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }

    /// Returns true if the broadcast is complete.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unprovisioned => "unprovisioned",
            Self::Provisioned { .. } => "provisioned",
            Self::Live { .. } => "live",
            Self::Complete => "complete",
        }
    }
}

/// Sequences one broadcast through provision → live → complete.
///
/// Calls are synchronous and sequential on the calling thread; a caller that
/// must not block runs the lifecycle from a background context.
pub struct BroadcastLifecycle<A, C> {
    api: A,
    clock: C,
    state: LifecycleState,
}

impl<A: StreamingApi, C: Clock> BroadcastLifecycle<A, C> {
    /// Create an unprovisioned lifecycle over the given provider client.
    pub fn new(api: A, clock: C) -> Self {
        Self {
            api,
            clock,
            state: LifecycleState::Unprovisioned,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    /// Create a broadcast, create an ingestion stream, and bind them.
    ///
    /// The three provider calls run in strict order. Any failure aborts the
    /// whole operation with the failed step named; no partial state is kept
    /// here, so the caller decides whether to discard the remote leftovers
    /// and retry from scratch. Not re-enterable once it has succeeded.
    #[instrument(name = "provision", skip(self, description))]
    pub fn provision(
        &mut self,
        title: &str,
        description: &str,
    ) -> Result<BroadcastEvent, LifecycleError> {
        if self.state != LifecycleState::Unprovisioned {
            return Err(LifecycleError::InvalidTransition {
                from: self.state.name(),
                action: "provision",
            });
        }

        let scheduled_start =
            self.clock.now_utc() + chrono::Duration::seconds(SCHEDULE_LEAD.as_secs() as i64);

        info!(%title, %scheduled_start, "provisioning broadcast");

        let broadcast = self
            .api
            .create_broadcast(&NewBroadcast {
                title: title.to_string(),
                description: description.to_string(),
                scheduled_start,
            })
            .map_err(|source| LifecycleError::Provision {
                step: ProvisionStep::CreateBroadcast,
                source,
            })?;

        let stream = self
            .api
            .create_stream(&NewStream {
                title: title.to_string(),
            })
            .map_err(|source| LifecycleError::Provision {
                step: ProvisionStep::CreateStream,
                source,
            })?;

        self.api
            .bind(&broadcast.id, &stream.id)
            .map_err(|source| LifecycleError::Provision {
                step: ProvisionStep::Bind,
                source,
            })?;

        info!(broadcast_id = %broadcast.id, stream_id = %stream.id, "broadcast provisioned");

        self.state = LifecycleState::Provisioned {
            broadcast_id: broadcast.id.clone(),
            stream_id: stream.id.clone(),
        };

        let mut event = broadcast.into_event();
        event.ingestion_address = Some(stream.endpoint());
        Ok(event)
    }

    /// Snapshot of upcoming events, in the order the provider listed them.
    ///
    /// Each event with a bound stream gets its ingestion endpoint resolved
    /// by a secondary lookup. A bound id the provider no longer knows leaves
    /// the address unset rather than failing the listing. The snapshot is
    /// finite and keeps no pagination cursor.
    #[instrument(name = "list_pending_events", skip(self))]
    pub fn list_pending_events(&self) -> Result<Vec<BroadcastEvent>, LifecycleError> {
        let broadcasts = self.api.list_broadcasts(BroadcastStatus::Upcoming)?;
        debug!(count = broadcasts.len(), "pending broadcasts listed");

        let mut events = Vec::with_capacity(broadcasts.len());
        for broadcast in broadcasts {
            let bound_stream_id = broadcast.bound_stream_id.clone();
            let mut event = broadcast.into_event();

            if let Some(stream_id) = bound_stream_id {
                match self.api.get_stream(&stream_id)? {
                    Some(stream) => event.ingestion_address = Some(stream.endpoint()),
                    None => warn!(%stream_id, "bound stream not found, leaving address unset"),
                }
            }

            events.push(event);
        }

        Ok(events)
    }

    /// Transition the broadcast to live after the mandatory settle delay.
    ///
    /// Blocks the caller for at least [`SETTLE_DELAY`] unless `cancel` fires
    /// first, in which case the transition call is never issued and
    /// [`LifecycleError::Cancelled`] is returned.
    #[instrument(name = "start_event", skip(self, cancel))]
    pub fn start_event(
        &mut self,
        broadcast_id: &str,
        cancel: &CancelToken,
    ) -> Result<(), LifecycleError> {
        if self.state.is_live() || self.state.is_complete() {
            return Err(LifecycleError::InvalidTransition {
                from: self.state.name(),
                action: "go live",
            });
        }

        info!(
            %broadcast_id,
            delay_secs = SETTLE_DELAY.as_secs(),
            "waiting for ingestion to settle"
        );
        self.wait_settle(cancel)?;

        self.api.transition(TransitionStatus::Live, broadcast_id)?;
        self.state = LifecycleState::Live {
            broadcast_id: broadcast_id.to_string(),
        };

        info!(%broadcast_id, "broadcast live");
        Ok(())
    }

    /// Transition the broadcast to complete. No delay.
    #[instrument(name = "end_event", skip(self))]
    pub fn end_event(&mut self, broadcast_id: &str) -> Result<(), LifecycleError> {
        if self.state.is_complete() {
            return Err(LifecycleError::InvalidTransition {
                from: self.state.name(),
                action: "end",
            });
        }

        self.api
            .transition(TransitionStatus::Complete, broadcast_id)?;
        self.state = LifecycleState::Complete;

        info!(%broadcast_id, "broadcast complete");
        Ok(())
    }

    /// Sleep out the settle delay in ticks, polling the cancellation token
    /// between ticks and once more before returning.
    fn wait_settle(&self, cancel: &CancelToken) -> Result<(), LifecycleError> {
        let mut remaining = SETTLE_DELAY;
        while !remaining.is_zero() {
            if cancel.is_cancelled() {
                return Err(LifecycleError::Cancelled);
            }
            let step = remaining.min(SETTLE_TICK);
            self.clock.sleep(step);
            remaining -= step;
        }

        if cancel.is_cancelled() {
            return Err(LifecycleError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use chrono::{DateTime, TimeZone, Utc};
    use parking_lot::Mutex;

    use livecast_api::{ApiResult, BroadcastResource};
    use livecast_ipc::IngestionStream;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        CreateBroadcast,
        CreateStream,
        Bind,
        List,
        GetStream(String),
        Transition(TransitionStatus, String),
        Slept(Duration),
    }

    /// Provider fake recording every call into a shared journal.
    struct FakeApi {
        calls: Arc<Mutex<Vec<Call>>>,
        fail_stream_create: bool,
        listed: Vec<BroadcastResource>,
        streams: HashMap<String, IngestionStream>,
    }

    impl FakeApi {
        fn new(calls: Arc<Mutex<Vec<Call>>>) -> Self {
            Self {
                calls,
                fail_stream_create: false,
                listed: Vec::new(),
                streams: HashMap::new(),
            }
        }
    }

    impl StreamingApi for FakeApi {
        fn create_broadcast(&self, spec: &NewBroadcast) -> ApiResult<BroadcastResource> {
            self.calls.lock().push(Call::CreateBroadcast);
            Ok(BroadcastResource {
                id: "bc-1".to_string(),
                title: spec.title.clone(),
                scheduled_start: spec.scheduled_start,
                bound_stream_id: None,
                status: BroadcastStatus::Upcoming,
            })
        }

        fn create_stream(&self, _spec: &NewStream) -> ApiResult<IngestionStream> {
            self.calls.lock().push(Call::CreateStream);
            if self.fail_stream_create {
                return Err(ApiError::Api {
                    code: 403,
                    message: "quota exceeded".to_string(),
                });
            }
            Ok(IngestionStream {
                id: "st-1".to_string(),
                ingestion_address: "rtmp://ingest.example.com/live".to_string(),
                stream_name: "abcd-1234".to_string(),
            })
        }

        fn bind(&self, _broadcast_id: &str, _stream_id: &str) -> ApiResult<()> {
            self.calls.lock().push(Call::Bind);
            Ok(())
        }

        fn list_broadcasts(&self, _status: BroadcastStatus) -> ApiResult<Vec<BroadcastResource>> {
            self.calls.lock().push(Call::List);
            Ok(self.listed.clone())
        }

        fn get_stream(&self, stream_id: &str) -> ApiResult<Option<IngestionStream>> {
            self.calls.lock().push(Call::GetStream(stream_id.to_string()));
            Ok(self.streams.get(stream_id).cloned())
        }

        fn transition(&self, status: TransitionStatus, broadcast_id: &str) -> ApiResult<()> {
            self.calls
                .lock()
                .push(Call::Transition(status, broadcast_id.to_string()));
            Ok(())
        }
    }

    /// Clock fake recording sleeps into the same journal, optionally firing
    /// a cancellation once enough virtual time has passed.
    struct FakeClock {
        calls: Arc<Mutex<Vec<Call>>>,
        slept: Mutex<Duration>,
        cancel_after: Option<(Duration, CancelToken)>,
    }

    impl FakeClock {
        fn new(calls: Arc<Mutex<Vec<Call>>>) -> Self {
            Self {
                calls,
                slept: Mutex::new(Duration::ZERO),
                cancel_after: None,
            }
        }

        fn now() -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
        }
    }

    impl Clock for FakeClock {
        fn now_utc(&self) -> DateTime<Utc> {
            Self::now()
        }

        fn sleep(&self, duration: Duration) {
            self.calls.lock().push(Call::Slept(duration));
            let mut slept = self.slept.lock();
            *slept += duration;
            if let Some((threshold, token)) = &self.cancel_after {
                if *slept >= *threshold {
                    token.cancel();
                }
            }
        }
    }

    fn journal() -> Arc<Mutex<Vec<Call>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn upcoming(id: &str, bound_stream_id: Option<&str>) -> BroadcastResource {
        BroadcastResource {
            id: id.to_string(),
            title: format!("event {id}"),
            scheduled_start: FakeClock::now(),
            bound_stream_id: bound_stream_id.map(str::to_string),
            status: BroadcastStatus::Upcoming,
        }
    }

    #[test]
    fn test_provision_calls_in_strict_order() {
        let calls = journal();
        let mut lifecycle =
            BroadcastLifecycle::new(FakeApi::new(calls.clone()), FakeClock::new(calls.clone()));

        let event = lifecycle.provision("Test Event", "desc").unwrap();

        assert_eq!(
            *calls.lock(),
            vec![Call::CreateBroadcast, Call::CreateStream, Call::Bind]
        );
        assert_eq!(event.id, "bc-1");
        assert_eq!(
            event.ingestion_address.as_deref(),
            Some("rtmp://ingest.example.com/live/abcd-1234")
        );
        assert_eq!(event.status, BroadcastStatus::Upcoming);
        assert_eq!(
            *lifecycle.state(),
            LifecycleState::Provisioned {
                broadcast_id: "bc-1".to_string(),
                stream_id: "st-1".to_string(),
            }
        );
    }

    #[test]
    fn test_provision_schedules_start_in_the_future() {
        let calls = journal();
        let mut lifecycle =
            BroadcastLifecycle::new(FakeApi::new(calls.clone()), FakeClock::new(calls));

        let event = lifecycle.provision("Test Event", "desc").unwrap();

        let lead = event.scheduled_start - FakeClock::now();
        assert_eq!(lead.num_seconds(), SCHEDULE_LEAD.as_secs() as i64);
    }

    #[test]
    fn test_provision_failure_on_stream_creation_skips_bind() {
        let calls = journal();
        let mut api = FakeApi::new(calls.clone());
        api.fail_stream_create = true;
        let mut lifecycle = BroadcastLifecycle::new(api, FakeClock::new(calls.clone()));

        let result = lifecycle.provision("Test Event", "desc");

        match result {
            Err(LifecycleError::Provision { step, .. }) => {
                assert_eq!(step, ProvisionStep::CreateStream);
            }
            other => panic!("expected provision error, got {other:?}"),
        }
        assert!(!calls.lock().contains(&Call::Bind));
        assert_eq!(*lifecycle.state(), LifecycleState::Unprovisioned);
    }

    #[test]
    fn test_provision_not_reenterable() {
        let calls = journal();
        let mut lifecycle =
            BroadcastLifecycle::new(FakeApi::new(calls.clone()), FakeClock::new(calls));

        lifecycle.provision("Test Event", "desc").unwrap();
        let second = lifecycle.provision("Test Event", "desc");

        assert!(matches!(
            second,
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_start_event_waits_full_settle_delay_before_transition() {
        let calls = journal();
        let mut lifecycle =
            BroadcastLifecycle::new(FakeApi::new(calls.clone()), FakeClock::new(calls.clone()));

        lifecycle
            .start_event("bc-1", &CancelToken::new())
            .unwrap();

        let journal = calls.lock();
        let transition_index = journal
            .iter()
            .position(|call| matches!(call, Call::Transition(TransitionStatus::Live, _)))
            .expect("live transition should be issued");

        let slept_before: Duration = journal[..transition_index]
            .iter()
            .map(|call| match call {
                Call::Slept(duration) => *duration,
                _ => Duration::ZERO,
            })
            .sum();

        assert_eq!(slept_before, SETTLE_DELAY);
        assert!(lifecycle.state().is_live());
    }

    #[test]
    fn test_start_event_cancelled_never_transitions() {
        let calls = journal();
        let token = CancelToken::new();
        let mut clock = FakeClock::new(calls.clone());
        clock.cancel_after = Some((Duration::from_millis(300), token.clone()));
        let mut lifecycle = BroadcastLifecycle::new(FakeApi::new(calls.clone()), clock);

        let result = lifecycle.start_event("bc-1", &token);

        assert!(matches!(result, Err(LifecycleError::Cancelled)));
        assert!(!calls
            .lock()
            .iter()
            .any(|call| matches!(call, Call::Transition(..))));
        assert!(!lifecycle.state().is_live());
    }

    #[test]
    fn test_start_event_rejected_when_already_live() {
        let calls = journal();
        let mut lifecycle =
            BroadcastLifecycle::new(FakeApi::new(calls.clone()), FakeClock::new(calls));

        lifecycle.start_event("bc-1", &CancelToken::new()).unwrap();
        let second = lifecycle.start_event("bc-1", &CancelToken::new());

        assert!(matches!(
            second,
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_end_event_is_immediate_and_terminal() {
        let calls = journal();
        let mut lifecycle =
            BroadcastLifecycle::new(FakeApi::new(calls.clone()), FakeClock::new(calls.clone()));

        lifecycle.start_event("bc-1", &CancelToken::new()).unwrap();
        calls.lock().clear();

        lifecycle.end_event("bc-1").unwrap();

        let journal = calls.lock();
        assert!(!journal.iter().any(|call| matches!(call, Call::Slept(_))));
        assert_eq!(
            *journal,
            vec![Call::Transition(
                TransitionStatus::Complete,
                "bc-1".to_string()
            )]
        );
        drop(journal);

        let after_complete = lifecycle.end_event("bc-1");
        assert!(matches!(
            after_complete,
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_list_preserves_order_and_resolves_bound_streams() {
        let calls = journal();
        let mut api = FakeApi::new(calls.clone());
        api.listed = vec![
            upcoming("bc-1", Some("st-9")),
            upcoming("bc-2", None),
            upcoming("bc-3", Some("st-missing")),
        ];
        api.streams.insert(
            "st-9".to_string(),
            IngestionStream {
                id: "st-9".to_string(),
                ingestion_address: "rtmp://ingest.example.com/live".to_string(),
                stream_name: "key-9".to_string(),
            },
        );
        let lifecycle = BroadcastLifecycle::new(api, FakeClock::new(calls.clone()));

        let events = lifecycle.list_pending_events().unwrap();

        let ids: Vec<&str> = events.iter().map(|event| event.id.as_str()).collect();
        assert_eq!(ids, vec!["bc-1", "bc-2", "bc-3"]);

        assert_eq!(
            events[0].ingestion_address.as_deref(),
            Some("rtmp://ingest.example.com/live/key-9")
        );
        assert_eq!(events[1].ingestion_address, None);
        assert_eq!(events[2].ingestion_address, None);

        // The stream lookup runs only for events with a bound stream.
        let journal = calls.lock();
        let lookups: Vec<String> = journal
            .iter()
            .filter_map(|call| match call {
                Call::GetStream(id) => Some(id.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(lookups, vec!["st-9".to_string(), "st-missing".to_string()]);
    }
}
