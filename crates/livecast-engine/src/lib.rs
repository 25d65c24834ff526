//! Core engine for a livecast session.
//!
//! Hosts the broadcast lifecycle state machine and the session orchestrator
//! that drives microphone capture and lifecycle transitions from a command
//! channel.

mod clock;
mod lifecycle;
mod orchestrator;

pub use clock::{Clock, SystemClock};
pub use lifecycle::{
    BroadcastLifecycle, CancelToken, LifecycleError, LifecycleState, ProvisionStep, SCHEDULE_LEAD,
    SETTLE_DELAY,
};
pub use orchestrator::Session;
