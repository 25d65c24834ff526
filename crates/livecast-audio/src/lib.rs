//! Microphone capture.
//!
//! This crate pulls fixed-size blocks of 16-bit mono samples from a
//! [`SampleSource`] on a dedicated worker thread and hands each block to a
//! [`FrameSink`] synchronously.

mod capture;
mod error;
mod source;

pub use capture::{FrameSink, MicCapture};
pub use error::CaptureError;
pub use source::{MicSource, MicSourceProvider, SampleSource, SourceProvider};

/// Channel capacity for sample chunks coming off the input callback.
pub const SAMPLE_CHANNEL_CAPACITY: usize = 32;

/// Result type for audio operations.
pub type AudioResult<T> = Result<T, CaptureError>;
