//! Microphone capture loop.
//!
//! One worker thread repeatedly reads sample blocks from a [`SampleSource`]
//! and hands each block to the registered [`FrameSink`] on that same thread.
//! The cancel flag is the only state shared between the control thread and
//! the worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use livecast_ipc::CaptureConfig;

use crate::error::CaptureError;
use crate::source::SampleSource;
use crate::AudioResult;

/// Consumer of captured sample blocks.
///
/// `samples` is the valid prefix of the worker's read buffer, borrowed only
/// for the duration of the call; the buffer is reused for the next read. A
/// sink that blocks for long starves subsequent reads.
pub trait FrameSink: Send + Sync {
    /// Handle one captured block.
    fn handle_frame(&self, samples: &[i16]);
}

/// Microphone capture session.
///
/// At most one worker thread is active per instance; `start` while active is
/// rejected. `stop` joins the worker, so no [`FrameSink`] call happens after
/// it returns.
pub struct MicCapture {
    sink: Option<Arc<dyn FrameSink>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    cancel: Arc<AtomicBool>,
    active: AtomicBool,
}

impl MicCapture {
    /// Create an idle capture session.
    pub fn new() -> Self {
        Self {
            sink: None,
            worker: Mutex::new(None),
            cancel: Arc::new(AtomicBool::new(false)),
            active: AtomicBool::new(false),
        }
    }

    /// Register the frame sink. Must be called before `start`.
    pub fn set_frame_sink(&mut self, sink: Arc<dyn FrameSink>) {
        self.sink = Some(sink);
    }

    /// Start capturing on a background worker thread.
    ///
    /// Permission and the computed read-buffer size are validated before any
    /// thread is spawned; on success the call returns immediately while the
    /// worker keeps reading until [`stop`](Self::stop).
    #[instrument(name = "capture_start", skip(self, source))]
    pub fn start(
        &mut self,
        config: &CaptureConfig,
        source: Box<dyn SampleSource>,
    ) -> AudioResult<()> {
        if self.active.load(Ordering::SeqCst) {
            return Err(CaptureError::AlreadyStarted);
        }

        let sink = self.sink.clone().ok_or(CaptureError::NoSink)?;

        if !source.permission_granted() {
            return Err(CaptureError::PermissionDenied);
        }

        let min_bytes = source.min_buffer_bytes(config);
        let buffer_len = min_bytes / config.bytes_per_sample().max(1);
        if buffer_len == 0 {
            return Err(CaptureError::InvalidBufferSize(min_bytes));
        }

        info!(
            rate = config.sample_rate_hz,
            buffer_len, "starting microphone capture"
        );

        let cancel = Arc::clone(&self.cancel);
        cancel.store(false, Ordering::SeqCst);

        let handle = thread::spawn(move || capture_loop(source, sink, cancel, buffer_len));

        *self.worker.lock() = Some(handle);
        self.active.store(true, Ordering::SeqCst);

        Ok(())
    }

    /// Stop capturing and join the worker.
    ///
    /// Blocks until the worker has exited; no `FrameSink` call happens after
    /// this returns. Calling `stop` with no active session is a no-op.
    #[instrument(name = "capture_stop", skip(self))]
    pub fn stop(&mut self) -> AudioResult<()> {
        if !self.active.load(Ordering::SeqCst) {
            return Ok(());
        }

        info!("stopping microphone capture");

        self.cancel.store(true, Ordering::SeqCst);

        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }

        self.active.store(false, Ordering::SeqCst);

        Ok(())
    }

    /// Check if a capture session is active.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Default for MicCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Worker loop: read blocks until cancelled, forwarding each to the sink.
///
/// The cancel flag is checked once per iteration boundary; a read in flight
/// is never interrupted.
fn capture_loop(
    mut source: Box<dyn SampleSource>,
    sink: Arc<dyn FrameSink>,
    cancel: Arc<AtomicBool>,
    buffer_len: usize,
) {
    if let Err(e) = source.start() {
        warn!("sample source failed to start: {e}");
        return;
    }

    debug!(buffer_len, "capture worker entering read loop");

    let mut buffer = vec![0i16; buffer_len];

    while !cancel.load(Ordering::SeqCst) {
        match source.read(&mut buffer) {
            Ok(0) => {}
            Ok(count) => sink.handle_frame(&buffer[..count.min(buffer_len)]),
            // Read errors are transient; the session keeps running.
            Err(e) => warn!("microphone read failed: {e}"),
        }
    }

    source.stop();
    debug!("capture worker exiting");
}
