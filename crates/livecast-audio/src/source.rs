//! Sample sources: the platform microphone contract and its cpal binding.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use livecast_ipc::CaptureConfig;

use crate::error::CaptureError;
use crate::{AudioResult, SAMPLE_CHANNEL_CAPACITY};

/// How long a read blocks for samples before reporting an empty iteration.
const READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Fallback read window when the device reports no minimum buffer size.
const FALLBACK_WINDOW_MS: usize = 20;

/// Blocking sample input.
///
/// `read` fills `buf` and returns the number of valid samples: a positive
/// count is a block to forward, zero is a no-op iteration, and an error is a
/// transient device failure the caller may skip.
pub trait SampleSource: Send + 'static {
    /// Whether microphone capture is permitted for this process.
    fn permission_granted(&self) -> bool;

    /// Recommended minimum read-buffer size in bytes for `config`.
    fn min_buffer_bytes(&self, config: &CaptureConfig) -> usize;

    /// Open the device. Called on the capture worker thread.
    fn start(&mut self) -> AudioResult<()>;

    /// Blocking read of up to `buf.len()` samples into `buf`.
    fn read(&mut self, buf: &mut [i16]) -> AudioResult<usize>;

    /// Release the device.
    fn stop(&mut self);
}

/// Opens sample sources for capture sessions.
pub trait SourceProvider: Send {
    /// Open a source for the given configuration.
    fn open(&self, config: &CaptureConfig) -> AudioResult<Box<dyn SampleSource>>;
}

/// Microphone input via cpal.
///
/// The cpal stream is not `Send`, so a holder thread owns it for its whole
/// lifetime and forwards sample chunks over a bounded channel; `read` drains
/// that channel through a pending queue.
pub struct MicSource {
    config: CaptureConfig,
    chunk_rx: Option<Receiver<Vec<i16>>>,
    pending: VecDeque<i16>,
    holder: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    last_error: Arc<Mutex<Option<String>>>,
}

impl MicSource {
    /// Create a source for the default input device. The device itself is
    /// opened by `start`, on the capture worker thread.
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            config: config.clone(),
            chunk_rx: None,
            pending: VecDeque::new(),
            holder: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            last_error: Arc::new(Mutex::new(None)),
        }
    }
}

impl SampleSource for MicSource {
    /// Desktop hosts surface a privacy-denied microphone as an absent or
    /// unopenable default device; an absent device reads as no permission.
    fn permission_granted(&self) -> bool {
        cpal::default_host().default_input_device().is_some()
    }

    fn min_buffer_bytes(&self, config: &CaptureConfig) -> usize {
        let fallback = (config.sample_rate_hz as usize * FALLBACK_WINDOW_MS / 1000).max(1)
            * config.channel_count as usize
            * config.bytes_per_sample();

        let Some(device) = cpal::default_host().default_input_device() else {
            return fallback;
        };

        match device.default_input_config() {
            Ok(supported) => match supported.buffer_size() {
                cpal::SupportedBufferSize::Range { min, .. } if *min > 0 => {
                    (*min as usize * config.channel_count as usize * config.bytes_per_sample())
                        .max(fallback)
                }
                _ => fallback,
            },
            Err(_) => fallback,
        }
    }

    fn start(&mut self) -> AudioResult<()> {
        if self.holder.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }

        let (chunk_tx, chunk_rx) = crossbeam_channel::bounded(SAMPLE_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let shutdown = Arc::clone(&self.shutdown);
        shutdown.store(false, Ordering::SeqCst);
        let last_error = Arc::clone(&self.last_error);

        let stream_config = cpal::StreamConfig {
            channels: self.config.channel_count,
            sample_rate: cpal::SampleRate(self.config.sample_rate_hz),
            buffer_size: cpal::BufferSize::Default,
        };

        let handle = thread::spawn(move || {
            holder_thread(stream_config, chunk_tx, ready_tx, shutdown, last_error)
        });

        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                self.shutdown.store(true, Ordering::SeqCst);
                let _ = handle.join();
                return Err(CaptureError::DeviceUnavailable(
                    "input stream did not start".into(),
                ));
            }
        }

        self.holder = Some(handle);
        self.chunk_rx = Some(chunk_rx);

        info!(rate = self.config.sample_rate_hz, "microphone input started");
        Ok(())
    }

    fn read(&mut self, buf: &mut [i16]) -> AudioResult<usize> {
        if let Some(message) = self.last_error.lock().take() {
            return Err(CaptureError::ReadFailed(message));
        }

        let rx = self
            .chunk_rx
            .as_ref()
            .ok_or_else(|| CaptureError::ReadFailed("input not started".into()))?;

        while self.pending.is_empty() {
            match rx.recv_timeout(READ_TIMEOUT) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => return Ok(0),
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    return Err(CaptureError::ReadFailed("input stream closed".into()))
                }
            }
        }

        let count = buf.len().min(self.pending.len());
        for (slot, sample) in buf.iter_mut().zip(self.pending.drain(..count)) {
            *slot = sample;
        }
        Ok(count)
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.holder.take() {
            let _ = handle.join();
        }
        self.chunk_rx = None;
        self.pending.clear();
    }
}

impl Drop for MicSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Owns the cpal stream for its whole lifetime and parks until shutdown.
fn holder_thread(
    config: cpal::StreamConfig,
    chunk_tx: Sender<Vec<i16>>,
    ready_tx: Sender<AudioResult<()>>,
    shutdown: Arc<AtomicBool>,
    last_error: Arc<Mutex<Option<String>>>,
) {
    let Some(device) = cpal::default_host().default_input_device() else {
        let _ = ready_tx.send(Err(CaptureError::DeviceUnavailable(
            "no default input device".into(),
        )));
        return;
    };

    debug!(
        device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
        "opening microphone input stream"
    );

    let error_store = Arc::clone(&last_error);
    let stream = match device.build_input_stream(
        &config,
        move |data: &[i16], _: &cpal::InputCallbackInfo| {
            if chunk_tx.try_send(data.to_vec()).is_err() {
                trace!("sample channel full, dropping block");
            }
        },
        move |err| {
            warn!("input stream error: {err}");
            *error_store.lock() = Some(err.to_string());
        },
        None,
    ) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(CaptureError::DeviceUnavailable(e.to_string())));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(CaptureError::DeviceUnavailable(e.to_string())));
        return;
    }

    let _ = ready_tx.send(Ok(()));

    while !shutdown.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(20));
    }

    drop(stream);
    debug!("microphone holder thread exiting");
}

/// Provider that opens the default microphone.
pub struct MicSourceProvider;

impl SourceProvider for MicSourceProvider {
    fn open(&self, config: &CaptureConfig) -> AudioResult<Box<dyn SampleSource>> {
        Ok(Box::new(MicSource::new(config)))
    }
}
