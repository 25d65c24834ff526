//! Session orchestrator.
//!
//! Drives microphone capture and the broadcast lifecycle from a command
//! channel. This is where the session-level ordering lives: capture must be
//! running before a broadcast goes live, and it outlives the broadcast until
//! the event has ended (or the session is aborted).

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, instrument, warn};

use livecast_api::StreamingApi;
use livecast_audio::{FrameSink, MicCapture, SourceProvider};
use livecast_ipc::{CaptureConfig, SessionCommand, SessionEvent, SessionState};

use crate::clock::Clock;
use crate::lifecycle::{BroadcastLifecycle, CancelToken, LifecycleError};

/// The streaming session engine.
pub struct Session<A, C> {
    command_rx: Receiver<SessionCommand>,
    event_tx: Sender<SessionEvent>,
    lifecycle: BroadcastLifecycle<A, C>,
    capture: MicCapture,
    sources: Box<dyn SourceProvider>,
    state: SessionState,
    go_live_cancel: CancelToken,
}

impl<A: StreamingApi, C: Clock> Session<A, C> {
    /// Create a session over the given provider client, clock, sample source
    /// provider, and frame sink.
    pub fn new(
        command_rx: Receiver<SessionCommand>,
        event_tx: Sender<SessionEvent>,
        api: A,
        clock: C,
        sources: Box<dyn SourceProvider>,
        sink: Arc<dyn FrameSink>,
    ) -> Self {
        let mut capture = MicCapture::new();
        capture.set_frame_sink(sink);

        Self {
            command_rx,
            event_tx,
            lifecycle: BroadcastLifecycle::new(api, clock),
            capture,
            sources,
            state: SessionState::Idle,
            go_live_cancel: CancelToken::new(),
        }
    }

    /// Token that cancels an in-flight go-live wait. Clone it before `run`;
    /// the session loop is blocked while that wait is in progress.
    pub fn go_live_cancel(&self) -> CancelToken {
        self.go_live_cancel.clone()
    }

    /// Run the session loop (blocking) until `Shutdown` or disconnect.
    #[instrument(name = "session_run", skip(self))]
    pub fn run(&mut self) {
        info!("session starting");
        self.send_event(SessionEvent::Ready);

        loop {
            match self.command_rx.recv() {
                Ok(command) => {
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Err(_) => {
                    info!("command channel disconnected, shutting down");
                    break;
                }
            }
        }

        if self.capture.is_active() {
            let _ = self.capture.stop();
        }
        info!("session stopped");
    }

    /// Handle a command. Returns false if the session should stop.
    fn handle_command(&mut self, command: SessionCommand) -> bool {
        debug!(?command, "handling command");

        match command {
            SessionCommand::StartCapture { config } => self.start_capture(config),
            SessionCommand::StopCapture => self.stop_capture(),
            SessionCommand::Provision { title, description } => {
                self.provision(&title, &description)
            }
            SessionCommand::ListEvents => self.list_events(),
            SessionCommand::GoLive { broadcast_id } => self.go_live(broadcast_id),
            SessionCommand::EndEvent { broadcast_id } => self.end_event(&broadcast_id),
            SessionCommand::Shutdown => {
                if self.capture.is_active() {
                    let _ = self.capture.stop();
                    self.send_event(SessionEvent::CaptureStopped);
                }
                self.transition_to(SessionState::Idle);
                self.send_event(SessionEvent::Shutdown);
                return false;
            }
        }

        true
    }

    fn start_capture(&mut self, config: CaptureConfig) {
        if self.capture.is_active() {
            debug!("capture already running, ignoring start");
            return;
        }

        let source = match self.sources.open(&config) {
            Ok(source) => source,
            Err(e) => {
                return self.report_error(format!("failed to open sample source: {e}"), true)
            }
        };

        match self.capture.start(&config, source) {
            Ok(()) => {
                self.transition_to(SessionState::Capturing);
                self.send_event(SessionEvent::CaptureStarted);
            }
            Err(e) => self.report_error(format!("capture start failed: {e}"), true),
        }
    }

    fn stop_capture(&mut self) {
        if !self.capture.is_active() {
            debug!("capture not running, ignoring stop");
            return;
        }

        if self.state.is_live() {
            warn!("stopping capture while live, treating as session abort");
        }

        let _ = self.capture.stop();
        self.transition_to(SessionState::Idle);
        self.send_event(SessionEvent::CaptureStopped);
    }

    fn provision(&mut self, title: &str, description: &str) {
        match self.lifecycle.provision(title, description) {
            Ok(event) => self.send_event(SessionEvent::Provisioned(event)),
            Err(e) => self.report_error(format!("provisioning failed: {e}"), true),
        }
    }

    fn list_events(&mut self) {
        match self.lifecycle.list_pending_events() {
            Ok(events) => self.send_event(SessionEvent::PendingEvents(events)),
            Err(e) => self.report_error(format!("listing events failed: {e}"), true),
        }
    }

    /// Capture must be running before the live transition so the ingestion
    /// pipeline has data when the provider checks it.
    fn go_live(&mut self, broadcast_id: String) {
        if !self.capture.is_active() {
            return self.report_error("cannot go live: capture is not running".to_string(), true);
        }

        self.go_live_cancel.reset();
        self.transition_to(SessionState::GoingLive {
            broadcast_id: broadcast_id.clone(),
        });

        match self.lifecycle.start_event(&broadcast_id, &self.go_live_cancel) {
            Ok(()) => {
                self.transition_to(SessionState::Live {
                    broadcast_id: broadcast_id.clone(),
                });
                self.send_event(SessionEvent::Live { broadcast_id });
            }
            Err(LifecycleError::Cancelled) => {
                info!(%broadcast_id, "go-live cancelled before transition");
                self.transition_to(SessionState::Capturing);
                self.send_event(SessionEvent::GoLiveCancelled { broadcast_id });
            }
            Err(e) => {
                self.transition_to(SessionState::Capturing);
                self.report_error(format!("go-live failed: {e}"), true);
            }
        }
    }

    fn end_event(&mut self, broadcast_id: &str) {
        match self.lifecycle.end_event(broadcast_id) {
            Ok(()) => {
                let next = if self.capture.is_active() {
                    SessionState::Capturing
                } else {
                    SessionState::Idle
                };
                self.transition_to(next);
                self.send_event(SessionEvent::Ended {
                    broadcast_id: broadcast_id.to_string(),
                });
            }
            Err(e) => self.report_error(format!("ending event failed: {e}"), true),
        }
    }

    fn transition_to(&mut self, new_state: SessionState) {
        let previous = std::mem::replace(&mut self.state, new_state.clone());
        debug!(
            previous = %previous.name(),
            current = %new_state.name(),
            "state transition"
        );
        self.send_event(SessionEvent::StateChanged {
            previous: Box::new(previous),
            current: Box::new(new_state),
        });
    }

    fn report_error(&mut self, message: String, recoverable: bool) {
        warn!("{message}");
        self.send_event(SessionEvent::Error {
            message,
            recoverable,
        });
    }

    fn send_event(&self, event: SessionEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("failed to send event: {e}");
        }
    }
}
