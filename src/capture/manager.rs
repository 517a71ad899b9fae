use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use super::artifact::{RecordingArtifact, StopReason};
use super::config::CaptureConfig;
use super::device::{CaptureDevice, MediaChunk};
use super::encoder::RecordingEncoder;
use crate::error::CaptureError;

/// Lifecycle of the capture manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    RequestingPermission,
    Ready,
    PermissionDenied(String),
    Recording,
    Stopped(StopReason),
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureState::Idle => write!(f, "idle"),
            CaptureState::RequestingPermission => write!(f, "requesting permission"),
            CaptureState::Ready => write!(f, "ready"),
            CaptureState::PermissionDenied(reason) => write!(f, "permission denied ({})", reason),
            CaptureState::Recording => write!(f, "recording"),
            CaptureState::Stopped(_) => write!(f, "stopped"),
        }
    }
}

/// Signals emitted while the manager runs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum CaptureEvent {
    StateChanged(CaptureState),
    Tick { elapsed_secs: u64, remaining_secs: u64 },
    /// Fires once per recording attempt
    ApproachingLimit { elapsed_secs: u64, remaining_secs: u64 },
    /// The recording was finalized automatically at the limit
    MaxDurationReached { duration_secs: u64 },
    /// The device failed and the attempt was dropped
    Aborted { reason: String },
}

enum StopCommand {
    Finish,
    Discard,
}

enum RecordingOutcome {
    Finished(RecordingArtifact),
    Discarded,
    Failed(CaptureError),
}

struct ActiveRecording {
    stop_tx: Option<oneshot::Sender<StopCommand>>,
    handle: JoinHandle<(Box<dyn CaptureDevice>, RecordingOutcome)>,
}

/// Owns device permission, the recording lifecycle and duration enforcement
///
/// While recording, the device is moved into a dedicated task that drives the
/// elapsed-time ticker and encodes incoming media. The task hands the device
/// back when the recording ends, and stops it on every exit path. If the
/// manager is dropped mid-recording the task releases the device itself.
pub struct CaptureManager {
    config: CaptureConfig,
    device: Option<Box<dyn CaptureDevice>>,
    state: Arc<watch::Sender<CaptureState>>,
    events: broadcast::Sender<CaptureEvent>,
    active: Option<ActiveRecording>,
}

impl CaptureManager {
    pub fn new(
        device: Box<dyn CaptureDevice>,
        config: CaptureConfig,
    ) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::Config)?;

        info!(
            "Capture manager initialized: {} (max {}s, warning {}s before limit)",
            device.name(),
            config.max_duration_secs,
            config.warning_threshold_secs
        );

        let (state, _) = watch::channel(CaptureState::Idle);
        let (events, _) = broadcast::channel(256);

        Ok(Self {
            config,
            device: Some(device),
            state: Arc::new(state),
            events,
            active: None,
        })
    }

    pub fn state(&self) -> CaptureState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.events.subscribe()
    }

    /// Acquire device access. Denial is surfaced, never retried here.
    pub async fn request_permission(&mut self) -> Result<(), CaptureError> {
        match self.state() {
            CaptureState::Idle | CaptureState::PermissionDenied(_) => {}
            CaptureState::Ready | CaptureState::Stopped(_) => return Ok(()),
            other => return Err(invalid_state("request permission", &other)),
        }

        let device = self.device.as_mut().ok_or_else(device_unavailable)?;
        transition(&self.state, &self.events, CaptureState::RequestingPermission);

        match device.request_permission().await {
            Ok(()) => {
                info!("Capture permission granted for {}", device.name());
                transition(&self.state, &self.events, CaptureState::Ready);
                Ok(())
            }
            Err(err) => {
                let reason = match err {
                    CaptureError::PermissionDenied(reason) => reason,
                    other => other.to_string(),
                };
                warn!("Capture permission denied for {}: {}", device.name(), reason);
                transition(
                    &self.state,
                    &self.events,
                    CaptureState::PermissionDenied(reason.clone()),
                );
                Err(CaptureError::PermissionDenied(reason))
            }
        }
    }

    pub async fn start_recording(&mut self) -> Result<(), CaptureError> {
        let current = self.state();
        if current != CaptureState::Ready {
            return Err(invalid_state("start recording", &current));
        }

        // A previous attempt may have faulted; take the device back first
        if self.active.is_some() {
            let _ = self.join_active(StopCommand::Discard).await;
        }

        let mut device = self.device.take().ok_or_else(device_unavailable)?;
        let frames = match device.start().await {
            Ok(frames) => frames,
            Err(e) => {
                error!("Failed to start capture on {}: {}", device.name(), e);
                self.device = Some(device);
                return Err(e);
            }
        };

        info!("Recording started on {}", device.name());

        let video_mime = device.video_mime_type().map(str::to_string);
        let encoder = RecordingEncoder::new(&self.config.device_config(), video_mime);
        let (stop_tx, stop_rx) = oneshot::channel();

        transition(&self.state, &self.events, CaptureState::Recording);

        let task = RecordingTask {
            device,
            frames,
            stop_rx,
            encoder,
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            events: self.events.clone(),
        };
        let handle = tokio::spawn(task.run());

        self.active = Some(ActiveRecording {
            stop_tx: Some(stop_tx),
            handle,
        });

        Ok(())
    }

    /// Finish the current recording and take its artifact
    ///
    /// After an auto-stop this returns the artifact that was finalized at the
    /// limit, flagged with `StopReason::MaxDurationReached`.
    pub async fn stop_recording(&mut self) -> Result<RecordingArtifact, CaptureError> {
        if self.active.is_none() {
            return Err(invalid_state("stop recording", &self.state()));
        }

        match self.join_active(StopCommand::Finish).await {
            Some(RecordingOutcome::Finished(artifact)) => {
                info!(
                    "Recording stopped: {:.1}s ({:?})",
                    artifact.duration_secs(),
                    artifact.stop_reason
                );
                Ok(artifact)
            }
            Some(RecordingOutcome::Failed(err)) => Err(err),
            Some(RecordingOutcome::Discarded) | None => {
                Err(CaptureError::Device("recording was discarded".to_string()))
            }
        }
    }

    /// Drop any recording in progress or finished and get ready to record again
    pub async fn reset(&mut self) -> CaptureState {
        if self.active.is_some() {
            let _ = self.join_active(StopCommand::Discard).await;
        }

        let next = match (self.device.is_some(), self.state()) {
            (false, _) => CaptureState::Idle,
            (true, CaptureState::Ready)
            | (true, CaptureState::Recording)
            | (true, CaptureState::Stopped(_)) => CaptureState::Ready,
            (true, _) => CaptureState::Idle,
        };

        transition(&self.state, &self.events, next.clone());
        next
    }

    /// Abandon everything and release the device
    pub async fn shutdown(&mut self) {
        if self.active.is_some() {
            let _ = self.join_active(StopCommand::Discard).await;
        }

        if let Some(device) = self.device.as_mut() {
            device.release().await;
            info!("Released capture device {}", device.name());
        }

        transition(&self.state, &self.events, CaptureState::Idle);
    }

    async fn join_active(&mut self, command: StopCommand) -> Option<RecordingOutcome> {
        let mut active = self.active.take()?;

        if let Some(stop_tx) = active.stop_tx.take() {
            // The task may already have finished on its own
            let _ = stop_tx.send(command);
        }

        match active.handle.await {
            Ok((device, outcome)) => {
                self.device = Some(device);
                Some(outcome)
            }
            Err(e) => {
                error!("Recording task failed: {}", e);
                transition(&self.state, &self.events, CaptureState::Idle);
                None
            }
        }
    }
}

impl Drop for CaptureManager {
    fn drop(&mut self) {
        // An active recording task notices its stop channel closing and
        // releases the device on its own.
        if let Some(mut device) = self.device.take() {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move {
                    device.release().await;
                });
            }
        }
    }
}

enum Exit {
    Finish(StopReason),
    Discard,
    Abandoned,
    Fault(String),
}

struct RecordingTask {
    device: Box<dyn CaptureDevice>,
    frames: mpsc::Receiver<MediaChunk>,
    stop_rx: oneshot::Receiver<StopCommand>,
    encoder: RecordingEncoder,
    config: CaptureConfig,
    state: Arc<watch::Sender<CaptureState>>,
    events: broadcast::Sender<CaptureEvent>,
}

impl RecordingTask {
    async fn run(self) -> (Box<dyn CaptureDevice>, RecordingOutcome) {
        let RecordingTask {
            mut device,
            mut frames,
            mut stop_rx,
            mut encoder,
            config,
            state,
            events,
        } = self;

        let max_secs = config.max_duration_secs;
        let warn_at = config.warning_at_secs();
        let second = Duration::from_secs(1);
        let started = Instant::now();
        let mut ticker = time::interval_at(started + second, second);
        let mut elapsed_secs = 0u64;

        let exit = loop {
            tokio::select! {
                biased;

                command = &mut stop_rx => {
                    break match command {
                        Ok(StopCommand::Finish) => Exit::Finish(StopReason::UserStopped),
                        Ok(StopCommand::Discard) => Exit::Discard,
                        Err(_) => Exit::Abandoned,
                    };
                }

                _ = ticker.tick() => {
                    elapsed_secs += 1;
                    let remaining_secs = max_secs.saturating_sub(elapsed_secs);
                    let _ = events.send(CaptureEvent::Tick { elapsed_secs, remaining_secs });

                    if elapsed_secs == warn_at {
                        warn!("Recording approaching limit: {}s remaining", remaining_secs);
                        let _ = events.send(CaptureEvent::ApproachingLimit {
                            elapsed_secs,
                            remaining_secs,
                        });
                    }

                    if elapsed_secs >= max_secs {
                        break Exit::Finish(StopReason::MaxDurationReached);
                    }
                }

                chunk = frames.recv() => match chunk {
                    Some(MediaChunk::Audio(frame)) => encoder.push_audio(&frame),
                    Some(MediaChunk::Video(chunk)) => encoder.push_video(&chunk),
                    Some(MediaChunk::Fault(reason)) => break Exit::Fault(reason),
                    None => break Exit::Fault("capture stream closed unexpectedly".to_string()),
                },
            }
        };

        // Media delivered before the stop still belongs to this recording
        if matches!(exit, Exit::Finish(_)) {
            while let Ok(chunk) = frames.try_recv() {
                match chunk {
                    MediaChunk::Audio(frame) => encoder.push_audio(&frame),
                    MediaChunk::Video(chunk) => encoder.push_video(&chunk),
                    MediaChunk::Fault(_) => break,
                }
            }
        }
        drop(frames);

        if let Err(e) = device.stop().await {
            warn!("Failed to stop capture device {}: {}", device.name(), e);
        }

        let outcome = match exit {
            Exit::Finish(reason) => {
                let duration = match reason {
                    StopReason::MaxDurationReached => config.max_duration(),
                    StopReason::UserStopped => started.elapsed().min(config.max_duration()),
                };
                debug!(
                    "Finalizing recording: {} samples over {:.1}s",
                    encoder.sample_count(),
                    duration.as_secs_f64()
                );

                match encoder.finish(duration, reason) {
                    Ok(artifact) => {
                        if reason == StopReason::MaxDurationReached {
                            info!("Recording auto-stopped at {}s limit", max_secs);
                            let _ = events.send(CaptureEvent::MaxDurationReached {
                                duration_secs: max_secs,
                            });
                        }
                        transition(&state, &events, CaptureState::Stopped(reason));
                        RecordingOutcome::Finished(artifact)
                    }
                    Err(e) => {
                        error!("Failed to encode recording: {}", e);
                        transition(&state, &events, CaptureState::Ready);
                        RecordingOutcome::Failed(e)
                    }
                }
            }
            Exit::Discard => {
                info!("Recording discarded");
                transition(&state, &events, CaptureState::Ready);
                RecordingOutcome::Discarded
            }
            Exit::Abandoned => {
                device.release().await;
                info!("Recording abandoned; released {}", device.name());
                transition(&state, &events, CaptureState::Idle);
                RecordingOutcome::Discarded
            }
            Exit::Fault(reason) => {
                error!("Capture device {} failed: {}", device.name(), reason);
                let _ = events.send(CaptureEvent::Aborted {
                    reason: reason.clone(),
                });
                transition(&state, &events, CaptureState::Ready);
                RecordingOutcome::Failed(CaptureError::Device(reason))
            }
        };

        (device, outcome)
    }
}

fn transition(
    state: &watch::Sender<CaptureState>,
    events: &broadcast::Sender<CaptureEvent>,
    next: CaptureState,
) {
    let previous = state.send_replace(next.clone());
    if previous != next {
        info!("Capture state: {} -> {}", previous, next);
        let _ = events.send(CaptureEvent::StateChanged(next));
    }
}

fn invalid_state(action: &'static str, state: &CaptureState) -> CaptureError {
    CaptureError::InvalidState {
        action,
        state: state.to_string(),
    }
}

fn device_unavailable() -> CaptureError {
    CaptureError::Device("capture device unavailable".to_string())
}
