//! Media capture
//!
//! The capture manager wraps a platform `CaptureDevice` and turns one
//! recording attempt into an immutable `RecordingArtifact`:
//! - permission acquisition with surfaced denial
//! - an elapsed-time ticker with a one-shot approaching-limit warning
//! - auto-stop at the configured maximum duration
//! - device release on every exit path

mod artifact;
mod config;
mod device;
mod encoder;
mod file;
mod manager;

pub use artifact::{RecordingArtifact, RecordingSummary, StopReason};
pub use config::CaptureConfig;
pub use device::{AudioFrame, CaptureDevice, CaptureDeviceConfig, MediaChunk, VideoChunk};
pub use encoder::{encode_wav, RecordingEncoder};
pub use file::{decode_audio_file, DecodedAudio, FileDevice};
pub use manager::{CaptureEvent, CaptureManager, CaptureState};
