use tokio::sync::mpsc;

use crate::error::CaptureError;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since recording started
    pub timestamp_ms: u64,
}

/// Already-encoded video data emitted by a camera
#[derive(Debug, Clone)]
pub struct VideoChunk {
    pub data: Vec<u8>,
    pub timestamp_ms: u64,
}

/// Everything a device can push while capturing
#[derive(Debug, Clone)]
pub enum MediaChunk {
    Audio(AudioFrame),
    Video(VideoChunk),
    /// The device failed; the current recording attempt must be aborted
    Fault(String),
}

/// Configuration handed to capture devices
#[derive(Debug, Clone)]
pub struct CaptureDeviceConfig {
    /// Target sample rate (devices resample if needed)
    pub sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Duration of each emitted audio frame
    pub frame_duration_ms: u64,
    /// Whether video should be captured alongside audio
    pub capture_video: bool,
}

impl Default for CaptureDeviceConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            frame_duration_ms: 100,
            capture_video: false,
        }
    }
}

/// Platform capture boundary wrapped by the capture manager
///
/// Implementations:
/// - `FileDevice`: replays an audio file at real time (CLI practice, tests)
/// - platform microphone/camera backends live outside this crate
#[async_trait::async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Ask the platform for microphone (and camera) access
    async fn request_permission(&mut self) -> Result<(), CaptureError>;

    /// Start capturing
    ///
    /// Returns a channel receiver that will receive media chunks. Closing the
    /// channel while capturing counts as a device fault.
    async fn start(&mut self) -> Result<mpsc::Receiver<MediaChunk>, CaptureError>;

    /// Stop capturing, keeping permission for a later `start`
    async fn stop(&mut self) -> Result<(), CaptureError>;

    /// Release every platform handle acquired by this device
    async fn release(&mut self);

    /// Check if device is currently capturing
    fn is_capturing(&self) -> bool;

    /// MIME type of emitted video chunks, if this device records video
    fn video_mime_type(&self) -> Option<&str> {
        None
    }

    /// Get device name for logging
    fn name(&self) -> &str;
}
