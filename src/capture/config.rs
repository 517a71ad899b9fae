use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::device::CaptureDeviceConfig;

/// Configuration for the capture manager
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Hard limit for a single recording; capture auto-stops here
    /// Default: 600 seconds (10 minutes)
    pub max_duration_secs: u64,

    /// How long before the limit the "approaching limit" signal fires
    pub warning_threshold_secs: u64,

    /// Sample rate requested from the device
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Audio frame size requested from the device
    pub frame_duration_ms: u64,

    /// Record video alongside audio
    pub capture_video: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 600,
            warning_threshold_secs: 30,
            sample_rate: 16000,
            channels: 1,
            frame_duration_ms: 100,
            capture_video: false,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_duration_secs == 0 {
            return Err("max_duration_secs must be greater than zero".to_string());
        }
        if self.warning_threshold_secs >= self.max_duration_secs {
            return Err(format!(
                "warning_threshold_secs ({}) must be below max_duration_secs ({})",
                self.warning_threshold_secs, self.max_duration_secs
            ));
        }
        Ok(())
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }

    /// Elapsed second at which the approaching-limit signal fires
    pub fn warning_at_secs(&self) -> u64 {
        self.max_duration_secs.saturating_sub(self.warning_threshold_secs)
    }

    pub fn device_config(&self) -> CaptureDeviceConfig {
        CaptureDeviceConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            frame_duration_ms: self.frame_duration_ms,
            capture_video: self.capture_video,
        }
    }
}
