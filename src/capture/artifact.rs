use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::time::Duration;

/// Why a recording ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The user stopped the recording
    UserStopped,
    /// The capture manager auto-stopped at the configured maximum
    MaxDurationReached,
}

/// Encoded output of one completed recording attempt
///
/// Moved out of the capture manager when a recording stops and discarded once
/// its answer has been analysed. It is never mutated after creation.
pub struct RecordingArtifact {
    pub audio: Bytes,
    pub audio_mime: String,
    pub video: Option<Bytes>,
    pub video_mime: Option<String>,
    pub duration: Duration,
    pub stop_reason: StopReason,
}

impl RecordingArtifact {
    /// Build an artifact from media recorded elsewhere (e.g. uploaded)
    pub fn from_upload(audio: Vec<u8>, video: Option<Vec<u8>>, duration_secs: f64) -> Self {
        let has_video = video.is_some();
        Self {
            audio: Bytes::from(audio),
            audio_mime: "audio/wav".to_string(),
            video: video.map(Bytes::from),
            video_mime: has_video.then(|| "video/webm".to_string()),
            duration: Duration::from_secs_f64(duration_secs.max(0.0)),
            stop_reason: StopReason::UserStopped,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    pub fn max_time_reached(&self) -> bool {
        self.stop_reason == StopReason::MaxDurationReached
    }

    /// True when the recording holds nothing to analyse
    ///
    /// An encoded WAV always carries a header, so the sample count is read
    /// from it rather than trusting the byte length.
    pub fn is_empty(&self) -> bool {
        if self.audio.is_empty() || self.duration.is_zero() {
            return true;
        }
        self.audio_mime == "audio/wav" && wav_sample_count(&self.audio) == Some(0)
    }
}

fn wav_sample_count(audio: &[u8]) -> Option<u32> {
    hound::WavReader::new(Cursor::new(audio))
        .ok()
        .map(|reader| reader.len())
}

impl fmt::Debug for RecordingArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingArtifact")
            .field("audio_bytes", &self.audio.len())
            .field("audio_mime", &self.audio_mime)
            .field("video_bytes", &self.video.as_ref().map(|v| v.len()))
            .field("duration", &self.duration)
            .field("stop_reason", &self.stop_reason)
            .finish()
    }
}

/// Lightweight description of a staged recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub duration_secs: f64,
    pub audio_bytes: usize,
    pub has_video: bool,
    pub stop_reason: StopReason,
}

impl From<&RecordingArtifact> for RecordingSummary {
    fn from(artifact: &RecordingArtifact) -> Self {
        Self {
            duration_secs: artifact.duration_secs(),
            audio_bytes: artifact.audio.len(),
            has_video: artifact.video.is_some(),
            stop_reason: artifact.stop_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::encode_wav;

    #[test]
    fn test_header_only_wav_is_empty() {
        let header_only = encode_wav(&[], 16000, 1).unwrap();
        assert!(!header_only.is_empty());

        let artifact = RecordingArtifact::from_upload(header_only.to_vec(), None, 2.0);
        assert!(artifact.is_empty());
    }

    #[test]
    fn test_zero_duration_is_empty() {
        let audio = encode_wav(&[0i16; 1600], 16000, 1).unwrap();

        assert!(RecordingArtifact::from_upload(audio.to_vec(), None, 0.0).is_empty());
        assert!(!RecordingArtifact::from_upload(audio.to_vec(), None, 0.1).is_empty());
    }

    #[test]
    fn test_undecodable_upload_is_left_to_the_service() {
        let artifact = RecordingArtifact::from_upload(b"opaque media".to_vec(), None, 1.0);
        assert!(!artifact.is_empty());
    }
}
