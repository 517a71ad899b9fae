use bytes::Bytes;
use std::io::Cursor;
use std::time::Duration;
use tracing::debug;

use super::artifact::{RecordingArtifact, StopReason};
use super::device::{AudioFrame, CaptureDeviceConfig, VideoChunk};
use crate::error::CaptureError;

/// Accumulates captured media and encodes it once the recording stops
///
/// Audio is buffered as PCM and written out as a single in-memory WAV file.
/// Video chunks arrive already encoded and are concatenated in order.
pub struct RecordingEncoder {
    sample_rate: u32,
    channels: u16,
    samples: Vec<i16>,
    video: Vec<u8>,
    video_mime: Option<String>,
    format_locked: bool,
}

impl RecordingEncoder {
    pub fn new(config: &CaptureDeviceConfig, video_mime: Option<String>) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            samples: Vec::new(),
            video: Vec::new(),
            video_mime,
            format_locked: false,
        }
    }

    pub fn push_audio(&mut self, frame: &AudioFrame) {
        // The first frame decides the stream format
        if !self.format_locked {
            self.sample_rate = frame.sample_rate;
            self.channels = frame.channels;
            self.format_locked = true;
        }
        self.samples.extend_from_slice(&frame.samples);
    }

    pub fn push_video(&mut self, chunk: &VideoChunk) {
        self.video.extend_from_slice(&chunk.data);
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn finish(
        self,
        duration: Duration,
        stop_reason: StopReason,
    ) -> Result<RecordingArtifact, CaptureError> {
        let audio = encode_wav(&self.samples, self.sample_rate, self.channels)?;

        debug!(
            "Encoded recording: {} samples, {} audio bytes, {} video bytes",
            self.samples.len(),
            audio.len(),
            self.video.len()
        );

        let video = (!self.video.is_empty()).then(|| Bytes::from(self.video));
        let video_mime = video.as_ref().and(self.video_mime);

        Ok(RecordingArtifact {
            audio,
            audio_mime: "audio/wav".to_string(),
            video,
            video_mime,
            duration,
            stop_reason,
        })
    }
}

/// Encode interleaved 16-bit PCM as a WAV file held in memory
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Bytes, CaptureError> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut buffer = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut buffer, spec)
            .map_err(|e| CaptureError::Encoding(e.to_string()))?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| CaptureError::Encoding(e.to_string()))?;
        }

        writer
            .finalize()
            .map_err(|e| CaptureError::Encoding(e.to_string()))?;
    }

    Ok(Bytes::from(buffer.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_wav_round_trips_through_hound() {
        let samples: Vec<i16> = (0..1600).map(|i| (i % 128) as i16).collect();
        let wav = encode_wav(&samples, 16000, 1).unwrap();

        let reader = hound::WavReader::new(Cursor::new(wav.to_vec())).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);
        let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_encoder_uses_first_frame_format_and_concatenates_video() {
        let mut encoder = RecordingEncoder::new(
            &CaptureDeviceConfig::default(),
            Some("video/webm".to_string()),
        );
        encoder.push_audio(&AudioFrame {
            samples: vec![1, 2, 3, 4],
            sample_rate: 48000,
            channels: 2,
            timestamp_ms: 0,
        });
        encoder.push_video(&VideoChunk { data: vec![1, 2], timestamp_ms: 0 });
        encoder.push_video(&VideoChunk { data: vec![3], timestamp_ms: 100 });

        let artifact = encoder
            .finish(Duration::from_secs(1), StopReason::UserStopped)
            .unwrap();

        let reader = hound::WavReader::new(Cursor::new(artifact.audio.to_vec())).unwrap();
        assert_eq!(reader.spec().sample_rate, 48000);
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(artifact.video.as_deref(), Some(&[1u8, 2, 3][..]));
        assert_eq!(artifact.video_mime.as_deref(), Some("video/webm"));
    }

    #[test]
    fn test_encoder_without_video_has_no_video_mime() {
        let encoder =
            RecordingEncoder::new(&CaptureDeviceConfig::default(), Some("video/webm".into()));
        let artifact = encoder
            .finish(Duration::ZERO, StopReason::UserStopped)
            .unwrap();
        assert!(artifact.video.is_none());
        assert!(artifact.video_mime.is_none());
        // Header-only WAV still counts as audio data
        assert!(!artifact.audio.is_empty());
    }
}
