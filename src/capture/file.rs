use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::device::{AudioFrame, CaptureDevice, CaptureDeviceConfig, MediaChunk};
use crate::error::CaptureError;

/// Decoded audio file contents (16-bit PCM, interleaved)
pub struct DecodedAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

/// Decode any symphonia-supported audio file to interleaved i16 PCM
pub fn decode_audio_file(path: &Path) -> Result<DecodedAudio, String> {
    let file = File::open(path).map_err(|e| format!("cannot open {}: {}", path.display(), e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| format!("unsupported media in {}: {}", path.display(), e))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| format!("no audio track in {}", path.display()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| format!("unsupported codec in {}: {}", path.display(), e))?;

    let mut sample_rate = codec_params.sample_rate.unwrap_or(16000);
    let mut channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(1);
    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(format!("failed to read {}: {}", path.display(), e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt packets are skipped
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(format!("failed to decode {}: {}", path.display(), e)),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count() as u16;

        let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Capture device that replays an audio file at real time
///
/// "Permission" amounts to being able to open and decode the file.
pub struct FileDevice {
    path: PathBuf,
    config: CaptureDeviceConfig,
    audio: Option<DecodedAudio>,
    feeder: Option<JoinHandle<()>>,
    name: String,
}

impl FileDevice {
    pub fn new(path: impl Into<PathBuf>, config: CaptureDeviceConfig) -> Self {
        let path = path.into();
        let name = format!("file:{}", path.display());
        Self {
            path,
            config,
            audio: None,
            feeder: None,
            name,
        }
    }

    /// Convert decoded audio to the configured target format
    fn convert(audio: &DecodedAudio, target_rate: u32, target_channels: u16) -> DecodedAudio {
        let mut samples = audio.samples.clone();
        let mut channels = audio.channels;
        let mut sample_rate = audio.sample_rate;

        // Convert to mono by summing channels
        if target_channels == 1 && channels == 2 {
            samples = samples
                .chunks_exact(2)
                .map(|pair| {
                    let sum = pair[0] as i32 + pair[1] as i32;
                    sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16
                })
                .collect();
            channels = 1;
        }

        // Downsample by decimation; upsampling is not supported
        let ratio = sample_rate / target_rate.max(1);
        if ratio > 1 {
            samples = samples
                .chunks_exact(channels as usize)
                .step_by(ratio as usize)
                .flatten()
                .copied()
                .collect();
            sample_rate /= ratio;
        }

        DecodedAudio {
            samples,
            sample_rate,
            channels,
        }
    }
}

#[async_trait::async_trait]
impl CaptureDevice for FileDevice {
    async fn request_permission(&mut self) -> Result<(), CaptureError> {
        if self.audio.is_some() {
            return Ok(());
        }

        let path = self.path.clone();
        let decoded = tokio::task::spawn_blocking(move || decode_audio_file(&path))
            .await
            .map_err(|e| CaptureError::PermissionDenied(e.to_string()))?
            .map_err(CaptureError::PermissionDenied)?;

        info!(
            "Audio file opened: {:.1}s, {}Hz, {} channels",
            decoded.duration_seconds(),
            decoded.sample_rate,
            decoded.channels
        );

        self.audio = Some(decoded);
        Ok(())
    }

    async fn start(&mut self) -> Result<mpsc::Receiver<MediaChunk>, CaptureError> {
        if self.feeder.is_some() {
            return Err(CaptureError::InvalidState {
                action: "start capture",
                state: "capturing".to_string(),
            });
        }

        let audio = self
            .audio
            .as_ref()
            .ok_or_else(|| CaptureError::PermissionDenied("file not opened".to_string()))?;

        let DecodedAudio {
            samples,
            sample_rate,
            channels,
        } = Self::convert(audio, self.config.sample_rate, self.config.channels);

        let frame_ms = self.config.frame_duration_ms.max(1);
        let frame_len =
            ((sample_rate as u64 * frame_ms / 1000) as usize * channels as usize).max(1);

        let (tx, rx) = mpsc::channel(100);

        let feeder = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(frame_ms));
            let mut timestamp_ms = 0;

            for chunk in samples.chunks(frame_len) {
                ticker.tick().await;
                let frame = AudioFrame {
                    samples: chunk.to_vec(),
                    sample_rate,
                    channels,
                    timestamp_ms,
                };
                if tx.send(MediaChunk::Audio(frame)).await.is_err() {
                    return;
                }
                timestamp_ms += frame_ms;
            }

            debug!("Audio file exhausted; holding stream open until stopped");
            tx.closed().await;
        });

        self.feeder = Some(feeder);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
        Ok(())
    }

    async fn release(&mut self) {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
        self.audio = None;
    }

    fn is_capturing(&self) -> bool {
        self.feeder.is_some()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_stereo_to_mono_and_decimate() {
        let audio = DecodedAudio {
            samples: vec![1, 1, 2, 2, 3, 3, 4, 4],
            sample_rate: 32000,
            channels: 2,
        };

        let converted = FileDevice::convert(&audio, 16000, 1);
        assert_eq!(converted.samples, vec![2, 6]);
        assert_eq!(converted.sample_rate, 16000);
        assert_eq!(converted.channels, 1);
    }

    #[test]
    fn test_convert_clamps_when_summing() {
        let audio = DecodedAudio {
            samples: vec![i16::MAX, i16::MAX],
            sample_rate: 16000,
            channels: 2,
        };

        assert_eq!(FileDevice::convert(&audio, 16000, 1).samples, vec![i16::MAX]);
    }
}
