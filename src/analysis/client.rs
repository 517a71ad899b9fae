//! HTTP client for the external analysis service

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::progress::{ProgressReporter, UploadTracker};
use super::types::AnalysisResult;
use super::wire::{AdvancedAnalysisRequest, AnalysisResponse, StandardAnalysisRequest};
use crate::capture::RecordingArtifact;
use crate::error::AnalysisError;

const USER_AGENT: &str = concat!("interview-coach/", env!("CARGO_PKG_VERSION"));

/// Network boundary of the analysis submitter
///
/// Implementations perform exactly one request per call and never retry.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze_standard(
        &self,
        request: &StandardAnalysisRequest,
    ) -> Result<AnalysisResult, AnalysisError>;

    /// Upload the recording and return the advanced result.
    ///
    /// Reports `Uploading`/`Analyzing` progress; `Complete` is left to the caller.
    async fn analyze_advanced(
        &self,
        request: &AdvancedAnalysisRequest,
        recording: &RecordingArtifact,
        progress: &ProgressReporter,
    ) -> Result<AnalysisResult, AnalysisError>;
}

/// Analysis service connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisServiceConfig {
    pub base_url: String,

    /// Timeout for `/analyze/standard`
    pub request_timeout_secs: u64,

    /// Timeout for the whole `/analyze/advanced` exchange, upload included
    pub upload_timeout_secs: u64,

    /// Size of each streamed upload chunk; drives progress granularity
    pub upload_chunk_bytes: usize,
}

impl Default for AnalysisServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            request_timeout_secs: 60,
            upload_timeout_secs: 300,
            upload_chunk_bytes: 64 * 1024,
        }
    }
}

/// `AnalysisService` over reqwest
pub struct HttpAnalysisService {
    http_client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    upload_timeout: Duration,
    chunk_bytes: usize,
}

impl HttpAnalysisService {
    pub fn new(config: &AnalysisServiceConfig) -> Result<Self, AnalysisError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AnalysisError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            upload_timeout: Duration::from_secs(config.upload_timeout_secs),
            chunk_bytes: config.upload_chunk_bytes.max(1),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_response(response: reqwest::Response) -> Result<AnalysisResponse, AnalysisError> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Analysis service returned {}: {}", status, body);
            return Err(AnalysisError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await.map_err(AnalysisError::from_reqwest)?;
        serde_json::from_slice(&body).map_err(|e| AnalysisError::MalformedResponse(e.to_string()))
    }

    /// Multipart part streaming `data` in fixed-size chunks through `tracker`
    fn streamed_part(
        &self,
        data: &Bytes,
        file_name: &'static str,
        mime: &str,
        tracker: Arc<UploadTracker>,
    ) -> Result<Part, AnalysisError> {
        let chunks: Vec<Bytes> = (0..data.len())
            .step_by(self.chunk_bytes)
            .map(|start| data.slice(start..(start + self.chunk_bytes).min(data.len())))
            .collect();

        let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            tracker.advance(chunk.len());
            Ok::<_, std::io::Error>(chunk)
        }));

        Part::stream_with_length(reqwest::Body::wrap_stream(stream), data.len() as u64)
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|e| AnalysisError::Validation(format!("invalid media type {}: {}", mime, e)))
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn analyze_standard(
        &self,
        request: &StandardAnalysisRequest,
    ) -> Result<AnalysisResult, AnalysisError> {
        debug!(
            domain = %request.domain_id,
            level = %request.level,
            answer_chars = request.answer_text.len(),
            "Requesting standard analysis"
        );

        let response = self
            .http_client
            .post(self.url("/analyze/standard"))
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await
            .map_err(AnalysisError::from_reqwest)?;

        let result = Self::read_response(response).await?.into_standard()?;
        info!(score = result.score(), "Standard analysis received");
        Ok(result)
    }

    async fn analyze_advanced(
        &self,
        request: &AdvancedAnalysisRequest,
        recording: &RecordingArtifact,
        progress: &ProgressReporter,
    ) -> Result<AnalysisResult, AnalysisError> {
        let total = recording.audio.len() + recording.video.as_ref().map_or(0, |v| v.len());
        let tracker = Arc::new(UploadTracker::new(total as u64, progress.clone()));

        let keywords = serde_json::to_string(&request.keywords)
            .map_err(|e| AnalysisError::Validation(e.to_string()))?;

        let mut form = Form::new()
            .text("questionText", request.question_text.clone())
            .part(
                "audio",
                self.streamed_part(
                    &recording.audio,
                    "answer.wav",
                    &recording.audio_mime,
                    tracker.clone(),
                )?,
            )
            .text("domainId", request.domain_id.clone())
            .text("level", request.level.to_string())
            .text("userId", request.user_id.clone())
            .text("sessionId", request.session_id.clone())
            .text("keywords", keywords);

        if let (Some(video), Some(mime)) = (&recording.video, &recording.video_mime) {
            form = form.part(
                "video",
                self.streamed_part(video, "answer.webm", mime, tracker.clone())?,
            );
        }

        info!(
            session = %request.session_id,
            bytes = total,
            has_video = recording.video.is_some(),
            "Uploading recording for advanced analysis"
        );

        let response = self
            .http_client
            .post(self.url("/analyze/advanced"))
            .timeout(self.upload_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(AnalysisError::from_reqwest)?;

        // Body fully consumed by now
        tracker.advance(0);

        let result = Self::read_response(response).await?.into_advanced()?;
        info!(
            session = %request.session_id,
            score = result.score(),
            "Advanced analysis received"
        );
        Ok(result)
    }
}
