use std::sync::Arc;
use tracing::{info, warn};

use super::client::AnalysisService;
use super::progress::{AnalysisStage, ProgressReporter};
use super::types::{AnalysisContext, AnalysisResult};
use super::wire::{AdvancedAnalysisRequest, StandardAnalysisRequest};
use crate::capture::RecordingArtifact;
use crate::error::AnalysisError;

/// Validates answers locally and forwards them to the analysis service
///
/// Precondition failures return `AnalysisError::Validation` without touching
/// the network. Service failures are returned as-is; there is no retry.
#[derive(Clone)]
pub struct AnalysisSubmitter {
    service: Arc<dyn AnalysisService>,
}

impl AnalysisSubmitter {
    pub fn new(service: Arc<dyn AnalysisService>) -> Self {
        Self { service }
    }

    pub async fn analyze_standard(
        &self,
        context: &AnalysisContext,
        answer_text: &str,
    ) -> Result<AnalysisResult, AnalysisError> {
        let answer_text = answer_text.trim();
        if answer_text.is_empty() {
            return Err(AnalysisError::Validation(
                "answer text must not be empty".to_string(),
            ));
        }

        let request = StandardAnalysisRequest::new(context, answer_text);
        let result = self.service.analyze_standard(&request).await;

        if let Err(e) = &result {
            warn!(session = %context.session_id, "Standard analysis failed: {}", e);
        }
        result
    }

    /// Analyze a recorded answer. The artifact is borrowed so the caller
    /// keeps it for a manual retry.
    pub async fn analyze_advanced(
        &self,
        context: &AnalysisContext,
        recording: Option<&RecordingArtifact>,
        progress: &ProgressReporter,
    ) -> Result<AnalysisResult, AnalysisError> {
        let recording = recording.ok_or_else(|| {
            AnalysisError::Validation("a recorded answer is required".to_string())
        })?;
        if recording.is_empty() {
            return Err(AnalysisError::Validation(
                "recording contains no audio".to_string(),
            ));
        }

        info!(
            session = %context.session_id,
            duration_secs = recording.duration_secs(),
            max_time_reached = recording.max_time_reached(),
            "Submitting recorded answer"
        );

        progress.report(AnalysisStage::Uploading, 0);

        let request = AdvancedAnalysisRequest::from(context);
        match self
            .service
            .analyze_advanced(&request, recording, progress)
            .await
        {
            Ok(result) => {
                progress.complete();
                Ok(result)
            }
            Err(e) => {
                warn!(session = %context.session_id, "Advanced analysis failed: {}", e);
                Err(e)
            }
        }
    }
}
