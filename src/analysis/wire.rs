//! Analysis service wire format
//!
//! Both endpoints answer with the same loosely-typed JSON shape; the advanced
//! endpoint adds four media sections. Normalization checks required fields,
//! clamps score-like values into 0-100 and picks the result variant.

use serde::{Deserialize, Serialize};

use super::types::{
    AdvancedAnalysis, AnalysisContext, AnalysisResult, BaseAnalysis, BodyLanguageAnalysis,
    FeedbackMetrics, ScoreBreakdown, SpeechAnalysis, Transcription,
};
use crate::catalog::ExperienceLevel;
use crate::error::AnalysisError;

/// Body of `POST /analyze/standard`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardAnalysisRequest {
    pub question_text: String,
    pub answer_text: String,
    pub domain_id: String,
    pub level: ExperienceLevel,
    pub keywords: Vec<String>,
}

impl StandardAnalysisRequest {
    pub fn new(context: &AnalysisContext, answer_text: &str) -> Self {
        Self {
            question_text: context.question_text.clone(),
            answer_text: answer_text.to_string(),
            domain_id: context.domain_id.clone(),
            level: context.level,
            keywords: context.keywords.clone(),
        }
    }
}

/// Text fields of the `POST /analyze/advanced` multipart body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedAnalysisRequest {
    pub question_text: String,
    pub domain_id: String,
    pub level: ExperienceLevel,
    pub user_id: String,
    pub session_id: String,
    pub keywords: Vec<String>,
}

impl From<&AnalysisContext> for AdvancedAnalysisRequest {
    fn from(context: &AnalysisContext) -> Self {
        Self {
            question_text: context.question_text.clone(),
            domain_id: context.domain_id.clone(),
            level: context.level,
            user_id: context.user_id.clone(),
            session_id: context.session_id.clone(),
            keywords: context.keywords.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackBody {
    pub technical_accuracy: Option<f64>,
    pub clarity: Option<f64>,
    pub relevance: Option<f64>,
}

/// Response of either endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub score: Option<f64>,
    pub feedback: Option<FeedbackBody>,
    pub strengths: Option<Vec<String>>,
    pub improvements: Option<Vec<String>>,
    pub overall_assessment: Option<String>,
    pub domain_specific_insights: Option<String>,
    pub transcription: Option<Transcription>,
    pub speech_analysis: Option<SpeechAnalysis>,
    pub body_language_analysis: Option<BodyLanguageAnalysis>,
    pub score_breakdown: Option<ScoreBreakdown>,
}

impl AnalysisResponse {
    /// Normalize a `/analyze/standard` response. Media sections are ignored.
    pub fn into_standard(self) -> Result<AnalysisResult, AnalysisError> {
        let (base, _) = self.split_base()?;
        Ok(AnalysisResult::Standard(base))
    }

    /// Normalize a `/analyze/advanced` response. Every media section is required.
    pub fn into_advanced(self) -> Result<AnalysisResult, AnalysisError> {
        let (base, media) = self.split_base()?;

        let score_breakdown = media.score_breakdown.ok_or_else(|| missing("scoreBreakdown"))?;
        let speech_analysis = media.speech_analysis.ok_or_else(|| missing("speechAnalysis"))?;
        let body_language_analysis = media
            .body_language_analysis
            .ok_or_else(|| missing("bodyLanguageAnalysis"))?;
        let transcription = media.transcription.ok_or_else(|| missing("transcription"))?;

        Ok(AnalysisResult::Advanced(AdvancedAnalysis {
            base,
            score_breakdown: ScoreBreakdown {
                content: clamp_score(score_breakdown.content),
                delivery: clamp_score(score_breakdown.delivery),
                body_language: clamp_score(score_breakdown.body_language),
            },
            speech_analysis,
            body_language_analysis: BodyLanguageAnalysis {
                eye_contact: clamp_score(body_language_analysis.eye_contact),
                body_movement: clamp_score(body_language_analysis.body_movement),
                overall_presence: clamp_score(body_language_analysis.overall_presence),
                recommendations: body_language_analysis.recommendations,
            },
            transcription,
        }))
    }

    fn split_base(self) -> Result<(BaseAnalysis, MediaSections), AnalysisError> {
        let score = self.score.ok_or_else(|| missing("score"))?;
        let feedback = self.feedback.ok_or_else(|| missing("feedback"))?;
        let overall_assessment = self
            .overall_assessment
            .ok_or_else(|| missing("overallAssessment"))?;

        let base = BaseAnalysis {
            score: clamp_score(score),
            feedback: FeedbackMetrics {
                technical_accuracy: clamp_score(
                    feedback
                        .technical_accuracy
                        .ok_or_else(|| missing("feedback.technicalAccuracy"))?,
                ),
                clarity: clamp_score(feedback.clarity.ok_or_else(|| missing("feedback.clarity"))?),
                relevance: clamp_score(
                    feedback.relevance.ok_or_else(|| missing("feedback.relevance"))?,
                ),
            },
            strengths: self.strengths.unwrap_or_default(),
            improvements: self.improvements.unwrap_or_default(),
            overall_assessment,
            domain_specific_insights: self
                .domain_specific_insights
                .filter(|s| !s.trim().is_empty()),
        };

        let media = MediaSections {
            transcription: self.transcription,
            speech_analysis: self.speech_analysis,
            body_language_analysis: self.body_language_analysis,
            score_breakdown: self.score_breakdown,
        };

        Ok((base, media))
    }
}

struct MediaSections {
    transcription: Option<Transcription>,
    speech_analysis: Option<SpeechAnalysis>,
    body_language_analysis: Option<BodyLanguageAnalysis>,
    score_breakdown: Option<ScoreBreakdown>,
}

fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

fn missing(field: &str) -> AnalysisError {
    AnalysisError::MalformedResponse(format!("missing field `{}`", field))
}
