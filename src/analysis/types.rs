use serde::{Deserialize, Serialize};

use crate::catalog::ExperienceLevel;

/// Per-answer content metrics, each 0-100
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackMetrics {
    pub technical_accuracy: f64,
    pub clarity: f64,
    pub relevance: f64,
}

/// Fields every analysis carries regardless of mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseAnalysis {
    /// Overall score, 0-100
    pub score: f64,
    pub feedback: FeedbackMetrics,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub overall_assessment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_specific_insights: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub content: f64,
    pub delivery: f64,
    pub body_language: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechAnalysis {
    pub words_per_minute: f64,
    pub filler_word_count: u32,
    pub filler_word_percentage: f64,
    pub confidence: f64,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyLanguageAnalysis {
    pub eye_contact: f64,
    pub body_movement: f64,
    pub overall_presence: f64,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcription {
    pub text: String,
    pub word_count: u32,
    /// Seconds of speech transcribed
    pub duration: f64,
    pub confidence: f64,
}

/// Result of the media-based analysis: the base fields plus delivery insights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedAnalysis {
    #[serde(flatten)]
    pub base: BaseAnalysis,
    pub score_breakdown: ScoreBreakdown,
    pub speech_analysis: SpeechAnalysis,
    pub body_language_analysis: BodyLanguageAnalysis,
    pub transcription: Transcription,
}

/// Normalized analysis of one answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisResult {
    Standard(BaseAnalysis),
    Advanced(AdvancedAnalysis),
}

impl AnalysisResult {
    pub fn base(&self) -> &BaseAnalysis {
        match self {
            AnalysisResult::Standard(base) => base,
            AnalysisResult::Advanced(advanced) => &advanced.base,
        }
    }

    pub fn score(&self) -> f64 {
        self.base().score
    }

    pub fn advanced(&self) -> Option<&AdvancedAnalysis> {
        match self {
            AnalysisResult::Standard(_) => None,
            AnalysisResult::Advanced(advanced) => Some(advanced),
        }
    }

    pub fn transcription(&self) -> Option<&Transcription> {
        self.advanced().map(|a| &a.transcription)
    }
}

/// Question and session context sent with every analysis request
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisContext {
    pub question_text: String,
    pub domain_id: String,
    pub level: ExperienceLevel,
    pub keywords: Vec<String>,
    pub user_id: String,
    pub session_id: String,
}
