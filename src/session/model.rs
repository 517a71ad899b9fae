use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::state::SessionPhase;
use crate::analysis::{AnalysisProgress, AnalysisResult, Transcription};
use crate::capture::{CaptureState, RecordingSummary};
use crate::catalog::{ExperienceLevel, Question};

/// How answers are given and scored; fixed for a session's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Typed text answers
    Standard,
    /// Recorded audio/video answers
    Advanced,
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisMode::Standard => write!(f, "standard"),
            AnalysisMode::Advanced => write!(f, "advanced"),
        }
    }
}

impl FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" | "text" => Ok(AnalysisMode::Standard),
            "advanced" | "media" => Ok(AnalysisMode::Advanced),
            other => Err(format!("unknown analysis mode: {}", other)),
        }
    }
}

/// A configured practice session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub domain_id: String,
    pub level: ExperienceLevel,
    pub analysis_mode: AnalysisMode,
    pub questions: Vec<Question>,
    pub total_questions: usize,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }
}

/// What the candidate gave for one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerContent {
    Text { text: String },
    /// The artifact itself is discarded after analysis
    Recording { recording: RecordingSummary },
}

/// A scored answer. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question_index: usize,
    pub question: Question,
    pub content: AnswerContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcription: Option<Transcription>,
    pub analysis: AnalysisResult,
    pub answered_at: DateTime<Utc>,
}

impl Answer {
    pub fn score(&self) -> f64 {
        self.analysis.score()
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            AnswerContent::Text { text } => Some(text),
            AnswerContent::Recording { .. } => None,
        }
    }
}

/// Input to `submit_answer`
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerInput {
    /// A typed answer (standard mode)
    Text(String),
    /// Use the recording staged for the current question (advanced mode)
    Recording,
}

impl AnswerInput {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            AnswerInput::Text(_) => "text",
            AnswerInput::Recording => "recorded",
        }
    }
}

/// Result of a successful submission
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Moved on to the next question
    Advanced { current_index: usize, score: f64 },
    /// That was the last question
    Completed {
        report: crate::results::SessionReport,
    },
}

/// Where the session stands after `go_to_previous`
#[derive(Debug, Clone, Serialize)]
pub struct PreviousQuestion {
    pub index: usize,
    pub question: Question,
    /// The earlier text answer, for editing (standard mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_answer: Option<String>,
}

/// Snapshot of a running session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub phase: SessionPhase,
    pub analysis_mode: AnalysisMode,
    pub current_index: usize,
    pub total_questions: usize,
    pub answered: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_state: Option<CaptureState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staged_recording: Option<RecordingSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<AnalysisProgress>,
}
