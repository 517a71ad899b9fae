//! Answer analysis
//!
//! Two request contracts (text-only and media upload) normalized into one
//! `AnalysisResult` variant type.

mod client;
mod progress;
mod submitter;
mod types;
mod wire;

pub use client::{AnalysisService, AnalysisServiceConfig, HttpAnalysisService};
pub use progress::{AnalysisProgress, AnalysisStage, ProgressReporter, UPLOAD_PERCENT_MAX};
pub use submitter::AnalysisSubmitter;
pub use types::{
    AdvancedAnalysis, AnalysisContext, AnalysisResult, BaseAnalysis, BodyLanguageAnalysis,
    FeedbackMetrics, ScoreBreakdown, SpeechAnalysis, Transcription,
};
pub use wire::{AdvancedAnalysisRequest, AnalysisResponse, FeedbackBody, StandardAnalysisRequest};
