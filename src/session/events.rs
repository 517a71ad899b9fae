use serde::Serialize;
use tracing::{error, info, warn};

use super::state::SessionPhase;
use crate::analysis::AnalysisProgress;
use crate::capture::CaptureEvent;

/// Events published to session subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    PhaseChanged {
        phase: SessionPhase,
        current_index: usize,
    },
    AnalysisProgress {
        question_index: usize,
        progress: AnalysisProgress,
    },
    AnswerAccepted {
        question_index: usize,
        score: f64,
    },
    AnalysisFailed {
        question_index: usize,
        error: String,
        retryable: bool,
    },
    Capture {
        event: CaptureEvent,
    },
    Completed {
        overall_score: f64,
        grade: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// User-facing notifications (toasts and the like)
///
/// Injected into the session controller so the engine itself stays free of
/// any presentation concern.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, level: NotificationLevel, message: &str);
}

/// Routes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, level: NotificationLevel, message: &str) {
        match level {
            NotificationLevel::Info => info!("{}", message),
            NotificationLevel::Warning => warn!("{}", message),
            NotificationLevel::Error => error!("{}", message),
        }
    }
}
