use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::results::{Grade, SessionReport};
use crate::session::{Answer, Session};

/// Completed session as handed to a persistence sink
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub user_id: String,
    pub session: Session,
    pub answers: Vec<Answer>,
    pub overall_score: f64,
    pub grade: Grade,
    pub saved_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(session: &Session, answers: &[Answer], report: &SessionReport) -> Self {
        Self {
            user_id: session.user_id.clone(),
            session: session.clone(),
            answers: answers.to_vec(),
            overall_score: report.overall_score,
            grade: report.grade,
            saved_at: Utc::now(),
        }
    }
}
