use serde::{Deserialize, Serialize};

use super::model::AnalysisMode;
use crate::catalog::ExperienceLevel;

/// Parameters for a new practice session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Catalog domain identifier (e.g., "backend")
    pub domain_id: String,

    pub level: ExperienceLevel,

    /// Number of questions to ask; the catalog may supply fewer
    pub question_count: usize,

    /// Fixed for the whole session
    pub analysis_mode: AnalysisMode,

    /// Owner of the session, forwarded to the analysis service and the
    /// persistence sink
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

fn default_user_id() -> String {
    "anonymous".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            domain_id: "backend".to_string(),
            level: ExperienceLevel::Mid,
            question_count: 5,
            analysis_mode: AnalysisMode::Standard,
            user_id: default_user_id(),
        }
    }
}
