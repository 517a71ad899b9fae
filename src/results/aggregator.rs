use std::sync::Arc;
use tracing::{error, info, warn};

use super::report::SessionReport;
use crate::persistence::{SessionRecord, SessionSink};
use crate::session::{Answer, Session};

/// Turns a completed session into a report and requests persistence
#[derive(Clone)]
pub struct ResultsAggregator {
    sink: Arc<dyn SessionSink>,
}

impl ResultsAggregator {
    pub fn new(sink: Arc<dyn SessionSink>) -> Self {
        Self { sink }
    }

    /// Build the report and persist the session in the background
    ///
    /// The report does not depend on the outcome of the save.
    pub fn aggregate(&self, session: &Session, answers: &[Answer]) -> SessionReport {
        let report = SessionReport::build(session, answers);

        info!(
            "Session {} scored {:.2} ({}) over {} answers",
            session.id,
            report.overall_score,
            report.grade,
            answers.len()
        );

        self.persist(SessionRecord::new(session, answers, &report));
        report
    }

    fn persist(&self, record: SessionRecord) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                "No async runtime; session {} was not persisted",
                record.session.id
            );
            return;
        };

        let sink = Arc::clone(&self.sink);
        runtime.spawn(async move {
            match sink.save(&record).await {
                Ok(()) => info!("Session {} saved via {}", record.session.id, sink.name()),
                Err(e) => error!(
                    "Failed to save session {} via {}: {}",
                    record.session.id,
                    sink.name(),
                    e
                ),
            }
        });
    }
}
