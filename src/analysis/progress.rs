use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Phase of an advanced analysis request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    Uploading,
    Analyzing,
    Complete,
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnalysisStage::Uploading => "uploading",
            AnalysisStage::Analyzing => "analyzing",
            AnalysisStage::Complete => "complete",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalysisProgress {
    pub stage: AnalysisStage,
    pub percent: u8,
}

/// Upload share of the progress range; the remainder covers server-side analysis
pub const UPLOAD_PERCENT_MAX: u8 = 90;

type ProgressCallback = dyn Fn(AnalysisProgress) + Send + Sync;

/// Forwards progress to a callback, enforcing a non-decreasing sequence
///
/// Percent and stage never go backwards, and 100 is only reported through
/// [`ProgressReporter::complete`].
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<Arc<ProgressCallback>>,
    last: Arc<Mutex<Option<AnalysisProgress>>>,
}

impl ProgressReporter {
    pub fn new(callback: impl Fn(AnalysisProgress) + Send + Sync + 'static) -> Self {
        Self {
            callback: Some(Arc::new(callback)),
            last: Arc::new(Mutex::new(None)),
        }
    }

    /// Reporter that tracks progress without forwarding it
    pub fn noop() -> Self {
        Self {
            callback: None,
            last: Arc::new(Mutex::new(None)),
        }
    }

    /// Reporter feeding an unbounded channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AnalysisProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = Self::new(move |progress| {
            let _ = tx.send(progress);
        });
        (reporter, rx)
    }

    pub fn report(&self, stage: AnalysisStage, percent: u8) {
        let percent = if stage == AnalysisStage::Complete {
            100
        } else {
            percent.min(99)
        };
        self.emit(AnalysisProgress { stage, percent });
    }

    pub fn complete(&self) {
        self.report(AnalysisStage::Complete, 100);
    }

    /// Most recent progress forwarded, if any
    pub fn last(&self) -> Option<AnalysisProgress> {
        self.last.lock().ok().and_then(|guard| *guard)
    }

    fn emit(&self, next: AnalysisProgress) {
        let Ok(mut last) = self.last.lock() else {
            return;
        };

        let next = match *last {
            Some(prev) => AnalysisProgress {
                stage: prev.stage.max(next.stage),
                percent: prev.percent.max(next.percent),
            },
            None => next,
        };

        if *last == Some(next) {
            return;
        }
        *last = Some(next);
        drop(last);

        if let Some(callback) = &self.callback {
            callback(next);
        }
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("last", &self.last())
            .finish()
    }
}

/// Translates uploaded byte counts into the 0-90 upload range
pub(crate) struct UploadTracker {
    total: u64,
    sent: Mutex<u64>,
    reporter: ProgressReporter,
}

impl UploadTracker {
    pub fn new(total: u64, reporter: ProgressReporter) -> Self {
        Self {
            total,
            sent: Mutex::new(0),
            reporter,
        }
    }

    pub fn advance(&self, bytes: usize) {
        let Ok(mut sent) = self.sent.lock() else {
            return;
        };
        *sent = (*sent + bytes as u64).min(self.total);
        let sent = *sent;

        if self.total == 0 || sent == self.total {
            self.reporter
                .report(AnalysisStage::Analyzing, UPLOAD_PERCENT_MAX);
            return;
        }

        let percent = (sent * UPLOAD_PERCENT_MAX as u64 / self.total) as u8;
        self.reporter.report(AnalysisStage::Uploading, percent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect() -> (ProgressReporter, Arc<Mutex<Vec<AnalysisProgress>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ProgressReporter::new(move |p| sink.lock().unwrap().push(p));
        (reporter, seen)
    }

    #[test]
    fn test_progress_never_decreases() {
        let (reporter, seen) = collect();

        reporter.report(AnalysisStage::Uploading, 40);
        reporter.report(AnalysisStage::Uploading, 20);
        reporter.report(AnalysisStage::Analyzing, 90);
        reporter.report(AnalysisStage::Uploading, 95);

        let seen = seen.lock().unwrap();
        let percents: Vec<u8> = seen.iter().map(|p| p.percent).collect();
        assert_eq!(percents, vec![40, 90, 95]);
        assert!(seen.iter().all(|p| p.stage != AnalysisStage::Uploading || p.percent < 90));
        assert_eq!(seen.last().unwrap().stage, AnalysisStage::Analyzing);
    }

    #[test]
    fn test_only_complete_reaches_100() {
        let (reporter, seen) = collect();

        reporter.report(AnalysisStage::Analyzing, 100);
        assert_eq!(reporter.last().unwrap().percent, 99);

        reporter.complete();
        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen.last().unwrap(),
            AnalysisProgress {
                stage: AnalysisStage::Complete,
                percent: 100
            }
        );
    }

    #[test]
    fn test_upload_tracker_maps_bytes_to_upload_range() {
        let (reporter, seen) = collect();
        let tracker = UploadTracker::new(1000, reporter);

        tracker.advance(250);
        tracker.advance(250);
        tracker.advance(500);

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                AnalysisProgress { stage: AnalysisStage::Uploading, percent: 22 },
                AnalysisProgress { stage: AnalysisStage::Uploading, percent: 45 },
                AnalysisProgress { stage: AnalysisStage::Analyzing, percent: 90 },
            ]
        );
    }
}
