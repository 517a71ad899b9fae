//! Session results: grading, report and text export

mod aggregator;
mod grade;
mod report;

pub use aggregator::ResultsAggregator;
pub use grade::Grade;
pub use report::{mean_score, QuestionReport, SessionReport};
