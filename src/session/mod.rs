//! Practice session management
//!
//! This module provides the session controller that drives:
//! - question selection from the catalog
//! - the per-question answer, record and submit cycle
//! - analysis submission with retry on failure
//! - cancellation at any suspension point
//! - hand-off of completed sessions to the results aggregator

mod config;
mod controller;
mod events;
mod model;
mod state;

pub use config::SessionConfig;
pub use controller::{SessionController, SessionDeps, SessionHandle};
pub use events::{NotificationLevel, NotificationSink, SessionEvent, TracingNotifier};
pub use model::{
    AnalysisMode, Answer, AnswerContent, AnswerInput, PreviousQuestion, Session, SessionStatus,
    SubmitOutcome,
};
pub use state::{SessionMachine, SessionPhase};
