pub mod analysis;
pub mod capture;
pub mod catalog;
pub mod config;
pub mod error;
pub mod http;
pub mod persistence;
pub mod results;
pub mod session;

pub use analysis::{
    AnalysisProgress, AnalysisResult, AnalysisService, AnalysisStage, AnalysisSubmitter,
    HttpAnalysisService, ProgressReporter,
};
pub use capture::{
    CaptureConfig, CaptureDevice, CaptureEvent, CaptureManager, CaptureState, FileDevice,
    RecordingArtifact, StopReason,
};
pub use catalog::{Domain, ExperienceLevel, InMemoryCatalog, Question, QuestionCatalog};
pub use config::Config;
pub use error::{AnalysisError, CaptureError, CatalogError, PersistenceError, SessionError};
pub use http::{create_router, AppState};
pub use persistence::{NatsSessionSink, SessionRecord, SessionSink, TracingSessionSink};
pub use results::{Grade, ResultsAggregator, SessionReport};
pub use session::{
    AnalysisMode, Answer, AnswerInput, NotificationSink, Session, SessionConfig,
    SessionController, SessionDeps, SessionEvent, SessionHandle, SessionPhase, TracingNotifier,
};
