//! Session controller actor
//!
//! One tokio task owns the session, its answers, the capture manager and the
//! staged recording. Callers talk to it through a cloneable [`SessionHandle`].
//! Analysis runs in a separate task and reports back with the submission
//! generation it was started under; anything from an older generation, or
//! arriving after cancellation, is dropped.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::SessionConfig;
use super::events::{NotificationLevel, NotificationSink, SessionEvent};
use super::model::{
    AnalysisMode, Answer, AnswerContent, AnswerInput, PreviousQuestion, Session, SessionStatus,
    SubmitOutcome,
};
use super::state::{SessionMachine, SessionPhase};
use crate::analysis::{
    AnalysisContext, AnalysisProgress, AnalysisResult, AnalysisSubmitter, ProgressReporter,
};
use crate::capture::{
    CaptureConfig, CaptureDevice, CaptureEvent, CaptureManager, CaptureState, RecordingArtifact,
    RecordingSummary,
};
use crate::catalog::{Question, QuestionCatalog};
use crate::error::{AnalysisError, CaptureError, SessionError};
use crate::results::{ResultsAggregator, SessionReport};

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 256;

/// Collaborators shared by every session
#[derive(Clone)]
pub struct SessionDeps {
    pub catalog: Arc<dyn QuestionCatalog>,
    pub submitter: AnalysisSubmitter,
    pub aggregator: ResultsAggregator,
    pub notifier: Arc<dyn NotificationSink>,
    pub capture: CaptureConfig,
}

pub struct SessionController;

impl SessionController {
    /// Load questions and start a session actor
    ///
    /// `device` is only used in advanced mode; without one, recordings must be
    /// attached with [`SessionHandle::attach_recording`].
    pub async fn configure(
        deps: SessionDeps,
        config: SessionConfig,
        device: Option<Box<dyn CaptureDevice>>,
    ) -> Result<SessionHandle, SessionError> {
        if config.question_count == 0 {
            return Err(SessionError::Validation(
                "question count must be at least 1".to_string(),
            ));
        }

        let questions = deps
            .catalog
            .get_questions(&config.domain_id, config.level, config.question_count)
            .await?;

        let session = Session {
            id: format!("session-{}", Uuid::new_v4()),
            user_id: config.user_id.clone(),
            domain_id: config.domain_id.clone(),
            level: config.level,
            analysis_mode: config.analysis_mode,
            total_questions: questions.len(),
            questions,
            created_at: Utc::now(),
        };

        let mut machine = SessionMachine::new();
        machine.activate(session.total_questions)?;

        let capture = match (config.analysis_mode, device) {
            (AnalysisMode::Advanced, Some(device)) => {
                Some(CaptureManager::new(device, deps.capture.clone())?)
            }
            (AnalysisMode::Standard, Some(device)) => {
                debug!("Ignoring capture device {} for standard session", device.name());
                None
            }
            (_, None) => None,
        };

        info!(
            "Session {} configured: domain={}, level={}, mode={}, questions={}",
            session.id,
            session.domain_id,
            session.level,
            session.analysis_mode,
            session.total_questions
        );

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let capture_forwarder = capture.as_ref().map(|manager| {
            let mut capture_rx = manager.subscribe();
            let internal_tx = internal_tx.clone();
            tokio::spawn(async move {
                loop {
                    match capture_rx.recv().await {
                        Ok(event) => {
                            if internal_tx.send(Internal::Capture(event)).is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Dropped {} capture events", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        });

        let handle = SessionHandle {
            session_id: session.id.clone(),
            commands: command_tx,
            events: events.clone(),
        };

        let actor = SessionActor {
            deps,
            session,
            machine,
            answers: Vec::new(),
            capture,
            capture_forwarder,
            staged: None,
            pending: None,
            generation: 0,
            progress: None,
            report: None,
            internal_tx,
            events,
        };

        tokio::spawn(actor.run(command_rx, internal_rx));
        Ok(handle)
    }
}

/// Cloneable handle to a running session
///
/// The session shuts down once every handle is dropped.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: String,
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn session(&self) -> Result<Session, SessionError> {
        self.request(|reply| Command::Session { reply }).await
    }

    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        self.request(|reply| Command::Status { reply }).await
    }

    pub async fn answers(&self) -> Result<Vec<Answer>, SessionError> {
        self.request(|reply| Command::Answers { reply }).await
    }

    pub async fn current_question(&self) -> Result<Question, SessionError> {
        self.request(|reply| Command::CurrentQuestion { reply })
            .await?
    }

    /// Submit an answer for the current question and wait for its analysis
    pub async fn submit_answer(&self, input: AnswerInput) -> Result<SubmitOutcome, SessionError> {
        self.request(|reply| Command::SubmitAnswer { input, reply })
            .await?
    }

    pub async fn go_to_previous(&self) -> Result<PreviousQuestion, SessionError> {
        self.request(|reply| Command::GoToPrevious { reply }).await?
    }

    /// Abort the session, discarding answers and any in-flight analysis
    pub async fn cancel(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Cancel { reply }).await?
    }

    pub async fn request_capture_permission(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::RequestPermission { reply })
            .await?
    }

    pub async fn start_recording(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::StartRecording { reply })
            .await?
    }

    /// Stop recording and stage the artifact for the current question
    pub async fn stop_recording(&self) -> Result<RecordingSummary, SessionError> {
        self.request(|reply| Command::StopRecording { reply })
            .await?
    }

    /// Discard the staged recording and get ready to record again
    pub async fn rerecord(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Rerecord { reply }).await?
    }

    /// Stage a recording produced outside the capture manager
    pub async fn attach_recording(
        &self,
        artifact: RecordingArtifact,
    ) -> Result<RecordingSummary, SessionError> {
        self.request(|reply| Command::AttachRecording { artifact, reply })
            .await?
    }

    pub async fn report(&self) -> Result<SessionReport, SessionError> {
        self.request(|reply| Command::Report { reply }).await?
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(make(reply_tx))
            .await
            .map_err(|_| SessionError::ControllerGone)?;
        reply_rx.await.map_err(|_| SessionError::ControllerGone)
    }
}

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

enum Command {
    Session { reply: oneshot::Sender<Session> },
    Status { reply: oneshot::Sender<SessionStatus> },
    Answers { reply: oneshot::Sender<Vec<Answer>> },
    CurrentQuestion { reply: Reply<Question> },
    SubmitAnswer { input: AnswerInput, reply: Reply<SubmitOutcome> },
    GoToPrevious { reply: Reply<PreviousQuestion> },
    Cancel { reply: Reply<()> },
    RequestPermission { reply: Reply<()> },
    StartRecording { reply: Reply<()> },
    StopRecording { reply: Reply<RecordingSummary> },
    Rerecord { reply: Reply<()> },
    AttachRecording { artifact: RecordingArtifact, reply: Reply<RecordingSummary> },
    Report { reply: Reply<SessionReport> },
}

enum Internal {
    AnalysisFinished {
        generation: u64,
        result: Result<AnalysisResult, AnalysisError>,
        /// Handed back so a failed submission can be retried
        recording: Option<RecordingArtifact>,
    },
    Progress {
        generation: u64,
        progress: AnalysisProgress,
    },
    Capture(CaptureEvent),
}

struct PreparedAnswer {
    content: AnswerContent,
    text: Option<String>,
    recording: Option<RecordingArtifact>,
}

struct PendingSubmission {
    generation: u64,
    index: usize,
    content: AnswerContent,
    reply: Reply<SubmitOutcome>,
    task: JoinHandle<()>,
}

struct SessionActor {
    deps: SessionDeps,
    session: Session,
    machine: SessionMachine,
    answers: Vec<Answer>,
    capture: Option<CaptureManager>,
    capture_forwarder: Option<JoinHandle<()>>,
    staged: Option<RecordingArtifact>,
    pending: Option<PendingSubmission>,
    generation: u64,
    progress: Option<AnalysisProgress>,
    report: Option<SessionReport>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        info!("Session {} controller started", self.session.id);
        self.publish_phase();

        loop {
            tokio::select! {
                biased;
                Some(message) = internal.recv() => self.handle_internal(message).await,
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
        }

        self.shutdown().await;
        info!("Session {} controller stopped", self.session.id);
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Session { reply } => {
                let _ = reply.send(self.session.clone());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            Command::Answers { reply } => {
                let _ = reply.send(self.answers.clone());
            }
            Command::CurrentQuestion { reply } => {
                let _ = reply.send(self.current_question());
            }
            Command::SubmitAnswer { input, reply } => self.submit_answer(input, reply),
            Command::GoToPrevious { reply } => {
                let _ = reply.send(self.go_to_previous().await);
            }
            Command::Cancel { reply } => {
                let _ = reply.send(self.cancel().await);
            }
            Command::RequestPermission { reply } => {
                let _ = reply.send(self.request_permission().await);
            }
            Command::StartRecording { reply } => {
                let _ = reply.send(self.start_recording().await);
            }
            Command::StopRecording { reply } => {
                let _ = reply.send(self.stop_recording().await);
            }
            Command::Rerecord { reply } => {
                let _ = reply.send(self.rerecord().await);
            }
            Command::AttachRecording { artifact, reply } => {
                let _ = reply.send(self.attach_recording(artifact));
            }
            Command::Report { reply } => {
                let result = match (&self.report, self.machine.phase()) {
                    (Some(report), _) => Ok(report.clone()),
                    (None, SessionPhase::Aborted) => Err(SessionError::Cancelled),
                    (None, phase) => Err(SessionError::InvalidState {
                        action: "produce a report",
                        phase,
                    }),
                };
                let _ = reply.send(result);
            }
        }
    }

    async fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::AnalysisFinished {
                generation,
                result,
                recording,
            } => self.finish_submission(generation, result, recording).await,
            Internal::Progress {
                generation,
                progress,
            } => {
                if self.is_current(generation) {
                    self.progress = Some(progress);
                    self.publish(SessionEvent::AnalysisProgress {
                        question_index: self.machine.index(),
                        progress,
                    });
                }
            }
            Internal::Capture(event) => self.handle_capture_event(event).await,
        }
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.session.id.clone(),
            phase: self.machine.phase(),
            analysis_mode: self.session.analysis_mode,
            current_index: self.machine.index(),
            total_questions: self.session.total_questions,
            answered: self.answers.len(),
            capture_state: self.capture.as_ref().map(CaptureManager::state),
            staged_recording: self.staged.as_ref().map(RecordingSummary::from),
            progress: self.progress,
        }
    }

    fn current_question(&self) -> Result<Question, SessionError> {
        match self.machine.phase() {
            SessionPhase::Active | SessionPhase::Submitting => {}
            SessionPhase::Aborted => return Err(SessionError::Cancelled),
            phase => {
                return Err(SessionError::InvalidState {
                    action: "show a question",
                    phase,
                })
            }
        }
        self.session
            .question(self.machine.index())
            .cloned()
            .ok_or(SessionError::InvalidState {
                action: "show a question",
                phase: self.machine.phase(),
            })
    }

    fn submit_answer(&mut self, input: AnswerInput, reply: Reply<SubmitOutcome>) {
        let PreparedAnswer {
            content,
            text,
            recording,
        } = match self.prepare_submission(input) {
            Ok(prepared) => prepared,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        let index = match self.machine.begin_submit() {
            Ok(index) => index,
            Err(e) => {
                // Give back a recording taken for this attempt
                if recording.is_some() {
                    self.staged = recording;
                }
                let _ = reply.send(Err(e));
                return;
            }
        };

        self.generation += 1;
        let generation = self.generation;
        self.progress = None;

        let Some(context) = self.analysis_context(index) else {
            let _ = self.machine.submit_failed();
            self.staged = recording;
            let _ = reply.send(Err(SessionError::InvalidState {
                action: "submit an answer",
                phase: self.machine.phase(),
            }));
            return;
        };

        info!(
            "Session {} submitting answer {}/{} (generation {})",
            self.session.id,
            index + 1,
            self.session.total_questions,
            generation
        );
        self.publish_phase();

        let submitter = self.deps.submitter.clone();
        let internal_tx = self.internal_tx.clone();
        let progress_tx = self.internal_tx.clone();
        let progress = ProgressReporter::new(move |progress| {
            let _ = progress_tx.send(Internal::Progress {
                generation,
                progress,
            });
        });

        let task = tokio::spawn(async move {
            let result = match &text {
                Some(text) => submitter.analyze_standard(&context, text).await,
                None => {
                    submitter
                        .analyze_advanced(&context, recording.as_ref(), &progress)
                        .await
                }
            };
            let _ = internal_tx.send(Internal::AnalysisFinished {
                generation,
                result,
                recording,
            });
        });

        self.pending = Some(PendingSubmission {
            generation,
            index,
            content,
            reply,
            task,
        });
    }

    /// Check the input against the session mode before anything is sent
    fn prepare_submission(&mut self, input: AnswerInput) -> Result<PreparedAnswer, SessionError> {
        match self.machine.phase() {
            SessionPhase::Active => {}
            SessionPhase::Submitting => return Err(SessionError::SubmissionInFlight),
            SessionPhase::Aborted => return Err(SessionError::Cancelled),
            phase => {
                return Err(SessionError::InvalidState {
                    action: "submit an answer",
                    phase,
                })
            }
        }

        match (self.session.analysis_mode, input) {
            (AnalysisMode::Standard, AnswerInput::Text(text)) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return Err(SessionError::Validation(
                        "answer text must not be empty".to_string(),
                    ));
                }
                Ok(PreparedAnswer {
                    content: AnswerContent::Text { text: text.clone() },
                    text: Some(text),
                    recording: None,
                })
            }
            (AnalysisMode::Advanced, AnswerInput::Recording) => {
                if matches!(
                    self.capture.as_ref().map(CaptureManager::state),
                    Some(CaptureState::Recording)
                ) {
                    return Err(SessionError::Validation(
                        "stop the recording before submitting".to_string(),
                    ));
                }

                let recording = self.staged.take().ok_or_else(|| {
                    SessionError::Validation("no recording for the current question".to_string())
                })?;
                if recording.is_empty() {
                    return Err(SessionError::Validation(
                        "recording contains no audio".to_string(),
                    ));
                }

                Ok(PreparedAnswer {
                    content: AnswerContent::Recording {
                        recording: RecordingSummary::from(&recording),
                    },
                    text: None,
                    recording: Some(recording),
                })
            }
            (mode, input) => Err(SessionError::ModeMismatch {
                mode,
                input: input.kind(),
            }),
        }
    }

    async fn finish_submission(
        &mut self,
        generation: u64,
        result: Result<AnalysisResult, AnalysisError>,
        recording: Option<RecordingArtifact>,
    ) {
        if !self.is_current(generation) {
            debug!(
                "Session {} discarding stale analysis result (generation {})",
                self.session.id, generation
            );
            return;
        }
        let Some(pending) = self.pending.take() else {
            return;
        };

        match result {
            Ok(analysis) => {
                let answer = Answer {
                    question_index: pending.index,
                    question: self.session.questions[pending.index].clone(),
                    content: pending.content,
                    transcription: analysis.transcription().cloned(),
                    analysis,
                    answered_at: Utc::now(),
                };
                let score = answer.score();

                // Resubmission after going back replaces the earlier answer
                if pending.index < self.answers.len() {
                    self.answers[pending.index] = answer;
                } else {
                    self.answers.push(answer);
                }
                drop(recording);

                let phase = match self.machine.submit_succeeded() {
                    Ok(phase) => phase,
                    Err(e) => {
                        let _ = pending.reply.send(Err(e));
                        return;
                    }
                };

                info!(
                    "Session {} answer {} scored {:.2}",
                    self.session.id,
                    pending.index + 1,
                    score
                );
                self.publish(SessionEvent::AnswerAccepted {
                    question_index: pending.index,
                    score,
                });
                self.deps.notifier.notify(
                    NotificationLevel::Info,
                    &format!("Answer {} analysed: {:.0}/100", pending.index + 1, score),
                );

                if let Some(capture) = self.capture.as_mut() {
                    capture.reset().await;
                }

                let outcome = if phase == SessionPhase::Completed {
                    let report = self.complete().await;
                    SubmitOutcome::Completed { report }
                } else {
                    SubmitOutcome::Advanced {
                        current_index: self.machine.index(),
                        score,
                    }
                };

                self.publish_phase();
                let _ = pending.reply.send(Ok(outcome));
            }
            Err(e) => {
                let _ = self.machine.submit_failed();
                self.staged = recording;

                warn!(
                    "Session {} answer {} analysis failed: {}",
                    self.session.id,
                    pending.index + 1,
                    e
                );
                self.publish(SessionEvent::AnalysisFailed {
                    question_index: pending.index,
                    error: e.to_string(),
                    retryable: e.is_retryable(),
                });
                self.deps.notifier.notify(
                    NotificationLevel::Error,
                    &format!("Analysis failed, you can retry: {}", e),
                );
                self.publish_phase();
                let _ = pending.reply.send(Err(SessionError::Analysis(e)));
            }
        }
    }

    async fn complete(&mut self) -> SessionReport {
        if let Some(capture) = self.capture.as_mut() {
            capture.shutdown().await;
        }

        let report = self.deps.aggregator.aggregate(&self.session, &self.answers);
        self.publish(SessionEvent::Completed {
            overall_score: report.overall_score,
            grade: report.grade.to_string(),
        });
        self.deps.notifier.notify(
            NotificationLevel::Info,
            &format!(
                "Session complete: {:.2} ({})",
                report.overall_score, report.grade
            ),
        );

        self.report = Some(report.clone());
        report
    }

    async fn go_to_previous(&mut self) -> Result<PreviousQuestion, SessionError> {
        self.ensure_not_recording("change question")?;

        let index = self.machine.go_to_previous()?;
        if self.staged.take().is_some() {
            debug!("Session {} discarded staged recording", self.session.id);
        }
        if let Some(capture) = self.capture.as_mut() {
            capture.reset().await;
        }

        let question = self.session.questions[index].clone();
        let previous_answer = self
            .answers
            .get(index)
            .and_then(Answer::text)
            .map(str::to_string);

        info!("Session {} back to question {}", self.session.id, index + 1);
        self.publish_phase();

        Ok(PreviousQuestion {
            index,
            question,
            previous_answer,
        })
    }

    async fn cancel(&mut self) -> Result<(), SessionError> {
        self.machine.cancel()?;

        // Anything still in flight belongs to a discarded session
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
            let _ = pending.reply.send(Err(SessionError::Cancelled));
        }

        self.answers.clear();
        self.staged = None;
        self.progress = None;
        if let Some(capture) = self.capture.as_mut() {
            capture.shutdown().await;
        }

        info!("Session {} cancelled", self.session.id);
        self.deps
            .notifier
            .notify(NotificationLevel::Info, "Session cancelled");
        self.publish_phase();
        Ok(())
    }

    async fn request_permission(&mut self) -> Result<(), SessionError> {
        self.ensure_recording_allowed("request capture permission")?;
        let capture = self.capture_manager()?;

        match capture.request_permission().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.deps.notifier.notify(
                    NotificationLevel::Error,
                    &format!("Camera/microphone unavailable: {}", e),
                );
                Err(e.into())
            }
        }
    }

    async fn start_recording(&mut self) -> Result<(), SessionError> {
        self.ensure_recording_allowed("start recording")?;
        if self.staged.is_some() {
            return Err(CaptureError::InvalidState {
                action: "start recording",
                state: "holding a recording; re-record to discard it".to_string(),
            }
            .into());
        }

        self.capture_manager()?.start_recording().await?;
        Ok(())
    }

    async fn stop_recording(&mut self) -> Result<RecordingSummary, SessionError> {
        self.ensure_recording_allowed("stop recording")?;

        // Already collected after an auto-stop
        if let Some(staged) = &self.staged {
            if matches!(
                self.capture.as_ref().map(CaptureManager::state),
                Some(CaptureState::Stopped(_))
            ) {
                return Ok(RecordingSummary::from(staged));
            }
        }

        let artifact = self.capture_manager()?.stop_recording().await?;
        Ok(self.stage(artifact))
    }

    async fn rerecord(&mut self) -> Result<(), SessionError> {
        self.ensure_recording_allowed("re-record")?;
        self.staged = None;
        self.capture_manager()?.reset().await;
        Ok(())
    }

    fn attach_recording(
        &mut self,
        artifact: RecordingArtifact,
    ) -> Result<RecordingSummary, SessionError> {
        self.ensure_recording_allowed("attach a recording")?;
        self.ensure_not_recording("attach a recording")?;

        if artifact.is_empty() {
            return Err(SessionError::Validation(
                "recording contains no audio".to_string(),
            ));
        }
        Ok(self.stage(artifact))
    }

    async fn handle_capture_event(&mut self, event: CaptureEvent) {
        match &event {
            CaptureEvent::ApproachingLimit { remaining_secs, .. } => {
                self.deps.notifier.notify(
                    NotificationLevel::Warning,
                    &format!("Recording stops automatically in {}s", remaining_secs),
                );
            }
            CaptureEvent::MaxDurationReached { duration_secs } => {
                self.deps.notifier.notify(
                    NotificationLevel::Warning,
                    &format!("Maximum recording time of {}s reached", duration_secs),
                );
                self.collect_auto_stopped().await;
            }
            CaptureEvent::Aborted { reason } => {
                self.deps.notifier.notify(
                    NotificationLevel::Error,
                    &format!("Recording failed: {}", reason),
                );
            }
            CaptureEvent::StateChanged(_) | CaptureEvent::Tick { .. } => {}
        }

        self.publish(SessionEvent::Capture { event });
    }

    /// Take the artifact finalized by an auto-stop
    async fn collect_auto_stopped(&mut self) {
        if self.machine.phase() != SessionPhase::Active || self.staged.is_some() {
            return;
        }
        let Some(capture) = self.capture.as_mut() else {
            return;
        };

        match capture.stop_recording().await {
            Ok(artifact) => {
                self.stage(artifact);
            }
            Err(e) => debug!("No auto-stopped recording to collect: {}", e),
        }
    }

    fn stage(&mut self, artifact: RecordingArtifact) -> RecordingSummary {
        let summary = RecordingSummary::from(&artifact);
        info!(
            "Session {} staged recording for question {} ({:.1}s, {:?})",
            self.session.id,
            self.machine.index() + 1,
            summary.duration_secs,
            summary.stop_reason
        );
        self.staged = Some(artifact);
        summary
    }

    fn capture_manager(&mut self) -> Result<&mut CaptureManager, SessionError> {
        self.capture.as_mut().ok_or_else(|| {
            SessionError::Capture(CaptureError::Device(
                "no capture device configured for this session".to_string(),
            ))
        })
    }

    fn ensure_recording_allowed(&self, action: &'static str) -> Result<(), SessionError> {
        if self.session.analysis_mode != AnalysisMode::Advanced {
            return Err(SessionError::ModeMismatch {
                mode: self.session.analysis_mode,
                input: AnswerInput::Recording.kind(),
            });
        }
        match self.machine.phase() {
            SessionPhase::Active => Ok(()),
            SessionPhase::Submitting => Err(SessionError::SubmissionInFlight),
            SessionPhase::Aborted => Err(SessionError::Cancelled),
            phase => Err(SessionError::InvalidState { action, phase }),
        }
    }

    fn ensure_not_recording(&self, action: &'static str) -> Result<(), SessionError> {
        match self.capture.as_ref().map(CaptureManager::state) {
            Some(state @ CaptureState::Recording) => {
                Err(SessionError::Capture(CaptureError::InvalidState {
                    action,
                    state: state.to_string(),
                }))
            }
            _ => Ok(()),
        }
    }

    fn analysis_context(&self, index: usize) -> Option<AnalysisContext> {
        let question = self.session.question(index)?;
        Some(AnalysisContext {
            question_text: question.text.clone(),
            domain_id: self.session.domain_id.clone(),
            level: self.session.level,
            keywords: question.keywords.clone(),
            user_id: self.session.user_id.clone(),
            session_id: self.session.id.clone(),
        })
    }

    fn is_current(&self, generation: u64) -> bool {
        self.machine.phase() == SessionPhase::Submitting
            && self
                .pending
                .as_ref()
                .is_some_and(|pending| pending.generation == generation)
    }

    fn publish_phase(&self) {
        self.publish(SessionEvent::PhaseChanged {
            phase: self.machine.phase(),
            current_index: self.machine.index(),
        });
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    async fn shutdown(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
            let _ = pending.reply.send(Err(SessionError::ControllerGone));
        }
        if let Some(capture) = self.capture.as_mut() {
            capture.shutdown().await;
        }
        if let Some(forwarder) = self.capture_forwarder.take() {
            forwarder.abort();
        }
    }
}
