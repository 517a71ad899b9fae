// Shared test doubles for the integration tests
//
// Each test binary pulls in only what it needs, so some helpers are unused
// in any given binary.
#![allow(dead_code)]

use async_trait::async_trait;
use interview_coach::analysis::{
    AdvancedAnalysis, AdvancedAnalysisRequest, AnalysisResult, AnalysisService, AnalysisStage,
    AnalysisSubmitter, BaseAnalysis, BodyLanguageAnalysis, FeedbackMetrics, ProgressReporter,
    ScoreBreakdown, SpeechAnalysis, StandardAnalysisRequest, Transcription,
};
use interview_coach::capture::{
    AudioFrame, CaptureConfig, CaptureDevice, MediaChunk, RecordingArtifact,
};
use interview_coach::catalog::{Difficulty, DomainEntry, ExperienceLevel, InMemoryCatalog, Question};
use interview_coach::error::{AnalysisError, CaptureError, PersistenceError};
use interview_coach::persistence::{SessionRecord, SessionSink};
use interview_coach::results::ResultsAggregator;
use interview_coach::session::{NotificationLevel, NotificationSink, SessionDeps};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// ============================================================================
// Catalog
// ============================================================================

pub fn question(id: &str, text: &str) -> Question {
    Question {
        id: id.to_string(),
        text: text.to_string(),
        category: "system design".to_string(),
        difficulty: Difficulty::Medium,
        keywords: vec!["scalability".to_string(), "trade-offs".to_string()],
    }
}

pub fn test_catalog() -> InMemoryCatalog {
    let mut questions = BTreeMap::new();
    questions.insert(
        ExperienceLevel::Mid,
        vec![
            question("backend-mid-1", "How would you design a rate limiter?"),
            question("backend-mid-2", "How do you make an endpoint idempotent?"),
            question("backend-mid-3", "When would you use a message queue?"),
        ],
    );
    questions.insert(
        ExperienceLevel::Senior,
        vec![question("backend-senior-1", "How do you migrate a large table?")],
    );

    InMemoryCatalog::new(vec![DomainEntry {
        id: "backend".to_string(),
        name: "Backend Engineering".to_string(),
        keywords: vec!["api".to_string(), "database".to_string()],
        questions,
    }])
}

// ============================================================================
// Analysis service
// ============================================================================

pub fn base_analysis(score: f64) -> BaseAnalysis {
    BaseAnalysis {
        score,
        feedback: FeedbackMetrics {
            technical_accuracy: score,
            clarity: score,
            relevance: score,
        },
        strengths: vec!["Clear structure".to_string()],
        improvements: vec!["Discuss failure modes".to_string()],
        overall_assessment: format!("Scored {}", score),
        domain_specific_insights: None,
    }
}

pub fn advanced_analysis(score: f64) -> AnalysisResult {
    AnalysisResult::Advanced(AdvancedAnalysis {
        base: base_analysis(score),
        score_breakdown: ScoreBreakdown {
            content: score,
            delivery: score,
            body_language: score,
        },
        speech_analysis: SpeechAnalysis {
            words_per_minute: 140.0,
            filler_word_count: 2,
            filler_word_percentage: 1.5,
            confidence: 0.8,
            recommendations: vec!["Pause between points".to_string()],
        },
        body_language_analysis: BodyLanguageAnalysis {
            eye_contact: 70.0,
            body_movement: 65.0,
            overall_presence: 68.0,
            recommendations: vec![],
        },
        transcription: Transcription {
            text: "I would start with a token bucket".to_string(),
            word_count: 7,
            duration: 3.0,
            confidence: 0.9,
        },
    })
}

/// One scripted reply of the analysis service
#[derive(Debug, Clone)]
pub enum Scripted {
    Score(f64),
    Fail(AnalysisError),
    /// Never answers
    Hang,
    /// Answers with a score once the delay has passed
    Delay(Duration, f64),
}

/// Analysis service replaying scripted replies in order
///
/// Once the script is exhausted every call scores 75.
#[derive(Default)]
pub struct ScriptedAnalysis {
    script: Mutex<VecDeque<Scripted>>,
    calls: AtomicUsize,
    answers: Mutex<Vec<String>>,
    uploads: Mutex<Vec<usize>>,
}

impl ScriptedAnalysis {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn answers(&self) -> Vec<String> {
        self.answers.lock().unwrap().clone()
    }

    /// Audio byte counts of advanced submissions
    pub fn uploads(&self) -> Vec<usize> {
        self.uploads.lock().unwrap().clone()
    }

    async fn next(&self) -> Result<f64, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Scripted::Score(score)) => Ok(score),
            Some(Scripted::Fail(err)) => Err(err),
            Some(Scripted::Hang) => std::future::pending::<Result<f64, AnalysisError>>().await,
            Some(Scripted::Delay(delay, score)) => {
                tokio::time::sleep(delay).await;
                Ok(score)
            }
            None => Ok(75.0),
        }
    }
}

#[async_trait]
impl AnalysisService for ScriptedAnalysis {
    async fn analyze_standard(
        &self,
        request: &StandardAnalysisRequest,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.answers
            .lock()
            .unwrap()
            .push(request.answer_text.clone());
        let score = self.next().await?;
        Ok(AnalysisResult::Standard(base_analysis(score)))
    }

    async fn analyze_advanced(
        &self,
        _request: &AdvancedAnalysisRequest,
        recording: &RecordingArtifact,
        progress: &ProgressReporter,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.uploads.lock().unwrap().push(recording.audio.len());
        progress.report(AnalysisStage::Uploading, 45);
        progress.report(AnalysisStage::Analyzing, 90);
        let score = self.next().await?;
        Ok(advanced_analysis(score))
    }
}

// ============================================================================
// Persistence and notifications
// ============================================================================

#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<SessionRecord>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    pub fn records(&self) -> Vec<SessionRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionSink for RecordingSink {
    async fn save(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        self.records.lock().unwrap().push(record.clone());
        if self.fail {
            return Err(PersistenceError::Connection("sink offline".to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[derive(Default)]
pub struct CollectingNotifier {
    messages: Mutex<Vec<(NotificationLevel, String)>>,
}

impl CollectingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<(NotificationLevel, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn count(&self, level: NotificationLevel) -> usize {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .count()
    }
}

impl NotificationSink for CollectingNotifier {
    fn notify(&self, level: NotificationLevel, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}

pub struct Harness {
    pub deps: SessionDeps,
    pub analysis: Arc<ScriptedAnalysis>,
    pub sink: Arc<RecordingSink>,
    pub notifier: Arc<CollectingNotifier>,
}

pub fn harness(script: impl IntoIterator<Item = Scripted>) -> Harness {
    harness_with(script, CaptureConfig::default())
}

pub fn harness_with(script: impl IntoIterator<Item = Scripted>, capture: CaptureConfig) -> Harness {
    let analysis = ScriptedAnalysis::new(script);
    let sink = RecordingSink::new();
    let notifier = CollectingNotifier::new();

    let deps = SessionDeps {
        catalog: Arc::new(test_catalog()),
        submitter: AnalysisSubmitter::new(analysis.clone()),
        aggregator: ResultsAggregator::new(sink.clone()),
        notifier: notifier.clone(),
        capture,
    };

    Harness {
        deps,
        analysis,
        sink,
        notifier,
    }
}

/// Let spawned background work (persistence, event forwarding) run
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
}

// ============================================================================
// Capture device
// ============================================================================

/// Counters shared between a scripted device and the test
#[derive(Default)]
pub struct DeviceCounters {
    pub permission_requests: AtomicUsize,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub releases: AtomicUsize,
}

impl DeviceCounters {
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

/// Capture device emitting silent frames on a timer
pub struct ScriptedDevice {
    permissions: VecDeque<Result<(), String>>,
    fault_after_frames: Option<usize>,
    frame_interval: Duration,
    frame_samples: usize,
    counters: Arc<DeviceCounters>,
    feeder: Option<JoinHandle<()>>,
}

impl ScriptedDevice {
    pub fn new() -> (Self, Arc<DeviceCounters>) {
        let counters = Arc::new(DeviceCounters::default());
        let device = Self {
            permissions: VecDeque::new(),
            fault_after_frames: None,
            frame_interval: Duration::from_millis(100),
            frame_samples: 1600,
            counters: counters.clone(),
            feeder: None,
        };
        (device, counters)
    }

    /// Deny the next permission request
    pub fn deny_once(mut self, reason: &str) -> Self {
        self.permissions.push_back(Err(reason.to_string()));
        self
    }

    pub fn fault_after(mut self, frames: usize) -> Self {
        self.fault_after_frames = Some(frames);
        self
    }

    pub fn frames(mut self, interval: Duration, samples: usize) -> Self {
        self.frame_interval = interval;
        self.frame_samples = samples;
        self
    }

    pub fn boxed(self) -> Box<dyn CaptureDevice> {
        Box::new(self)
    }
}

#[async_trait]
impl CaptureDevice for ScriptedDevice {
    async fn request_permission(&mut self) -> Result<(), CaptureError> {
        self.counters.permission_requests.fetch_add(1, Ordering::SeqCst);
        match self.permissions.pop_front() {
            Some(Err(reason)) => Err(CaptureError::PermissionDenied(reason)),
            _ => Ok(()),
        }
    }

    async fn start(&mut self) -> Result<mpsc::Receiver<MediaChunk>, CaptureError> {
        self.counters.starts.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(64);
        let interval = self.frame_interval;
        let samples = self.frame_samples;
        let fault_after = self.fault_after_frames;

        self.feeder = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut sent = 0usize;
            loop {
                ticker.tick().await;
                if fault_after == Some(sent) {
                    let _ = tx.send(MediaChunk::Fault("microphone unplugged".to_string())).await;
                    tx.closed().await;
                    return;
                }
                let frame = AudioFrame {
                    samples: vec![0i16; samples],
                    sample_rate: 16000,
                    channels: 1,
                    timestamp_ms: sent as u64 * interval.as_millis() as u64,
                };
                if tx.send(MediaChunk::Audio(frame)).await.is_err() {
                    return;
                }
                sent += 1;
            }
        }));

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
        Ok(())
    }

    async fn release(&mut self) {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
    }

    fn is_capturing(&self) -> bool {
        self.feeder.is_some()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn wav_artifact(seconds: f64) -> RecordingArtifact {
    let samples = vec![0i16; (16000.0 * seconds) as usize];
    let audio = interview_coach::capture::encode_wav(&samples, 16000, 1).unwrap();
    RecordingArtifact::from_upload(audio.to_vec(), None, seconds)
}
