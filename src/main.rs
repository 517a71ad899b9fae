use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use interview_coach::analysis::{AnalysisSubmitter, HttpAnalysisService};
use interview_coach::capture::{decode_audio_file, CaptureDevice, FileDevice};
use interview_coach::catalog::{ExperienceLevel, InMemoryCatalog, QuestionCatalog};
use interview_coach::persistence::connect_sink;
use interview_coach::results::ResultsAggregator;
use interview_coach::session::{
    AnalysisMode, AnswerInput, SessionConfig, SessionController, SessionDeps, SessionEvent,
    SessionHandle, SubmitOutcome, TracingNotifier,
};
use interview_coach::{create_router, AppState, Config, SessionError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "interview-coach")]
#[command(about = "Interview practice sessions with AI feedback")]
struct Args {
    /// Configuration file (extension optional)
    #[arg(short, long, default_value = "config/interview-coach")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the REST API
    Serve,

    /// List catalog domains
    Domains,

    /// Practice in the terminal
    Practice {
        /// Domain identifier (e.g. "backend")
        #[arg(short, long)]
        domain: String,

        /// Experience level: junior, mid or senior
        #[arg(short, long, default_value = "mid")]
        level: ExperienceLevel,

        /// Number of questions
        #[arg(short = 'n', long, default_value = "3")]
        count: usize,

        /// Answer every question with this audio file (advanced analysis)
        #[arg(short, long)]
        audio: Option<PathBuf>,

        /// User identifier sent with the session
        #[arg(short, long, default_value = "cli")]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("Loaded config: {}", cfg.service.name);

    match args.command {
        Command::Serve => serve(cfg).await,
        Command::Domains => list_domains(&cfg).await,
        Command::Practice {
            domain,
            level,
            count,
            audio,
            user,
        } => {
            let config = SessionConfig {
                domain_id: domain,
                level,
                question_count: count,
                analysis_mode: if audio.is_some() {
                    AnalysisMode::Advanced
                } else {
                    AnalysisMode::Standard
                },
                user_id: user,
            };
            practice(cfg, config, audio).await
        }
    }
}

fn load_catalog(cfg: &Config) -> Result<Arc<InMemoryCatalog>> {
    Ok(Arc::new(InMemoryCatalog::from_json_file(&cfg.catalog.path)?))
}

async fn build_deps(cfg: &Config) -> Result<SessionDeps> {
    let service =
        HttpAnalysisService::new(&cfg.analysis).context("Failed to create analysis client")?;
    let sink = connect_sink(&cfg.persistence).await;

    info!("Analysis service: {}", cfg.analysis.base_url);
    info!("Session persistence: {}", sink.name());

    Ok(SessionDeps {
        catalog: load_catalog(cfg)?,
        submitter: AnalysisSubmitter::new(Arc::new(service)),
        aggregator: ResultsAggregator::new(sink),
        notifier: Arc::new(TracingNotifier),
        capture: cfg.capture.clone(),
    })
}

async fn serve(cfg: Config) -> Result<()> {
    let deps = build_deps(&cfg).await?;
    let state = AppState::new(deps);
    let http = &cfg.service.http;
    state.spawn_reaper(
        Duration::from_secs(http.sweep_interval_secs.max(1)),
        Duration::from_secs(http.session_ttl_secs),
    );
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).await.context("HTTP server error")?;

    Ok(())
}

async fn list_domains(cfg: &Config) -> Result<()> {
    let catalog = load_catalog(cfg)?;

    for domain in catalog.list_domains().await? {
        let levels: Vec<&str> = domain.levels.iter().map(|l| l.as_str()).collect();
        println!("{:<16} {:<32} [{}]", domain.id, domain.name, levels.join(", "));
    }

    Ok(())
}

async fn practice(cfg: Config, config: SessionConfig, audio: Option<PathBuf>) -> Result<()> {
    let deps = build_deps(&cfg).await?;
    let device: Option<Box<dyn CaptureDevice>> = audio.as_ref().map(|path| {
        Box::new(FileDevice::new(path, cfg.capture.device_config())) as Box<dyn CaptureDevice>
    });

    let handle = SessionController::configure(deps, config, device).await?;
    let session = handle.session().await?;
    println!(
        "Session {}: {} questions ({} / {}, {} mode)\n",
        session.id, session.total_questions, session.domain_id, session.level, session.analysis_mode
    );

    let progress_task = tokio::spawn(print_progress(handle.clone()));
    let result = match &audio {
        Some(path) => answer_with_recordings(&handle, path, &cfg).await,
        None => answer_from_stdin(&handle).await,
    };
    progress_task.abort();

    let report = result?;
    println!("\n{}", report);
    Ok(())
}

async fn answer_from_stdin(handle: &SessionHandle) -> Result<String> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let question = handle.current_question().await?;
        println!("[{}] {}", question.category, question.text);
        println!("Your answer (empty line to cancel):");

        let Some(line) = lines.next_line().await? else {
            handle.cancel().await?;
            bail!("Input closed; session cancelled");
        };
        if line.trim().is_empty() {
            handle.cancel().await?;
            bail!("Session cancelled");
        }

        match submit_with_retry(handle, AnswerInput::Text(line)).await? {
            SubmitOutcome::Advanced { score, .. } => println!("Score: {:.0}\n", score),
            SubmitOutcome::Completed { report } => return Ok(report.to_text()),
        }
    }
}

async fn answer_with_recordings(
    handle: &SessionHandle,
    path: &Path,
    cfg: &Config,
) -> Result<String> {
    let file = path.to_path_buf();
    let decoded = tokio::task::spawn_blocking(move || decode_audio_file(&file))
        .await?
        .map_err(anyhow::Error::msg)?;
    let record_for = Duration::from_secs_f64(decoded.duration_seconds())
        .min(Duration::from_secs(cfg.capture.max_duration_secs));

    handle.request_capture_permission().await?;

    loop {
        let question = handle.current_question().await?;
        println!("[{}] {}", question.category, question.text);
        println!("Recording {:.1}s from {}", record_for.as_secs_f64(), path.display());

        handle.start_recording().await?;
        tokio::time::sleep(record_for).await;
        let summary = handle.stop_recording().await?;
        info!("Recorded {:.1}s ({} bytes)", summary.duration_secs, summary.audio_bytes);

        match submit_with_retry(handle, AnswerInput::Recording).await? {
            SubmitOutcome::Advanced { score, .. } => println!("Score: {:.0}\n", score),
            SubmitOutcome::Completed { report } => return Ok(report.to_text()),
        }
    }
}

/// Analysis failures leave the session on the same question; retry a few times
async fn submit_with_retry(handle: &SessionHandle, input: AnswerInput) -> Result<SubmitOutcome> {
    const ATTEMPTS: u32 = 3;

    for attempt in 1..=ATTEMPTS {
        match handle.submit_answer(input.clone()).await {
            Ok(outcome) => return Ok(outcome),
            Err(SessionError::Analysis(e)) if e.is_retryable() && attempt < ATTEMPTS => {
                warn!("Analysis attempt {}/{} failed: {}", attempt, ATTEMPTS, e);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }

    bail!("Analysis failed after {} attempts", ATTEMPTS)
}

async fn print_progress(handle: SessionHandle) {
    let mut events = handle.subscribe();
    drop(handle);

    loop {
        match events.recv().await {
            Ok(SessionEvent::AnalysisProgress { progress, .. }) => {
                info!("Analysis {}: {}%", progress.stage, progress.percent);
            }
            Ok(SessionEvent::AnalysisFailed { error, .. }) => error!("Analysis failed: {}", error),
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}
