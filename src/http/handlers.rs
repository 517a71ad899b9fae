use super::state::AppState;
use crate::capture::RecordingArtifact;
use crate::catalog::{ExperienceLevel, Question};
use crate::error::{CaptureError, SessionError};
use crate::session::{
    AnalysisMode, AnswerInput, SessionConfig, SessionController, SessionHandle, SessionPhase,
};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub domain_id: String,
    pub level: ExperienceLevel,
    pub question_count: usize,
    pub analysis_mode: AnalysisMode,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub total_questions: usize,
    pub current_question: Question,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    /// Required in standard mode; omitted to submit the uploaded recording
    pub answer_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadRecordingRequest {
    pub audio_base64: String,
    pub video_base64: Option<String>,
    pub duration_secs: f64,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub session_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn session_error(err: SessionError) -> Response {
    let status = match &err {
        SessionError::Validation(_) | SessionError::ModeMismatch { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        SessionError::InvalidState { .. }
        | SessionError::SubmissionInFlight
        | SessionError::Cancelled => StatusCode::CONFLICT,
        SessionError::Analysis(_) => StatusCode::BAD_GATEWAY,
        SessionError::Catalog(_) => StatusCode::BAD_REQUEST,
        SessionError::Capture(CaptureError::PermissionDenied(_)) => StatusCode::FORBIDDEN,
        SessionError::Capture(_) => StatusCode::CONFLICT,
        SessionError::ControllerGone => StatusCode::GONE,
    };

    if status == StatusCode::BAD_GATEWAY {
        warn!("Request failed: {}", err);
    }
    error_response(status, err.to_string())
}

fn not_found(session_id: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        format!("Session {} not found", session_id),
    )
}

async fn lookup(state: &AppState, session_id: &str) -> Result<SessionHandle, Response> {
    state
        .session(session_id)
        .await
        .ok_or_else(|| not_found(session_id))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /domains
/// List catalog domains
pub async fn list_domains(State(state): State<AppState>) -> Response {
    match state.deps.catalog.list_domains().await {
        Ok(domains) => (StatusCode::OK, Json(domains)).into_response(),
        Err(e) => {
            error!("Failed to list domains: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// POST /sessions
/// Configure a new practice session
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Response {
    let config = SessionConfig {
        domain_id: req.domain_id,
        level: req.level,
        question_count: req.question_count,
        analysis_mode: req.analysis_mode,
        user_id: req.user_id.unwrap_or_else(|| SessionConfig::default().user_id),
    };

    // Remote clients upload recordings; no local capture device
    let handle = match SessionController::configure(state.deps.clone(), config, None).await {
        Ok(handle) => handle,
        Err(e) => return session_error(e),
    };

    let (session, current_question) =
        match (handle.session().await, handle.current_question().await) {
            (Ok(session), Ok(question)) => (session, question),
            (Err(e), _) | (_, Err(e)) => return session_error(e),
        };

    state
        .sessions
        .write()
        .await
        .insert(session.id.clone(), handle);

    info!("Session {} created over HTTP", session.id);

    (
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id,
            total_questions: session.total_questions,
            current_question,
        }),
    )
        .into_response()
}

/// GET /sessions/:session_id
/// Session status
pub async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let handle = match lookup(&state, &session_id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };

    match handle.status().await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => session_error(e),
    }
}

/// GET /sessions/:session_id/question
/// Current question
pub async fn get_current_question(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let handle = match lookup(&state, &session_id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };

    match handle.current_question().await {
        Ok(question) => (StatusCode::OK, Json(question)).into_response(),
        Err(e) => session_error(e),
    }
}

/// POST /sessions/:session_id/answers
/// Submit the answer for the current question and wait for its analysis
pub async fn submit_answer(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Response {
    let handle = match lookup(&state, &session_id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };

    let input = match req.answer_text {
        Some(text) => AnswerInput::Text(text),
        None => AnswerInput::Recording,
    };

    match handle.submit_answer(input).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => session_error(e),
    }
}

/// POST /sessions/:session_id/recording
/// Stage a recorded answer (advanced mode)
pub async fn upload_recording(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<UploadRecordingRequest>,
) -> Response {
    let handle = match lookup(&state, &session_id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };

    let engine = base64::engine::general_purpose::STANDARD;
    let audio = match engine.decode(req.audio_base64.as_bytes()) {
        Ok(audio) => audio,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, format!("Invalid audio: {}", e))
        }
    };
    let video = match req.video_base64.map(|v| engine.decode(v.as_bytes())).transpose() {
        Ok(video) => video,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, format!("Invalid video: {}", e))
        }
    };

    if !req.duration_secs.is_finite() || req.duration_secs < 0.0 {
        return error_response(StatusCode::BAD_REQUEST, "Invalid duration");
    }

    let artifact = RecordingArtifact::from_upload(audio, video, req.duration_secs);
    match handle.attach_recording(artifact).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => session_error(e),
    }
}

/// POST /sessions/:session_id/previous
/// Return to the previous question
pub async fn go_to_previous(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let handle = match lookup(&state, &session_id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };

    match handle.go_to_previous().await {
        Ok(previous) => (StatusCode::OK, Json(previous)).into_response(),
        Err(e) => session_error(e),
    }
}

/// GET /sessions/:session_id/report
/// Text export of a completed session
pub async fn get_report(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let handle = match lookup(&state, &session_id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };

    match handle.report().await {
        Ok(report) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            report.to_text(),
        )
            .into_response(),
        Err(e) => session_error(e),
    }
}

/// DELETE /sessions/:session_id
/// Cancel a session (or close a completed one)
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let handle = match state.remove(&session_id).await {
        Some(handle) => handle,
        None => return not_found(&session_id),
    };

    let status = match handle.cancel().await {
        Ok(()) => "cancelled",
        Err(SessionError::InvalidState {
            phase: SessionPhase::Completed,
            ..
        }) => "closed",
        Err(e) => return session_error(e),
    };

    info!("Session {} {}", session_id, status);

    (
        StatusCode::OK,
        Json(CancelResponse {
            session_id,
            status: status.to_string(),
        }),
    )
        .into_response()
}
