//! HTTP API server for remote practice clients
//!
//! This module provides a REST API over the session controller:
//! - GET /health - Health check
//! - GET /domains - Catalog domains
//! - POST /sessions - Configure a session
//! - GET /sessions/:id - Session status
//! - GET /sessions/:id/question - Current question
//! - POST /sessions/:id/answers - Submit an answer
//! - POST /sessions/:id/recording - Upload a recorded answer
//! - POST /sessions/:id/previous - Back to the previous question
//! - GET /sessions/:id/report - Text report
//! - DELETE /sessions/:id - Cancel

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
