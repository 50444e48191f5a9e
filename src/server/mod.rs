//! HTTP server exposing the chat orchestrator.
//!
//! # Endpoints
//!
//! - `GET  /health`     - Liveness check
//! - `POST /initialize` - Prepare a personality
//! - `POST /chat`       - Chat with a personality
//!
//! See [`routes`] for the full list.

pub mod routes;

pub use routes::{app_router, AppState};
