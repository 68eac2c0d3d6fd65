use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. `check_auth` still reads the session when
/// one is present, but never rejects.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /api/login
        // Opens a session and sets the session cookie.
        .route("/login", post(handlers::login))
        // GET /api/check_auth
        // Reports {isAuthenticated, ssn, role} for the current cookie.
        .route("/check_auth", get(handlers::check_auth))
}

/// Liveness probe, mounted outside `/api`.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(|| async { "OK" }))
}
