use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Routes for the non-admin roles plus logout. The router above applies the
/// session check; each handler then gates on its own role and uses the session SSN
/// as the acting identity (student, coordinator, mentor or evaluator).
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /api/logout
        .route("/logout", post(handlers::logout))
        // --- Student ---
        .route(
            "/student_dashboard_data",
            get(handlers::get_student_dashboard_data),
        )
        // POST /api/apply_internship
        // At most one internship per student; a second application is a 400.
        .route("/apply_internship", post(handlers::apply_internship))
        // --- InternshipCoordinator ---
        .route(
            "/coordinator_dashboard_data",
            get(handlers::get_coordinator_dashboard_data),
        )
        // --- Mentor ---
        .route(
            "/mentor_dashboard_data",
            get(handlers::get_mentor_dashboard_data),
        )
        // --- InternshipEvaluator ---
        // POST /api/submit_evaluation
        // Inserts or overwrites the student's evaluation.
        .route("/submit_evaluation", post(handlers::submit_evaluation))
}
