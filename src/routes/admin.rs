use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// User management, bulk import and reporting. Every handler here calls
/// `AuthUser::require(&[Role::Admin])` before doing any work.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/admin_dashboard_data
        // Row counts for the admin landing page.
        .route(
            "/admin_dashboard_data",
            get(handlers::get_admin_dashboard_data),
        )
        // --- Users ---
        .route("/users", get(handlers::get_users))
        .route("/add_user", post(handlers::add_user))
        // POST /api/upload_data
        // Multipart CSV import into the users table, all-or-nothing.
        .route("/upload_data", post(handlers::upload_data))
        .route("/register_student", post(handlers::register_student))
        // --- Reports ---
        .route("/business_queries", get(handlers::get_business_queries))
        // GET /api/export_report/{name}
        // CSV attachment; only `low_grade_students` exists today.
        .route("/export_report/{name}", get(handlers::export_report))
        .route(
            "/failing_students_count",
            get(handlers::get_failing_students_count),
        )
}
