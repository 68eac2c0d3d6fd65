use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderName, HeaderValue, Method, header},
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Server side: state, persistence, sessions and HTTP handlers.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod import;
pub mod models;
pub mod reports;
pub mod repository;
pub mod session;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// Client side: auth context, route guard and page operations over HTTP.
pub mod client;

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{PostgresRepository, RepositoryState};
pub use session::{MemorySessionStore, SessionState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the OpenAPI
/// document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::logout, handlers::check_auth,
        handlers::get_users, handlers::add_user, handlers::register_student,
        handlers::get_business_queries, handlers::export_report,
        handlers::get_failing_students_count, handlers::upload_data,
        handlers::get_admin_dashboard_data, handlers::get_student_dashboard_data,
        handlers::apply_internship, handlers::get_coordinator_dashboard_data,
        handlers::get_mentor_dashboard_data, handlers::submit_evaluation
    ),
    components(
        schemas(
            models::Role, models::Grade, models::User, models::Student, models::Internship,
            models::Evaluation, models::LoginRequest, models::AddUserRequest,
            models::RegisterStudentRequest, models::InternshipApplication,
            models::EvaluationSubmission, models::MessageResponse, models::LoginResponse,
            models::AuthStatus, models::StudentDashboardRow, models::CoordinatorDashboardRow,
            models::MentorInfo, models::MentorStudentRow, models::MentorDashboard,
            models::AdminDashboardStats, models::FailingStudentsCount, models::CompanyGrade,
            models::MentorPositionCount, models::CoordinatorStudentCount,
            models::EvaluationGuidance, models::CompanyDurationReport,
            models::LowGradeStudent, models::BusinessQueries,
        )
    ),
    tags(
        (name = "field-training", description = "Field Training Portal API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single shared container handed to every handler. Cloning is cheap: services
/// sit behind `Arc`s and the configuration is small.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: abstracts Postgres access.
    pub repo: RepositoryState,
    /// Session Layer: server-side login records referenced by the session cookie.
    pub sessions: SessionState,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Lets the `AuthUser` extractor pull only the components it needs out of AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects requests without a live session before any protected handler runs.
/// `AuthUser` does the work: its rejection is the 401 response.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    // Credentialed CORS needs explicit origins, methods and headers.
    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// create_router
///
/// Assembles the routing tree, applies the scoped auth layer and the global
/// observability layers, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let x_request_id = HeaderName::from_static("x-request-id");

    // Everything under /api. Protected routes share one auth layer; role checks
    // happen inside the handlers.
    let api = Router::new().merge(public::public_routes()).merge(
        authenticated::authenticated_routes()
            .merge(admin::admin_routes())
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
    );

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::health_routes())
        .nest("/api", api)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span so every log line of a request carries its
/// `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
