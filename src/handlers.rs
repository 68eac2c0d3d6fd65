use crate::{
    AppState,
    auth::{self, AuthUser},
    error::{ApiError, JsonBody},
    import,
    models::{
        AddUserRequest, AdminDashboardStats, AuthStatus, BusinessQueries,
        CoordinatorDashboardRow, EvaluationSubmission, FailingStudentsCount,
        InternshipApplication, LoginRequest, LoginResponse, MentorDashboard, MessageResponse,
        RegisterStudentRequest, Role, StudentDashboardRow, User,
    },
    reports::{self, ReportName},
};
use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

// --- Session ---

/// login
///
/// [Public Route] Resolves the role for an SSN and opens a session.
///
/// The session lives in the server-side store; the response sets an HttpOnly cookie
/// carrying a signed reference to it. A session already attached to the request is
/// revoked first so one browser never holds two.
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "SSN missing", body = MessageResponse),
        (status = 401, description = "Unknown SSN", body = MessageResponse)
    )
)]
pub async fn login(
    current: Option<AuthUser>,
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let ssn = payload.validate()?;

    let role = state
        .repo
        .resolve_role(&ssn)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if let Some(previous) = current.and_then(|user| user.session_id) {
        state.sessions.revoke(previous).await;
    }

    let session = state
        .sessions
        .create(&ssn, role, state.config.session_ttl())
        .await;
    let token = auth::issue_token(&state.config, &session)?;

    tracing::info!(%role, session_id = %session.id, "login succeeded");

    let jar = jar.add(auth::session_cookie(&state.config, token));
    Ok((
        jar,
        Json(LoginResponse {
            message: "Login successful".to_string(),
            ssn,
            role,
        }),
    ))
}

/// logout
///
/// [Authenticated Route] Revokes the current session and expires the cookie.
#[utoipa::path(
    post,
    path = "/api/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "No session", body = MessageResponse)
    )
)]
pub async fn logout(
    user: AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    if let Some(session_id) = user.session_id {
        state.sessions.revoke(session_id).await;
    }
    tracing::info!(role = %user.role, "logout");

    (
        jar.remove(auth::expired_session_cookie()),
        Json(MessageResponse::new("Logged out successfully")),
    )
}

/// check_auth
///
/// [Public Route] Reports whether the request carries a live session. Always 200.
#[utoipa::path(
    get,
    path = "/api/check_auth",
    responses((status = 200, description = "Session status", body = AuthStatus))
)]
pub async fn check_auth(user: Option<AuthUser>) -> Json<AuthStatus> {
    match user {
        Some(user) => Json(AuthStatus {
            is_authenticated: true,
            ssn: Some(user.ssn),
            role: Some(user.role),
        }),
        None => Json(AuthStatus::anonymous()),
    }
}

// --- Admin ---

/// get_users
///
/// [Admin Route] Lists every user ordered by SSN.
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 403, description = "Not an admin", body = MessageResponse)
    )
)]
pub async fn get_users(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, ApiError> {
    user.require(&[Role::Admin])?;
    Ok(Json(state.repo.list_users().await?))
}

/// add_user
///
/// [Admin Route] Creates a single user. Duplicate SSNs are rejected with 409.
#[utoipa::path(
    post,
    path = "/api/add_user",
    request_body = AddUserRequest,
    responses(
        (status = 201, description = "User created", body = MessageResponse),
        (status = 400, description = "Missing or malformed fields", body = MessageResponse),
        (status = 409, description = "SSN already exists", body = MessageResponse)
    )
)]
pub async fn add_user(
    user: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<AddUserRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    user.require(&[Role::Admin])?;
    let new_user = payload.validate()?;

    let created = state.repo.create_user(new_user).await?;
    tracing::info!(ssn = %created.ssn, "user added");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User added successfully!")),
    ))
}

/// register_student
///
/// [Admin Route] Registers a student with their coordinator, evaluator and optional
/// mentor. The user row is created when it does not exist yet.
#[utoipa::path(
    post,
    path = "/api/register_student",
    request_body = RegisterStudentRequest,
    responses(
        (status = 201, description = "Student registered", body = MessageResponse),
        (status = 400, description = "Invalid fields or unknown links", body = MessageResponse),
        (status = 409, description = "Student already registered", body = MessageResponse)
    )
)]
pub async fn register_student(
    user: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterStudentRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    user.require(&[Role::Admin])?;
    let student = payload.validate()?;

    let created = state.repo.register_student(student).await?;
    tracing::info!(ssn = %created.ssn, level = created.level, "student registered");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Student registered successfully")),
    ))
}

/// get_business_queries
///
/// [Admin Route] The six aggregate reports shown on the business queries page.
#[utoipa::path(
    get,
    path = "/api/business_queries",
    responses((status = 200, description = "Aggregate reports", body = BusinessQueries))
)]
pub async fn get_business_queries(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<BusinessQueries>, ApiError> {
    user.require(&[Role::Admin])?;
    Ok(Json(state.repo.business_queries().await?))
}

/// export_report
///
/// [Admin Route] Downloads a named report as a CSV attachment.
#[utoipa::path(
    get,
    path = "/api/export_report/{name}",
    params(("name" = String, Path, description = "Report name, e.g. low_grade_students")),
    responses(
        (status = 200, description = "CSV file", body = String, content_type = "text/csv"),
        (status = 400, description = "Unknown report", body = MessageResponse),
        (status = 404, description = "Report has no rows", body = MessageResponse)
    )
)]
pub async fn export_report(
    user: AuthUser,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    user.require(&[Role::Admin])?;

    let report = ReportName::parse(&name)
        .ok_or_else(|| ApiError::Validation(format!("Unknown report '{}'.", name)))?;

    let bytes = match report {
        ReportName::LowGradeStudents => {
            let rows = state.repo.low_grade_students().await?;
            if rows.is_empty() {
                return Err(ApiError::NotFound(format!(
                    "No data to export for {}.",
                    report.as_str()
                )));
            }
            reports::to_csv(&rows)?
        }
    };

    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", report.file_name()),
        ),
    ];
    Ok((headers, bytes).into_response())
}

/// get_failing_students_count
///
/// [Admin Route] Number of evaluations graded `F`.
#[utoipa::path(
    get,
    path = "/api/failing_students_count",
    responses((status = 200, description = "Failing count", body = FailingStudentsCount))
)]
pub async fn get_failing_students_count(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FailingStudentsCount>, ApiError> {
    user.require(&[Role::Admin])?;
    let failing_students_count = state.repo.failing_students_count().await?;
    Ok(Json(FailingStudentsCount {
        failing_students_count,
    }))
}

/// upload_data
///
/// [Admin Route] Bulk user import from a multipart `file` field holding a CSV.
///
/// *Note*: Parsing and writing live in `import_users` so they can be exercised
/// without building a multipart request.
#[utoipa::path(
    post,
    path = "/api/upload_data",
    request_body(content = String, content_type = "multipart/form-data", description = "CSV in a `file` field"),
    responses(
        (status = 200, description = "Rows imported", body = MessageResponse),
        (status = 400, description = "Missing file, wrong type or invalid rows", body = MessageResponse)
    )
)]
pub async fn upload_data(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    user.require(&[Role::Admin])?;
    let mut multipart = multipart?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("Malformed upload: {}", e)))?;

        return import_users(&state, &file_name, &bytes).await.map(Json);
    }

    Err(ApiError::Validation("No file part".to_string()))
}

/// import_users
///
/// Validates the file name and every row before touching the database, then writes
/// all rows in one transaction.
pub async fn import_users(
    state: &AppState,
    file_name: &str,
    bytes: &[u8],
) -> Result<MessageResponse, ApiError> {
    import::check_upload_name(file_name)?;
    let users = import::parse_user_csv(bytes)?;

    let written = state.repo.upsert_users(users).await?;
    tracing::info!(file_name, rows = written, "user upload imported");

    Ok(MessageResponse::new(format!(
        "File uploaded and {} rows processed successfully for '{}' table!",
        written,
        import::USER_TABLE_LABEL
    )))
}

/// get_admin_dashboard_data
///
/// [Admin Route] Row counts shown on the admin landing page.
#[utoipa::path(
    get,
    path = "/api/admin_dashboard_data",
    responses((status = 200, description = "Counts", body = AdminDashboardStats))
)]
pub async fn get_admin_dashboard_data(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<AdminDashboardStats>, ApiError> {
    user.require(&[Role::Admin])?;
    Ok(Json(state.repo.admin_stats().await?))
}

// --- Student ---

/// get_student_dashboard_data
///
/// [Student Route] The session owner's internship, grade and mentor summary.
#[utoipa::path(
    get,
    path = "/api/student_dashboard_data",
    responses((status = 200, description = "Student rows", body = [StudentDashboardRow]))
)]
pub async fn get_student_dashboard_data(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<StudentDashboardRow>>, ApiError> {
    user.require(&[Role::Student])?;
    Ok(Json(state.repo.student_dashboard(&user.ssn).await?))
}

/// apply_internship
///
/// [Student Route] Files an internship for the session owner. One per student.
#[utoipa::path(
    post,
    path = "/api/apply_internship",
    request_body = InternshipApplication,
    responses(
        (status = 201, description = "Application stored", body = MessageResponse),
        (status = 400, description = "Invalid fields or already placed", body = MessageResponse)
    )
)]
pub async fn apply_internship(
    user: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<InternshipApplication>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    user.require(&[Role::Student])?;
    let internship = payload.validate()?;

    let created = state.repo.create_internship(&user.ssn, internship).await?;
    tracing::info!(company = %created.company_name, "internship application stored");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(
            "Internship application submitted successfully",
        )),
    ))
}

// --- Coordinator / Mentor / Evaluator ---

/// get_coordinator_dashboard_data
///
/// [Coordinator Route] Students linked to the session's coordinator.
#[utoipa::path(
    get,
    path = "/api/coordinator_dashboard_data",
    responses((status = 200, description = "Coordinated students", body = [CoordinatorDashboardRow]))
)]
pub async fn get_coordinator_dashboard_data(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CoordinatorDashboardRow>>, ApiError> {
    user.require(&[Role::InternshipCoordinator])?;
    Ok(Json(state.repo.coordinator_dashboard(&user.ssn).await?))
}

/// get_mentor_dashboard_data
///
/// [Mentor Route] The mentor's record and the students they supervise.
#[utoipa::path(
    get,
    path = "/api/mentor_dashboard_data",
    responses((status = 200, description = "Mentor dashboard", body = MentorDashboard))
)]
pub async fn get_mentor_dashboard_data(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MentorDashboard>, ApiError> {
    user.require(&[Role::Mentor])?;
    Ok(Json(state.repo.mentor_dashboard(&user.ssn).await?))
}

/// submit_evaluation
///
/// [Evaluator Route] Grades a placed student. Re-submitting overwrites the grade.
#[utoipa::path(
    post,
    path = "/api/submit_evaluation",
    request_body = EvaluationSubmission,
    responses(
        (status = 201, description = "Evaluation stored", body = MessageResponse),
        (status = 400, description = "Invalid fields", body = MessageResponse),
        (status = 404, description = "Student not placed", body = MessageResponse)
    )
)]
pub async fn submit_evaluation(
    user: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<EvaluationSubmission>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    user.require(&[Role::InternshipEvaluator])?;
    let evaluation = payload.validate()?;

    let stored = state.repo.upsert_evaluation(&user.ssn, evaluation).await?;
    tracing::info!(student = %stored.student_id, grade = %stored.final_grade, "evaluation stored");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Evaluation submitted successfully")),
    ))
}
