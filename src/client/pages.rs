use crate::{
    client::{
        api::{ApiClient, ClientError},
        context::AuthContext,
        guard::{Access, guard},
        routes::Route,
    },
    models::{
        AddUserRequest, AdminDashboardStats, BusinessQueries, CoordinatorDashboardRow,
        EvaluationSubmission, FailingStudentsCount, InternshipApplication, MentorDashboard,
        MessageResponse, RegisterStudentRequest, StudentDashboardRow, User,
    },
};
use std::fmt;

/// PageError
///
/// Why a page operation produced no data: the guard sent the user elsewhere before any
/// request was made, or the page has a message to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    Redirect(Route),
    Message(String),
}

impl PageError {
    pub fn message(text: impl Into<String>) -> Self {
        PageError::Message(text.into())
    }
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageError::Redirect(route) => write!(f, "redirected to {}", route),
            PageError::Message(text) => f.write_str(text),
        }
    }
}

/// Submitted
///
/// Result of a successful form page: the server's confirmation and where to go next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub message: String,
    pub redirect: Route,
}

/// ExportedReport
///
/// A downloaded CSV, named the way the browser would save it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedReport {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Runs the guard for `page`; only a rendered page may talk to the server.
fn enter(ctx: &AuthContext, page: Route) -> Result<(), PageError> {
    match guard(ctx, page) {
        Access::Render => Ok(()),
        Access::Redirect(to) => Err(PageError::Redirect(to)),
    }
}

fn shown(context: &str, fallback: &str) -> impl FnOnce(ClientError) -> PageError {
    move |e| {
        tracing::warn!("{} error: {}", context, e);
        PageError::Message(e.user_message(fallback))
    }
}

async fn submit<B: serde::Serialize>(
    api: &ApiClient,
    path: &str,
    body: &B,
    redirect: Route,
    context: &str,
    fallback: &str,
) -> Result<Submitted, PageError> {
    let response: MessageResponse = api
        .post_json(path, body)
        .await
        .map_err(shown(context, fallback))?;
    Ok(Submitted {
        message: response.message,
        redirect,
    })
}

// --- Admin ---

pub async fn admin_dashboard(
    api: &ApiClient,
    ctx: &AuthContext,
) -> Result<AdminDashboardStats, PageError> {
    enter(ctx, Route::AdminDashboard)?;
    api.get_json("/admin_dashboard_data")
        .await
        .map_err(shown("Admin dashboard", "Failed to fetch dashboard data."))
}

pub async fn users_list(
    api: &ApiClient,
    ctx: &AuthContext,
) -> Result<Vec<User>, PageError> {
    enter(ctx, Route::UsersList)?;
    api.get_json("/users")
        .await
        .map_err(shown("Users list", "Failed to fetch users."))
}

/// Checks required fields locally, then posts; success leads to the users list.
pub async fn add_user(
    api: &ApiClient,
    ctx: &AuthContext,
    form: &AddUserRequest,
) -> Result<Submitted, PageError> {
    enter(ctx, Route::AddUser)?;
    form.validate().map_err(|e| PageError::Message(e.0))?;
    submit(api, "/add_user", form, Route::UsersList, "Add user", "Failed to add user.").await
}

pub async fn register_student(
    api: &ApiClient,
    ctx: &AuthContext,
    form: &RegisterStudentRequest,
) -> Result<Submitted, PageError> {
    enter(ctx, Route::RegisterStudent)?;
    form.validate().map_err(|e| PageError::Message(e.0))?;
    submit(
        api,
        "/register_student",
        form,
        Route::AdminDashboard,
        "Student registration",
        "Failed to register student.",
    )
    .await
}

pub async fn business_queries(
    api: &ApiClient,
    ctx: &AuthContext,
) -> Result<BusinessQueries, PageError> {
    enter(ctx, Route::BusinessQueries)?;
    api.get_json("/business_queries")
        .await
        .map_err(shown("Business queries", "Failed to fetch business queries."))
}

pub async fn export_report(
    api: &ApiClient,
    ctx: &AuthContext,
    name: &str,
) -> Result<ExportedReport, PageError> {
    enter(ctx, Route::BusinessQueries)?;
    let bytes = api
        .get_bytes(&format!("/export_report/{}", name))
        .await
        .map_err(shown("Export", "Failed to export report."))?;
    Ok(ExportedReport {
        file_name: format!("{}.csv", name),
        bytes,
    })
}

pub async fn failing_students(
    api: &ApiClient,
    ctx: &AuthContext,
) -> Result<i64, PageError> {
    enter(ctx, Route::FailingStudents)?;
    let body: FailingStudentsCount = api
        .get_json("/failing_students_count")
        .await
        .map_err(shown("Failing students count", "Failed to fetch failing students count."))?;
    Ok(body.failing_students_count)
}

/// upload_data
///
/// Stays on the page: the returned message is shown either way.
pub async fn upload_data(
    api: &ApiClient,
    ctx: &AuthContext,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<String, PageError> {
    enter(ctx, Route::UploadData)?;
    if file_name.trim().is_empty() {
        return Err(PageError::message("Please select a file to upload."));
    }
    let response: MessageResponse = api
        .post_file("/upload_data", file_name, bytes)
        .await
        .map_err(shown("Upload", "File upload failed."))?;
    Ok(response.message)
}

// --- Student ---

pub async fn student_dashboard(
    api: &ApiClient,
    ctx: &AuthContext,
) -> Result<Vec<StudentDashboardRow>, PageError> {
    enter(ctx, Route::StudentDashboard)?;
    api.get_json("/student_dashboard_data")
        .await
        .map_err(shown("Student dashboard", "Failed to fetch student data."))
}

pub async fn apply_internship(
    api: &ApiClient,
    ctx: &AuthContext,
    form: &InternshipApplication,
) -> Result<Submitted, PageError> {
    enter(ctx, Route::ApplyInternship)?;
    form.validate().map_err(|e| PageError::Message(e.0))?;
    submit(
        api,
        "/apply_internship",
        form,
        Route::StudentDashboard,
        "Internship application",
        "Failed to submit internship application.",
    )
    .await
}

// --- Coordinator / Mentor / Evaluator ---

pub async fn coordinator_dashboard(
    api: &ApiClient,
    ctx: &AuthContext,
) -> Result<Vec<CoordinatorDashboardRow>, PageError> {
    enter(ctx, Route::CoordinatorDashboard)?;
    api.get_json("/coordinator_dashboard_data")
        .await
        .map_err(shown("Coordinator dashboard", "Failed to fetch coordinator data."))
}

pub async fn mentor_dashboard(
    api: &ApiClient,
    ctx: &AuthContext,
) -> Result<MentorDashboard, PageError> {
    enter(ctx, Route::MentorDashboard)?;
    api.get_json("/mentor_dashboard_data")
        .await
        .map_err(shown("Mentor dashboard", "Failed to fetch mentor data."))
}

/// Evaluators stay on the form after submitting so they can grade the next student.
pub async fn submit_evaluation(
    api: &ApiClient,
    ctx: &AuthContext,
    form: &EvaluationSubmission,
) -> Result<Submitted, PageError> {
    enter(ctx, Route::SubmitEvaluation)?;
    form.validate().map_err(|e| PageError::Message(e.0))?;
    submit(
        api,
        "/submit_evaluation",
        form,
        Route::SubmitEvaluation,
        "Evaluation submission",
        "Failed to submit evaluation.",
    )
    .await
}
