use chrono::NaiveDate;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{self, Visitor},
};
use sqlx::FromRow;
use std::fmt;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::ValidationError;

// --- Roles & Grades ---

/// Role
///
/// The five account kinds known to the portal. The serialized names are the exact
/// strings the pages switch on, so they must not be renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum Role {
    Admin,
    Student,
    InternshipCoordinator,
    Mentor,
    InternshipEvaluator,
}

impl Role {
    /// Order in which the role tables are probed at login. First match wins.
    pub const RESOLUTION_ORDER: [Role; 5] = [
        Role::Admin,
        Role::Student,
        Role::InternshipCoordinator,
        Role::Mentor,
        Role::InternshipEvaluator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Student => "Student",
            Role::InternshipCoordinator => "InternshipCoordinator",
            Role::Mentor => "Mentor",
            Role::InternshipEvaluator => "InternshipEvaluator",
        }
    }

    /// Table holding one row per account of this role, keyed by `ssn`.
    pub fn table(&self) -> &'static str {
        match self {
            Role::Admin => "admins",
            Role::Student => "students",
            Role::InternshipCoordinator => "coordinators",
            Role::Mentor => "mentors",
            Role::InternshipEvaluator => "evaluators",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grade
///
/// Letter grades accepted by the evaluation form, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    C,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "D+")]
    DPlus,
    D,
    F,
}

impl Grade {
    pub const ALL: [Grade; 12] = [
        Grade::APlus,
        Grade::A,
        Grade::AMinus,
        Grade::BPlus,
        Grade::B,
        Grade::BMinus,
        Grade::CPlus,
        Grade::C,
        Grade::CMinus,
        Grade::DPlus,
        Grade::D,
        Grade::F,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::AMinus => "A-",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::BMinus => "B-",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::CMinus => "C-",
            Grade::DPlus => "D+",
            Grade::D => "D",
            Grade::F => "F",
        }
    }

    pub fn parse(value: &str) -> Option<Grade> {
        Grade::ALL.into_iter().find(|g| g.as_str() == value.trim())
    }

    /// Warned students: `D` and `F` only.
    pub fn is_low(&self) -> bool {
        matches!(self, Grade::D | Grade::F)
    }

    pub fn is_failing(&self) -> bool {
        matches!(self, Grade::F)
    }

    pub fn is_high(&self) -> bool {
        matches!(self, Grade::APlus | Grade::A)
    }

    /// Rank used for "best grade" comparisons; higher is better.
    pub fn rank(&self) -> u8 {
        (Grade::ALL.len() - Grade::ALL.iter().position(|g| g == self).unwrap_or(11)) as u8
    }
}

// --- Core Records (Mapped to Database) ---

/// User
///
/// A person known to the portal, keyed by SSN. Role membership lives in the
/// per-role tables, not here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct User {
    pub ssn: String,
    pub name: String,
    pub email: String,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

/// Student
///
/// Student record with its supervisory links. `mentor_id`, `coordinator_id` and
/// `evaluator_id` are SSNs of the linked accounts.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Student {
    pub ssn: String,
    pub level: i16,
    pub mentor_id: Option<String>,
    pub coordinator_id: String,
    pub evaluator_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Internship {
    pub student_id: String,
    pub company_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub mentor_id: Option<String>,
    pub coordinator_id: String,
    pub evaluator_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Evaluation {
    pub student_id: String,
    pub final_grade: String,
    pub performance_score: i32,
    pub comments: String,
    pub evaluator_id: String,
    pub coordinator_id: String,
}

// --- Request Payloads (Input Schemas) ---
//
// Every text field defaults to empty so a missing field reaches `validate` and is
// reported as a message instead of failing JSON extraction.

/// Accepts `2`, `"2"`, `""` and `null` for a numeric form field. Form inputs post their
/// values as strings; a blank one counts as missing.
fn deserialize_number_or_string<'de, D, N>(deserializer: D) -> Result<Option<N>, D::Error>
where
    D: Deserializer<'de>,
    N: TryFrom<i64>,
{
    struct NumberOrString;

    impl<'de> Visitor<'de> for NumberOrString {
        type Value = Option<i64>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("an integer or a string holding one")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D2: Deserializer<'de>>(self, d: D2) -> Result<Self::Value, D2::Error> {
            d.deserialize_any(NumberOrString)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
            Ok(Some(value))
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
            i64::try_from(value)
                .map(Some)
                .map_err(|_| E::custom(format!("number {} is out of range", value)))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<i64>()
                .map(Some)
                .map_err(|_| E::custom(format!("'{}' is not a whole number", value)))
        }
    }

    match deserializer.deserialize_any(NumberOrString)? {
        None => Ok(None),
        Some(value) => N::try_from(value)
            .map(Some)
            .map_err(|_| de::Error::custom(format!("number {} is out of range", value))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[serde(default)]
    pub ssn: String,
}

/// AddUserRequest
///
/// Input payload for POST /add_user. `date_of_birth` is an ISO `YYYY-MM-DD` string.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AddUserRequest {
    #[serde(default)]
    pub ssn: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub date_of_birth: String,
}

/// RegisterStudentRequest
///
/// Input payload for POST /register_student. Creates the user row when absent.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterStudentRequest {
    #[serde(default)]
    pub ssn: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "deserialize_number_or_string")]
    pub level: Option<i16>,
    #[serde(default)]
    pub mentor_id: Option<String>,
    #[serde(default)]
    pub coordinator_id: String,
    #[serde(default)]
    pub evaluator_id: String,
}

/// InternshipApplication
///
/// Input payload for POST /apply_internship. The student is always the session owner,
/// so no student id travels in the body.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct InternshipApplication {
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub mentor_id: Option<String>,
    #[serde(default)]
    pub coordinator_id: String,
    #[serde(default)]
    pub evaluator_id: String,
}

/// EvaluationSubmission
///
/// Input payload for POST /submit_evaluation. The evaluator is the session owner.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct EvaluationSubmission {
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub final_grade: String,
    #[serde(default, deserialize_with = "deserialize_number_or_string")]
    pub performance_score: Option<i32>,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub coordinator_id: String,
}

// --- Validated Inputs ---

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub ssn: String,
    pub name: String,
    pub email: String,
    pub address: Option<String>,
    pub date_of_birth: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewStudent {
    pub ssn: String,
    pub name: String,
    pub email: String,
    pub level: i16,
    pub mentor_id: Option<String>,
    pub coordinator_id: String,
    pub evaluator_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewInternship {
    pub company_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub mentor_id: Option<String>,
    pub coordinator_id: String,
    pub evaluator_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEvaluation {
    pub student_id: String,
    pub final_grade: Grade,
    pub performance_score: i32,
    pub comments: String,
    pub coordinator_id: String,
}

fn required(value: &str, message: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(message));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ValidationError::new(format!("{} must be a date in YYYY-MM-DD format.", field))
    })
}

impl LoginRequest {
    pub fn validate(&self) -> Result<String, ValidationError> {
        required(&self.ssn, "SSN is required.")
    }
}

impl AddUserRequest {
    pub fn validate(&self) -> Result<NewUser, ValidationError> {
        const MISSING: &str = "SSN, Name, Email, and Date of Birth are required.";
        let ssn = required(&self.ssn, MISSING)?;
        let name = required(&self.name, MISSING)?;
        let email = required(&self.email, MISSING)?;
        let dob = required(&self.date_of_birth, MISSING)?;

        Ok(NewUser {
            ssn,
            name,
            email,
            address: optional(self.address.as_deref()),
            date_of_birth: parse_date(&dob, "Date of Birth")?,
        })
    }
}

impl RegisterStudentRequest {
    pub fn validate(&self) -> Result<NewStudent, ValidationError> {
        const MISSING: &str =
            "SSN, Name, Email, Level, Coordinator ID, and Evaluator ID are required.";
        let ssn = required(&self.ssn, MISSING)?;
        let name = required(&self.name, MISSING)?;
        let email = required(&self.email, MISSING)?;
        let coordinator_id = required(&self.coordinator_id, MISSING)?;
        let evaluator_id = required(&self.evaluator_id, MISSING)?;

        let level = self.level.ok_or_else(|| ValidationError::new(MISSING))?;
        if !(1..=4).contains(&level) {
            return Err(ValidationError::new("Level must be between 1 and 4."));
        }

        Ok(NewStudent {
            ssn,
            name,
            email,
            level,
            mentor_id: optional(self.mentor_id.as_deref()),
            coordinator_id,
            evaluator_id,
        })
    }
}

impl InternshipApplication {
    pub fn validate(&self) -> Result<NewInternship, ValidationError> {
        const MISSING: &str =
            "Company name, start date, end date, coordinator ID, and evaluator ID are required.";
        let company_name = required(&self.company_name, MISSING)?;
        let start = required(&self.start_date, MISSING)?;
        let end = required(&self.end_date, MISSING)?;
        let coordinator_id = required(&self.coordinator_id, MISSING)?;
        let evaluator_id = required(&self.evaluator_id, MISSING)?;

        let start_date = parse_date(&start, "Start date")?;
        let end_date = parse_date(&end, "End date")?;
        if end_date < start_date {
            return Err(ValidationError::new("End date cannot be before start date."));
        }

        Ok(NewInternship {
            company_name,
            start_date,
            end_date,
            mentor_id: optional(self.mentor_id.as_deref()),
            coordinator_id,
            evaluator_id,
        })
    }
}

impl EvaluationSubmission {
    pub fn validate(&self) -> Result<NewEvaluation, ValidationError> {
        const MISSING: &str =
            "Student ID, final grade, performance score, comments, and coordinator ID are required.";
        let student_id = required(&self.student_id, MISSING)?;
        let grade = required(&self.final_grade, MISSING)?;
        let comments = required(&self.comments, MISSING)?;
        let coordinator_id = required(&self.coordinator_id, MISSING)?;
        let performance_score = self
            .performance_score
            .ok_or_else(|| ValidationError::new(MISSING))?;

        let final_grade = Grade::parse(&grade)
            .ok_or_else(|| ValidationError::new(format!("Unknown grade '{}'.", grade)))?;

        if !(0..=100).contains(&performance_score) {
            return Err(ValidationError::new(
                "Performance score must be between 0 and 100.",
            ));
        }

        Ok(NewEvaluation {
            student_id,
            final_grade,
            performance_score,
            comments,
            coordinator_id,
        })
    }
}

// --- Response Schemas (Output) ---

/// MessageResponse
///
/// The body of every write acknowledgement and every error.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct LoginResponse {
    pub message: String,
    pub ssn: String,
    pub role: Role,
}

/// AuthStatus
///
/// Output of GET /check_auth. `ssn` and `role` are omitted when unauthenticated.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct AuthStatus {
    #[serde(rename = "isAuthenticated")]
    pub is_authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl AuthStatus {
    pub fn anonymous() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct StudentDashboardRow {
    pub ssn: String,
    pub full_name: String,
    pub email: String,
    pub grade: Option<String>,
    pub company_name: Option<String>,
    pub mentor_position: Option<String>,
    pub mentor_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct CoordinatorDashboardRow {
    pub student_ssn: String,
    pub student_name: String,
    pub student_email: String,
    pub level: i16,
    pub company_name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub final_grade: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct MentorInfo {
    pub mentor_type: Option<String>,
    pub position: Option<String>,
    pub mentor_company: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct MentorStudentRow {
    pub ssn: String,
    pub student_name: String,
    pub student_email: String,
    pub company_name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub final_grade: Option<String>,
    pub comments: Option<String>,
}

/// MentorDashboard
///
/// Output of GET /mentor_dashboard_data: the mentor's own record plus assigned students.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct MentorDashboard {
    pub mentor_info: Option<MentorInfo>,
    pub students: Vec<MentorStudentRow>,
}

/// AdminDashboardStats
///
/// Output of GET /admin_dashboard_data.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct AdminDashboardStats {
    pub total_users: i64,
    pub total_students: i64,
    pub total_internships: i64,
    pub total_evaluations: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct FailingStudentsCount {
    pub failing_students_count: i64,
}

// --- Business Query Rows ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct CompanyGrade {
    pub company_name: String,
    pub highest_grade: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct MentorPositionCount {
    pub position: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct CoordinatorStudentCount {
    pub coordinator_name: String,
    pub total_students: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct EvaluationGuidance {
    pub student_ssn: String,
    pub evaluation: String,
    pub mentor_position: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct CompanyDurationReport {
    pub company_name: String,
    /// Average internship length in days.
    pub duration: i32,
    pub reports: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct LowGradeStudent {
    pub ssn: String,
    pub name: String,
    pub final_grade: String,
}

/// BusinessQueries
///
/// Output of GET /business_queries: the six aggregate reports shown to the admin.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct BusinessQueries {
    pub highest_grade_internship: Option<CompanyGrade>,
    pub most_selected_mentor: Vec<MentorPositionCount>,
    pub students_per_coordinator: Vec<CoordinatorStudentCount>,
    pub evaluations_mentor_guidance: Vec<EvaluationGuidance>,
    pub internship_duration_reports: Vec<CompanyDurationReport>,
    pub low_grade_students: Vec<LowGradeStudent>,
}
