use crate::models::Role;

/// Route
///
/// Every page the portal can display. `allowed_roles` is the guard's allow-list;
/// `None` marks a public page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    AdminDashboard,
    AddUser,
    UsersList,
    BusinessQueries,
    UploadData,
    FailingStudents,
    RegisterStudent,
    StudentDashboard,
    ApplyInternship,
    CoordinatorDashboard,
    MentorDashboard,
    SubmitEvaluation,
    NotFound,
}

const ADMIN: &[Role] = &[Role::Admin];
const STUDENT: &[Role] = &[Role::Student];
const COORDINATOR: &[Role] = &[Role::InternshipCoordinator];
const MENTOR: &[Role] = &[Role::Mentor];
const EVALUATOR: &[Role] = &[Role::InternshipEvaluator];

impl Route {
    /// Routes reachable by path, i.e. all but `NotFound`.
    pub const ALL: [Route; 14] = [
        Route::Home,
        Route::Login,
        Route::AdminDashboard,
        Route::AddUser,
        Route::UsersList,
        Route::BusinessQueries,
        Route::UploadData,
        Route::FailingStudents,
        Route::RegisterStudent,
        Route::StudentDashboard,
        Route::ApplyInternship,
        Route::CoordinatorDashboard,
        Route::MentorDashboard,
        Route::SubmitEvaluation,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::AdminDashboard => "/admin",
            Route::AddUser => "/add-user",
            Route::UsersList => "/users-list",
            Route::BusinessQueries => "/business-queries",
            Route::UploadData => "/upload-data",
            Route::FailingStudents => "/failing-students",
            Route::RegisterStudent => "/register-student",
            Route::StudentDashboard => "/student",
            Route::ApplyInternship => "/apply-internship",
            Route::CoordinatorDashboard => "/coordinator",
            Route::MentorDashboard => "/mentor",
            Route::SubmitEvaluation => "/submit-evaluation",
            Route::NotFound => "*",
        }
    }

    /// Matches a location against the table. Query strings, fragments and a
    /// trailing slash are ignored; anything unknown is `NotFound`.
    pub fn from_path(path: &str) -> Route {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };

        Self::ALL
            .into_iter()
            .find(|route| route.path() == path)
            .unwrap_or(Route::NotFound)
    }

    pub fn allowed_roles(&self) -> Option<&'static [Role]> {
        match self {
            Route::Home | Route::Login | Route::NotFound => None,
            Route::AdminDashboard
            | Route::AddUser
            | Route::UsersList
            | Route::BusinessQueries
            | Route::UploadData
            | Route::FailingStudents
            | Route::RegisterStudent => Some(ADMIN),
            Route::StudentDashboard | Route::ApplyInternship => Some(STUDENT),
            Route::CoordinatorDashboard => Some(COORDINATOR),
            Route::MentorDashboard => Some(MENTOR),
            Route::SubmitEvaluation => Some(EVALUATOR),
        }
    }

    pub fn is_public(&self) -> bool {
        self.allowed_roles().is_none()
    }

    /// Landing page after login.
    pub fn dashboard_for(role: Role) -> Route {
        match role {
            Role::Admin => Route::AdminDashboard,
            Role::Student => Route::StudentDashboard,
            Role::InternshipCoordinator => Route::CoordinatorDashboard,
            Role::Mentor => Route::MentorDashboard,
            Role::InternshipEvaluator => Route::SubmitEvaluation,
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}
