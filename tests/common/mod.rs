#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use field_training::{
    AppConfig, AppState, MemorySessionStore, create_router,
    error::RepoError,
    models::{
        AdminDashboardStats, BusinessQueries, CompanyGrade, CoordinatorDashboardRow, Evaluation,
        Grade, Internship, LowGradeStudent, MentorDashboard, MentorInfo, MentorStudentRow,
        NewEvaluation, NewInternship, NewStudent, NewUser, Role, Student, StudentDashboardRow,
        User,
    },
    repository::{Repository, RepositoryState},
    session::SessionState,
};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex},
};
use tokio::net::TcpListener;

// --- In-memory Repository ---

#[derive(Default)]
struct Tables {
    users: BTreeMap<String, User>,
    roles: HashMap<Role, HashSet<String>>,
    mentors: HashMap<String, MentorInfo>,
    students: BTreeMap<String, Student>,
    internships: HashMap<String, Internship>,
    evaluations: HashMap<String, Evaluation>,
}

impl Tables {
    fn has_role(&self, role: Role, ssn: &str) -> bool {
        self.roles.get(&role).is_some_and(|set| set.contains(ssn))
    }

    fn links_exist(&self, mentor: Option<&str>, coordinator: &str, evaluator: &str) -> bool {
        mentor.is_none_or(|m| self.has_role(Role::Mentor, m))
            && self.has_role(Role::InternshipCoordinator, coordinator)
            && self.has_role(Role::InternshipEvaluator, evaluator)
    }

    fn user_name(&self, ssn: &str) -> String {
        self.users
            .get(ssn)
            .map(|u| u.name.clone())
            .unwrap_or_default()
    }

    fn user_email(&self, ssn: &str) -> String {
        self.users
            .get(ssn)
            .map(|u| u.email.clone())
            .unwrap_or_default()
    }
}

/// MemoryRepository
///
/// Mirrors the Postgres repository's observable behavior (messages, conflicts,
/// link checks) without a database, so handler and HTTP tests run anywhere.
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
}

const INVALID_LINK: &str = "Mentor, coordinator or evaluator ID does not match an existing record.";

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_user(&self, ssn: &str, name: &str) {
        let mut t = self.tables.lock().unwrap();
        t.users.insert(
            ssn.to_string(),
            User {
                ssn: ssn.to_string(),
                name: name.to_string(),
                email: format!("{}@uni.test", ssn),
                address: None,
                date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1),
            },
        );
    }

    pub fn grant(&self, role: Role, ssn: &str) {
        let mut t = self.tables.lock().unwrap();
        t.roles.entry(role).or_default().insert(ssn.to_string());
    }

    pub fn seed_mentor(&self, ssn: &str, name: &str, position: &str) {
        self.seed_user(ssn, name);
        self.grant(Role::Mentor, ssn);
        let mut t = self.tables.lock().unwrap();
        t.mentors.insert(
            ssn.to_string(),
            MentorInfo {
                mentor_type: Some("Industry".to_string()),
                position: Some(position.to_string()),
                mentor_company: Some("Acme".to_string()),
            },
        );
    }

    pub fn user_count(&self) -> usize {
        self.tables.lock().unwrap().users.len()
    }

    pub fn evaluation_for(&self, student: &str) -> Option<Evaluation> {
        self.tables
            .lock()
            .unwrap()
            .evaluations
            .get(student)
            .cloned()
    }

    pub fn internship_for(&self, student: &str) -> Option<Internship> {
        self.tables
            .lock()
            .unwrap()
            .internships
            .get(student)
            .cloned()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn resolve_role(&self, ssn: &str) -> Result<Option<Role>, RepoError> {
        let t = self.tables.lock().unwrap();
        Ok(Role::RESOLUTION_ORDER
            .into_iter()
            .find(|role| t.has_role(*role, ssn)))
    }

    async fn list_users(&self) -> Result<Vec<User>, RepoError> {
        Ok(self.tables.lock().unwrap().users.values().cloned().collect())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let mut t = self.tables.lock().unwrap();
        if t.users.contains_key(&user.ssn) {
            return Err(RepoError::Conflict(format!(
                "Error: User with SSN '{}' already exists.",
                user.ssn
            )));
        }
        let created = User {
            ssn: user.ssn.clone(),
            name: user.name,
            email: user.email,
            address: user.address,
            date_of_birth: Some(user.date_of_birth),
        };
        t.users.insert(user.ssn, created.clone());
        Ok(created)
    }

    async fn upsert_users(&self, users: Vec<NewUser>) -> Result<usize, RepoError> {
        let mut t = self.tables.lock().unwrap();
        let count = users.len();
        for user in users {
            t.users.insert(
                user.ssn.clone(),
                User {
                    ssn: user.ssn,
                    name: user.name,
                    email: user.email,
                    address: user.address,
                    date_of_birth: Some(user.date_of_birth),
                },
            );
        }
        Ok(count)
    }

    async fn register_student(&self, student: NewStudent) -> Result<Student, RepoError> {
        let mut t = self.tables.lock().unwrap();
        if t.students.contains_key(&student.ssn) {
            return Err(RepoError::Conflict(format!(
                "Student with SSN '{}' is already registered.",
                student.ssn
            )));
        }
        if !t.links_exist(
            student.mentor_id.as_deref(),
            &student.coordinator_id,
            &student.evaluator_id,
        ) {
            return Err(RepoError::Invalid(INVALID_LINK.to_string()));
        }

        t.users.entry(student.ssn.clone()).or_insert_with(|| User {
            ssn: student.ssn.clone(),
            name: student.name.clone(),
            email: student.email.clone(),
            address: None,
            date_of_birth: None,
        });
        t.roles
            .entry(Role::Student)
            .or_default()
            .insert(student.ssn.clone());

        let created = Student {
            ssn: student.ssn.clone(),
            level: student.level,
            mentor_id: student.mentor_id,
            coordinator_id: student.coordinator_id,
            evaluator_id: student.evaluator_id,
        };
        t.students.insert(student.ssn, created.clone());
        Ok(created)
    }

    async fn create_internship(
        &self,
        student_id: &str,
        internship: NewInternship,
    ) -> Result<Internship, RepoError> {
        let mut t = self.tables.lock().unwrap();
        if t.internships.contains_key(student_id) {
            return Err(RepoError::Invalid(
                "Student already has an internship assigned".to_string(),
            ));
        }
        if !t.links_exist(
            internship.mentor_id.as_deref(),
            &internship.coordinator_id,
            &internship.evaluator_id,
        ) {
            return Err(RepoError::Invalid(INVALID_LINK.to_string()));
        }

        let created = Internship {
            student_id: student_id.to_string(),
            company_name: internship.company_name,
            start_date: internship.start_date,
            end_date: internship.end_date,
            mentor_id: internship.mentor_id,
            coordinator_id: internship.coordinator_id,
            evaluator_id: internship.evaluator_id,
        };
        t.internships.insert(student_id.to_string(), created.clone());
        Ok(created)
    }

    async fn upsert_evaluation(
        &self,
        evaluator_id: &str,
        evaluation: NewEvaluation,
    ) -> Result<Evaluation, RepoError> {
        let mut t = self.tables.lock().unwrap();
        if !t.students.contains_key(&evaluation.student_id)
            || !t.internships.contains_key(&evaluation.student_id)
        {
            return Err(RepoError::NotFound(
                "Student not found or no internship assigned".to_string(),
            ));
        }

        let stored = Evaluation {
            student_id: evaluation.student_id.clone(),
            final_grade: evaluation.final_grade.as_str().to_string(),
            performance_score: evaluation.performance_score,
            comments: evaluation.comments,
            evaluator_id: evaluator_id.to_string(),
            coordinator_id: evaluation.coordinator_id,
        };
        t.evaluations.insert(evaluation.student_id, stored.clone());
        Ok(stored)
    }

    async fn student_dashboard(&self, ssn: &str) -> Result<Vec<StudentDashboardRow>, RepoError> {
        let t = self.tables.lock().unwrap();
        let Some(student) = t.students.get(ssn) else {
            return Ok(vec![]);
        };
        let mentor = student.mentor_id.as_ref().and_then(|m| t.mentors.get(m));
        Ok(vec![StudentDashboardRow {
            ssn: ssn.to_string(),
            full_name: t.user_name(ssn),
            email: t.user_email(ssn),
            grade: t.evaluations.get(ssn).map(|e| e.final_grade.clone()),
            company_name: t.internships.get(ssn).map(|i| i.company_name.clone()),
            mentor_position: mentor.and_then(|m| m.position.clone()),
            mentor_type: mentor.and_then(|m| m.mentor_type.clone()),
        }])
    }

    async fn coordinator_dashboard(
        &self,
        coordinator_id: &str,
    ) -> Result<Vec<CoordinatorDashboardRow>, RepoError> {
        let t = self.tables.lock().unwrap();
        Ok(t.students
            .values()
            .filter(|s| s.coordinator_id == coordinator_id)
            .map(|s| {
                let internship = t.internships.get(&s.ssn);
                CoordinatorDashboardRow {
                    student_ssn: s.ssn.clone(),
                    student_name: t.user_name(&s.ssn),
                    student_email: t.user_email(&s.ssn),
                    level: s.level,
                    company_name: internship.map(|i| i.company_name.clone()),
                    start_date: internship.map(|i| i.start_date),
                    end_date: internship.map(|i| i.end_date),
                    final_grade: t.evaluations.get(&s.ssn).map(|e| e.final_grade.clone()),
                }
            })
            .collect())
    }

    async fn mentor_dashboard(&self, mentor_id: &str) -> Result<MentorDashboard, RepoError> {
        let t = self.tables.lock().unwrap();
        let students = t
            .students
            .values()
            .filter(|s| s.mentor_id.as_deref() == Some(mentor_id))
            .map(|s| {
                let internship = t.internships.get(&s.ssn);
                let evaluation = t.evaluations.get(&s.ssn);
                MentorStudentRow {
                    ssn: s.ssn.clone(),
                    student_name: t.user_name(&s.ssn),
                    student_email: t.user_email(&s.ssn),
                    company_name: internship.map(|i| i.company_name.clone()),
                    start_date: internship.map(|i| i.start_date),
                    end_date: internship.map(|i| i.end_date),
                    final_grade: evaluation.map(|e| e.final_grade.clone()),
                    comments: evaluation.map(|e| e.comments.clone()),
                }
            })
            .collect();
        Ok(MentorDashboard {
            mentor_info: t.mentors.get(mentor_id).cloned(),
            students,
        })
    }

    async fn admin_stats(&self) -> Result<AdminDashboardStats, RepoError> {
        let t = self.tables.lock().unwrap();
        Ok(AdminDashboardStats {
            total_users: t.users.len() as i64,
            total_students: t.students.len() as i64,
            total_internships: t.internships.len() as i64,
            total_evaluations: t.evaluations.len() as i64,
        })
    }

    async fn business_queries(&self) -> Result<BusinessQueries, RepoError> {
        let highest_grade_internship = {
            let t = self.tables.lock().unwrap();
            t.evaluations
                .values()
                .filter_map(|e| {
                    let rank = Grade::parse(&e.final_grade)?.rank();
                    let internship = t.internships.get(&e.student_id)?;
                    Some((rank, internship.company_name.clone(), e.final_grade.clone()))
                })
                .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
                .map(|(_, company_name, highest_grade)| CompanyGrade {
                    company_name,
                    highest_grade,
                })
        };

        Ok(BusinessQueries {
            highest_grade_internship,
            low_grade_students: self.low_grade_students().await?,
            ..BusinessQueries::default()
        })
    }

    async fn low_grade_students(&self) -> Result<Vec<LowGradeStudent>, RepoError> {
        let t = self.tables.lock().unwrap();
        let mut rows: Vec<LowGradeStudent> = t
            .evaluations
            .values()
            .filter(|e| Grade::parse(&e.final_grade).is_some_and(|g| g.is_low()))
            .map(|e| LowGradeStudent {
                ssn: e.student_id.clone(),
                name: t.user_name(&e.student_id),
                final_grade: e.final_grade.clone(),
            })
            .collect();
        rows.sort_by(|a, b| a.ssn.cmp(&b.ssn));
        Ok(rows)
    }

    async fn failing_students_count(&self) -> Result<i64, RepoError> {
        let t = self.tables.lock().unwrap();
        Ok(t.evaluations
            .values()
            .filter(|e| Grade::parse(&e.final_grade).is_some_and(|g| g.is_failing()))
            .count() as i64)
    }
}

// --- Fixtures ---

pub const ADMIN: &str = "100";
pub const COORDINATOR: &str = "200";
pub const EVALUATOR: &str = "300";
pub const MENTOR: &str = "400";
pub const STUDENT: &str = "500";

/// One person per role; the student is registered (linked to the others) but not
/// yet placed in an internship.
pub fn seeded_repo() -> Arc<MemoryRepository> {
    let repo = MemoryRepository::new();
    repo.seed_user(ADMIN, "Ada Admin");
    repo.grant(Role::Admin, ADMIN);
    repo.seed_user(COORDINATOR, "Cora Coordinator");
    repo.grant(Role::InternshipCoordinator, COORDINATOR);
    repo.seed_user(EVALUATOR, "Eve Evaluator");
    repo.grant(Role::InternshipEvaluator, EVALUATOR);
    repo.seed_mentor(MENTOR, "Milo Mentor", "Senior Engineer");

    repo.seed_user(STUDENT, "Sam Student");
    repo.grant(Role::Student, STUDENT);
    {
        let mut t = repo.tables.lock().unwrap();
        t.students.insert(
            STUDENT.to_string(),
            Student {
                ssn: STUDENT.to_string(),
                level: 3,
                mentor_id: Some(MENTOR.to_string()),
                coordinator_id: COORDINATOR.to_string(),
                evaluator_id: EVALUATOR.to_string(),
            },
        );
    }
    Arc::new(repo)
}

pub fn test_state(repo: Arc<MemoryRepository>) -> AppState {
    AppState {
        repo: repo as RepositoryState,
        sessions: Arc::new(MemorySessionStore::new()) as SessionState,
        config: AppConfig::default(),
    }
}

pub struct TestApp {
    pub address: String,
    pub state: AppState,
}

/// Serves the full router on an ephemeral port.
pub async fn spawn_app(repo: Arc<MemoryRepository>) -> TestApp {
    let state = test_state(repo);
    let router = create_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address, state }
}
