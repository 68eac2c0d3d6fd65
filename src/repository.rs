use crate::error::RepoError;
use crate::models::{
    AdminDashboardStats, BusinessQueries, CompanyDurationReport, CompanyGrade,
    CoordinatorDashboardRow, CoordinatorStudentCount, Evaluation, EvaluationGuidance, Internship,
    LowGradeStudent, MentorDashboard, MentorInfo, MentorPositionCount, MentorStudentRow,
    NewEvaluation, NewInternship, NewStudent, NewUser, Role, Student, StudentDashboardRow, User,
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, so handlers can be
/// exercised against an in-memory implementation in tests.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity ---
    // Probes the role tables in `Role::RESOLUTION_ORDER`; None when the SSN has no role.
    async fn resolve_role(&self, ssn: &str) -> Result<Option<Role>, RepoError>;

    // --- Users ---
    async fn list_users(&self) -> Result<Vec<User>, RepoError>;
    // Conflict when the SSN already exists.
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError>;
    // Bulk import: inserts or overwrites every row in one transaction. Returns rows written.
    async fn upsert_users(&self, users: Vec<NewUser>) -> Result<usize, RepoError>;

    // --- Students, Internships, Evaluations ---
    async fn register_student(&self, student: NewStudent) -> Result<Student, RepoError>;
    // Invalid when the student already holds an internship.
    async fn create_internship(
        &self,
        student_id: &str,
        internship: NewInternship,
    ) -> Result<Internship, RepoError>;
    // NotFound unless the student exists and holds an internship. Updates in place if graded.
    async fn upsert_evaluation(
        &self,
        evaluator_id: &str,
        evaluation: NewEvaluation,
    ) -> Result<Evaluation, RepoError>;

    // --- Dashboards ---
    async fn student_dashboard(&self, ssn: &str) -> Result<Vec<StudentDashboardRow>, RepoError>;
    async fn coordinator_dashboard(
        &self,
        coordinator_id: &str,
    ) -> Result<Vec<CoordinatorDashboardRow>, RepoError>;
    async fn mentor_dashboard(&self, mentor_id: &str) -> Result<MentorDashboard, RepoError>;
    async fn admin_stats(&self) -> Result<AdminDashboardStats, RepoError>;

    // --- Reports ---
    async fn business_queries(&self) -> Result<BusinessQueries, RepoError>;
    async fn low_grade_students(&self) -> Result<Vec<LowGradeStudent>, RepoError>;
    async fn failing_students_count(&self) -> Result<i64, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations in `./migrations`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn count_rows(&self, table: &'static str) -> Result<i64, RepoError> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Orders evaluations best grade first; mirrors `Grade::rank`.
const GRADE_RANK: &str = "CASE e.final_grade \
    WHEN 'A+' THEN 12 WHEN 'A' THEN 11 WHEN 'A-' THEN 10 \
    WHEN 'B+' THEN 9 WHEN 'B' THEN 8 WHEN 'B-' THEN 7 \
    WHEN 'C+' THEN 6 WHEN 'C' THEN 5 WHEN 'C-' THEN 4 \
    WHEN 'D+' THEN 3 WHEN 'D' THEN 2 ELSE 1 END";

const INVALID_LINK: &str = "Mentor, coordinator or evaluator ID does not match an existing record.";

/// classify_write_error
///
/// Turns constraint violations into domain errors; everything else stays a driver error.
fn classify_write_error(err: sqlx::Error, on_conflict: String, on_invalid: &str) -> RepoError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return RepoError::Conflict(on_conflict);
        }
        if db_err.is_foreign_key_violation() || db_err.is_check_violation() {
            return RepoError::Invalid(on_invalid.to_string());
        }
    }
    tracing::error!("write failed: {:?}", err);
    RepoError::Database(err)
}

#[async_trait]
impl Repository for PostgresRepository {
    /// resolve_role
    ///
    /// One existence probe per role table, stopping at the first hit. Table names come
    /// from `Role::table`, never from input.
    async fn resolve_role(&self, ssn: &str) -> Result<Option<Role>, RepoError> {
        for role in Role::RESOLUTION_ORDER {
            let query = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE ssn = $1)", role.table());
            let found: bool = sqlx::query_scalar(&query)
                .bind(ssn)
                .fetch_one(&self.pool)
                .await?;
            if found {
                return Ok(Some(role));
            }
        }
        Ok(None)
    }

    async fn list_users(&self) -> Result<Vec<User>, RepoError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT ssn, name, email, address, date_of_birth FROM users ORDER BY ssn",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (ssn, name, email, address, date_of_birth)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING ssn, name, email, address, date_of_birth
            "#,
        )
        .bind(&user.ssn)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.address)
        .bind(user.date_of_birth)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            classify_write_error(
                e,
                format!("Error: User with SSN '{}' already exists.", user.ssn),
                "Invalid user data.",
            )
        })
    }

    /// upsert_users
    ///
    /// All-or-nothing: a failing row rolls back the rows written before it.
    async fn upsert_users(&self, users: Vec<NewUser>) -> Result<usize, RepoError> {
        let mut tx = self.pool.begin().await?;
        for user in &users {
            sqlx::query(
                r#"
                INSERT INTO users (ssn, name, email, address, date_of_birth)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (ssn) DO UPDATE
                SET name = EXCLUDED.name,
                    email = EXCLUDED.email,
                    address = EXCLUDED.address,
                    date_of_birth = EXCLUDED.date_of_birth
                "#,
            )
            .bind(&user.ssn)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.address)
            .bind(user.date_of_birth)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(users.len())
    }

    /// register_student
    ///
    /// Creates the user row when it does not exist yet, then the student row, in one
    /// transaction so a bad link leaves no orphan user behind.
    async fn register_student(&self, student: NewStudent) -> Result<Student, RepoError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO users (ssn, name, email) VALUES ($1, $2, $3) ON CONFLICT (ssn) DO NOTHING",
        )
        .bind(&student.ssn)
        .bind(&student.name)
        .bind(&student.email)
        .execute(&mut *tx)
        .await?;

        let created = sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (ssn, level, mentor_id, coordinator_id, evaluator_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING ssn, level, mentor_id, coordinator_id, evaluator_id
            "#,
        )
        .bind(&student.ssn)
        .bind(student.level)
        .bind(&student.mentor_id)
        .bind(&student.coordinator_id)
        .bind(&student.evaluator_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            classify_write_error(
                e,
                format!("Student with SSN '{}' is already registered.", student.ssn),
                INVALID_LINK,
            )
        })?;

        tx.commit().await?;
        Ok(created)
    }

    async fn create_internship(
        &self,
        student_id: &str,
        internship: NewInternship,
    ) -> Result<Internship, RepoError> {
        const ALREADY_ASSIGNED: &str = "Student already has an internship assigned";

        // The conflict clause makes the one-internship rule atomic: a concurrent second
        // application gets no row back instead of a key violation.
        let created = sqlx::query_as::<_, Internship>(
            r#"
            INSERT INTO internships
                (student_id, company_name, start_date, end_date, mentor_id, coordinator_id, evaluator_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (student_id) DO NOTHING
            RETURNING student_id, company_name, start_date, end_date, mentor_id, coordinator_id, evaluator_id
            "#,
        )
        .bind(student_id)
        .bind(&internship.company_name)
        .bind(internship.start_date)
        .bind(internship.end_date)
        .bind(&internship.mentor_id)
        .bind(&internship.coordinator_id)
        .bind(&internship.evaluator_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify_write_error(e, ALREADY_ASSIGNED.to_string(), INVALID_LINK))?;

        created.ok_or_else(|| RepoError::Invalid(ALREADY_ASSIGNED.to_string()))
    }

    async fn upsert_evaluation(
        &self,
        evaluator_id: &str,
        evaluation: NewEvaluation,
    ) -> Result<Evaluation, RepoError> {
        let eligible: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM students s
                JOIN internships i ON i.student_id = s.ssn
                WHERE s.ssn = $1
            )
            "#,
        )
        .bind(&evaluation.student_id)
        .fetch_one(&self.pool)
        .await?;
        if !eligible {
            return Err(RepoError::NotFound(
                "Student not found or no internship assigned".to_string(),
            ));
        }

        sqlx::query_as::<_, Evaluation>(
            r#"
            INSERT INTO evaluations
                (student_id, final_grade, performance_score, comments, evaluator_id, coordinator_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (student_id) DO UPDATE
            SET final_grade = EXCLUDED.final_grade,
                performance_score = EXCLUDED.performance_score,
                comments = EXCLUDED.comments,
                evaluator_id = EXCLUDED.evaluator_id,
                coordinator_id = EXCLUDED.coordinator_id
            RETURNING student_id, final_grade, performance_score, comments, evaluator_id, coordinator_id
            "#,
        )
        .bind(&evaluation.student_id)
        .bind(evaluation.final_grade.as_str())
        .bind(evaluation.performance_score)
        .bind(&evaluation.comments)
        .bind(evaluator_id)
        .bind(&evaluation.coordinator_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify_write_error(e, String::new(), INVALID_LINK))
    }

    async fn student_dashboard(&self, ssn: &str) -> Result<Vec<StudentDashboardRow>, RepoError> {
        let rows = sqlx::query_as::<_, StudentDashboardRow>(
            r#"
            SELECT s.ssn, u.name AS full_name, u.email, e.final_grade AS grade,
                   i.company_name, m.position AS mentor_position, m.mentor_type
            FROM students s
            JOIN users u ON u.ssn = s.ssn
            LEFT JOIN internships i ON i.student_id = s.ssn
            LEFT JOIN mentors m ON m.ssn = s.mentor_id
            LEFT JOIN evaluations e ON e.student_id = s.ssn
            WHERE s.ssn = $1
            "#,
        )
        .bind(ssn)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn coordinator_dashboard(
        &self,
        coordinator_id: &str,
    ) -> Result<Vec<CoordinatorDashboardRow>, RepoError> {
        let rows = sqlx::query_as::<_, CoordinatorDashboardRow>(
            r#"
            SELECT s.ssn AS student_ssn, u.name AS student_name, u.email AS student_email,
                   s.level, i.company_name, i.start_date, i.end_date, e.final_grade
            FROM students s
            JOIN users u ON u.ssn = s.ssn
            LEFT JOIN internships i ON i.student_id = s.ssn
            LEFT JOIN evaluations e ON e.student_id = s.ssn
            WHERE s.coordinator_id = $1
            ORDER BY s.ssn
            "#,
        )
        .bind(coordinator_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn mentor_dashboard(&self, mentor_id: &str) -> Result<MentorDashboard, RepoError> {
        let mentor_info = sqlx::query_as::<_, MentorInfo>(
            "SELECT mentor_type, position, company_name AS mentor_company FROM mentors WHERE ssn = $1",
        )
        .bind(mentor_id)
        .fetch_optional(&self.pool)
        .await?;

        let students = sqlx::query_as::<_, MentorStudentRow>(
            r#"
            SELECT s.ssn, u.name AS student_name, u.email AS student_email,
                   i.company_name, i.start_date, i.end_date,
                   e.final_grade, e.comments
            FROM students s
            JOIN users u ON u.ssn = s.ssn
            LEFT JOIN internships i ON i.student_id = s.ssn
            LEFT JOIN evaluations e ON e.student_id = s.ssn
            WHERE s.mentor_id = $1
            ORDER BY s.ssn
            "#,
        )
        .bind(mentor_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(MentorDashboard {
            mentor_info,
            students,
        })
    }

    async fn admin_stats(&self) -> Result<AdminDashboardStats, RepoError> {
        Ok(AdminDashboardStats {
            total_users: self.count_rows("users").await?,
            total_students: self.count_rows("students").await?,
            total_internships: self.count_rows("internships").await?,
            total_evaluations: self.count_rows("evaluations").await?,
        })
    }

    async fn business_queries(&self) -> Result<BusinessQueries, RepoError> {
        let highest_grade_internship = sqlx::query_as::<_, CompanyGrade>(&format!(
            r#"
            SELECT i.company_name, e.final_grade AS highest_grade
            FROM evaluations e
            JOIN internships i ON i.student_id = e.student_id
            ORDER BY {} DESC, i.company_name
            LIMIT 1
            "#,
            GRADE_RANK
        ))
        .fetch_optional(&self.pool)
        .await?;

        let most_selected_mentor = sqlx::query_as::<_, MentorPositionCount>(
            r#"
            SELECT m.position, COUNT(*) AS count
            FROM mentors m
            JOIN students s ON s.mentor_id = m.ssn
            JOIN evaluations e ON e.student_id = s.ssn
            WHERE e.final_grade IN ('A+', 'A')
            GROUP BY m.position
            ORDER BY count DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let students_per_coordinator = sqlx::query_as::<_, CoordinatorStudentCount>(
            r#"
            SELECT u.name AS coordinator_name, COUNT(DISTINCT i.student_id) AS total_students
            FROM coordinators c
            JOIN users u ON u.ssn = c.ssn
            JOIN internships i ON i.coordinator_id = c.ssn
            GROUP BY u.name
            ORDER BY u.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let evaluations_mentor_guidance = sqlx::query_as::<_, EvaluationGuidance>(
            r#"
            SELECT s.ssn AS student_ssn, e.comments AS evaluation, m.position AS mentor_position
            FROM students s
            JOIN evaluations e ON e.student_id = s.ssn
            LEFT JOIN mentors m ON m.ssn = s.mentor_id
            ORDER BY s.ssn
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let internship_duration_reports = sqlx::query_as::<_, CompanyDurationReport>(
            r#"
            SELECT i.company_name,
                   AVG(i.end_date - i.start_date)::INT AS duration,
                   COUNT(e.final_grade) AS reports
            FROM internships i
            JOIN evaluations e ON e.student_id = i.student_id
            GROUP BY i.company_name
            ORDER BY i.company_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(BusinessQueries {
            highest_grade_internship,
            most_selected_mentor,
            students_per_coordinator,
            evaluations_mentor_guidance,
            internship_duration_reports,
            low_grade_students: self.low_grade_students().await?,
        })
    }

    async fn low_grade_students(&self) -> Result<Vec<LowGradeStudent>, RepoError> {
        let rows = sqlx::query_as::<_, LowGradeStudent>(
            r#"
            SELECT s.ssn, u.name, e.final_grade
            FROM students s
            JOIN evaluations e ON e.student_id = s.ssn
            JOIN users u ON u.ssn = s.ssn
            WHERE e.final_grade IN ('D', 'F')
            ORDER BY s.ssn
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn failing_students_count(&self) -> Result<i64, RepoError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM evaluations WHERE final_grade = 'F'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
