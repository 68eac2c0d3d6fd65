use chrono::NaiveDate;
use field_training::{
    error::RepoError,
    models::{
        CompanyDurationReport, CoordinatorStudentCount, Grade, LowGradeStudent, NewEvaluation,
        NewInternship, NewStudent, NewUser, Role,
    },
    repository::{PostgresRepository, Repository},
};
use serial_test::serial;
use sqlx::{PgPool, postgres::PgPoolOptions};

// --- Test Context and Setup ---

/// Holds a pool on a migrated, emptied database.
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    /// Returns None when no database is configured, so the suite is a no-op on
    /// machines without Postgres.
    async fn setup() -> Option<Self> {
        dotenv::dotenv().ok();

        let Ok(db_url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set; skipping repository tests");
            return None;
        };

        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        PostgresRepository::new(pool.clone())
            .migrate()
            .await
            .expect("Failed to run database migrations.");

        sqlx::query(
            "TRUNCATE evaluations, internships, students, mentors, evaluators, coordinators, \
             admins, users CASCADE",
        )
        .execute(&pool)
        .await
        .expect("Failed to reset tables");

        Some(DbTestContext { pool })
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

fn new_user(ssn: &str, name: &str) -> NewUser {
    NewUser {
        ssn: ssn.to_string(),
        name: name.to_string(),
        email: format!("{}@uni.test", ssn),
        address: None,
        date_of_birth: date("2000-01-01"),
    }
}

async fn seed_user(pool: &PgPool, ssn: &str, name: &str) {
    sqlx::query("INSERT INTO users (ssn, name, email) VALUES ($1, $2, $3)")
        .bind(ssn)
        .bind(name)
        .bind(format!("{}@uni.test", ssn))
        .execute(pool)
        .await
        .expect("Failed to create test user");
}

/// Adds `ssn` to a role table without extra columns (admins, coordinators, evaluators).
async fn grant(pool: &PgPool, table: &str, ssn: &str) {
    sqlx::query(&format!("INSERT INTO {} (ssn) VALUES ($1)", table))
        .bind(ssn)
        .execute(pool)
        .await
        .expect("Failed to grant role");
}

async fn seed_mentor(pool: &PgPool, ssn: &str, position: &str) {
    seed_user(pool, ssn, "Milo Mentor").await;
    sqlx::query(
        "INSERT INTO mentors (ssn, mentor_type, position, company_name) VALUES ($1, 'Industry', $2, 'Initech')",
    )
    .bind(ssn)
    .bind(position)
    .execute(pool)
    .await
    .expect("Failed to create test mentor");
}

/// Coordinator `c1` ("Cora"), evaluator `e1` and mentor `m1` ("Lead").
async fn seed_staff(pool: &PgPool) {
    seed_user(pool, "c1", "Cora").await;
    grant(pool, "coordinators", "c1").await;
    seed_user(pool, "e1", "Evan").await;
    grant(pool, "evaluators", "e1").await;
    seed_mentor(pool, "m1", "Lead").await;
}

fn student(ssn: &str, level: i16, mentor: Option<&str>) -> NewStudent {
    NewStudent {
        ssn: ssn.to_string(),
        name: format!("Student {}", ssn),
        email: format!("{}@uni.test", ssn),
        level,
        mentor_id: mentor.map(str::to_string),
        coordinator_id: "c1".to_string(),
        evaluator_id: "e1".to_string(),
    }
}

fn internship(company: &str, start: &str, end: &str) -> NewInternship {
    NewInternship {
        company_name: company.to_string(),
        start_date: date(start),
        end_date: date(end),
        mentor_id: None,
        coordinator_id: "c1".to_string(),
        evaluator_id: "e1".to_string(),
    }
}

fn evaluation(student_id: &str, grade: Grade, comments: &str) -> NewEvaluation {
    NewEvaluation {
        student_id: student_id.to_string(),
        final_grade: grade,
        performance_score: 70,
        comments: comments.to_string(),
        coordinator_id: "c1".to_string(),
    }
}

// --- Identity & Users ---

#[tokio::test]
#[serial]
async fn test_resolve_role_probes_tables_in_order() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();

    seed_user(&ctx.pool, "r1", "Both").await;
    grant(&ctx.pool, "admins", "r1").await;
    grant(&ctx.pool, "coordinators", "r1").await;

    seed_user(&ctx.pool, "r2", "Staff").await;
    grant(&ctx.pool, "coordinators", "r2").await;
    grant(&ctx.pool, "evaluators", "r2").await;

    seed_mentor(&ctx.pool, "r3", "Lead").await;
    seed_user(&ctx.pool, "r4", "Nobody").await;

    assert_eq!(repo.resolve_role("r1").await.unwrap(), Some(Role::Admin));
    assert_eq!(
        repo.resolve_role("r2").await.unwrap(),
        Some(Role::InternshipCoordinator)
    );
    assert_eq!(repo.resolve_role("r3").await.unwrap(), Some(Role::Mentor));
    assert_eq!(repo.resolve_role("r4").await.unwrap(), None);
    assert_eq!(repo.resolve_role("missing").await.unwrap(), None);
}

#[tokio::test]
#[serial]
async fn test_create_user_rejects_duplicate_ssn() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();

    let created = repo.create_user(new_user("u2", "Bo")).await.unwrap();
    assert_eq!(created.date_of_birth, Some(date("2000-01-01")));
    repo.create_user(new_user("u1", "Al")).await.unwrap();

    let err = repo.create_user(new_user("u1", "Again")).await.unwrap_err();
    match err {
        RepoError::Conflict(msg) => assert_eq!(msg, "Error: User with SSN 'u1' already exists."),
        other => panic!("Expected conflict, got {:?}", other),
    }

    let ssns: Vec<String> = repo
        .list_users()
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.ssn)
        .collect();
    assert_eq!(ssns, vec!["u1", "u2"]);
}

#[tokio::test]
#[serial]
async fn test_upsert_users_overwrites_and_rolls_back() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();

    repo.create_user(new_user("u1", "Old Name")).await.unwrap();
    let written = repo
        .upsert_users(vec![new_user("u1", "New Name"), new_user("u2", "Bo")])
        .await
        .unwrap();
    assert_eq!(written, 2);

    let users = repo.list_users().await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].name, "New Name");

    // Postgres refuses NUL in text, so the second row fails and the first is undone.
    let err = repo
        .upsert_users(vec![new_user("u3", "Cy"), new_user("u4", "bad\0name")])
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Database(_)), "{:?}", err);
    assert_eq!(repo.list_users().await.unwrap().len(), 2);
}

// --- Students, Internships, Evaluations ---

#[tokio::test]
#[serial]
async fn test_register_student_links_and_rollback() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    seed_staff(&ctx.pool).await;

    let bad_link = NewStudent {
        evaluator_id: "no-such-evaluator".to_string(),
        ..student("s1", 2, None)
    };
    let err = repo.register_student(bad_link).await.unwrap_err();
    assert!(matches!(err, RepoError::Invalid(_)), "{:?}", err);
    // The user row created inside the failed transaction is gone too.
    assert!(repo.list_users().await.unwrap().iter().all(|u| u.ssn != "s1"));

    let out_of_range = repo.register_student(student("s1", 5, None)).await.unwrap_err();
    assert!(matches!(out_of_range, RepoError::Invalid(_)), "{:?}", out_of_range);

    let created = repo.register_student(student("s1", 2, Some("m1"))).await.unwrap();
    assert_eq!(created.level, 2);
    assert_eq!(created.mentor_id.as_deref(), Some("m1"));
    assert_eq!(repo.resolve_role("s1").await.unwrap(), Some(Role::Student));

    let err = repo.register_student(student("s1", 2, None)).await.unwrap_err();
    match err {
        RepoError::Conflict(msg) => assert_eq!(msg, "Student with SSN 's1' is already registered."),
        other => panic!("Expected conflict, got {:?}", other),
    }
}

#[tokio::test]
#[serial]
async fn test_second_internship_is_invalid() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    seed_staff(&ctx.pool).await;
    repo.register_student(student("s1", 1, None)).await.unwrap();

    let bad_link = NewInternship {
        coordinator_id: "nobody".to_string(),
        ..internship("Acme", "2025-01-01", "2025-02-01")
    };
    let err = repo.create_internship("s1", bad_link).await.unwrap_err();
    assert!(matches!(err, RepoError::Invalid(_)), "{:?}", err);

    let created = repo
        .create_internship("s1", internship("Acme", "2025-01-01", "2025-02-01"))
        .await
        .unwrap();
    assert_eq!(created.company_name, "Acme");

    let err = repo
        .create_internship("s1", internship("Other", "2025-03-01", "2025-04-01"))
        .await
        .unwrap_err();
    match err {
        RepoError::Invalid(msg) => assert_eq!(msg, "Student already has an internship assigned"),
        other => panic!("Expected invalid, got {:?}", other),
    }
}

#[tokio::test]
#[serial]
async fn test_concurrent_applications_keep_one_internship() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    seed_staff(&ctx.pool).await;
    repo.register_student(student("s1", 1, None)).await.unwrap();

    let (first, second) = tokio::join!(
        repo.create_internship("s1", internship("Acme", "2025-01-01", "2025-02-01")),
        repo.create_internship("s1", internship("Globex", "2025-01-01", "2025-02-01")),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = results.into_iter().find_map(Result::err).unwrap();
    assert!(matches!(loser, RepoError::Invalid(_)), "{:?}", loser);
}

#[tokio::test]
#[serial]
async fn test_evaluation_requires_internship_and_updates_in_place() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    seed_staff(&ctx.pool).await;
    repo.register_student(student("s1", 1, None)).await.unwrap();

    let err = repo
        .upsert_evaluation("e1", evaluation("s1", Grade::B, "fine"))
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(_)), "{:?}", err);

    repo.create_internship("s1", internship("Acme", "2025-01-01", "2025-02-01"))
        .await
        .unwrap();
    repo.upsert_evaluation("e1", evaluation("s1", Grade::B, "fine"))
        .await
        .unwrap();
    let updated = repo
        .upsert_evaluation("e1", evaluation("s1", Grade::F, "absent"))
        .await
        .unwrap();
    assert_eq!(updated.final_grade, "F");
    assert_eq!(updated.comments, "absent");

    assert_eq!(repo.admin_stats().await.unwrap().total_evaluations, 1);
    assert_eq!(repo.failing_students_count().await.unwrap(), 1);
}

// --- Dashboards & Reports ---

/// Three students under `c1`: s1 A- at Initech (60 days), s2 B+ at Globex (30 days)
/// and s3 F at Globex (60 days). s1 and s3 have mentor `m1`.
async fn seed_graded_cohort(ctx: &DbTestContext) -> PostgresRepository {
    let repo = ctx.repository();
    seed_staff(&ctx.pool).await;

    for (ssn, level, mentor, company, end, grade) in [
        ("s1", 1, Some("m1"), "Initech", "2025-03-02", Grade::AMinus),
        ("s2", 2, None, "Globex", "2025-01-31", Grade::BPlus),
        ("s3", 3, Some("m1"), "Globex", "2025-03-02", Grade::F),
    ] {
        repo.register_student(student(ssn, level, mentor)).await.unwrap();
        repo.create_internship(ssn, internship(company, "2025-01-01", end))
            .await
            .unwrap();
        repo.upsert_evaluation("e1", evaluation(ssn, grade, &format!("notes {}", ssn)))
            .await
            .unwrap();
    }
    repo
}

#[tokio::test]
#[serial]
async fn test_dashboards_decode_joined_rows() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = seed_graded_cohort(&ctx).await;

    let rows = repo.student_dashboard("s1").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].full_name, "Student s1");
    assert_eq!(rows[0].grade.as_deref(), Some("A-"));
    assert_eq!(rows[0].company_name.as_deref(), Some("Initech"));
    assert_eq!(rows[0].mentor_position.as_deref(), Some("Lead"));
    assert_eq!(rows[0].mentor_type.as_deref(), Some("Industry"));
    assert!(repo.student_dashboard("c1").await.unwrap().is_empty());

    let rows = repo.coordinator_dashboard("c1").await.unwrap();
    let ssns: Vec<&str> = rows.iter().map(|r| r.student_ssn.as_str()).collect();
    assert_eq!(ssns, vec!["s1", "s2", "s3"]);
    assert_eq!(rows[1].level, 2);
    assert_eq!(rows[1].end_date, Some(date("2025-01-31")));
    assert_eq!(rows[2].final_grade.as_deref(), Some("F"));

    let dashboard = repo.mentor_dashboard("m1").await.unwrap();
    let info = dashboard.mentor_info.unwrap();
    assert_eq!(info.position.as_deref(), Some("Lead"));
    assert_eq!(info.mentor_company.as_deref(), Some("Initech"));
    let ssns: Vec<&str> = dashboard.students.iter().map(|r| r.ssn.as_str()).collect();
    assert_eq!(ssns, vec!["s1", "s3"]);
    assert_eq!(dashboard.students[1].comments.as_deref(), Some("notes s3"));

    let empty = repo.mentor_dashboard("c1").await.unwrap();
    assert!(empty.mentor_info.is_none());
    assert!(empty.students.is_empty());

    let stats = repo.admin_stats().await.unwrap();
    assert_eq!(stats.total_users, 6);
    assert_eq!(stats.total_students, 3);
    assert_eq!(stats.total_internships, 3);
    assert_eq!(stats.total_evaluations, 3);
}

#[tokio::test]
#[serial]
async fn test_business_queries_rank_grades_and_average_durations() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = seed_graded_cohort(&ctx).await;

    let report = repo.business_queries().await.unwrap();

    // Text order would put B+ above A-; the grade rank must not.
    let best = report.highest_grade_internship.unwrap();
    assert_eq!(best.company_name, "Initech");
    assert_eq!(best.highest_grade, "A-");

    // Only A+ and A count as top grades.
    assert!(report.most_selected_mentor.is_empty());

    assert_eq!(
        report.students_per_coordinator,
        vec![CoordinatorStudentCount {
            coordinator_name: "Cora".to_string(),
            total_students: 3,
        }]
    );

    assert_eq!(
        report.internship_duration_reports,
        vec![
            CompanyDurationReport {
                company_name: "Globex".to_string(),
                duration: 45,
                reports: 2,
            },
            CompanyDurationReport {
                company_name: "Initech".to_string(),
                duration: 60,
                reports: 1,
            },
        ]
    );

    assert_eq!(report.evaluations_mentor_guidance.len(), 3);
    assert_eq!(report.evaluations_mentor_guidance[1].mentor_position, None);
    assert_eq!(
        report.low_grade_students,
        vec![LowGradeStudent {
            ssn: "s3".to_string(),
            name: "Student s3".to_string(),
            final_grade: "F".to_string(),
        }]
    );

    // A top grade under m1 shows up in the mentor ranking.
    repo.upsert_evaluation("e1", evaluation("s1", Grade::APlus, "excellent"))
        .await
        .unwrap();
    let report = repo.business_queries().await.unwrap();
    assert_eq!(report.most_selected_mentor.len(), 1);
    assert_eq!(report.most_selected_mentor[0].position.as_deref(), Some("Lead"));
    assert_eq!(report.most_selected_mentor[0].count, 1);
    assert_eq!(report.highest_grade_internship.unwrap().highest_grade, "A+");
}
