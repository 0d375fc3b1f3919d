use sqlx::PgPool;
use steadydancer_db::models::project::CreateProject;
use steadydancer_db::repositories::ProjectRepo;
use uuid::Uuid;

/// Full bootstrap test: connect, migrate, verify schema.
#[sqlx::test(migrations = "./migrations")]
async fn test_full_bootstrap(pool: PgPool) {
    steadydancer_db::health_check(&pool).await.unwrap();

    for table in [
        "projects",
        "reference_assets",
        "motion_assets",
        "experiments",
        "jobs",
    ] {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("{table} query failed: {e}"));
        assert_eq!(count.0, 0, "{table} should start empty");
    }
}

/// Duplicate project names violate `uq_projects_name` and leave no row
/// behind.
#[sqlx::test(migrations = "./migrations")]
async fn test_duplicate_project_name_rejected(pool: PgPool) {
    let input = CreateProject {
        name: "Demo".to_string(),
        description: None,
    };

    ProjectRepo::create(&pool, Uuid::new_v4(), &input)
        .await
        .unwrap();

    let err = ProjectRepo::create(&pool, Uuid::new_v4(), &input)
        .await
        .unwrap_err();
    match err {
        sqlx::Error::Database(db_err) => {
            assert_eq!(db_err.code().as_deref(), Some("23505"));
            assert_eq!(db_err.constraint(), Some("uq_projects_name"));
        }
        other => panic!("expected database error, got {other:?}"),
    }

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects WHERE name = 'Demo'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 1);
}

/// Deleting a project cascades to assets, experiments, and jobs.
#[sqlx::test(migrations = "./migrations")]
async fn test_project_delete_cascades(pool: PgPool) {
    let project = ProjectRepo::create(
        &pool,
        Uuid::new_v4(),
        &CreateProject {
            name: "Cascade".to_string(),
            description: None,
        },
    )
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO experiments (id, project_id, name) VALUES ($1, $2, 'exp')",
    )
    .bind(Uuid::new_v4())
    .bind(project.id)
    .execute(&pool)
    .await
    .unwrap();

    assert!(ProjectRepo::delete(&pool, project.id).await.unwrap());

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM experiments")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 0);
}
