//! Postgres store tests
//!
//! Need a disposable database: `DATABASE_URL=postgres://... cargo test -- --ignored`

use chrono::{DateTime, TimeZone, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};

use gearloan_server::{
    config::LoansConfig,
    models::{
        equipment::{CreateEquipment, Equipment},
        loan::{CreateLoan, LoanStatus, LoanView},
    },
    repository::Repository,
    services::Services,
    AppError,
};

const OWNER: i64 = 7001;

fn jan(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2099, 1, day, 0, 0, 0).unwrap()
}

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("Failed to connect");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

fn services(pool: &PgPool, lock_timeout_ms: u64) -> Services {
    let config = LoansConfig {
        lock_timeout_ms,
        ..LoansConfig::default()
    };
    Services::new(Repository::new(pool.clone(), &config), config)
}

async fn register(services: &Services) -> Equipment {
    services
        .equipment
        .create(
            OWNER,
            &CreateEquipment {
                name: "Pressure washer".to_string(),
                category: "cleaning".to_string(),
                description: None,
            },
        )
        .await
        .unwrap()
}

async fn request(
    services: &Services,
    borrower: i64,
    equipment: &Equipment,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<LoanView, AppError> {
    services
        .loans
        .request_loan(
            borrower,
            CreateLoan {
                equipment_id: equipment.id,
                start_date: start,
                end_date: end,
            },
        )
        .await
}

#[tokio::test]
#[ignore]
async fn test_back_to_back_and_overlap() {
    let pool = pool().await;
    let services = services(&pool, 5000);
    let drill = register(&services).await;

    let first = request(&services, 1, &drill, jan(10), jan(15)).await.unwrap();
    services.loans.approve_loan(OWNER, first.id).await.unwrap();
    let second = request(&services, 2, &drill, jan(15), jan(20)).await.unwrap();
    services.loans.approve_loan(OWNER, second.id).await.unwrap();

    let err = request(&services, 3, &drill, jan(12), jan(18)).await.unwrap_err();
    assert!(matches!(err, AppError::ScheduleConflict(_)), "{err}");
    let err = request(&services, 3, &drill, jan(5), jan(11)).await.unwrap_err();
    assert!(matches!(err, AppError::ScheduleConflict(_)), "{err}");
    request(&services, 3, &drill, jan(5), jan(10)).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_concurrent_approvals_never_double_book() {
    let pool = pool().await;
    let services = services(&pool, 5000);

    for _ in 0..10 {
        let drill = register(&services).await;
        let a = request(&services, 1, &drill, jan(10), jan(15)).await.unwrap();
        let b = request(&services, 2, &drill, jan(12), jan(18)).await.unwrap();

        let (left, right) = (services.clone(), services.clone());
        let first = tokio::spawn(async move { left.loans.approve_loan(OWNER, a.id).await });
        let second = tokio::spawn(async move { right.loans.approve_loan(OWNER, b.id).await });
        let results = [first.await.unwrap(), second.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for result in &results {
            if let Err(err) = result {
                assert!(
                    matches!(err, AppError::ScheduleConflict(_) | AppError::ConcurrencyConflict(_)),
                    "unexpected error: {err}"
                );
            }
        }
    }
}

#[tokio::test]
#[ignore]
async fn test_held_row_lock_is_a_concurrency_conflict() {
    let pool = pool().await;
    let services = services(&pool, 50);
    let drill = register(&services).await;
    let loan = request(&services, 1, &drill, jan(10), jan(15)).await.unwrap();

    let mut holder = pool.begin().await.unwrap();
    sqlx::query("SELECT id FROM equipment WHERE id = $1 FOR UPDATE")
        .bind(drill.id)
        .execute(&mut *holder)
        .await
        .unwrap();

    let err = services.loans.approve_loan(OWNER, loan.id).await.unwrap_err();
    assert!(matches!(err, AppError::ConcurrencyConflict(_)), "{err}");

    holder.rollback().await.unwrap();

    assert_eq!(
        services.loans.get_loan(loan.id).await.unwrap().status,
        LoanStatus::Pending
    );
    let approved = services.loans.approve_loan(OWNER, loan.id).await.unwrap();
    assert_eq!(approved.status, LoanStatus::Approved);
}
