//! Loans repository for database operations
//!
//! Writers serialize per equipment with `SELECT ... FOR UPDATE` on the
//! equipment row, inside the same transaction that re-reads the loan, runs the
//! availability query and writes. A lock wait longer than `lock_timeout_ms`
//! aborts with `ConcurrencyConflict`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgExecutor, Pool, Postgres, Transaction};

use super::{equipment_not_found, loan_not_found, lock_timed_out, schedule_conflict, LoansStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        loan::{Loan, LoanFilter, LoanStatus, NewLoan},
        page::{Page, PageRequest},
    },
    scheduling::{self, Interval, LoanAction},
};

/// Postgres `lock_not_available`
const LOCK_NOT_AVAILABLE: &str = "55P03";

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
    lock_timeout_ms: u64,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>, lock_timeout_ms: u64) -> Self {
        Self {
            pool,
            lock_timeout_ms,
        }
    }

    /// Open a write transaction bounded by the configured lock timeout
    async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("SET LOCAL lock_timeout = {}", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

/// Take the per-equipment write lock. `None` when the equipment is absent.
async fn lock_equipment(conn: &mut PgConnection, equipment_id: i64) -> AppResult<Option<i64>> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM equipment WHERE id = $1 FOR UPDATE")
        .bind(equipment_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| {
            let timed_out = matches!(
                &e,
                sqlx::Error::Database(db) if db.code().as_deref() == Some(LOCK_NOT_AVAILABLE)
            );
            if timed_out {
                lock_timed_out(equipment_id)
            } else {
                AppError::Database(e)
            }
        })
}

/// `NOT EXISTS` over the blocking loans of one equipment
async fn blocking_free<'e, E>(
    executor: E,
    equipment_id: i64,
    window: &Interval,
    exclude_loan_id: Option<i64>,
) -> AppResult<bool>
where
    E: PgExecutor<'e>,
{
    let blocking = LoanStatus::BLOCKING
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    let query = format!(
        r#"
        SELECT NOT EXISTS(
            SELECT 1 FROM loans
            WHERE equipment_id = $1
              AND status IN ({})
              AND ($2::bigint IS NULL OR id <> $2)
              AND start_date < $4
              AND $3 < end_date
        )
        "#,
        blocking
    );

    let free: bool = sqlx::query_scalar(&query)
        .bind(equipment_id)
        .bind(exclude_loan_id)
        .bind(window.start())
        .bind(window.end())
        .fetch_one(executor)
        .await?;
    Ok(free)
}

#[async_trait]
impl LoansStore for LoansRepository {
    /// Get loan by ID
    async fn get_by_id(&self, id: i64) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(loan)
    }

    /// List loans with optional filters and pagination
    async fn list(&self, filter: &LoanFilter, page: PageRequest) -> AppResult<Page<Loan>> {
        let mut conditions = Vec::new();
        let mut idx = 1;

        if filter.status.is_some() {
            conditions.push(format!("l.status = ${}", idx));
            idx += 1;
        }
        if filter.borrower_id.is_some() {
            conditions.push(format!("l.borrower_id = ${}", idx));
            idx += 1;
        }
        if filter.owner_id.is_some() {
            conditions.push(format!("e.owner_id = ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        // Ownership always comes from the join, never from a loaded row
        let from = "FROM loans l JOIN equipment e ON e.id = l.equipment_id";

        // Count total
        let count_q = format!("SELECT COUNT(*) {} {}", from, where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(status) = filter.status { count_builder = count_builder.bind(status); }
        if let Some(borrower) = filter.borrower_id { count_builder = count_builder.bind(borrower); }
        if let Some(owner) = filter.owner_id { count_builder = count_builder.bind(owner); }
        let total = count_builder.fetch_one(&self.pool).await?;

        // Fetch rows
        let select_q = format!(
            "SELECT l.* {} {} ORDER BY l.created_at DESC, l.id DESC LIMIT {} OFFSET {}",
            from,
            where_clause,
            page.size,
            page.offset()
        );
        let mut builder = sqlx::query_as::<_, Loan>(&select_q);
        if let Some(status) = filter.status { builder = builder.bind(status); }
        if let Some(borrower) = filter.borrower_id { builder = builder.bind(borrower); }
        if let Some(owner) = filter.owner_id { builder = builder.bind(owner); }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok(Page::new(rows, total, page))
    }

    async fn overdue_for_borrower(&self, borrower_id: i64, now: DateTime<Utc>) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE borrower_id = $1 AND status = $2 AND end_date < $3
            ORDER BY end_date
            "#,
        )
        .bind(borrower_id)
        .bind(LoanStatus::Approved)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    async fn is_available(
        &self,
        equipment_id: i64,
        interval: &Interval,
        exclude_loan_id: Option<i64>,
    ) -> AppResult<bool> {
        blocking_free(&self.pool, equipment_id, interval, exclude_loan_id).await
    }

    async fn is_equipment_owner(&self, loan_id: i64, user_id: i64) -> AppResult<bool> {
        let owns: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM loans l
                JOIN equipment e ON e.id = l.equipment_id
                WHERE l.id = $1 AND e.owner_id = $2
            )
            "#,
        )
        .bind(loan_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(owns)
    }

    /// Create a new loan request
    async fn insert_requested(&self, loan: &NewLoan, now: DateTime<Utc>) -> AppResult<Loan> {
        let mut tx = self.begin().await?;

        lock_equipment(&mut tx, loan.equipment_id)
            .await?
            .ok_or_else(|| equipment_not_found(loan.equipment_id))?;

        if !blocking_free(&mut *tx, loan.equipment_id, &loan.interval, None).await? {
            return Err(schedule_conflict(loan.equipment_id, &loan.interval));
        }

        let created = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (equipment_id, borrower_id, start_date, end_date, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(loan.equipment_id)
        .bind(loan.borrower_id)
        .bind(loan.interval.start())
        .bind(loan.interval.end())
        .bind(LoanStatus::Pending)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn transition(&self, loan_id: i64, action: LoanAction, now: DateTime<Utc>) -> AppResult<Loan> {
        let mut tx = self.begin().await?;

        // equipment_id never changes, so it can be read before the lock
        let equipment_id: i64 = sqlx::query_scalar("SELECT equipment_id FROM loans WHERE id = $1")
            .bind(loan_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| loan_not_found(loan_id))?;

        lock_equipment(&mut tx, equipment_id)
            .await?
            .ok_or_else(|| equipment_not_found(equipment_id))?;

        let current = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(loan_id)
            .fetch_one(&mut *tx)
            .await?;

        let step = scheduling::plan(&current, action, now)?;

        if let Some(window) = step.requires_free {
            if !blocking_free(&mut *tx, equipment_id, &window, Some(loan_id)).await? {
                return Err(schedule_conflict(equipment_id, &window));
            }
        }

        let next = step.next;
        let updated = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET status = $2, end_date = $3, requested_end_date = $4, returned_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(loan_id)
        .bind(next.status)
        .bind(next.end_date)
        .bind(next.requested_end_date)
        .bind(next.returned_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }
}
