//! Repository layer
//!
//! Every write to a loan goes through [`LoansStore::insert_requested`] or
//! [`LoansStore::transition`]. Both take the equipment's lock, re-read the
//! current rows, evaluate the lifecycle guard and the availability check, and
//! write, as one unit. Reads never cache.

pub mod equipment;
pub mod loans;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    config::LoansConfig,
    error::{AppError, AppResult},
    models::{
        equipment::{CreateEquipment, Equipment},
        loan::{Loan, LoanFilter, NewLoan},
        page::{Page, PageRequest},
    },
    scheduling::{Interval, LoanAction},
};

/// Loan persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoansStore: Send + Sync {
    async fn get_by_id(&self, id: i64) -> AppResult<Option<Loan>>;

    /// Filtered page ordered by `created_at` descending
    async fn list(&self, filter: &LoanFilter, page: PageRequest) -> AppResult<Page<Loan>>;

    /// APPROVED loans of `borrower_id` whose end date is before `now`
    async fn overdue_for_borrower(&self, borrower_id: i64, now: DateTime<Utc>) -> AppResult<Vec<Loan>>;

    /// Point-in-time availability read. Writers re-check under the lock.
    async fn is_available(
        &self,
        equipment_id: i64,
        interval: &Interval,
        exclude_loan_id: Option<i64>,
    ) -> AppResult<bool>;

    /// Fresh loan -> equipment -> owner join; false when the loan is absent
    async fn is_equipment_owner(&self, loan_id: i64, user_id: i64) -> AppResult<bool>;

    /// Create a PENDING loan if the equipment exists and the interval is free
    async fn insert_requested(&self, loan: &NewLoan, now: DateTime<Utc>) -> AppResult<Loan>;

    /// Apply a lifecycle action atomically and return the written row
    async fn transition(&self, loan_id: i64, action: LoanAction, now: DateTime<Utc>) -> AppResult<Loan>;
}

/// Equipment existence and ownership
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EquipmentRegistry: Send + Sync {
    async fn create(&self, owner_id: i64, data: &CreateEquipment, now: DateTime<Utc>) -> AppResult<Equipment>;

    async fn get_by_id(&self, id: i64) -> AppResult<Equipment>;

    /// Every registered piece of equipment, oldest first
    async fn list(&self) -> AppResult<Vec<Equipment>>;
}

/// Main repository struct holding the stores
#[derive(Clone)]
pub struct Repository {
    pub loans: Arc<dyn LoansStore>,
    pub equipment: Arc<dyn EquipmentRegistry>,
    pool: Option<Pool<Postgres>>,
}

impl Repository {
    /// Create a Postgres-backed repository with the given database pool
    pub fn new(pool: Pool<Postgres>, config: &LoansConfig) -> Self {
        Self {
            loans: Arc::new(loans::LoansRepository::new(pool.clone(), config.lock_timeout_ms)),
            equipment: Arc::new(equipment::EquipmentRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Create an in-process repository; loans and equipment share one store
    pub fn in_memory(config: &LoansConfig) -> Self {
        let store = Arc::new(memory::MemoryStore::new(config.lock_timeout_ms));
        Self {
            loans: store.clone(),
            equipment: store,
            pool: None,
        }
    }

    pub fn from_stores(loans: Arc<dyn LoansStore>, equipment: Arc<dyn EquipmentRegistry>) -> Self {
        Self {
            loans,
            equipment,
            pool: None,
        }
    }

    /// Check storage connectivity
    pub async fn ping(&self) -> AppResult<()> {
        if let Some(pool) = &self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }
}

pub(crate) fn loan_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Loan {} not found", id))
}

pub(crate) fn equipment_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Equipment {} not found", id))
}

pub(crate) fn schedule_conflict(equipment_id: i64, window: &Interval) -> AppError {
    AppError::ScheduleConflict(format!(
        "Equipment {} is already booked between {} and {}",
        equipment_id,
        window.start().to_rfc3339(),
        window.end().to_rfc3339()
    ))
}

pub(crate) fn lock_timed_out(equipment_id: i64) -> AppError {
    AppError::ConcurrencyConflict(format!(
        "Equipment {} is being updated by another request, retry the operation",
        equipment_id
    ))
}
