//! In-process store
//!
//! Same contract as the Postgres repositories: one async mutex per equipment
//! id plays the role of the `FOR UPDATE` row lock, and the row tables sit
//! behind a synchronous `RwLock` that is never held across an await.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::{
    equipment_not_found, loan_not_found, lock_timed_out, schedule_conflict, EquipmentRegistry,
    LoansStore,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        equipment::{CreateEquipment, Equipment},
        loan::{Loan, LoanFilter, LoanStatus, NewLoan},
        page::{Page, PageRequest},
    },
    scheduling::{self, Interval, LoanAction},
};

#[derive(Default)]
struct Tables {
    equipment: HashMap<i64, Equipment>,
    loans: BTreeMap<i64, Loan>,
    next_equipment_id: i64,
    next_loan_id: i64,
}

impl Tables {
    fn equipment_loans(&self, equipment_id: i64) -> impl Iterator<Item = &Loan> {
        self.loans
            .values()
            .filter(move |loan| loan.equipment_id == equipment_id)
    }

    fn owner_of(&self, loan: &Loan) -> Option<i64> {
        self.equipment.get(&loan.equipment_id).map(|e| e.owner_id)
    }
}

pub struct MemoryStore {
    tables: RwLock<Tables>,
    equipment_locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
    lock_timeout: Duration,
}

impl MemoryStore {
    pub fn new(lock_timeout_ms: u64) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            equipment_locks: Mutex::new(HashMap::new()),
            lock_timeout: Duration::from_millis(lock_timeout_ms),
        }
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| AppError::Internal("loan table lock poisoned".to_string()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| AppError::Internal("loan table lock poisoned".to_string()))
    }

    async fn lock_equipment(&self, equipment_id: i64) -> AppResult<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self
                .equipment_locks
                .lock()
                .map_err(|_| AppError::Internal("equipment lock table poisoned".to_string()))?;
            locks.entry(equipment_id).or_default().clone()
        };

        tokio::time::timeout(self.lock_timeout, lock.lock_owned())
            .await
            .map_err(|_| lock_timed_out(equipment_id))
    }
}

#[async_trait]
impl LoansStore for MemoryStore {
    async fn get_by_id(&self, id: i64) -> AppResult<Option<Loan>> {
        Ok(self.read()?.loans.get(&id).cloned())
    }

    async fn list(&self, filter: &LoanFilter, page: PageRequest) -> AppResult<Page<Loan>> {
        let tables = self.read()?;
        let mut matching: Vec<&Loan> = tables
            .loans
            .values()
            .filter(|loan| filter.matches(loan, tables.owner_of(loan)))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.size as usize)
            .cloned()
            .collect();
        Ok(Page::new(items, total, page))
    }

    async fn overdue_for_borrower(&self, borrower_id: i64, now: DateTime<Utc>) -> AppResult<Vec<Loan>> {
        let tables = self.read()?;
        let mut overdue: Vec<Loan> = tables
            .loans
            .values()
            .filter(|loan| loan.borrower_id == borrower_id && loan.is_overdue(now))
            .cloned()
            .collect();
        overdue.sort_by_key(|loan| loan.end_date);
        Ok(overdue)
    }

    async fn is_available(
        &self,
        equipment_id: i64,
        interval: &Interval,
        exclude_loan_id: Option<i64>,
    ) -> AppResult<bool> {
        let tables = self.read()?;
        Ok(scheduling::is_available(
            tables.equipment_loans(equipment_id),
            interval,
            exclude_loan_id,
        ))
    }

    async fn is_equipment_owner(&self, loan_id: i64, user_id: i64) -> AppResult<bool> {
        let tables = self.read()?;
        Ok(tables
            .loans
            .get(&loan_id)
            .and_then(|loan| tables.owner_of(loan))
            == Some(user_id))
    }

    async fn insert_requested(&self, loan: &NewLoan, now: DateTime<Utc>) -> AppResult<Loan> {
        let _guard = self.lock_equipment(loan.equipment_id).await?;

        let mut tables = self.write()?;
        if !tables.equipment.contains_key(&loan.equipment_id) {
            return Err(equipment_not_found(loan.equipment_id));
        }
        if !scheduling::is_available(tables.equipment_loans(loan.equipment_id), &loan.interval, None) {
            return Err(schedule_conflict(loan.equipment_id, &loan.interval));
        }

        tables.next_loan_id += 1;
        let created = Loan {
            id: tables.next_loan_id,
            equipment_id: loan.equipment_id,
            borrower_id: loan.borrower_id,
            start_date: loan.interval.start(),
            end_date: loan.interval.end(),
            requested_end_date: None,
            status: LoanStatus::Pending,
            created_at: now,
            returned_at: None,
        };
        tables.loans.insert(created.id, created.clone());
        Ok(created)
    }

    async fn transition(&self, loan_id: i64, action: LoanAction, now: DateTime<Utc>) -> AppResult<Loan> {
        let equipment_id = self
            .read()?
            .loans
            .get(&loan_id)
            .map(|loan| loan.equipment_id)
            .ok_or_else(|| loan_not_found(loan_id))?;

        let _guard = self.lock_equipment(equipment_id).await?;

        let mut tables = self.write()?;
        let current = tables
            .loans
            .get(&loan_id)
            .cloned()
            .ok_or_else(|| loan_not_found(loan_id))?;

        let step = scheduling::plan(&current, action, now)?;

        if let Some(window) = step.requires_free {
            if !scheduling::is_available(tables.equipment_loans(equipment_id), &window, Some(loan_id)) {
                return Err(schedule_conflict(equipment_id, &window));
            }
        }

        tables.loans.insert(loan_id, step.next.clone());
        Ok(step.next)
    }
}

#[async_trait]
impl EquipmentRegistry for MemoryStore {
    async fn create(&self, owner_id: i64, data: &CreateEquipment, now: DateTime<Utc>) -> AppResult<Equipment> {
        let mut tables = self.write()?;
        tables.next_equipment_id += 1;
        let equipment = Equipment {
            id: tables.next_equipment_id,
            owner_id,
            name: data.name.clone(),
            category: data.category.clone(),
            description: data.description.clone(),
            created_at: now,
        };
        tables.equipment.insert(equipment.id, equipment.clone());
        Ok(equipment)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Equipment> {
        self.read()?
            .equipment
            .get(&id)
            .cloned()
            .ok_or_else(|| equipment_not_found(id))
    }

    async fn list(&self) -> AppResult<Vec<Equipment>> {
        let tables = self.read()?;
        let mut all: Vec<Equipment> = tables.equipment.values().cloned().collect();
        all.sort_by_key(|e| e.id);
        Ok(all)
    }
}
