//! Loan scheduling service
//!
//! Orchestrates each operation as: existence check, caller authorization,
//! then a single atomic store write that evaluates the lifecycle guard and
//! the availability check under the equipment lock.

use chrono::Utc;

use crate::{
    config::LoansConfig,
    error::{AppError, AppResult},
    models::{
        loan::{CreateLoan, Loan, LoanFilter, LoanListQuery, LoanView, NewLoan},
        page::{Page, PageRequest},
    },
    repository::Repository,
    scheduling::{Actor, Interval, LoanAction},
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    config: LoansConfig,
}

impl LoansService {
    pub fn new(repository: Repository, config: LoansConfig) -> Self {
        Self { repository, config }
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// All loans, optionally filtered by status
    pub async fn list_loans(&self, query: &LoanListQuery) -> AppResult<Page<LoanView>> {
        let filter = LoanFilter {
            status: query.status,
            ..LoanFilter::default()
        };
        self.page(filter, query).await
    }

    pub async fn get_loan(&self, loan_id: i64) -> AppResult<LoanView> {
        let loan = self.find(loan_id).await?;
        Ok(LoanView::from_loan(loan, Utc::now()))
    }

    /// Loans where the caller is the borrower
    pub async fn borrower_loans(&self, borrower_id: i64, query: &LoanListQuery) -> AppResult<Page<LoanView>> {
        let filter = LoanFilter {
            status: query.status,
            borrower_id: Some(borrower_id),
            owner_id: None,
        };
        self.page(filter, query).await
    }

    /// Unpaged; overdue is computed against the current time
    pub async fn borrower_overdue_loans(&self, borrower_id: i64) -> AppResult<Vec<LoanView>> {
        let now = Utc::now();
        let loans = self
            .repository
            .loans
            .overdue_for_borrower(borrower_id, now)
            .await?;
        Ok(loans
            .into_iter()
            .map(|loan| LoanView::from_loan(loan, now))
            .collect())
    }

    /// Loans against equipment owned by the caller
    pub async fn owner_loans(&self, owner_id: i64, query: &LoanListQuery) -> AppResult<Page<LoanView>> {
        let filter = LoanFilter {
            status: query.status,
            borrower_id: None,
            owner_id: Some(owner_id),
        };
        self.page(filter, query).await
    }

    pub async fn is_equipment_owner(&self, loan_id: i64, user_id: i64) -> AppResult<bool> {
        self.repository.loans.is_equipment_owner(loan_id, user_id).await
    }

    // ---------------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------------

    /// Request a loan; the caller becomes the borrower
    pub async fn request_loan(&self, borrower_id: i64, request: CreateLoan) -> AppResult<LoanView> {
        let result = self.insert(borrower_id, &request).await;
        match &result {
            Ok(loan) => tracing::info!(
                target: "loan_events",
                loan_id = loan.id,
                equipment_id = loan.equipment_id,
                borrower_id,
                status = %loan.status,
                "loan requested"
            ),
            Err(e) => log_refusal("request", None, borrower_id, e),
        }
        result.map(|loan| LoanView::from_loan(loan, Utc::now()))
    }

    /// Borrower withdraws a loan that has not started
    pub async fn cancel_loan(&self, caller_id: i64, loan_id: i64) -> AppResult<LoanView> {
        self.apply(caller_id, loan_id, LoanAction::Cancel).await
    }

    /// Borrower or owner confirms the equipment came back
    pub async fn complete_loan(&self, caller_id: i64, loan_id: i64) -> AppResult<LoanView> {
        self.apply(caller_id, loan_id, LoanAction::Complete).await
    }

    /// Borrower asks to push the end date out
    pub async fn request_extension(
        &self,
        caller_id: i64,
        loan_id: i64,
        new_end: chrono::DateTime<Utc>,
    ) -> AppResult<LoanView> {
        self.apply(caller_id, loan_id, LoanAction::RequestExtension { new_end })
            .await
    }

    pub async fn approve_loan(&self, caller_id: i64, loan_id: i64) -> AppResult<LoanView> {
        self.apply(caller_id, loan_id, LoanAction::Approve).await
    }

    pub async fn reject_loan(&self, caller_id: i64, loan_id: i64) -> AppResult<LoanView> {
        self.apply(caller_id, loan_id, LoanAction::Reject).await
    }

    /// Re-validates the extension window at approval time
    pub async fn approve_extension(&self, caller_id: i64, loan_id: i64) -> AppResult<LoanView> {
        self.apply(caller_id, loan_id, LoanAction::ApproveExtension).await
    }

    pub async fn decline_extension(&self, caller_id: i64, loan_id: i64) -> AppResult<LoanView> {
        self.apply(caller_id, loan_id, LoanAction::DeclineExtension).await
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    async fn insert(&self, borrower_id: i64, request: &CreateLoan) -> AppResult<Loan> {
        let interval = Interval::new(request.start_date, request.end_date)?;
        let new_loan = NewLoan {
            equipment_id: request.equipment_id,
            borrower_id,
            interval,
        };
        self.repository
            .loans
            .insert_requested(&new_loan, Utc::now())
            .await
    }

    async fn apply(&self, caller_id: i64, loan_id: i64, action: LoanAction) -> AppResult<LoanView> {
        let result = self.authorize_and_apply(caller_id, loan_id, action).await;
        match &result {
            Ok(loan) => tracing::info!(
                target: "loan_events",
                loan_id,
                equipment_id = loan.equipment_id,
                caller_id,
                action = action.name(),
                status = %loan.status,
                "loan updated"
            ),
            Err(e) => log_refusal(action.name(), Some(loan_id), caller_id, e),
        }
        result.map(|loan| LoanView::from_loan(loan, Utc::now()))
    }

    async fn authorize_and_apply(&self, caller_id: i64, loan_id: i64, action: LoanAction) -> AppResult<Loan> {
        let loan = self.find(loan_id).await?;

        let allowed = match action.actor() {
            Actor::Borrower => loan.borrower_id == caller_id,
            Actor::Owner => self.is_equipment_owner(loan_id, caller_id).await?,
            Actor::BorrowerOrOwner => {
                loan.borrower_id == caller_id || self.is_equipment_owner(loan_id, caller_id).await?
            }
        };
        if !allowed {
            let role = match action.actor() {
                Actor::Borrower => "the borrower",
                Actor::Owner => "the equipment owner",
                Actor::BorrowerOrOwner => "the borrower or the equipment owner",
            };
            return Err(AppError::Unauthorized(format!(
                "Only {} can {} loan {}",
                role,
                action.name(),
                loan_id
            )));
        }

        self.repository
            .loans
            .transition(loan_id, action, Utc::now())
            .await
    }

    async fn find(&self, loan_id: i64) -> AppResult<Loan> {
        self.repository
            .loans
            .get_by_id(loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", loan_id)))
    }

    async fn page(&self, filter: LoanFilter, query: &LoanListQuery) -> AppResult<Page<LoanView>> {
        let request = PageRequest::resolve(query.page_number, query.page_size, &self.config)?;
        let page = self.repository.loans.list(&filter, request).await?;
        let now = Utc::now();
        Ok(page.map(|loan| LoanView::from_loan(loan, now)))
    }
}

fn log_refusal(action: &str, loan_id: Option<i64>, caller_id: i64, error: &AppError) {
    if error.is_expected() {
        tracing::warn!(action, ?loan_id, caller_id, "loan {} refused: {}", action, error);
    } else {
        tracing::error!(action, ?loan_id, caller_id, "loan {} failed: {}", action, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::loan::LoanStatus,
        repository::{MockEquipmentRegistry, MockLoansStore},
    };
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn pending_loan() -> Loan {
        let start = Utc.with_ymd_and_hms(2030, 1, 10, 0, 0, 0).unwrap();
        Loan {
            id: 1,
            equipment_id: 5,
            borrower_id: 42,
            start_date: start,
            end_date: start + Duration::days(5),
            requested_end_date: None,
            status: LoanStatus::Pending,
            created_at: start - Duration::days(30),
            returned_at: None,
        }
    }

    fn service(store: MockLoansStore) -> LoansService {
        let repository = Repository::from_stores(Arc::new(store), Arc::new(MockEquipmentRegistry::new()));
        LoansService::new(repository, LoansConfig::default())
    }

    #[tokio::test]
    async fn test_storage_fault_propagates_as_hard_failure() {
        let mut store = MockLoansStore::new();
        store
            .expect_get_by_id()
            .returning(|_| Ok(Some(pending_loan())));
        store
            .expect_is_equipment_owner()
            .returning(|_, _| Ok(true));
        store
            .expect_transition()
            .returning(|_, _, _| Err(AppError::Database(sqlx::Error::PoolTimedOut)));

        let err = service(store).approve_loan(7, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        assert!(!err.is_expected());
    }

    #[tokio::test]
    async fn test_owner_check_happens_before_write() {
        let mut store = MockLoansStore::new();
        store
            .expect_get_by_id()
            .returning(|_| Ok(Some(pending_loan())));
        store
            .expect_is_equipment_owner()
            .returning(|_, _| Ok(false));
        store.expect_transition().never();

        let err = service(store).approve_loan(99, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_missing_loan_is_not_found_before_authorization() {
        let mut store = MockLoansStore::new();
        store.expect_get_by_id().returning(|_| Ok(None));
        store.expect_is_equipment_owner().never();
        store.expect_transition().never();

        let err = service(store).reject_loan(7, 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_interval_never_reaches_store() {
        let mut store = MockLoansStore::new();
        store.expect_insert_requested().never();

        let day = Utc.with_ymd_and_hms(2030, 1, 10, 0, 0, 0).unwrap();
        let err = service(store)
            .request_loan(
                42,
                CreateLoan {
                    equipment_id: 5,
                    start_date: day,
                    end_date: day,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
