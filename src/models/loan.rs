//! Loan model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::scheduling::Interval;

/// Loan status, mirrored by the `loan_status` Postgres enum
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "loan_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Pending,
    Approved,
    Denied,
    Cancelled,
    ExtensionPending,
    Completed,
}

impl LoanStatus {
    /// Statuses whose effective interval reserves the equipment
    pub const BLOCKING: [LoanStatus; 2] = [LoanStatus::Approved, LoanStatus::ExtensionPending];

    pub fn is_blocking(self) -> bool {
        matches!(self, LoanStatus::Approved | LoanStatus::ExtensionPending)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LoanStatus::Denied | LoanStatus::Cancelled | LoanStatus::Completed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoanStatus::Pending => "PENDING",
            LoanStatus::Approved => "APPROVED",
            LoanStatus::Denied => "DENIED",
            LoanStatus::Cancelled => "CANCELLED",
            LoanStatus::ExtensionPending => "EXTENSION_PENDING",
            LoanStatus::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loan row from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Loan {
    pub id: i64,
    pub equipment_id: i64,
    pub borrower_id: i64,
    pub start_date: DateTime<Utc>,
    /// Exclusive end of the currently granted interval
    pub end_date: DateTime<Utc>,
    /// Set only while an extension is awaiting the owner
    pub requested_end_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl Loan {
    /// Effective `[start_date, end_date)` interval
    pub fn interval(&self) -> Interval {
        Interval::from_ordered(self.start_date, self.end_date)
    }

    /// Overdue is derived, never stored
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == LoanStatus::Approved && self.end_date < now
    }
}

/// Loan as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanView {
    pub id: i64,
    pub equipment_id: i64,
    pub borrower_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub requested_end_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    /// APPROVED and past its end date at the time of the read
    pub is_overdue: bool,
}

impl LoanView {
    pub fn from_loan(loan: Loan, now: DateTime<Utc>) -> Self {
        let is_overdue = loan.is_overdue(now);
        Self {
            id: loan.id,
            equipment_id: loan.equipment_id,
            borrower_id: loan.borrower_id,
            start_date: loan.start_date,
            end_date: loan.end_date,
            requested_end_date: loan.requested_end_date,
            status: loan.status,
            created_at: loan.created_at,
            returned_at: loan.returned_at,
            is_overdue,
        }
    }
}

/// A validated loan request ready to be stored
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub equipment_id: i64,
    pub borrower_id: i64,
    pub interval: Interval,
}

/// Request loan body
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLoan {
    pub equipment_id: i64,
    /// Inclusive start (RFC 3339, normalized to UTC)
    pub start_date: DateTime<Utc>,
    /// Exclusive end (RFC 3339, normalized to UTC)
    pub end_date: DateTime<Utc>,
}

/// Extension request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct ExtendLoan {
    pub new_end_date: DateTime<Utc>,
}

/// Row filter for paged loan listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoanFilter {
    pub status: Option<LoanStatus>,
    pub borrower_id: Option<i64>,
    /// Owner of the referenced equipment, resolved by join
    pub owner_id: Option<i64>,
}

impl LoanFilter {
    pub fn matches(&self, loan: &Loan, equipment_owner: Option<i64>) -> bool {
        self.status.map_or(true, |s| loan.status == s)
            && self.borrower_id.map_or(true, |b| loan.borrower_id == b)
            && self
                .owner_id
                .map_or(true, |o| equipment_owner == Some(o))
    }
}

/// Query parameters for loan listings
#[derive(Debug, Default, Deserialize, Validate, IntoParams, ToSchema)]
pub struct LoanListQuery {
    /// Filter by status
    pub status: Option<LoanStatus>,
    /// Page number (1-based)
    #[validate(range(min = 1, message = "page_number must be at least 1"))]
    pub page_number: Option<i64>,
    /// Items per page
    #[validate(range(min = 1, message = "page_size must be at least 1"))]
    pub page_size: Option<i64>,
}
