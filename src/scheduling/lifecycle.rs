//! Loan lifecycle transitions
//!
//! ```text
//! (request) -> PENDING --approve--> APPROVED --complete--> COMPLETED
//!                 |                  |    ^
//!                 |-reject-> DENIED  |    |-approve/decline extension-.
//!                 |                  |                                |
//!                 '--cancel--> CANCELLED <--cancel--'--extend--> EXTENSION_PENDING
//! ```
//!
//! Guards that need the rest of the equipment's schedule are returned as a
//! window that must still be free; the store checks it under the equipment
//! lock before writing.

use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, LoanStatus},
};

use super::Interval;

/// Commands on an existing loan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanAction {
    Approve,
    Reject,
    Cancel,
    Complete,
    RequestExtension { new_end: DateTime<Utc> },
    ApproveExtension,
    DeclineExtension,
}

/// Who may issue an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Borrower,
    Owner,
    BorrowerOrOwner,
}

impl LoanAction {
    pub fn name(&self) -> &'static str {
        match self {
            LoanAction::Approve => "approve",
            LoanAction::Reject => "reject",
            LoanAction::Cancel => "cancel",
            LoanAction::Complete => "complete",
            LoanAction::RequestExtension { .. } => "extend",
            LoanAction::ApproveExtension => "approve the extension of",
            LoanAction::DeclineExtension => "decline the extension of",
        }
    }

    pub fn actor(&self) -> Actor {
        match self {
            LoanAction::Cancel | LoanAction::RequestExtension { .. } => Actor::Borrower,
            LoanAction::Complete => Actor::BorrowerOrOwner,
            LoanAction::Approve
            | LoanAction::Reject
            | LoanAction::ApproveExtension
            | LoanAction::DeclineExtension => Actor::Owner,
        }
    }
}

/// The row to persist and the window that must be free of blocking loans
/// (other than this one) at write time.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: Loan,
    pub requires_free: Option<Interval>,
}

/// Evaluate `action` against the current row.
///
/// Pure: reads nothing but `loan` and `now`. A returned error means nothing
/// may be written.
pub fn plan(loan: &Loan, action: LoanAction, now: DateTime<Utc>) -> AppResult<Transition> {
    use LoanStatus::*;

    let mut next = loan.clone();
    let mut requires_free = None;

    match action {
        LoanAction::Approve => match loan.status {
            Pending => {
                next.status = Approved;
                requires_free = Some(loan.interval());
            }
            Approved | Denied | Cancelled | ExtensionPending | Completed => {
                return Err(refused(loan, action));
            }
        },
        LoanAction::Reject => match loan.status {
            Pending => next.status = Denied,
            Approved | Denied | Cancelled | ExtensionPending | Completed => {
                return Err(refused(loan, action));
            }
        },
        LoanAction::Cancel => match loan.status {
            Pending | Approved => {
                if now >= loan.start_date {
                    return Err(AppError::InvalidTransition(format!(
                        "Loan {} has already started and can no longer be cancelled",
                        loan.id
                    )));
                }
                next.status = Cancelled;
            }
            Denied | Cancelled | ExtensionPending | Completed => {
                return Err(refused(loan, action));
            }
        },
        LoanAction::Complete => match loan.status {
            Approved => {
                next.status = Completed;
                next.returned_at = Some(now);
            }
            Pending | Denied | Cancelled | ExtensionPending | Completed => {
                return Err(refused(loan, action));
            }
        },
        LoanAction::RequestExtension { new_end } => match loan.status {
            Approved => {
                if new_end <= loan.end_date {
                    return Err(AppError::Validation(format!(
                        "New end date {} must be after the current end date {}",
                        new_end.to_rfc3339(),
                        loan.end_date.to_rfc3339()
                    )));
                }
                next.status = ExtensionPending;
                next.requested_end_date = Some(new_end);
                requires_free = Some(Interval::from_ordered(loan.end_date, new_end));
            }
            Pending | Denied | Cancelled | ExtensionPending | Completed => {
                return Err(refused(loan, action));
            }
        },
        LoanAction::ApproveExtension => match loan.status {
            ExtensionPending => {
                let requested = pending_extension_end(loan)?;
                next.status = Approved;
                next.end_date = requested;
                next.requested_end_date = None;
                requires_free = Some(Interval::from_ordered(loan.end_date, requested));
            }
            Pending | Approved | Denied | Cancelled | Completed => {
                return Err(refused(loan, action));
            }
        },
        LoanAction::DeclineExtension => match loan.status {
            ExtensionPending => {
                next.status = Approved;
                next.requested_end_date = None;
            }
            Pending | Approved | Denied | Cancelled | Completed => {
                return Err(refused(loan, action));
            }
        },
    }

    Ok(Transition {
        next,
        requires_free,
    })
}

fn refused(loan: &Loan, action: LoanAction) -> AppError {
    AppError::InvalidTransition(format!(
        "Cannot {} loan {} while it is {}",
        action.name(),
        loan.id,
        loan.status
    ))
}

fn pending_extension_end(loan: &Loan) -> AppResult<DateTime<Utc>> {
    match loan.requested_end_date {
        Some(requested) if requested > loan.end_date => Ok(requested),
        _ => Err(AppError::Internal(format!(
            "Loan {} is awaiting an extension without a valid requested end date",
            loan.id
        ))),
    }
}
