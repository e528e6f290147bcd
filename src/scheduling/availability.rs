//! Conflict scan over an equipment's loans

use crate::models::loan::Loan;

use super::Interval;

/// True when no blocking loan in `loans` overlaps `candidate`.
///
/// Only APPROVED and EXTENSION_PENDING loans block, on their effective
/// `[start_date, end_date)`. The loan whose id equals `exclude` is skipped so
/// a loan can be re-validated against everyone but itself. Callers pass the
/// loans of a single equipment.
pub fn is_available<'a, I>(loans: I, candidate: &Interval, exclude: Option<i64>) -> bool
where
    I: IntoIterator<Item = &'a Loan>,
{
    !loans.into_iter().any(|loan| {
        Some(loan.id) != exclude && loan.status.is_blocking() && loan.interval().overlaps(candidate)
    })
}
