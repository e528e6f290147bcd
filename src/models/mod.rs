//! Data models for Gearloan

pub mod caller;
pub mod equipment;
pub mod loan;
pub mod page;

// Re-export commonly used types
pub use caller::CallerClaims;
pub use equipment::Equipment;
pub use loan::{Loan, LoanStatus, LoanView};
pub use page::{Page, PageRequest};
