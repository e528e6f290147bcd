//! Loan scheduling rules: intervals, conflict detection and the lifecycle
//! state machine. Nothing here touches storage.

pub mod availability;
pub mod interval;
pub mod lifecycle;

pub use availability::is_available;
pub use interval::Interval;
pub use lifecycle::{plan, Actor, LoanAction, Transition};
