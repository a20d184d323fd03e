//! Data models for Librarium

pub mod book;
pub mod loan;
pub mod member;

// Re-export commonly used types
pub use book::Book;
pub use loan::{Loan, LoanStatus};
pub use member::Member;
