//! Loan lifecycle and inventory consistency
//!
//! This module owns the circulation state machine: borrow eligibility,
//! the borrow and return transactions, and the availability count they
//! keep consistent with the loan records.

pub mod engine;
pub mod inventory;

pub use engine::LoanEngine;
