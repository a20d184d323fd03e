//! Record store: transactional persistence for circulation state
//!
//! Every write to loans and availability counts flows through a [`StoreTx`]
//! obtained from [`RecordStore::begin`]. A transaction that is dropped
//! without commit leaves no trace, so the engine can bail out at any point
//! and the records stay exactly as they were.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Book, Loan, Member},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Durable storage for books, members and loans.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Open a transaction.
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>>;

    /// Active loans whose due date lies strictly before `as_of`.
    async fn overdue_loans(&self, as_of: DateTime<Utc>) -> AppResult<Vec<Loan>>;
}

/// One atomic unit of work against the record store.
///
/// Reads observe a consistent view of the records. Writes become durable
/// only on [`StoreTx::commit`]; the guarded updates fail with
/// `AppError::Conflict` when another transaction got there first, they never
/// silently overwrite.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreTx: Send {
    async fn book_by_id(&mut self, id: Uuid) -> AppResult<Option<Book>>;

    async fn member_by_id(&mut self, id: Uuid) -> AppResult<Option<Member>>;

    async fn loan_by_id(&mut self, id: Uuid) -> AppResult<Option<Loan>>;

    /// The active loan held by this member on this book, if any.
    async fn active_loan_for_pair(
        &mut self,
        book_id: Uuid,
        member_id: Uuid,
    ) -> AppResult<Option<Loan>>;

    async fn insert_loan(&mut self, loan: &Loan) -> AppResult<()>;

    /// Stamp an active loan as returned. Conflict if the loan was already
    /// returned by a concurrent transaction.
    async fn mark_loan_returned(
        &mut self,
        loan_id: Uuid,
        returned_at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Write a new available-copy count for a book that is expected to still
    /// carry `expected_version`. The stored token is replaced with a fresh
    /// one; a stale token means Conflict.
    async fn update_book_availability(
        &mut self,
        book_id: Uuid,
        expected_version: Uuid,
        available_copies: i32,
    ) -> AppResult<()>;

    async fn commit(&mut self) -> AppResult<()>;

    async fn rollback(&mut self) -> AppResult<()>;
}
