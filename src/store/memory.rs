//! In-memory record store
//!
//! Mirrors the transactional contract of the PostgreSQL store without a
//! database. Reads come from a snapshot taken at `begin`, writes are
//! buffered, and commit re-validates every guarded write against live state
//! under a single lock before applying any of them. Two racing transactions
//! therefore resolve the same way they do on PostgreSQL: the first committer
//! wins and the loser gets a conflict.
//!
//! The hermetic test suite runs the loan engine on this backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Book, Loan, Member},
};

use super::{RecordStore, StoreTx};

#[derive(Debug, Clone, Default)]
struct State {
    books: HashMap<Uuid, Book>,
    members: HashMap<Uuid, Member>,
    loans: HashMap<Uuid, Loan>,
}

/// Record store backed by process memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a book record.
    pub async fn put_book(&self, book: Book) {
        self.state.lock().await.books.insert(book.id, book);
    }

    /// Seed or replace a member record.
    pub async fn put_member(&self, member: Member) {
        self.state.lock().await.members.insert(member.id, member);
    }

    /// Seed or replace a loan record.
    pub async fn put_loan(&self, loan: Loan) {
        self.state.lock().await.loans.insert(loan.id, loan);
    }

    /// Committed state of a book.
    pub async fn book(&self, id: Uuid) -> Option<Book> {
        self.state.lock().await.books.get(&id).cloned()
    }

    /// Committed state of a loan.
    pub async fn loan(&self, id: Uuid) -> Option<Loan> {
        self.state.lock().await.loans.get(&id).cloned()
    }

    /// All committed loans, in no particular order.
    pub async fn loans(&self) -> Vec<Loan> {
        self.state.lock().await.loans.values().cloned().collect()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let snapshot = self.state.lock().await.clone();
        Ok(Box::new(MemoryTx {
            state: Arc::clone(&self.state),
            snapshot,
            writes: Vec::new(),
            done: false,
        }))
    }

    async fn overdue_loans(&self, as_of: DateTime<Utc>) -> AppResult<Vec<Loan>> {
        let state = self.state.lock().await;
        let mut loans: Vec<Loan> = state
            .loans
            .values()
            .filter(|loan| loan.is_overdue(as_of))
            .cloned()
            .collect();
        loans.sort_by_key(|loan| loan.due_at);
        Ok(loans)
    }
}

#[derive(Debug, Clone)]
enum Write {
    InsertLoan(Loan),
    MarkReturned {
        loan_id: Uuid,
        returned_at: DateTime<Utc>,
    },
    BookAvailability {
        book_id: Uuid,
        expected_version: Uuid,
        new_version: Uuid,
        available_copies: i32,
    },
}

/// A buffered transaction against the in-memory store.
pub struct MemoryTx {
    state: Arc<Mutex<State>>,
    snapshot: State,
    writes: Vec<Write>,
    done: bool,
}

impl MemoryTx {
    fn check_open(&self) -> AppResult<()> {
        if self.done {
            return Err(AppError::Storage(
                "transaction already completed".to_string(),
            ));
        }
        Ok(())
    }

    /// Snapshot view of a book with this transaction's own writes applied.
    fn effective_book(&self, id: Uuid) -> Option<Book> {
        let mut book = self.snapshot.books.get(&id).cloned();
        for write in &self.writes {
            if let Write::BookAvailability {
                book_id,
                new_version,
                available_copies,
                ..
            } = write
            {
                if *book_id == id {
                    if let Some(ref mut book) = book {
                        book.available_copies = *available_copies;
                        book.version = *new_version;
                    }
                }
            }
        }
        book
    }

    /// Snapshot view of all loans with this transaction's own writes applied.
    fn effective_loans(&self) -> HashMap<Uuid, Loan> {
        let mut loans = self.snapshot.loans.clone();
        for write in &self.writes {
            match write {
                Write::InsertLoan(loan) => {
                    loans.insert(loan.id, loan.clone());
                }
                Write::MarkReturned {
                    loan_id,
                    returned_at,
                } => {
                    if let Some(loan) = loans.get_mut(loan_id) {
                        loan.returned_at = Some(*returned_at);
                    }
                }
                Write::BookAvailability { .. } => {}
            }
        }
        loans
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn book_by_id(&mut self, id: Uuid) -> AppResult<Option<Book>> {
        self.check_open()?;
        Ok(self.effective_book(id))
    }

    async fn member_by_id(&mut self, id: Uuid) -> AppResult<Option<Member>> {
        self.check_open()?;
        Ok(self.snapshot.members.get(&id).cloned())
    }

    async fn loan_by_id(&mut self, id: Uuid) -> AppResult<Option<Loan>> {
        self.check_open()?;
        Ok(self.effective_loans().get(&id).cloned())
    }

    async fn active_loan_for_pair(
        &mut self,
        book_id: Uuid,
        member_id: Uuid,
    ) -> AppResult<Option<Loan>> {
        self.check_open()?;
        Ok(self
            .effective_loans()
            .into_values()
            .find(|loan| loan.book_id == book_id && loan.member_id == member_id && loan.is_active()))
    }

    async fn insert_loan(&mut self, loan: &Loan) -> AppResult<()> {
        self.check_open()?;
        self.writes.push(Write::InsertLoan(loan.clone()));
        Ok(())
    }

    async fn mark_loan_returned(
        &mut self,
        loan_id: Uuid,
        returned_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.check_open()?;
        self.writes.push(Write::MarkReturned {
            loan_id,
            returned_at,
        });
        Ok(())
    }

    async fn update_book_availability(
        &mut self,
        book_id: Uuid,
        expected_version: Uuid,
        available_copies: i32,
    ) -> AppResult<()> {
        self.check_open()?;
        self.writes.push(Write::BookAvailability {
            book_id,
            expected_version,
            new_version: Uuid::new_v4(),
            available_copies,
        });
        Ok(())
    }

    async fn commit(&mut self) -> AppResult<()> {
        self.check_open()?;
        self.done = true;

        let mut state = self.state.lock().await;
        // Validate and apply against a working copy so a conflict midway
        // leaves the live state untouched
        let mut next = state.clone();
        for write in &self.writes {
            match write {
                Write::InsertLoan(loan) => {
                    next.loans.insert(loan.id, loan.clone());
                }
                Write::MarkReturned {
                    loan_id,
                    returned_at,
                } => {
                    let loan = next
                        .loans
                        .get_mut(loan_id)
                        .filter(|loan| loan.returned_at.is_none())
                        .ok_or_else(|| {
                            AppError::Conflict("Loan was changed by someone else".to_string())
                        })?;
                    loan.returned_at = Some(*returned_at);
                }
                Write::BookAvailability {
                    book_id,
                    expected_version,
                    new_version,
                    available_copies,
                } => {
                    let book = next
                        .books
                        .get_mut(book_id)
                        .filter(|book| book.version == *expected_version)
                        .ok_or_else(|| {
                            AppError::Conflict("Book was changed by someone else".to_string())
                        })?;
                    book.available_copies = *available_copies;
                    book.version = *new_version;
                }
            }
        }
        *state = next;
        Ok(())
    }

    async fn rollback(&mut self) -> AppResult<()> {
        self.check_open()?;
        self.done = true;
        self.writes.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_book(available: i32) -> Book {
        Book {
            id: Uuid::new_v4(),
            isbn: "978-0-123".to_string(),
            title: "Sample".to_string(),
            subtitle: None,
            author: "Author".to_string(),
            total_copies: 3,
            available_copies: available,
            added_at: Utc::now(),
            is_deleted: false,
            version: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible() {
        let store = MemoryStore::new();
        let book = sample_book(2);
        let book_id = book.id;
        let version = book.version;
        store.put_book(book).await;

        let mut tx = store.begin().await.unwrap();
        tx.update_book_availability(book_id, version, 1).await.unwrap();
        drop(tx);

        assert_eq!(store.book(book_id).await.unwrap().available_copies, 2);
    }

    #[tokio::test]
    async fn commit_applies_buffered_writes() {
        let store = MemoryStore::new();
        let book = sample_book(2);
        let book_id = book.id;
        let version = book.version;
        store.put_book(book).await;

        let mut tx = store.begin().await.unwrap();
        tx.update_book_availability(book_id, version, 1).await.unwrap();
        tx.commit().await.unwrap();

        let stored = store.book(book_id).await.unwrap();
        assert_eq!(stored.available_copies, 1);
        assert_ne!(stored.version, version);
    }

    #[tokio::test]
    async fn stale_version_conflicts_at_commit() {
        let store = MemoryStore::new();
        let book = sample_book(2);
        let book_id = book.id;
        let version = book.version;
        store.put_book(book).await;

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.update_book_availability(book_id, version, 1).await.unwrap();
        second.update_book_availability(book_id, version, 1).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // The winner's write stands
        assert_eq!(store.book(book_id).await.unwrap().available_copies, 1);
    }

    #[tokio::test]
    async fn conflicting_commit_applies_nothing() {
        let store = MemoryStore::new();
        let book = sample_book(2);
        let book_id = book.id;
        let version = book.version;
        store.put_book(book).await;

        let mut winner = store.begin().await.unwrap();
        winner.update_book_availability(book_id, version, 1).await.unwrap();
        winner.commit().await.unwrap();

        let mut loser = store.begin().await.unwrap();
        let loan = Loan {
            id: Uuid::new_v4(),
            book_id,
            member_id: Uuid::new_v4(),
            borrowed_at: Utc::now(),
            due_at: Utc::now(),
            returned_at: None,
        };
        loser.insert_loan(&loan).await.unwrap();
        loser
            .update_book_availability(book_id, version, 1)
            .await
            .unwrap();

        assert!(loser.commit().await.is_err());
        // The buffered loan insert was discarded along with the conflict
        assert!(store.loan(loan.id).await.is_none());
    }

    #[tokio::test]
    async fn transaction_reads_its_own_writes() {
        let store = MemoryStore::new();
        let book = sample_book(2);
        let book_id = book.id;
        let version = book.version;
        store.put_book(book).await;

        let mut tx = store.begin().await.unwrap();
        tx.update_book_availability(book_id, version, 1).await.unwrap();
        let seen = tx.book_by_id(book_id).await.unwrap().unwrap();
        assert_eq!(seen.available_copies, 1);

        let loan = Loan {
            id: Uuid::new_v4(),
            book_id,
            member_id: Uuid::new_v4(),
            borrowed_at: Utc::now(),
            due_at: Utc::now(),
            returned_at: None,
        };
        tx.insert_loan(&loan).await.unwrap();
        let found = tx
            .active_loan_for_pair(book_id, loan.member_id)
            .await
            .unwrap();
        assert_eq!(found.map(|l| l.id), Some(loan.id));
    }

    #[tokio::test]
    async fn completed_transaction_rejects_further_use() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.commit().await.unwrap();

        let err = tx.commit().await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
        let err = tx.book_by_id(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }
}
