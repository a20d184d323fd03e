//! Loan lifecycle engine

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    circulation::inventory,
    error::{AppError, AppResult},
    models::{Book, Loan},
    store::{RecordStore, StoreTx},
};

/// Drives the loan state machine.
///
/// Borrow and return each run as a single store transaction: eligibility is
/// decided on the same view of the records that the mutation writes to, and
/// any failure before commit rolls the whole operation back. Loan records
/// and availability counts therefore never drift apart.
#[derive(Clone)]
pub struct LoanEngine {
    store: Arc<dyn RecordStore>,
    loan_period: Duration,
}

impl LoanEngine {
    pub fn new(store: Arc<dyn RecordStore>, loan_period: Duration) -> Self {
        Self { store, loan_period }
    }

    /// Borrow a book for a member, creating an active loan due one loan
    /// period from now.
    pub async fn borrow(&self, book_id: Uuid, member_id: Uuid) -> AppResult<Loan> {
        let mut tx = self.store.begin().await?;

        tx.member_by_id(member_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", member_id)))?;
        let book = tx
            .book_by_id(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        // Eligibility is decided inside the same transaction as the mutation;
        // bailing out here drops the transaction and nothing is written
        if !Self::eligible(&mut *tx, &book, member_id).await? {
            return Err(AppError::InvalidOperation(
                "Book cannot be borrowed".to_string(),
            ));
        }

        inventory::withdraw_copy(&mut *tx, &book).await?;

        let now = Utc::now();
        let loan = Loan {
            id: Uuid::new_v4(),
            book_id,
            member_id,
            borrowed_at: now,
            due_at: now + self.loan_period,
            returned_at: None,
        };
        tx.insert_loan(&loan).await?;
        tx.commit().await?;

        tracing::info!(loan_id = %loan.id, book_id = %book_id, member_id = %member_id, "book borrowed");
        Ok(loan)
    }

    /// Return an active loan, restoring one available copy.
    pub async fn return_loan(&self, loan_id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;

        let loan = tx
            .loan_by_id(loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;
        if loan.returned_at.is_some() {
            return Err(AppError::InvalidOperation(
                "Loan is already returned".to_string(),
            ));
        }

        tx.mark_loan_returned(loan_id, Utc::now()).await?;

        // A book deleted while on loan no longer tracks availability; the
        // return still goes through
        match tx.book_by_id(loan.book_id).await? {
            Some(book) => inventory::restore_copy(&mut *tx, &book).await?,
            None => {
                tracing::warn!(loan_id = %loan_id, book_id = %loan.book_id, "book record missing on return")
            }
        }

        tx.commit().await?;

        tracing::info!(loan_id = %loan_id, "loan returned");
        Ok(())
    }

    /// Whether a member could borrow a book right now. Read only.
    pub async fn can_borrow(&self, book_id: Uuid, member_id: Uuid) -> AppResult<bool> {
        let mut tx = self.store.begin().await?;
        let eligible = match tx.book_by_id(book_id).await? {
            Some(book) => Self::eligible(&mut *tx, &book, member_id).await?,
            None => false,
        };
        tx.rollback().await?;
        Ok(eligible)
    }

    /// Active loans past their due date as of now.
    pub async fn overdue_loans(&self) -> AppResult<Vec<Loan>> {
        self.store.overdue_loans(Utc::now()).await
    }

    /// A book is borrowable when it is not deleted, a copy is on the shelf
    /// and this member does not already hold an active loan on it.
    async fn eligible(tx: &mut dyn StoreTx, book: &Book, member_id: Uuid) -> AppResult<bool> {
        if book.is_deleted || book.available_copies <= 0 {
            return Ok(false);
        }
        Ok(tx
            .active_loan_for_pair(book.id, member_id)
            .await?
            .is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Member;
    use crate::store::{MockRecordStore, MockStoreTx};
    use chrono::DateTime;

    fn sample_book(available: i32) -> Book {
        Book {
            id: Uuid::new_v4(),
            isbn: "978-0-306-40615-7".to_string(),
            title: "The Dispossessed".to_string(),
            subtitle: None,
            author: "Ursula K. Le Guin".to_string(),
            total_copies: 3,
            available_copies: available,
            added_at: Utc::now(),
            is_deleted: false,
            version: Uuid::new_v4(),
        }
    }

    fn sample_member() -> Member {
        Member {
            id: Uuid::new_v4(),
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            joined_at: Utc::now(),
        }
    }

    fn active_loan(book_id: Uuid, member_id: Uuid) -> Loan {
        let now = Utc::now();
        Loan {
            id: Uuid::new_v4(),
            book_id,
            member_id,
            borrowed_at: now,
            due_at: now + Duration::days(14),
            returned_at: None,
        }
    }

    fn engine_with(tx: MockStoreTx, loan_period: Duration) -> LoanEngine {
        let mut store = MockRecordStore::new();
        store
            .expect_begin()
            .return_once(move || Ok(Box::new(tx) as Box<dyn StoreTx>));
        LoanEngine::new(Arc::new(store), loan_period)
    }

    #[tokio::test]
    async fn borrow_fails_when_member_missing() {
        let mut tx = MockStoreTx::new();
        tx.expect_member_by_id().returning(|_| Ok(None));
        tx.expect_commit().times(0);

        let engine = engine_with(tx, Duration::days(14));
        let err = engine
            .borrow(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn borrow_fails_when_book_missing() {
        let member = sample_member();
        let mut tx = MockStoreTx::new();
        tx.expect_member_by_id()
            .returning(move |_| Ok(Some(member.clone())));
        tx.expect_book_by_id().returning(|_| Ok(None));
        tx.expect_commit().times(0);

        let engine = engine_with(tx, Duration::days(14));
        let err = engine
            .borrow(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn borrow_rejected_when_no_copy_available() {
        let member = sample_member();
        let book = sample_book(0);
        let mut tx = MockStoreTx::new();
        tx.expect_member_by_id()
            .returning(move |_| Ok(Some(member.clone())));
        tx.expect_book_by_id()
            .returning(move |_| Ok(Some(book.clone())));
        // Exhausted availability short-circuits before the pair lookup
        tx.expect_active_loan_for_pair().times(0);
        tx.expect_update_book_availability().times(0);
        tx.expect_commit().times(0);

        let engine = engine_with(tx, Duration::days(14));
        let err = engine
            .borrow(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn borrow_rejected_when_book_deleted() {
        let member = sample_member();
        let mut book = sample_book(2);
        book.is_deleted = true;
        let mut tx = MockStoreTx::new();
        tx.expect_member_by_id()
            .returning(move |_| Ok(Some(member.clone())));
        tx.expect_book_by_id()
            .returning(move |_| Ok(Some(book.clone())));
        tx.expect_commit().times(0);

        let engine = engine_with(tx, Duration::days(14));
        let err = engine
            .borrow(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn borrow_rejected_when_member_already_holds_the_book() {
        let member = sample_member();
        let member_id = member.id;
        let book = sample_book(2);
        let book_id = book.id;
        let mut tx = MockStoreTx::new();
        tx.expect_member_by_id()
            .returning(move |_| Ok(Some(member.clone())));
        tx.expect_book_by_id()
            .returning(move |_| Ok(Some(book.clone())));
        tx.expect_active_loan_for_pair()
            .returning(move |b, m| Ok(Some(active_loan(b, m))));
        tx.expect_update_book_availability().times(0);
        tx.expect_commit().times(0);

        let engine = engine_with(tx, Duration::days(14));
        let err = engine.borrow(book_id, member_id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn borrow_does_not_commit_when_loan_insert_fails() {
        let member = sample_member();
        let book = sample_book(2);
        let mut tx = MockStoreTx::new();
        tx.expect_member_by_id()
            .returning(move |_| Ok(Some(member.clone())));
        tx.expect_book_by_id()
            .returning(move |_| Ok(Some(book.clone())));
        tx.expect_active_loan_for_pair().returning(|_, _| Ok(None));
        tx.expect_update_book_availability()
            .returning(|_, _, _| Ok(()));
        tx.expect_insert_loan()
            .returning(|_| Err(AppError::Storage("write failed".to_string())));
        tx.expect_commit().times(0);

        let engine = engine_with(tx, Duration::days(14));
        let err = engine
            .borrow(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[tokio::test]
    async fn borrow_withdraws_one_copy_and_applies_loan_period() {
        let member = sample_member();
        let member_id = member.id;
        let book = sample_book(2);
        let book_id = book.id;
        let version = book.version;
        let mut tx = MockStoreTx::new();
        tx.expect_member_by_id()
            .returning(move |_| Ok(Some(member.clone())));
        tx.expect_book_by_id()
            .returning(move |_| Ok(Some(book.clone())));
        tx.expect_active_loan_for_pair().returning(|_, _| Ok(None));
        tx.expect_update_book_availability()
            .withf(move |id, expected, available| {
                *id == book_id && *expected == version && *available == 1
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        tx.expect_insert_loan()
            .withf(|loan| loan.returned_at.is_none())
            .times(1)
            .returning(|_| Ok(()));
        tx.expect_commit().times(1).returning(|| Ok(()));

        let engine = engine_with(tx, Duration::days(30));
        let loan = engine.borrow(book_id, member_id).await.unwrap();
        assert_eq!(loan.book_id, book_id);
        assert_eq!(loan.member_id, member_id);
        assert_eq!(loan.due_at - loan.borrowed_at, Duration::days(30));
        assert!(loan.is_active());
    }

    #[tokio::test]
    async fn return_fails_when_loan_missing() {
        let mut tx = MockStoreTx::new();
        tx.expect_loan_by_id().returning(|_| Ok(None));
        tx.expect_commit().times(0);

        let engine = engine_with(tx, Duration::days(14));
        let err = engine.return_loan(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn return_rejected_when_already_returned() {
        let mut loan = active_loan(Uuid::new_v4(), Uuid::new_v4());
        loan.returned_at = Some(Utc::now());
        let loan_id = loan.id;
        let mut tx = MockStoreTx::new();
        tx.expect_loan_by_id()
            .returning(move |_| Ok(Some(loan.clone())));
        tx.expect_mark_loan_returned().times(0);
        tx.expect_commit().times(0);

        let engine = engine_with(tx, Duration::days(14));
        let err = engine.return_loan(loan_id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn return_propagates_conflict_without_committing() {
        let loan = active_loan(Uuid::new_v4(), Uuid::new_v4());
        let loan_id = loan.id;
        let mut tx = MockStoreTx::new();
        tx.expect_loan_by_id()
            .returning(move |_| Ok(Some(loan.clone())));
        tx.expect_mark_loan_returned()
            .returning(|_, _| Err(AppError::Conflict("Loan was changed by someone else".to_string())));
        tx.expect_commit().times(0);

        let engine = engine_with(tx, Duration::days(14));
        let err = engine.return_loan(loan_id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn return_restores_one_copy() {
        let book = sample_book(1);
        let book_id = book.id;
        let version = book.version;
        let loan = active_loan(book_id, Uuid::new_v4());
        let loan_id = loan.id;
        let mut tx = MockStoreTx::new();
        tx.expect_loan_by_id()
            .returning(move |_| Ok(Some(loan.clone())));
        tx.expect_mark_loan_returned()
            .times(1)
            .returning(|_, _| Ok(()));
        tx.expect_book_by_id()
            .returning(move |_| Ok(Some(book.clone())));
        tx.expect_update_book_availability()
            .withf(move |id, expected, available| {
                *id == book_id && *expected == version && *available == 2
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        tx.expect_commit().times(1).returning(|| Ok(()));

        let engine = engine_with(tx, Duration::days(14));
        engine.return_loan(loan_id).await.unwrap();
    }

    #[tokio::test]
    async fn return_succeeds_when_book_record_is_gone() {
        let loan = active_loan(Uuid::new_v4(), Uuid::new_v4());
        let loan_id = loan.id;
        let mut tx = MockStoreTx::new();
        tx.expect_loan_by_id()
            .returning(move |_| Ok(Some(loan.clone())));
        tx.expect_mark_loan_returned()
            .times(1)
            .returning(|_, _| Ok(()));
        tx.expect_book_by_id().returning(|_| Ok(None));
        tx.expect_update_book_availability().times(0);
        tx.expect_commit().times(1).returning(|| Ok(()));

        let engine = engine_with(tx, Duration::days(14));
        engine.return_loan(loan_id).await.unwrap();
    }

    #[tokio::test]
    async fn can_borrow_is_false_for_unknown_book_and_rolls_back() {
        let mut tx = MockStoreTx::new();
        tx.expect_book_by_id().returning(|_| Ok(None));
        tx.expect_rollback().times(1).returning(|| Ok(()));
        tx.expect_commit().times(0);

        let engine = engine_with(tx, Duration::days(14));
        let eligible = engine
            .can_borrow(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap();
        assert!(!eligible);
    }

    #[tokio::test]
    async fn can_borrow_is_true_when_copy_available() {
        let book = sample_book(1);
        let book_id = book.id;
        let mut tx = MockStoreTx::new();
        tx.expect_book_by_id()
            .returning(move |_| Ok(Some(book.clone())));
        tx.expect_active_loan_for_pair().returning(|_, _| Ok(None));
        tx.expect_rollback().times(1).returning(|| Ok(()));
        tx.expect_commit().times(0);

        let engine = engine_with(tx, Duration::days(14));
        let eligible = engine.can_borrow(book_id, Uuid::new_v4()).await.unwrap();
        assert!(eligible);
    }

    #[tokio::test]
    async fn overdue_delegates_to_the_store() {
        let due = DateTime::parse_from_rfc3339("2023-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut loan = active_loan(Uuid::new_v4(), Uuid::new_v4());
        loan.due_at = due;
        let loan_id = loan.id;

        let mut store = MockRecordStore::new();
        store
            .expect_overdue_loans()
            .returning(move |_| Ok(vec![loan.clone()]));
        let engine = LoanEngine::new(Arc::new(store), Duration::days(14));

        let overdue = engine.overdue_loans().await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, loan_id);
    }
}
