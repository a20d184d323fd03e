//! Loan management service
//!
//! Lifecycle operations delegate to the loan engine so they run inside a
//! store transaction; read-side queries go straight to the repository.

use uuid::Uuid;

use crate::{
    circulation::LoanEngine,
    error::AppResult,
    models::loan::{Loan, LoanQuery},
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    engine: LoanEngine,
}

impl LoansService {
    pub fn new(repository: Repository, engine: LoanEngine) -> Self {
        Self { repository, engine }
    }

    /// Borrow a book for a member
    pub async fn borrow(&self, book_id: Uuid, member_id: Uuid) -> AppResult<Loan> {
        self.engine.borrow(book_id, member_id).await
    }

    /// Return a borrowed book
    pub async fn return_loan(&self, loan_id: Uuid) -> AppResult<()> {
        self.engine.return_loan(loan_id).await
    }

    /// Check borrow eligibility without side effects
    pub async fn can_borrow(&self, book_id: Uuid, member_id: Uuid) -> AppResult<bool> {
        self.engine.can_borrow(book_id, member_id).await
    }

    /// Active loans past their due date
    pub async fn overdue(&self) -> AppResult<Vec<Loan>> {
        self.engine.overdue_loans().await
    }

    /// List loans with an optional status filter
    pub async fn list(&self, query: &LoanQuery) -> AppResult<(Vec<Loan>, i64)> {
        self.repository.loans.list(query).await
    }

    /// Get a loan by ID
    pub async fn get(&self, id: Uuid) -> AppResult<Loan> {
        self.repository.loans.get_by_id(id).await
    }

    /// Get loans for a member
    pub async fn member_loans(&self, member_id: Uuid) -> AppResult<Vec<Loan>> {
        // Verify member exists
        self.repository.members.get_by_id(member_id).await?;
        self.repository.loans.by_member(member_id).await
    }

    /// Administrative delete of a loan record
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.repository.loans.delete(id).await?;
        tracing::info!(loan_id = %id, "loan deleted");
        Ok(())
    }
}
