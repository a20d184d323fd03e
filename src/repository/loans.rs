//! Loans repository for database operations
//!
//! Read-side queries over loan records. Creating and returning loans goes
//! through the loan engine, never through this repository.

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, LoanFilter, LoanQuery},
};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// List loans with an optional status filter and pagination
    pub async fn list(&self, query: &LoanQuery) -> AppResult<(Vec<Loan>, i64)> {
        let page = query.page.unwrap_or(1);
        let per_page = query.per_page.unwrap_or(20);
        let offset = (page - 1) * per_page;

        let where_clause = match query.status {
            Some(LoanFilter::Active) => "WHERE returned_at IS NULL",
            Some(LoanFilter::History) => "WHERE returned_at IS NOT NULL",
            Some(LoanFilter::Overdue) => "WHERE returned_at IS NULL AND due_at < NOW()",
            None => "",
        };

        let count_query = format!("SELECT COUNT(*) FROM loans {}", where_clause);
        let total = sqlx::query_scalar::<_, i64>(&count_query)
            .fetch_one(&self.pool)
            .await?;

        let select_query = format!(
            "SELECT * FROM loans {} ORDER BY borrowed_at DESC LIMIT {} OFFSET {}",
            where_clause, per_page, offset
        );
        let loans = sqlx::query_as::<_, Loan>(&select_query)
            .fetch_all(&self.pool)
            .await?;

        Ok((loans, total))
    }

    /// All loans for a member, most recent first, returned ones included
    pub async fn by_member(&self, member_id: Uuid) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE member_id = $1 ORDER BY borrowed_at DESC",
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    /// Delete a loan record. Deleting an active loan does not restore a
    /// copy; that mismatch is logged and left to the operator.
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let loan = self.get_by_id(id).await?;
        if loan.is_active() {
            tracing::warn!(loan_id = %id, book_id = %loan.book_id, "deleting an active loan; available copies are not adjusted");
        }

        let rows = sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::NotFound(format!("Loan with id {} not found", id)));
        }
        Ok(())
    }
}
