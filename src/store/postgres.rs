//! PostgreSQL-backed record store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Book, Loan, Member},
};

use super::{RecordStore, StoreTx};

/// Record store over a PostgreSQL connection pool.
///
/// Guarded updates carry the version token in their WHERE clause, so a
/// transaction that lost a race sees zero affected rows and reports a
/// conflict instead of clobbering the winner's write.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
    statement_timeout_ms: u64,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>, statement_timeout_ms: u64) -> Self {
        Self {
            pool,
            statement_timeout_ms,
        }
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let mut tx = self.pool.begin().await?;
        // Bound how long a transaction may sit on row locks
        sqlx::query(&format!(
            "SET LOCAL statement_timeout = {}",
            self.statement_timeout_ms
        ))
        .execute(&mut *tx)
        .await?;
        Ok(Box::new(PgTx { tx: Some(tx) }))
    }

    async fn overdue_loans(&self, as_of: DateTime<Utc>) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE returned_at IS NULL AND due_at < $1 ORDER BY due_at",
        )
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }
}

/// One open database transaction. Dropping it without commit rolls back.
pub struct PgTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgTx {
    fn tx(&mut self) -> AppResult<&mut Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| AppError::Storage("transaction already completed".to_string()))
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn book_by_id(&mut self, id: Uuid) -> AppResult<Option<Book>> {
        let tx = self.tx()?;
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(book)
    }

    async fn member_by_id(&mut self, id: Uuid) -> AppResult<Option<Member>> {
        let tx = self.tx()?;
        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(member)
    }

    async fn loan_by_id(&mut self, id: Uuid) -> AppResult<Option<Loan>> {
        let tx = self.tx()?;
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(loan)
    }

    async fn active_loan_for_pair(
        &mut self,
        book_id: Uuid,
        member_id: Uuid,
    ) -> AppResult<Option<Loan>> {
        let tx = self.tx()?;
        let loan = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE book_id = $1 AND member_id = $2 AND returned_at IS NULL",
        )
        .bind(book_id)
        .bind(member_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(loan)
    }

    async fn insert_loan(&mut self, loan: &Loan) -> AppResult<()> {
        let tx = self.tx()?;
        sqlx::query(
            r#"
            INSERT INTO loans (id, book_id, member_id, borrowed_at, due_at, returned_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(loan.id)
        .bind(loan.book_id)
        .bind(loan.member_id)
        .bind(loan.borrowed_at)
        .bind(loan.due_at)
        .bind(loan.returned_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn mark_loan_returned(
        &mut self,
        loan_id: Uuid,
        returned_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let tx = self.tx()?;
        let rows = sqlx::query("UPDATE loans SET returned_at = $1 WHERE id = $2 AND returned_at IS NULL")
            .bind(returned_at)
            .bind(loan_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();
        if rows == 0 {
            return Err(AppError::Conflict(
                "Loan was changed by someone else".to_string(),
            ));
        }
        Ok(())
    }

    async fn update_book_availability(
        &mut self,
        book_id: Uuid,
        expected_version: Uuid,
        available_copies: i32,
    ) -> AppResult<()> {
        let tx = self.tx()?;
        let rows = sqlx::query(
            "UPDATE books SET available_copies = $1, version = $2 WHERE id = $3 AND version = $4",
        )
        .bind(available_copies)
        .bind(Uuid::new_v4())
        .bind(book_id)
        .bind(expected_version)
        .execute(&mut **tx)
        .await?
        .rows_affected();
        if rows == 0 {
            return Err(AppError::Conflict(
                "Book was changed by someone else".to_string(),
            ));
        }
        Ok(())
    }

    async fn commit(&mut self) -> AppResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| AppError::Storage("transaction already completed".to_string()))?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> AppResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| AppError::Storage("transaction already completed".to_string()))?;
        tx.rollback().await?;
        Ok(())
    }
}
