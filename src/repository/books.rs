//! Books repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Search books with pagination. Soft-deleted books are excluded.
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let page = query.page.unwrap_or(1);
        let per_page = query.per_page.unwrap_or(20);
        let offset = (page - 1) * per_page;

        let mut conditions = vec!["is_deleted = FALSE".to_string()];
        let mut params: Vec<String> = Vec::new();

        if let Some(ref title) = query.title {
            params.push(format!("%{}%", title.to_lowercase()));
            conditions.push(format!("LOWER(title) LIKE ${}", params.len()));
        }

        if let Some(ref author) = query.author {
            params.push(format!("%{}%", author.to_lowercase()));
            conditions.push(format!("LOWER(author) LIKE ${}", params.len()));
        }

        let where_clause = format!("WHERE {}", conditions.join(" AND "));

        // Count total
        let count_query = format!("SELECT COUNT(*) FROM books {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "SELECT * FROM books {} ORDER BY title LIMIT {} OFFSET {}",
            where_clause, per_page, offset
        );
        let mut select_builder = sqlx::query_as::<_, Book>(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let books = select_builder.fetch_all(&self.pool).await?;

        Ok((books, total))
    }

    /// Create a new book. Available copies start equal to total copies.
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO books (
                id, isbn, title, subtitle, author,
                total_copies, available_copies, added_at, is_deleted, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $6, $7, FALSE, $8)
            "#,
        )
        .bind(id)
        .bind(&book.isbn)
        .bind(&book.title)
        .bind(&book.subtitle)
        .bind(&book.author)
        .bind(book.total_copies)
        .bind(Utc::now())
        .bind(Uuid::new_v4())
        .execute(&self.pool)
        .await?;

        self.get_by_id(id).await
    }

    /// Update an existing book, gated by its version token.
    pub async fn update(&self, id: Uuid, book: &UpdateBook) -> AppResult<Book> {
        let rows = sqlx::query(
            r#"
            UPDATE books
            SET isbn = $1, title = $2, subtitle = $3, author = $4,
                total_copies = $5, available_copies = $6, version = $7
            WHERE id = $8 AND version = $9 AND is_deleted = FALSE
            "#,
        )
        .bind(&book.isbn)
        .bind(&book.title)
        .bind(&book.subtitle)
        .bind(&book.author)
        .bind(book.total_copies)
        .bind(book.available_copies)
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(book.version)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            // Distinguish a missing record from a stale version token
            let existing = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            return match existing {
                Some(current) if !current.is_deleted => Err(AppError::Conflict(
                    "Book was changed by someone else".to_string(),
                )),
                _ => Err(AppError::NotFound(format!("Book with id {} not found", id))),
            };
        }

        self.get_by_id(id).await
    }

    /// Soft delete a book. Loan history stays intact.
    pub async fn soft_delete(&self, id: Uuid) -> AppResult<()> {
        let rows = sqlx::query(
            "UPDATE books SET is_deleted = TRUE, version = $1 WHERE id = $2 AND is_deleted = FALSE",
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }

    /// Check if an ISBN is already registered
    pub async fn isbn_exists(&self, isbn: &str, exclude_id: Option<Uuid>) -> AppResult<bool> {
        let exists: bool = if let Some(id) = exclude_id {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND id != $2)")
                .bind(isbn)
                .bind(id)
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1)")
                .bind(isbn)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(exists)
    }
}
