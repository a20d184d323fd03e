//! Catalog management service

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
    repository::Repository,
};

#[derive(Clone)]
pub struct BooksService {
    repository: Repository,
}

impl BooksService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Search the catalog
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        self.repository.books.search(query).await
    }

    /// Get a book by ID
    pub async fn get(&self, id: Uuid) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Register a new book
    pub async fn create(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()?;

        if self.repository.books.isbn_exists(&book.isbn, None).await? {
            return Err(AppError::Validation("ISBN already exists".to_string()));
        }

        let created = self.repository.books.create(&book).await?;
        tracing::info!(book_id = %created.id, isbn = %created.isbn, "book created");
        Ok(created)
    }

    /// Update a book's catalog record
    pub async fn update(&self, id: Uuid, book: UpdateBook) -> AppResult<Book> {
        book.validate()?;

        if book.available_copies > book.total_copies {
            return Err(AppError::Validation(
                "Available copies cannot exceed total copies".to_string(),
            ));
        }

        if self
            .repository
            .books
            .isbn_exists(&book.isbn, Some(id))
            .await?
        {
            return Err(AppError::Validation("ISBN already exists".to_string()));
        }

        let updated = self.repository.books.update(id, &book).await?;
        tracing::info!(book_id = %id, "book updated");
        Ok(updated)
    }

    /// Remove a book from the catalog, keeping its loan history
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.repository.books.soft_delete(id).await?;
        tracing::info!(book_id = %id, "book deleted");
        Ok(())
    }
}
