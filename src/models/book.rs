//! Book (catalog entry) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: Uuid,
    pub isbn: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub author: String,
    pub total_copies: i32,
    pub available_copies: i32,
    pub added_at: DateTime<Utc>,
    pub is_deleted: bool,
    /// Opaque concurrency token; changes on every update
    pub version: Uuid,
}

/// Create book request. Available copies start equal to total copies.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 30, message = "ISBN is required and cannot exceed 30 characters"))]
    pub isbn: String,
    #[validate(length(min = 1, max = 250, message = "Title is required and cannot exceed 250 characters"))]
    pub title: String,
    #[validate(length(max = 250, message = "Subtitle cannot exceed 250 characters"))]
    pub subtitle: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Author name is required and cannot exceed 200 characters"))]
    pub author: String,
    #[validate(range(min = 0, message = "Total copies must be a non-negative integer"))]
    pub total_copies: i32,
}

/// Update book request. Carries the version token read alongside the record;
/// a stale token is rejected with a conflict.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 30, message = "ISBN is required and cannot exceed 30 characters"))]
    pub isbn: String,
    #[validate(length(min = 1, max = 250, message = "Title is required and cannot exceed 250 characters"))]
    pub title: String,
    #[validate(length(max = 250, message = "Subtitle cannot exceed 250 characters"))]
    pub subtitle: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Author name is required and cannot exceed 200 characters"))]
    pub author: String,
    #[validate(range(min = 0, message = "Total copies must be a non-negative integer"))]
    pub total_copies: i32,
    #[validate(range(min = 0, message = "Available copies must be a non-negative integer"))]
    pub available_copies: i32,
    pub version: Uuid,
}

/// Book list query parameters
#[derive(Debug, Default, Deserialize)]
pub struct BookQuery {
    pub title: Option<String>,
    pub author: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_create() -> CreateBook {
        CreateBook {
            isbn: "978-0-13-468599-1".to_string(),
            title: "The Rust Programming Language".to_string(),
            subtitle: None,
            author: "Klabnik, Nichols".to_string(),
            total_copies: 3,
        }
    }

    #[test]
    fn create_book_accepts_valid_input() {
        assert!(valid_create().validate().is_ok());
    }

    #[test]
    fn create_book_rejects_empty_isbn() {
        let mut req = valid_create();
        req.isbn = String::new();
        assert!(req.validate().is_err());
    }

    #[test]
    fn create_book_rejects_overlong_title() {
        let mut req = valid_create();
        req.title = "x".repeat(251);
        assert!(req.validate().is_err());
    }

    #[test]
    fn create_book_rejects_negative_copies() {
        let mut req = valid_create();
        req.total_copies = -1;
        assert!(req.validate().is_err());
    }
}
