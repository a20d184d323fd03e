//! Book (catalog) endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
};

use super::check_paging;

/// Paginated response wrapper
#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// List of items
    pub items: Vec<T>,
    /// Total number of items
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Items per page
    pub per_page: i64,
}

/// List books with search and pagination
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(
        ("title" = Option<String>, Query, description = "Search in title"),
        ("author" = Option<String>, Query, description = "Search by author"),
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<i64>, Query, description = "Items per page (default: 20, max: 100)")
    ),
    responses(
        (status = 200, description = "List of books", body = PaginatedResponse<Book>),
        (status = 400, description = "Invalid paging values")
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<PaginatedResponse<Book>>> {
    check_paging(query.page, query.per_page)?;

    let (items, total) = state.services.books.search(&query).await?;

    Ok(Json(PaginatedResponse {
        items,
        total,
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    }))
}

/// Get book details by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Book>> {
    let book = state.services.books.get(id).await?;
    Ok(Json(book))
}

/// Register a new book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input or duplicate ISBN")
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    Json(book): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let created = state.services.books.create(book).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a book
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid input or duplicate ISBN"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book was changed by someone else")
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    Json(book): Json<UpdateBook>,
) -> AppResult<Json<Book>> {
    let updated = state.services.books.update(id, book).await?;
    Ok(Json(updated))
}

/// Delete a book (soft delete, loan history is kept)
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.books.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Availability summary used by the eligibility endpoint
#[derive(Serialize, ToSchema)]
pub struct AvailabilityResponse {
    /// Book ID
    pub book_id: Uuid,
    /// Member ID the check was made for
    pub member_id: Uuid,
    /// Whether this member could borrow this book right now
    pub can_borrow: bool,
}

/// Check whether a member could borrow a book
#[utoipa::path(
    get,
    path = "/books/{id}/can-borrow/{member_id}",
    tag = "books",
    params(
        ("id" = Uuid, Path, description = "Book ID"),
        ("member_id" = Uuid, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Eligibility result", body = AvailabilityResponse)
    )
)]
pub async fn can_borrow(
    State(state): State<crate::AppState>,
    Path((id, member_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<AvailabilityResponse>> {
    let can_borrow = state.services.loans.can_borrow(id, member_id).await?;
    Ok(Json(AvailabilityResponse {
        book_id: id,
        member_id,
        can_borrow,
    }))
}
