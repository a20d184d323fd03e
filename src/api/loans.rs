//! Loan management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::loan::{Loan, LoanQuery},
};

use super::{books::PaginatedResponse, check_paging};

/// Borrow request
#[derive(Deserialize, ToSchema)]
pub struct BorrowRequest {
    /// Book ID
    pub book_id: Uuid,
    /// Member ID
    pub member_id: Uuid,
}

/// List loans with status filter and pagination
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    params(
        ("status" = Option<String>, Query, description = "Filter: active, history or overdue"),
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<i64>, Query, description = "Items per page (default: 20, max: 100)")
    ),
    responses(
        (status = 200, description = "List of loans", body = PaginatedResponse<Loan>),
        (status = 400, description = "Invalid paging values")
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<PaginatedResponse<Loan>>> {
    check_paging(query.page, query.per_page)?;

    let (items, total) = state.services.loans.list(&query).await?;

    Ok(Json(PaginatedResponse {
        items,
        total,
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    }))
}

/// Get loan details by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = Loan),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.get(id).await?;
    Ok(Json(loan))
}

/// Get loans for a specific member
#[utoipa::path(
    get,
    path = "/members/{id}/loans",
    tag = "loans",
    params(
        ("id" = Uuid, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Member's loans, returned ones included", body = Vec<Loan>),
        (status = 404, description = "Member not found")
    )
)]
pub async fn member_loans(
    State(state): State<crate::AppState>,
    Path(member_id): Path<Uuid>,
) -> AppResult<Json<Vec<Loan>>> {
    let loans = state.services.loans.member_loans(member_id).await?;
    Ok(Json(loans))
}

/// Active loans past their due date
#[utoipa::path(
    get,
    path = "/loans/overdue",
    tag = "loans",
    responses(
        (status = 200, description = "Overdue loans", body = Vec<Loan>)
    )
)]
pub async fn overdue_loans(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Loan>>> {
    let loans = state.services.loans.overdue().await?;
    Ok(Json(loans))
}

/// Borrow a book (create an active loan)
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Loan created", body = Loan),
        (status = 400, description = "Book cannot be borrowed"),
        (status = 404, description = "Book or member not found"),
        (status = 409, description = "Record was changed by someone else")
    )
)]
pub async fn borrow_book(
    State(state): State<crate::AppState>,
    Json(request): Json<BorrowRequest>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    let loan = state
        .services
        .loans
        .borrow(request.book_id, request.member_id)
        .await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    responses(
        (status = 204, description = "Book returned"),
        (status = 400, description = "Loan is already returned"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Record was changed by someone else")
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    Path(loan_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.loans.return_loan(loan_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a loan record
#[utoipa::path(
    delete,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    responses(
        (status = 204, description = "Loan deleted"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn delete_loan(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.loans.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
