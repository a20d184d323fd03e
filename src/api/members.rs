//! Member management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::member::{CreateMember, Member, MemberQuery, UpdateMember},
};

use super::{books::PaginatedResponse, check_paging};

/// List members with pagination
#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    params(
        ("name" = Option<String>, Query, description = "Search by name"),
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<i64>, Query, description = "Items per page (default: 20, max: 100)")
    ),
    responses(
        (status = 200, description = "List of members", body = PaginatedResponse<Member>),
        (status = 400, description = "Invalid paging values")
    )
)]
pub async fn list_members(
    State(state): State<crate::AppState>,
    Query(query): Query<MemberQuery>,
) -> AppResult<Json<PaginatedResponse<Member>>> {
    check_paging(query.page, query.per_page)?;

    let (items, total) = state.services.members.list(&query).await?;

    Ok(Json(PaginatedResponse {
        items,
        total,
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    }))
}

/// Get member details by ID
#[utoipa::path(
    get,
    path = "/members/{id}",
    tag = "members",
    params(
        ("id" = Uuid, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Member details", body = Member),
        (status = 404, description = "Member not found")
    )
)]
pub async fn get_member(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Member>> {
    let member = state.services.members.get(id).await?;
    Ok(Json(member))
}

/// Register a new member
#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    request_body = CreateMember,
    responses(
        (status = 201, description = "Member created", body = Member),
        (status = 400, description = "Invalid input or duplicate email")
    )
)]
pub async fn create_member(
    State(state): State<crate::AppState>,
    Json(member): Json<CreateMember>,
) -> AppResult<(StatusCode, Json<Member>)> {
    let created = state.services.members.create(member).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a member
#[utoipa::path(
    put,
    path = "/members/{id}",
    tag = "members",
    params(
        ("id" = Uuid, Path, description = "Member ID")
    ),
    request_body = UpdateMember,
    responses(
        (status = 200, description = "Member updated", body = Member),
        (status = 400, description = "Invalid input or duplicate email"),
        (status = 404, description = "Member not found")
    )
)]
pub async fn update_member(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    Json(member): Json<UpdateMember>,
) -> AppResult<Json<Member>> {
    let updated = state.services.members.update(id, member).await?;
    Ok(Json(updated))
}

/// Delete a member
#[utoipa::path(
    delete,
    path = "/members/{id}",
    tag = "members",
    params(
        ("id" = Uuid, Path, description = "Member ID")
    ),
    responses(
        (status = 204, description = "Member deleted"),
        (status = 400, description = "Member has active loans"),
        (status = 404, description = "Member not found")
    )
)]
pub async fn delete_member(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.members.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
