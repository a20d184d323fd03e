//! Member model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Member model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Member {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub joined_at: DateTime<Utc>,
}

/// Create member request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMember {
    #[validate(length(min = 1, max = 180, message = "Full name is required and cannot exceed 180 characters"))]
    pub full_name: String,
    #[validate(email(message = "Invalid email format"), length(max = 200, message = "Email cannot exceed 200 characters"))]
    pub email: String,
}

/// Update member request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateMember {
    #[validate(length(min = 1, max = 180, message = "Full name is required and cannot exceed 180 characters"))]
    pub full_name: String,
    #[validate(email(message = "Invalid email format"), length(max = 200, message = "Email cannot exceed 200 characters"))]
    pub email: String,
}

/// Member list query parameters
#[derive(Debug, Default, Deserialize)]
pub struct MemberQuery {
    pub name: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
