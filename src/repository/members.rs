//! Members repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::member::{CreateMember, Member, MemberQuery, UpdateMember},
};

#[derive(Clone)]
pub struct MembersRepository {
    pool: Pool<Postgres>,
}

impl MembersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get member by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Member> {
        sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    /// List members with pagination
    pub async fn list(&self, query: &MemberQuery) -> AppResult<(Vec<Member>, i64)> {
        let page = query.page.unwrap_or(1);
        let per_page = query.per_page.unwrap_or(20);
        let offset = (page - 1) * per_page;

        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(ref name) = query.name {
            params.push(format!("%{}%", name.to_lowercase()));
            conditions.push(format!("LOWER(full_name) LIKE ${}", params.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_query = format!("SELECT COUNT(*) FROM members {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "SELECT * FROM members {} ORDER BY full_name LIMIT {} OFFSET {}",
            where_clause, per_page, offset
        );
        let mut select_builder = sqlx::query_as::<_, Member>(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let members = select_builder.fetch_all(&self.pool).await?;

        Ok((members, total))
    }

    /// Create a new member
    pub async fn create(&self, member: &CreateMember) -> AppResult<Member> {
        let id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO members (id, full_name, email, joined_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(&member.full_name)
        .bind(&member.email)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get_by_id(id).await
    }

    /// Update an existing member
    pub async fn update(&self, id: Uuid, member: &UpdateMember) -> AppResult<Member> {
        let rows = sqlx::query("UPDATE members SET full_name = $1, email = $2 WHERE id = $3")
            .bind(&member.full_name)
            .bind(&member.email)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::NotFound(format!(
                "Member with id {} not found",
                id
            )));
        }

        self.get_by_id(id).await
    }

    /// Delete a member. Refused while the member holds active loans;
    /// returned loan history goes away with the member.
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let active_loans: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE member_id = $1 AND returned_at IS NULL",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if active_loans > 0 {
            return Err(AppError::InvalidOperation(
                "Member has active loans".to_string(),
            ));
        }

        let rows = sqlx::query("DELETE FROM members WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::NotFound(format!(
                "Member with id {} not found",
                id
            )));
        }
        Ok(())
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str, exclude_id: Option<Uuid>) -> AppResult<bool> {
        let exists: bool = if let Some(id) = exclude_id {
            sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM members WHERE LOWER(email) = LOWER($1) AND id != $2)",
            )
            .bind(email)
            .bind(id)
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM members WHERE LOWER(email) = LOWER($1))")
                .bind(email)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(exists)
    }
}
