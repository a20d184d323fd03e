//! Member management service

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::member::{CreateMember, Member, MemberQuery, UpdateMember},
    repository::Repository,
};

#[derive(Clone)]
pub struct MembersService {
    repository: Repository,
}

impl MembersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// List members
    pub async fn list(&self, query: &MemberQuery) -> AppResult<(Vec<Member>, i64)> {
        self.repository.members.list(query).await
    }

    /// Get a member by ID
    pub async fn get(&self, id: Uuid) -> AppResult<Member> {
        self.repository.members.get_by_id(id).await
    }

    /// Register a new member
    pub async fn create(&self, member: CreateMember) -> AppResult<Member> {
        member.validate()?;

        if self
            .repository
            .members
            .email_exists(&member.email, None)
            .await?
        {
            return Err(AppError::Validation("Email already exists".to_string()));
        }

        let created = self.repository.members.create(&member).await?;
        tracing::info!(member_id = %created.id, "member created");
        Ok(created)
    }

    /// Update a member's record
    pub async fn update(&self, id: Uuid, member: UpdateMember) -> AppResult<Member> {
        member.validate()?;

        if self
            .repository
            .members
            .email_exists(&member.email, Some(id))
            .await?
        {
            return Err(AppError::Validation("Email already exists".to_string()));
        }

        let updated = self.repository.members.update(id, &member).await?;
        tracing::info!(member_id = %id, "member updated");
        Ok(updated)
    }

    /// Delete a member. Refused while they hold active loans.
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.repository.members.delete(id).await?;
        tracing::info!(member_id = %id, "member deleted");
        Ok(())
    }
}
