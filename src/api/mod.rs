//! API handlers for the REST endpoints

pub mod books;
pub mod health;
pub mod loans;
pub mod members;
pub mod openapi;

use crate::error::{AppError, AppResult};

/// Validate paging values shared by the list endpoints.
pub(crate) fn check_paging(page: Option<i64>, per_page: Option<i64>) -> AppResult<()> {
    if page.unwrap_or(1) <= 0 {
        return Err(AppError::Validation(
            "Page must be greater than 0".to_string(),
        ));
    }
    let per_page = per_page.unwrap_or(20);
    if !(1..=100).contains(&per_page) {
        return Err(AppError::Validation(
            "Page size must be between 1 and 100".to_string(),
        ));
    }
    Ok(())
}
