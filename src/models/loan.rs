//! Loan model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Loan model from database.
///
/// A loan is active while `returned_at` is `None`. The only mutation a loan
/// ever receives is the return, which sets `returned_at` exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: Uuid,
    pub book_id: Uuid,
    pub member_id: Uuid,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

/// Lifecycle state of a loan, derived from `returned_at`.
/// Active -> Returned is the only transition and it is irreversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Returned,
}

impl Loan {
    pub fn status(&self) -> LoanStatus {
        if self.returned_at.is_some() {
            LoanStatus::Returned
        } else {
            LoanStatus::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }

    /// A loan is overdue iff it is active and its due date is strictly in the past.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.due_at < now
    }
}

/// Status filter accepted by the loan listing endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanFilter {
    /// Unreturned loans
    Active,
    /// Returned loans
    History,
    /// Unreturned loans past their due date
    Overdue,
}

/// Loan list query parameters
#[derive(Debug, Default, Deserialize)]
pub struct LoanQuery {
    pub status: Option<LoanFilter>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn loan(due_offset: Duration, returned: bool) -> Loan {
        let now = Utc::now();
        Loan {
            id: Uuid::new_v4(),
            book_id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            borrowed_at: now - Duration::days(1),
            due_at: now + due_offset,
            returned_at: returned.then_some(now),
        }
    }

    #[test]
    fn active_loan_past_due_is_overdue() {
        let l = loan(Duration::days(-1), false);
        assert_eq!(l.status(), LoanStatus::Active);
        assert!(l.is_overdue(Utc::now()));
    }

    #[test]
    fn active_loan_before_due_is_not_overdue() {
        let l = loan(Duration::days(13), false);
        assert!(!l.is_overdue(Utc::now()));
    }

    #[test]
    fn returned_loan_is_never_overdue() {
        let l = loan(Duration::days(-30), true);
        assert_eq!(l.status(), LoanStatus::Returned);
        assert!(!l.is_overdue(Utc::now()));
    }

    #[test]
    fn due_exactly_now_is_not_overdue() {
        let l = loan(Duration::zero(), false);
        assert!(!l.is_overdue(l.due_at));
    }
}
