//! Business logic services

pub mod books;
pub mod loans;
pub mod members;

use std::sync::Arc;

use chrono::Duration;

use crate::{
    circulation::LoanEngine, config::LoansConfig, repository::Repository, store::RecordStore,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub books: books::BooksService,
    pub members: members::MembersService,
    pub loans: loans::LoansService,
}

impl Services {
    /// Create all services with the given repository and record store
    pub fn new(
        repository: Repository,
        store: Arc<dyn RecordStore>,
        loans_config: &LoansConfig,
    ) -> Self {
        let engine = LoanEngine::new(store, Duration::days(loans_config.period_days));
        Self {
            books: books::BooksService::new(repository.clone()),
            members: members::MembersService::new(repository.clone()),
            loans: loans::LoansService::new(repository, engine),
        }
    }
}
