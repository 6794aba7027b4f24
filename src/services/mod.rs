//! Business logic services

pub mod availability;
pub mod catalog;
pub mod clock;
pub mod loans;
pub mod people;

use std::sync::Arc;

use crate::{
    config::{CatalogConfig, LoansConfig},
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
    pub people: people::PeopleService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(
        repository: Repository,
        catalog_config: CatalogConfig,
        loans_config: LoansConfig,
        clock: Arc<dyn clock::Clock>,
    ) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone(), catalog_config),
            loans: loans::LoansService::new(repository.clone(), loans_config, clock),
            people: people::PeopleService::new(repository.clone()),
            repository,
        }
    }

    /// Check that the store answers
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        self.repository.books.ping().await
    }

    /// Release storage resources; called once at shutdown
    pub async fn close(&self) {
        self.repository.close().await;
    }
}
