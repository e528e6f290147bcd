//! Business logic services

pub mod equipment;
pub mod loans;

use crate::{config::LoansConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub loans: loans::LoansService,
    pub equipment: equipment::EquipmentService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, loans_config: LoansConfig) -> Self {
        Self {
            loans: loans::LoansService::new(repository.clone(), loans_config),
            equipment: equipment::EquipmentService::new(repository.clone()),
            repository,
        }
    }

    /// Storage readiness
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}
