//! Equipment service

use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppResult,
    models::equipment::{CreateEquipment, Equipment},
    repository::Repository,
};

#[derive(Clone)]
pub struct EquipmentService {
    repository: Repository,
}

impl EquipmentService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn get_by_id(&self, id: i64) -> AppResult<Equipment> {
        self.repository.equipment.get_by_id(id).await
    }

    pub async fn list(&self) -> AppResult<Vec<Equipment>> {
        self.repository.equipment.list().await
    }

    /// Register equipment owned by `owner_id`
    pub async fn create(&self, owner_id: i64, data: &CreateEquipment) -> AppResult<Equipment> {
        data.validate()?;
        let equipment = self
            .repository
            .equipment
            .create(owner_id, data, Utc::now())
            .await?;
        tracing::info!(equipment_id = equipment.id, owner_id, "equipment registered");
        Ok(equipment)
    }
}
