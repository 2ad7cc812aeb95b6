//! Equipment service

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::equipment::{
        AvailabilityQuery, CreateEquipment, Equipment, EquipmentAvailability, EquipmentQuery,
        UpdateEquipment,
    },
    reconciler::{self, EquipmentLocks, TimeWindow},
    repository::Repository,
};

#[derive(Clone)]
pub struct EquipmentService {
    repository: Repository,
    locks: Arc<EquipmentLocks>,
}

/// Copy the requested changes onto `equipment`. A new total stock moves the
/// cached counter by the same delta.
fn apply_update(equipment: &mut Equipment, data: UpdateEquipment) {
    if let Some(name) = data.name {
        equipment.name = name;
    }
    if let Some(category) = data.category {
        equipment.category = category;
    }
    if let Some(description) = data.description {
        equipment.description = Some(description);
    }
    if let Some(location) = data.location {
        equipment.location = Some(location);
    }
    if let Some(status) = data.status {
        equipment.status = status;
    }
    if let Some(quantity) = data.quantity {
        if quantity != equipment.quantity {
            equipment.available_quantity = reconciler::adjust_for_total_change(equipment, quantity);
            equipment.quantity = quantity;
        }
    }
}

impl EquipmentService {
    pub fn new(repository: Repository, locks: Arc<EquipmentLocks>) -> Self {
        Self { repository, locks }
    }

    pub async fn list(&self, query: &EquipmentQuery) -> AppResult<Vec<Equipment>> {
        self.repository.equipment.list(query).await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Equipment> {
        self.repository.equipment.get_by_id(id).await
    }

    pub async fn create(&self, data: CreateEquipment) -> AppResult<Equipment> {
        data.validate()?;
        let equipment = self.repository.equipment.create(&data).await?;
        tracing::info!(equipment_id = equipment.id, quantity = equipment.quantity, "equipment created");
        Ok(equipment)
    }

    /// Update equipment under its lock, so a stock change cannot interleave
    /// with a booking decision. The total cannot drop below the peak load of
    /// pending and approved bookings.
    pub async fn update(&self, id: i32, data: UpdateEquipment) -> AppResult<Equipment> {
        data.validate()?;

        let _guard = self.locks.acquire(id).await?;
        let mut tx = self.repository.begin(self.locks.timeout()).await?;

        let mut equipment = self
            .repository
            .equipment
            .find_for_update(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?;

        if let Some(quantity) = data.quantity.filter(|q| *q < equipment.quantity) {
            let holding = self.repository.bookings.list_holding(&mut *tx, id).await?;
            if let Err(e) = reconciler::check_total_change(&equipment, &holding, quantity) {
                tracing::warn!(equipment_id = id, to = quantity, error = %e, "stock reduction refused");
                return Err(e);
            }
        }

        let previous_total = equipment.quantity;
        apply_update(&mut equipment, data);
        let saved = self.repository.equipment.save(&mut *tx, &equipment).await?;
        tx.commit().await?;

        if saved.quantity != previous_total {
            tracing::info!(
                equipment_id = id,
                from = previous_total,
                to = saved.quantity,
                available = saved.available_quantity,
                "equipment stock changed"
            );
        }
        Ok(saved)
    }

    /// Delete equipment that no booking references
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let _guard = self.locks.acquire(id).await?;
        let mut tx = self.repository.begin(self.locks.timeout()).await?;

        self.repository
            .equipment
            .find_for_update(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?;

        if self.repository.equipment.has_bookings(&mut *tx, id).await? {
            return Err(AppError::Conflict(
                "Equipment has bookings and cannot be deleted".to_string(),
            ));
        }
        self.repository.equipment.delete(&mut *tx, id).await?;
        tx.commit().await?;
        tracing::info!(equipment_id = id, "equipment deleted");
        Ok(())
    }

    /// Live availability over a window, aggregated from pending and approved
    /// bookings. Read-only: no lock is taken.
    pub async fn availability(&self, id: i32, query: &AvailabilityQuery) -> AppResult<EquipmentAvailability> {
        let window = TimeWindow::new(query.start_time, query.end_time)?;
        let equipment = self.repository.equipment.get_by_id(id).await?;
        let overlapping = self
            .repository
            .bookings
            .list_overlapping(&self.repository.pool, id, &window, None)
            .await?;

        let reserved = reconciler::reserved_quantity(id, &overlapping, &window, None);
        Ok(EquipmentAvailability {
            equipment_id: id,
            start_time: window.start,
            end_time: window.end,
            total_quantity: equipment.quantity,
            reserved_quantity: reserved,
            free_quantity: reconciler::free_quantity(&equipment, reserved),
            available_quantity: equipment.available_quantity,
            bookable: equipment.status.is_bookable(),
        })
    }

    /// Rebuild the cached counter from approved bookings
    pub async fn reconcile(&self, id: i32) -> AppResult<Equipment> {
        let _guard = self.locks.acquire(id).await?;
        let mut tx = self.repository.begin(self.locks.timeout()).await?;

        let equipment = self
            .repository
            .equipment
            .find_for_update(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?;

        let approved = self.repository.bookings.list_approved(&mut *tx, id).await?;
        let expected = reconciler::recompute_available(&equipment, &approved);
        if expected == equipment.available_quantity {
            tx.commit().await?;
            return Ok(equipment);
        }

        let saved = self
            .repository
            .equipment
            .set_available_quantity(&mut *tx, id, expected)
            .await?;
        tx.commit().await?;
        tracing::warn!(
            equipment_id = id,
            cached = equipment.available_quantity,
            expected,
            "available quantity drift repaired"
        );
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EquipmentStatus;
    use chrono::Utc;

    fn microscope(quantity: i32, available: i32) -> Equipment {
        Equipment {
            id: 3,
            name: "Microscope".to_string(),
            category: "Optics".to_string(),
            description: None,
            quantity,
            available_quantity: available,
            status: EquipmentStatus::Available,
            location: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_update_grows_stock() {
        let mut eq = microscope(5, 2);
        apply_update(
            &mut eq,
            UpdateEquipment {
                quantity: Some(8),
                ..Default::default()
            },
        );
        assert_eq!(eq.quantity, 8);
        assert_eq!(eq.available_quantity, 5);
    }

    #[test]
    fn test_update_shrinks_stock_clamped() {
        let mut eq = microscope(5, 2);
        apply_update(
            &mut eq,
            UpdateEquipment {
                quantity: Some(2),
                ..Default::default()
            },
        );
        assert_eq!(eq.quantity, 2);
        assert_eq!(eq.available_quantity, 0);
    }

    #[test]
    fn test_update_without_quantity_keeps_counter() {
        let mut eq = microscope(5, 2);
        apply_update(
            &mut eq,
            UpdateEquipment {
                name: Some("Confocal microscope".to_string()),
                status: Some(EquipmentStatus::Maintenance),
                quantity: Some(5),
                ..Default::default()
            },
        );
        assert_eq!(eq.name, "Confocal microscope");
        assert_eq!(eq.status, EquipmentStatus::Maintenance);
        assert_eq!(eq.available_quantity, 2);
    }
}
