//! Business logic services

pub mod bookings;
pub mod equipment;
pub mod reports;
pub mod users;

use std::sync::Arc;

use crate::{config::AppConfig, reconciler::EquipmentLocks, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: users::UsersService,
    pub equipment: equipment::EquipmentService,
    pub bookings: bookings::BookingsService,
    pub reports: reports::ReportsService,
}

impl Services {
    /// Create all services with the given repository. Equipment and booking
    /// mutations share one lock registry.
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let locks = Arc::new(EquipmentLocks::new(config.bookings.lock_timeout()));
        Self {
            users: users::UsersService::new(repository.clone(), config.auth.clone()),
            equipment: equipment::EquipmentService::new(repository.clone(), locks.clone()),
            bookings: bookings::BookingsService::new(repository.clone(), locks),
            reports: reports::ReportsService::new(repository),
        }
    }
}
