//! Repository layer for database operations

pub mod bookings;
pub mod equipment;
pub mod reports;
pub mod users;

use std::time::Duration;

use sqlx::{PgConnection, Pool, Postgres, Transaction};

use crate::{
    error::AppResult,
    models::{Booking, Equipment},
};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub users: users::UsersRepository,
    pub equipment: equipment::EquipmentRepository,
    pub bookings: bookings::BookingsRepository,
    pub reports: reports::ReportsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            users: users::UsersRepository::new(pool.clone()),
            equipment: equipment::EquipmentRepository::new(pool.clone()),
            bookings: bookings::BookingsRepository::new(pool.clone()),
            reports: reports::ReportsRepository::new(pool.clone()),
            pool,
        }
    }

    /// Open a transaction whose row-lock waits give up after `lock_timeout`.
    pub async fn begin(&self, lock_timeout: Duration) -> AppResult<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("SET LOCAL lock_timeout = {}", lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    /// Write a booking and its equipment counter in the caller's transaction.
    pub async fn persist_booking_and_equipment(
        &self,
        conn: &mut PgConnection,
        booking: &Booking,
        equipment: &Equipment,
    ) -> AppResult<(Booking, Equipment)> {
        let booking = self.bookings.save(&mut *conn, booking).await?;
        let equipment = self
            .equipment
            .set_available_quantity(&mut *conn, equipment.id, equipment.available_quantity)
            .await?;
        Ok((booking, equipment))
    }

    /// Database liveness check
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
