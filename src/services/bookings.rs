//! Booking service
//!
//! Every mutation that can move equipment capacity runs as
//! lock → transaction → row-locked re-read → decide → persist → commit,
//! so the conflict check and the write it guards see the same state.

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        booking::{BookingQuery, CreateBooking, UpdateBooking},
        Booking, BookingDetails, BookingStatus, UserClaims, UserRole,
    },
    reconciler::{self, EquipmentLocks, TimeWindow},
    repository::Repository,
};

#[derive(Clone)]
pub struct BookingsService {
    repository: Repository,
    locks: Arc<EquipmentLocks>,
}

/// Apply reservation edits to a pending booking and return its new window.
fn apply_edits(booking: &mut Booking, data: &UpdateBooking) -> AppResult<TimeWindow> {
    if booking.status != BookingStatus::Pending {
        return Err(AppError::Validation(
            "Only pending bookings can be modified".to_string(),
        ));
    }
    if let Some(quantity) = data.quantity {
        booking.quantity = quantity;
    }
    if let Some(start) = data.start_time {
        booking.start_time = start;
    }
    if let Some(end) = data.end_time {
        booking.end_time = end;
    }
    if let Some(ref purpose) = data.purpose {
        booking.purpose = Some(purpose.clone());
    }
    TimeWindow::new(booking.start_time, booking.end_time)
}

impl BookingsService {
    pub fn new(repository: Repository, locks: Arc<EquipmentLocks>) -> Self {
        Self { repository, locks }
    }

    /// List bookings visible to the caller, newest first
    pub async fn list(&self, claims: &UserClaims, query: &BookingQuery) -> AppResult<Vec<BookingDetails>> {
        let owner = match claims.role {
            UserRole::Student => Some(claims.user_id),
            UserRole::Researcher | UserRole::Admin => None,
        };
        self.repository.bookings.list_details(owner, query.status).await
    }

    pub async fn get(&self, claims: &UserClaims, id: i32) -> AppResult<BookingDetails> {
        let details = self.repository.bookings.get_details(id).await?;
        claims.require_booking_view(details.booking.user_id)?;
        Ok(details)
    }

    /// Admit a new pending booking if the window still has room
    #[tracing::instrument(skip(self, claims, data), fields(user_id = claims.user_id, equipment_id = data.equipment_id))]
    pub async fn create(&self, claims: &UserClaims, data: CreateBooking) -> AppResult<BookingDetails> {
        data.validate()?;
        let window = TimeWindow::new(data.start_time, data.end_time)?;

        let booking = {
            let _guard = self.locks.acquire(data.equipment_id).await?;
            let mut tx = self.repository.begin(self.locks.timeout()).await?;

            let equipment = self
                .repository
                .equipment
                .find_for_update(&mut *tx, data.equipment_id)
                .await?;
            let overlapping = self
                .repository
                .bookings
                .list_overlapping(&mut *tx, data.equipment_id, &window, None)
                .await?;

            if let Err(e) = reconciler::check_admission(
                equipment.as_ref(),
                &overlapping,
                &window,
                data.quantity,
                None,
            ) {
                tracing::warn!(quantity = data.quantity, error = %e, "booking rejected");
                return Err(e);
            }

            let booking = self
                .repository
                .bookings
                .insert(&mut *tx, claims.user_id, &data)
                .await?;
            tx.commit().await?;
            booking
        };

        tracing::info!(booking_id = booking.id, quantity = booking.quantity, "booking created");
        self.repository.bookings.get_details(booking.id).await
    }

    /// Edit a booking: status transition, admin notes, and (while pending)
    /// quantity, window and purpose.
    #[tracing::instrument(skip(self, claims, data), fields(user_id = claims.user_id))]
    pub async fn update(&self, claims: &UserClaims, id: i32, data: UpdateBooking) -> AppResult<BookingDetails> {
        data.validate()?;

        let current = self.repository.bookings.get_by_id(id).await?;
        claims.require_booking_view(current.user_id)?;
        if let Some(target) = data.status {
            claims.authorize_transition(current.user_id, target)?;
        }
        if data.edits_reservation() {
            claims.require_booking_owner(current.user_id)?;
        }
        if data.admin_notes.is_some() {
            claims.require_admin()?;
        }

        {
            let _guard = self.locks.acquire(current.equipment_id).await?;
            let mut tx = self.repository.begin(self.locks.timeout()).await?;

            let mut equipment = self
                .repository
                .equipment
                .find_for_update(&mut *tx, current.equipment_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Equipment not found".to_string()))?;
            let stored = self
                .repository
                .bookings
                .find_for_update(&mut *tx, id)
                .await?
                .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

            let old_status = stored.status;
            let mut booking = stored;

            if data.edits_reservation() {
                let window = apply_edits(&mut booking, &data)?;
                if data.changes_capacity() {
                    let overlapping = self
                        .repository
                        .bookings
                        .list_overlapping(&mut *tx, equipment.id, &window, Some(id))
                        .await?;
                    if let Err(e) = reconciler::check_admission(
                        Some(&equipment),
                        &overlapping,
                        &window,
                        booking.quantity,
                        Some(id),
                    ) {
                        tracing::warn!(booking_id = id, error = %e, "booking edit rejected");
                        return Err(e);
                    }
                }
            }

            if let Some(target) = data.status {
                reconciler::ensure_transition(old_status, target)?;
                equipment.available_quantity =
                    reconciler::apply_status_transition(&equipment, &booking, old_status, target);
                booking.status = target;
            }
            if let Some(ref notes) = data.admin_notes {
                booking.admin_notes = Some(notes.clone());
            }

            let (saved, equipment) = self
                .repository
                .persist_booking_and_equipment(&mut *tx, &booking, &equipment)
                .await?;
            tx.commit().await?;

            tracing::info!(
                booking_id = id,
                from = %old_status,
                to = %saved.status,
                available = equipment.available_quantity,
                "booking updated"
            );
        }

        self.repository.bookings.get_details(id).await
    }

    /// Delete a booking; approved units go back to the pool.
    #[tracing::instrument(skip(self, claims), fields(user_id = claims.user_id))]
    pub async fn delete(&self, claims: &UserClaims, id: i32) -> AppResult<()> {
        let current = self.repository.bookings.get_by_id(id).await?;
        claims.require_booking_owner(current.user_id)?;

        let _guard = self.locks.acquire(current.equipment_id).await?;
        let mut tx = self.repository.begin(self.locks.timeout()).await?;

        let equipment = self
            .repository
            .equipment
            .find_for_update(&mut *tx, current.equipment_id)
            .await?;
        let booking = self
            .repository
            .bookings
            .find_for_update(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if let (Some(equipment), BookingStatus::Approved) = (equipment.as_ref(), booking.status) {
            let available = reconciler::release_units(equipment, booking.quantity);
            self.repository
                .equipment
                .set_available_quantity(&mut *tx, equipment.id, available)
                .await?;
        }
        self.repository.bookings.delete(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(booking_id = id, status = %booking.status, "booking deleted");
        Ok(())
    }
}
