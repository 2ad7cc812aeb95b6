//! Availability reconciliation
//!
//! Pure decision functions over data the caller has already fetched (and
//! locked). Two read paths are kept apart:
//!
//! * [`has_conflict`] / [`reserved_quantity`] aggregate live over pending and
//!   approved bookings and are the authority for accepting a request.
//! * `Equipment::available_quantity` is a cached counter maintained by
//!   [`apply_status_transition`] and [`adjust_for_total_change`]; it only
//!   answers "is anything free at all" for listings.

mod locks;

pub use locks::{EquipmentGuard, EquipmentLocks};

use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{Booking, BookingStatus, Equipment},
};

/// Half-open time interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Self> {
        if end <= start {
            return Err(AppError::Validation(
                "end_time must be after start_time".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn of(booking: &Booking) -> Self {
        Self {
            start: booking.start_time,
            end: booking.end_time,
        }
    }

    /// Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Sum of quantities held over `window` by the equipment's other bookings.
///
/// The input is normally already filtered by the store; the filter is
/// re-applied here so a wider candidate set gives the same answer.
pub fn reserved_quantity(
    equipment_id: i32,
    bookings: &[Booking],
    window: &TimeWindow,
    exclude_booking_id: Option<i32>,
) -> i32 {
    bookings
        .iter()
        .filter(|b| b.equipment_id == equipment_id)
        .filter(|b| b.status.holds_capacity())
        .filter(|b| Some(b.id) != exclude_booking_id)
        .filter(|b| TimeWindow::of(b).overlaps(window))
        .fold(0i32, |acc, b| acc.saturating_add(b.quantity))
}

/// Whether placing `requested_quantity` over `window` would oversubscribe the
/// equipment. Unknown equipment is reported as a conflict.
pub fn has_conflict(
    equipment: Option<&Equipment>,
    overlapping: &[Booking],
    window: &TimeWindow,
    requested_quantity: i32,
    exclude_booking_id: Option<i32>,
) -> bool {
    let Some(equipment) = equipment else {
        return true;
    };
    let reserved = reserved_quantity(equipment.id, overlapping, window, exclude_booking_id);
    reserved.saturating_add(requested_quantity) > equipment.quantity
}

/// Units still requestable over a window, from the live aggregate.
pub fn free_quantity(equipment: &Equipment, reserved: i32) -> i32 {
    equipment.quantity.saturating_sub(reserved).max(0)
}

/// Full admission check for a new or edited booking, with the precise
/// rejection reason.
pub fn check_admission(
    equipment: Option<&Equipment>,
    overlapping: &[Booking],
    window: &TimeWindow,
    requested_quantity: i32,
    exclude_booking_id: Option<i32>,
) -> AppResult<()> {
    if requested_quantity < 1 {
        return Err(AppError::Validation("Quantity must be at least 1".to_string()));
    }
    let equipment =
        equipment.ok_or_else(|| AppError::NotFound("Equipment not found".to_string()))?;
    if !equipment.status.is_bookable() {
        return Err(AppError::Validation("Equipment is not available".to_string()));
    }
    if requested_quantity > equipment.quantity {
        return Err(AppError::Validation(format!(
            "Requested quantity {} exceeds total stock {}",
            requested_quantity, equipment.quantity
        )));
    }
    if has_conflict(
        Some(equipment),
        overlapping,
        window,
        requested_quantity,
        exclude_booking_id,
    ) {
        return Err(AppError::Unavailable(
            "Booking conflict: insufficient quantity available for the requested time slot"
                .to_string(),
        ));
    }
    Ok(())
}

/// Reject transitions the booking state machine does not allow.
pub fn ensure_transition(from: BookingStatus, to: BookingStatus) -> AppResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else if from.is_terminal() {
        Err(AppError::Validation(format!(
            "Booking is already {} and cannot change",
            from
        )))
    } else {
        Err(AppError::Validation(format!(
            "Invalid status transition: {} -> {}",
            from, to
        )))
    }
}

/// New cached counter after a booking moves from `old` to `new`.
pub fn apply_status_transition(
    equipment: &Equipment,
    booking: &Booking,
    old: BookingStatus,
    new: BookingStatus,
) -> i32 {
    let entering = old != BookingStatus::Approved && new == BookingStatus::Approved;
    let leaving = old == BookingStatus::Approved
        && matches!(new, BookingStatus::Rejected | BookingStatus::Cancelled);

    if entering {
        take_units(equipment, booking.quantity)
    } else if leaving {
        release_units(equipment, booking.quantity)
    } else {
        equipment.available_quantity
    }
}

/// Counter after `quantity` units are handed out, floored at zero.
pub fn take_units(equipment: &Equipment, quantity: i32) -> i32 {
    equipment.available_quantity.saturating_sub(quantity).max(0)
}

/// Counter after `quantity` units come back, capped at the total stock.
pub fn release_units(equipment: &Equipment, quantity: i32) -> i32 {
    equipment
        .available_quantity
        .saturating_add(quantity)
        .min(equipment.quantity)
}

/// Counter after an administrator changes total stock: the delta is applied
/// and the result clamped to `[0, new_total]`.
pub fn adjust_for_total_change(equipment: &Equipment, new_total: i32) -> i32 {
    let delta = new_total.saturating_sub(equipment.quantity);
    equipment
        .available_quantity
        .saturating_add(delta)
        .clamp(0, new_total.max(0))
}

/// Highest number of units held at any single instant by the equipment's
/// pending and approved bookings. Load only rises at a booking start, so the
/// start instants are the only candidates.
pub fn peak_reserved(equipment_id: i32, bookings: &[Booking]) -> i32 {
    let holding: Vec<&Booking> = bookings
        .iter()
        .filter(|b| b.equipment_id == equipment_id && b.status.holds_capacity())
        .collect();

    holding
        .iter()
        .map(|candidate| {
            holding
                .iter()
                .filter(|b| TimeWindow::of(b).contains(candidate.start_time))
                .fold(0i32, |acc, b| acc.saturating_add(b.quantity))
        })
        .max()
        .unwrap_or(0)
}

/// Refuse a new total stock that existing reservations no longer fit in.
pub fn check_total_change(equipment: &Equipment, holding: &[Booking], new_total: i32) -> AppResult<()> {
    if new_total < 1 {
        return Err(AppError::Validation("Quantity must be at least 1".to_string()));
    }
    let peak = peak_reserved(equipment.id, holding);
    if peak > new_total {
        return Err(AppError::Unavailable(format!(
            "Cannot reduce quantity to {}: {} units are held by pending or approved bookings",
            new_total, peak
        )));
    }
    Ok(())
}

/// Counter rebuilt from scratch: total minus everything currently approved.
pub fn recompute_available(equipment: &Equipment, bookings: &[Booking]) -> i32 {
    let approved = bookings
        .iter()
        .filter(|b| b.equipment_id == equipment.id && b.status == BookingStatus::Approved)
        .fold(0i32, |acc, b| acc.saturating_add(b.quantity));
    equipment.quantity.saturating_sub(approved).clamp(0, equipment.quantity)
}
