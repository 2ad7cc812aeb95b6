//! Booking (reservation) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use super::enums::{BookingStatus, EquipmentStatus, UserRole};
use super::equipment::Equipment;
use super::user::UserSummary;

/// Booking row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Booking {
    pub id: i32,
    pub user_id: i32,
    pub equipment_id: i32,
    pub quantity: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub purpose: Option<String>,
    pub status: BookingStatus,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Booking with its requester and equipment, for display
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    pub user: Option<UserSummary>,
    pub equipment: Option<Equipment>,
}

/// Internal row structure for the booking/user/equipment join
#[derive(Debug, Clone, FromRow)]
pub struct BookingDetailsRow {
    #[sqlx(flatten)]
    booking: Booking,
    u_id: Option<i32>,
    u_email: Option<String>,
    u_full_name: Option<String>,
    u_role: Option<UserRole>,
    e_id: Option<i32>,
    e_name: Option<String>,
    e_category: Option<String>,
    e_description: Option<String>,
    e_quantity: Option<i32>,
    e_available_quantity: Option<i32>,
    e_status: Option<EquipmentStatus>,
    e_location: Option<String>,
    e_created_at: Option<DateTime<Utc>>,
    e_updated_at: Option<DateTime<Utc>>,
}

impl From<BookingDetailsRow> for BookingDetails {
    fn from(row: BookingDetailsRow) -> Self {
        let user = match (row.u_id, row.u_email, row.u_full_name, row.u_role) {
            (Some(id), Some(email), Some(full_name), Some(role)) => Some(UserSummary {
                id,
                email,
                full_name,
                role,
            }),
            _ => None,
        };

        let equipment = match (
            row.e_id,
            row.e_name,
            row.e_category,
            row.e_quantity,
            row.e_available_quantity,
            row.e_status,
            row.e_created_at,
            row.e_updated_at,
        ) {
            (
                Some(id),
                Some(name),
                Some(category),
                Some(quantity),
                Some(available_quantity),
                Some(status),
                Some(created_at),
                Some(updated_at),
            ) => Some(Equipment {
                id,
                name,
                category,
                description: row.e_description,
                quantity,
                available_quantity,
                status,
                location: row.e_location,
                created_at,
                updated_at,
            }),
            _ => None,
        };

        BookingDetails {
            booking: row.booking,
            user,
            equipment,
        }
    }
}

/// Create booking request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_create_window"))]
pub struct CreateBooking {
    pub equipment_id: i32,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub purpose: Option<String>,
}

fn default_quantity() -> i32 {
    1
}

fn validate_create_window(booking: &CreateBooking) -> Result<(), ValidationError> {
    check_window(booking.start_time, booking.end_time)
}

fn check_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ValidationError> {
    if end <= start {
        let mut err = ValidationError::new("time_window");
        err.message = Some("end_time must be after start_time".into());
        return Err(err);
    }
    Ok(())
}

/// Update booking request.
///
/// `status` drives the state machine; `quantity`, `start_time`, `end_time`
/// and `purpose` may only be edited while the booking is pending.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_update_window"))]
pub struct UpdateBooking {
    pub status: Option<BookingStatus>,
    pub admin_notes: Option<String>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: Option<i32>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub purpose: Option<String>,
}

fn validate_update_window(update: &UpdateBooking) -> Result<(), ValidationError> {
    match (update.start_time, update.end_time) {
        (Some(start), Some(end)) => check_window(start, end),
        _ => Ok(()),
    }
}

impl UpdateBooking {
    /// Whether the request edits the reservation itself (not just status/notes)
    pub fn edits_reservation(&self) -> bool {
        self.quantity.is_some()
            || self.start_time.is_some()
            || self.end_time.is_some()
            || self.purpose.is_some()
    }

    /// Whether the request changes how much stock is held, or when
    pub fn changes_capacity(&self) -> bool {
        self.quantity.is_some() || self.start_time.is_some() || self.end_time.is_some()
    }
}

/// Booking list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookingQuery {
    pub status: Option<BookingStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    #[test]
    fn test_create_rejects_empty_window() {
        let req = CreateBooking {
            equipment_id: 1,
            quantity: 1,
            start_time: at(10, 0),
            end_time: at(10, 0),
            purpose: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_create_rejects_zero_quantity() {
        let req = CreateBooking {
            equipment_id: 1,
            quantity: 0,
            start_time: at(10, 0),
            end_time: at(11, 0),
            purpose: None,
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("quantity"));
    }

    #[test]
    fn test_create_accepts_valid() {
        let req: CreateBooking = serde_json::from_value(serde_json::json!({
            "equipment_id": 3,
            "start_time": "2026-03-02T10:00:00Z",
            "end_time": "2026-03-02T11:00:00Z"
        }))
        .unwrap();
        assert_eq!(req.quantity, 1);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_update_window_checked_only_when_both_given() {
        let partial = UpdateBooking {
            start_time: Some(at(12, 0)),
            ..Default::default()
        };
        assert!(partial.validate().is_ok());

        let inverted = UpdateBooking {
            start_time: Some(at(12, 0)),
            end_time: Some(at(11, 0)),
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_update_classification() {
        let notes_only = UpdateBooking {
            admin_notes: Some("ok".into()),
            status: Some(BookingStatus::Approved),
            ..Default::default()
        };
        assert!(!notes_only.edits_reservation());

        let purpose = UpdateBooking {
            purpose: Some("calibration".into()),
            ..Default::default()
        };
        assert!(purpose.edits_reservation());
        assert!(!purpose.changes_capacity());
    }
}
