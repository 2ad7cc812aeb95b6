//! Equipment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::EquipmentStatus;

/// Equipment record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Equipment {
    pub id: i32,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    /// Total stock (number of units owned)
    pub quantity: i32,
    /// Cached count of units not held by approved bookings
    pub available_quantity: i32,
    pub status: EquipmentStatus,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create equipment request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateEquipment {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 100, message = "Category is required"))]
    pub category: String,
    pub description: Option<String>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub status: EquipmentStatus,
    pub location: Option<String>,
}

fn default_quantity() -> i32 {
    1
}

/// Update equipment request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateEquipment {
    #[validate(length(min = 1, max = 200, message = "Name must not be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Category must not be empty"))]
    pub category: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: Option<i32>,
    pub status: Option<EquipmentStatus>,
    pub location: Option<String>,
}

/// Equipment list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct EquipmentQuery {
    pub category: Option<String>,
    pub status: Option<EquipmentStatus>,
    /// Only bookable equipment with at least one unit free (cached counter)
    pub available_only: Option<bool>,
}

/// Time window for a live availability lookup
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct AvailabilityQuery {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Live availability of one equipment item over a window
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EquipmentAvailability {
    pub equipment_id: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_quantity: i32,
    /// Units held by overlapping pending or approved bookings
    pub reserved_quantity: i32,
    /// Units that can still be requested for this window
    pub free_quantity: i32,
    /// Cached counter, for comparison
    pub available_quantity: i32,
    pub bookable: bool,
}
