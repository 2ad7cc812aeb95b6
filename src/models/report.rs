//! Dashboard aggregates and usage report rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::enums::BookingStatus;

/// Headline counters for the dashboard
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_equipment: i64,
    pub available_equipment: i64,
    pub total_users: i64,
    pub pending_bookings: i64,
    pub approved_bookings: i64,
    pub total_bookings: i64,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct StatusCount {
    pub status: BookingStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct MonthCount {
    /// `YYYY-MM`
    pub month: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct EquipmentUsage {
    pub name: String,
    pub bookings: i64,
}

/// Report filters (applied to booking creation time)
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<BookingStatus>,
}

/// Flattened booking row for usage reports
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct BookingReportRow {
    pub id: i32,
    pub user: String,
    pub user_email: String,
    pub equipment: String,
    pub category: String,
    pub quantity: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub purpose: String,
    pub created_at: DateTime<Utc>,
}
