//! Dashboard endpoints

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::report::{DashboardStats, EquipmentUsage, MonthCount, StatusCount},
};

use super::AuthenticatedUser;

/// Headline counters
#[utoipa::path(
    get,
    path = "/dashboard/stats",
    tag = "dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard counters", body = DashboardStats),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_stats(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<DashboardStats>> {
    Ok(Json(state.services.reports.dashboard_stats().await?))
}

#[utoipa::path(
    get,
    path = "/dashboard/bookings-by-status",
    tag = "dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Booking count per status", body = Vec<StatusCount>)
    )
)]
pub async fn bookings_by_status(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<StatusCount>>> {
    Ok(Json(state.services.reports.bookings_by_status().await?))
}

#[utoipa::path(
    get,
    path = "/dashboard/bookings-by-month",
    tag = "dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Booking count per creation month", body = Vec<MonthCount>)
    )
)]
pub async fn bookings_by_month(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<MonthCount>>> {
    Ok(Json(state.services.reports.bookings_by_month().await?))
}

/// Ten most booked equipment items
#[utoipa::path(
    get,
    path = "/dashboard/equipment-usage",
    tag = "dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Bookings per equipment", body = Vec<EquipmentUsage>)
    )
)]
pub async fn equipment_usage(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<EquipmentUsage>>> {
    Ok(Json(state.services.reports.equipment_usage().await?))
}
