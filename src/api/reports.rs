//! Usage report endpoints

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::report::{BookingReportRow, ReportQuery},
};

use super::AuthenticatedUser;

/// Booking report filtered on creation date and status (admin or researcher)
#[utoipa::path(
    get,
    path = "/reports/bookings",
    tag = "reports",
    security(("bearer_auth" = [])),
    params(ReportQuery),
    responses(
        (status = 200, description = "Report rows, newest first", body = Vec<BookingReportRow>),
        (status = 403, description = "Researcher or admin access required")
    )
)]
pub async fn booking_report(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<Vec<BookingReportRow>>> {
    claims.require_admin_or_researcher()?;
    let rows = state.services.reports.booking_report(&query).await?;
    Ok(Json(rows))
}
