//! Dashboard and usage report service

use crate::{
    error::{AppError, AppResult},
    models::report::{
        BookingReportRow, DashboardStats, EquipmentUsage, MonthCount, ReportQuery, StatusCount,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct ReportsService {
    repository: Repository,
}

impl ReportsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Database round trip for readiness checks
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }

    pub async fn dashboard_stats(&self) -> AppResult<DashboardStats> {
        self.repository.reports.dashboard_stats().await
    }

    pub async fn bookings_by_status(&self) -> AppResult<Vec<StatusCount>> {
        self.repository.reports.bookings_by_status().await
    }

    pub async fn bookings_by_month(&self) -> AppResult<Vec<MonthCount>> {
        self.repository.reports.bookings_by_month().await
    }

    pub async fn equipment_usage(&self) -> AppResult<Vec<EquipmentUsage>> {
        self.repository.reports.equipment_usage().await
    }

    /// Booking report, newest first
    pub async fn booking_report(&self, query: &ReportQuery) -> AppResult<Vec<BookingReportRow>> {
        if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
            if end < start {
                return Err(AppError::Validation(
                    "end_date must not be before start_date".to_string(),
                ));
            }
        }
        let rows = self.repository.reports.booking_report(query).await?;
        tracing::debug!(rows = rows.len(), "booking report generated");
        Ok(rows)
    }
}
