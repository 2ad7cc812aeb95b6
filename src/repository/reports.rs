//! Aggregate queries for the dashboard and usage reports

use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    error::AppResult,
    models::{
        report::{BookingReportRow, DashboardStats, EquipmentUsage, MonthCount, ReportQuery, StatusCount},
        BookingStatus, EquipmentStatus,
    },
};

#[derive(Clone)]
pub struct ReportsRepository {
    pool: Pool<Postgres>,
}

impl ReportsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn dashboard_stats(&self) -> AppResult<DashboardStats> {
        let (total_equipment, available_equipment): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*)::bigint,
                   COUNT(*) FILTER (WHERE status = $1)::bigint
            FROM equipment
            "#,
        )
        .bind(EquipmentStatus::Available)
        .fetch_one(&self.pool)
        .await?;

        let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*)::bigint FROM users")
            .fetch_one(&self.pool)
            .await?;

        let (total_bookings, pending_bookings, approved_bookings): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*)::bigint,
                   COUNT(*) FILTER (WHERE status = $1)::bigint,
                   COUNT(*) FILTER (WHERE status = $2)::bigint
            FROM bookings
            "#,
        )
        .bind(BookingStatus::Pending)
        .bind(BookingStatus::Approved)
        .fetch_one(&self.pool)
        .await?;

        Ok(DashboardStats {
            total_equipment,
            available_equipment,
            total_users,
            pending_bookings,
            approved_bookings,
            total_bookings,
        })
    }

    pub async fn bookings_by_status(&self) -> AppResult<Vec<StatusCount>> {
        let rows = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*)::bigint AS count FROM bookings GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn bookings_by_month(&self) -> AppResult<Vec<MonthCount>> {
        let rows = sqlx::query_as::<_, MonthCount>(
            r#"
            SELECT to_char(date_trunc('month', created_at), 'YYYY-MM') AS month,
                   COUNT(*)::bigint AS count
            FROM bookings
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Top 10 equipment by number of bookings (unbooked equipment included)
    pub async fn equipment_usage(&self) -> AppResult<Vec<EquipmentUsage>> {
        let rows = sqlx::query_as::<_, EquipmentUsage>(
            r#"
            SELECT e.name, COUNT(b.id)::bigint AS bookings
            FROM equipment e
            LEFT JOIN bookings b ON b.equipment_id = e.id
            GROUP BY e.id, e.name
            ORDER BY COUNT(b.id) DESC, e.name
            LIMIT 10
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Flattened booking rows filtered on creation date and status
    pub async fn booking_report(&self, query: &ReportQuery) -> AppResult<Vec<BookingReportRow>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT b.id,
                   COALESCE(u.full_name, '') AS "user",
                   COALESCE(u.email, '') AS user_email,
                   COALESCE(e.name, '') AS equipment,
                   COALESCE(e.category, '') AS category,
                   b.quantity, b.start_time, b.end_time, b.status,
                   COALESCE(b.purpose, '') AS purpose,
                   b.created_at
            FROM bookings b
            LEFT JOIN users u ON u.id = b.user_id
            LEFT JOIN equipment e ON e.id = b.equipment_id
            WHERE TRUE
            "#,
        );
        if let Some(start) = query.start_date {
            builder.push(" AND b.created_at >= ").push_bind(start);
        }
        if let Some(end) = query.end_date {
            builder.push(" AND b.created_at <= ").push_bind(end);
        }
        if let Some(status) = query.status {
            builder.push(" AND b.status = ").push_bind(status);
        }
        builder.push(" ORDER BY b.created_at DESC, b.id DESC");

        let rows = builder
            .build_query_as::<BookingReportRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
