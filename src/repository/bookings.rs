//! Bookings repository for database operations

use chrono::Utc;
use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::{
        booking::{Booking, BookingDetails, BookingDetailsRow, CreateBooking},
        BookingStatus,
    },
    reconciler::TimeWindow,
};

/// Booking joined with its requester (`u_*`) and equipment (`e_*`)
const DETAILS_SELECT: &str = r#"
    SELECT b.*,
           u.id AS u_id, u.email AS u_email, u.full_name AS u_full_name, u.role AS u_role,
           e.id AS e_id, e.name AS e_name, e.category AS e_category,
           e.description AS e_description, e.quantity AS e_quantity,
           e.available_quantity AS e_available_quantity, e.status AS e_status,
           e.location AS e_location, e.created_at AS e_created_at, e.updated_at AS e_updated_at
    FROM bookings b
    LEFT JOIN users u ON u.id = b.user_id
    LEFT JOIN equipment e ON e.id = b.equipment_id
"#;

#[derive(Clone)]
pub struct BookingsRepository {
    pool: Pool<Postgres>,
}

impl BookingsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get booking by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Booking> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }

    /// Re-read a booking inside a transaction, row-locked
    pub async fn find_for_update(&self, conn: &mut PgConnection, id: i32) -> AppResult<Option<Booking>> {
        let row = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    /// Get a booking with user and equipment
    pub async fn get_details(&self, id: i32) -> AppResult<BookingDetails> {
        let query = format!("{} WHERE b.id = $1", DETAILS_SELECT);
        sqlx::query_as::<_, BookingDetailsRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(BookingDetails::from)
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }

    /// List bookings newest first, optionally restricted to one owner and status
    pub async fn list_details(
        &self,
        owner_id: Option<i32>,
        status: Option<BookingStatus>,
    ) -> AppResult<Vec<BookingDetails>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(DETAILS_SELECT);
        builder.push(" WHERE TRUE");
        if let Some(owner_id) = owner_id {
            builder.push(" AND b.user_id = ").push_bind(owner_id);
        }
        if let Some(status) = status {
            builder.push(" AND b.status = ").push_bind(status);
        }
        builder.push(" ORDER BY b.created_at DESC, b.id DESC");

        let rows = builder
            .build_query_as::<BookingDetailsRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(BookingDetails::from).collect())
    }

    /// Bookings of one equipment that hold capacity and overlap `window`
    /// (half-open), minus an optional booking being edited.
    pub async fn list_overlapping<'c, E>(
        &self,
        executor: E,
        equipment_id: i32,
        window: &TimeWindow,
        exclude_id: Option<i32>,
    ) -> AppResult<Vec<Booking>>
    where
        E: sqlx::Executor<'c, Database = Postgres>,
    {
        let statuses: Vec<&str> = BookingStatus::HOLDING.iter().map(|s| s.as_str()).collect();
        let rows = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE equipment_id = $1
              AND status = ANY($2)
              AND start_time < $4
              AND end_time > $3
              AND ($5::int IS NULL OR id <> $5)
            ORDER BY start_time
            "#,
        )
        .bind(equipment_id)
        .bind(statuses)
        .bind(window.start)
        .bind(window.end)
        .bind(exclude_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Every pending or approved booking of one equipment, whatever its window
    pub async fn list_holding(&self, conn: &mut PgConnection, equipment_id: i32) -> AppResult<Vec<Booking>> {
        let statuses: Vec<&str> = BookingStatus::HOLDING.iter().map(|s| s.as_str()).collect();
        let rows = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE equipment_id = $1 AND status = ANY($2) ORDER BY start_time",
        )
        .bind(equipment_id)
        .bind(statuses)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    /// All currently approved bookings of one equipment
    pub async fn list_approved(&self, conn: &mut PgConnection, equipment_id: i32) -> AppResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE equipment_id = $1 AND status = $2",
        )
        .bind(equipment_id)
        .bind(BookingStatus::Approved)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    /// Insert a new pending booking
    pub async fn insert(&self, conn: &mut PgConnection, user_id: i32, data: &CreateBooking) -> AppResult<Booking> {
        let row = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (user_id, equipment_id, quantity, start_time, end_time, purpose, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(data.equipment_id)
        .bind(data.quantity)
        .bind(data.start_time)
        .bind(data.end_time)
        .bind(&data.purpose)
        .bind(BookingStatus::Pending)
        .fetch_one(conn)
        .await?;
        Ok(row)
    }

    /// Write back every editable column
    pub async fn save(&self, conn: &mut PgConnection, booking: &Booking) -> AppResult<Booking> {
        sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET quantity = $2, start_time = $3, end_time = $4, purpose = $5,
                status = $6, admin_notes = $7, updated_at = $8
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(booking.id)
        .bind(booking.quantity)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(&booking.purpose)
        .bind(booking.status)
        .bind(&booking.admin_notes)
        .bind(Utc::now())
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }

    pub async fn delete(&self, conn: &mut PgConnection, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Booking not found".to_string()));
        }
        Ok(())
    }
}
