//! Equipment repository

use chrono::Utc;
use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::{
        equipment::{CreateEquipment, Equipment, EquipmentQuery},
        EquipmentStatus,
    },
};

#[derive(Clone)]
pub struct EquipmentRepository {
    pool: Pool<Postgres>,
}

impl EquipmentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List equipment, optionally filtered
    pub async fn list(&self, query: &EquipmentQuery) -> AppResult<Vec<Equipment>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM equipment WHERE TRUE");

        if let Some(ref category) = query.category {
            builder.push(" AND category = ").push_bind(category.clone());
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if query.available_only.unwrap_or(false) {
            builder
                .push(" AND status = ")
                .push_bind(EquipmentStatus::Available)
                .push(" AND available_quantity > 0");
        }
        builder.push(" ORDER BY name");

        let rows = builder
            .build_query_as::<Equipment>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Get equipment by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Equipment> {
        sqlx::query_as::<_, Equipment>("SELECT * FROM equipment WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    /// Fetch and row-lock equipment for the rest of the transaction
    pub async fn find_for_update(&self, conn: &mut PgConnection, id: i32) -> AppResult<Option<Equipment>> {
        let row = sqlx::query_as::<_, Equipment>("SELECT * FROM equipment WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    /// Create equipment; every unit starts out available
    pub async fn create(&self, data: &CreateEquipment) -> AppResult<Equipment> {
        let row = sqlx::query_as::<_, Equipment>(
            r#"
            INSERT INTO equipment (name, category, description, quantity, available_quantity, status, location)
            VALUES ($1, $2, $3, $4, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.category)
        .bind(&data.description)
        .bind(data.quantity)
        .bind(data.status)
        .bind(&data.location)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Write back every editable column
    pub async fn save(&self, conn: &mut PgConnection, equipment: &Equipment) -> AppResult<Equipment> {
        sqlx::query_as::<_, Equipment>(
            r#"
            UPDATE equipment
            SET name = $2, category = $3, description = $4, quantity = $5,
                available_quantity = $6, status = $7, location = $8, updated_at = $9
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(equipment.id)
        .bind(&equipment.name)
        .bind(&equipment.category)
        .bind(&equipment.description)
        .bind(equipment.quantity)
        .bind(equipment.available_quantity)
        .bind(equipment.status)
        .bind(&equipment.location)
        .bind(Utc::now())
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", equipment.id)))
    }

    pub async fn set_available_quantity(
        &self,
        conn: &mut PgConnection,
        id: i32,
        available_quantity: i32,
    ) -> AppResult<Equipment> {
        sqlx::query_as::<_, Equipment>(
            "UPDATE equipment SET available_quantity = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(available_quantity)
        .bind(Utc::now())
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    /// Whether any booking (in any state) references the equipment
    pub async fn has_bookings(&self, conn: &mut PgConnection, id: i32) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM bookings WHERE equipment_id = $1)")
                .bind(id)
                .fetch_one(conn)
                .await?;
        Ok(exists)
    }

    /// Delete equipment
    pub async fn delete(&self, conn: &mut PgConnection, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM equipment WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Equipment {} not found", id)));
        }
        Ok(())
    }
}
