//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, bookings, dashboard, equipment, health, reports, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lab Reservation API",
        version = "1.0.0",
        description = "Laboratory equipment booking REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        // Users
        users::me,
        users::list_users,
        users::update_user,
        users::delete_user,
        // Equipment
        equipment::list_equipment,
        equipment::get_equipment,
        equipment::create_equipment,
        equipment::update_equipment,
        equipment::delete_equipment,
        equipment::get_availability,
        equipment::reconcile_equipment,
        // Bookings
        bookings::list_bookings,
        bookings::get_booking,
        bookings::create_booking,
        bookings::update_booking,
        bookings::delete_booking,
        // Dashboard
        dashboard::get_stats,
        dashboard::bookings_by_status,
        dashboard::bookings_by_month,
        dashboard::equipment_usage,
        // Reports
        reports::booking_report,
    ),
    components(
        schemas(
            // Auth
            auth::LoginResponse,
            crate::models::user::RegisterUser,
            crate::models::user::LoginRequest,
            // Users
            crate::models::user::User,
            crate::models::user::UserSummary,
            crate::models::user::UpdateUser,
            crate::models::UserRole,
            // Equipment
            crate::models::equipment::Equipment,
            crate::models::equipment::CreateEquipment,
            crate::models::equipment::UpdateEquipment,
            crate::models::equipment::EquipmentAvailability,
            crate::models::EquipmentStatus,
            // Bookings
            crate::models::booking::Booking,
            crate::models::booking::BookingDetails,
            crate::models::booking::CreateBooking,
            crate::models::booking::UpdateBooking,
            crate::models::BookingStatus,
            // Dashboard and reports
            crate::models::report::DashboardStats,
            crate::models::report::StatusCount,
            crate::models::report::MonthCount,
            crate::models::report::EquipmentUsage,
            crate::models::report::BookingReportRow,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration and login"),
        (name = "users", description = "User management"),
        (name = "equipment", description = "Equipment inventory and availability"),
        (name = "bookings", description = "Equipment bookings"),
        (name = "dashboard", description = "Dashboard aggregates"),
        (name = "reports", description = "Usage reports")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` JWT scheme referenced by secured paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_registers_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(doc.paths.paths.contains_key("/bookings/{id}"));
        assert!(doc.paths.paths.contains_key("/equipment/{id}/availability"));
    }
}
