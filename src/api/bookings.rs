//! Booking endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        booking::{BookingQuery, CreateBooking, UpdateBooking},
        BookingDetails,
    },
};

use super::AuthenticatedUser;

/// List bookings (students see only their own)
#[utoipa::path(
    get,
    path = "/bookings",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(BookingQuery),
    responses(
        (status = 200, description = "List of bookings", body = Vec<BookingDetails>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_bookings(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BookingQuery>,
) -> AppResult<Json<Vec<BookingDetails>>> {
    let bookings = state.services.bookings.list(&claims, &query).await?;
    Ok(Json(bookings))
}

/// Get booking by ID
#[utoipa::path(
    get,
    path = "/bookings/{id}",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking details", body = BookingDetails),
        (status = 403, description = "Not authorized"),
        (status = 404, description = "Booking not found")
    )
)]
pub async fn get_booking(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BookingDetails>> {
    let booking = state.services.bookings.get(&claims, id).await?;
    Ok(Json(booking))
}

/// Request a booking
#[utoipa::path(
    post,
    path = "/bookings",
    tag = "bookings",
    security(("bearer_auth" = [])),
    request_body = CreateBooking,
    responses(
        (status = 201, description = "Booking created (pending)", body = BookingDetails),
        (status = 400, description = "Invalid request or equipment not available"),
        (status = 404, description = "Equipment not found"),
        (status = 409, description = "Insufficient quantity for the time slot"),
        (status = 503, description = "Equipment busy, retry")
    )
)]
pub async fn create_booking(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateBooking>,
) -> AppResult<(StatusCode, Json<BookingDetails>)> {
    let booking = state.services.bookings.create(&claims, data).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// Change status, notes, or (pending only) the reservation itself
#[utoipa::path(
    put,
    path = "/bookings/{id}",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Booking ID")),
    request_body = UpdateBooking,
    responses(
        (status = 200, description = "Booking updated", body = BookingDetails),
        (status = 400, description = "Invalid transition or edit"),
        (status = 403, description = "Not authorized"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Insufficient quantity for the time slot"),
        (status = 503, description = "Equipment busy, retry")
    )
)]
pub async fn update_booking(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<UpdateBooking>,
) -> AppResult<Json<BookingDetails>> {
    let booking = state.services.bookings.update(&claims, id, data).await?;
    Ok(Json(booking))
}

/// Delete a booking (owner or admin)
#[utoipa::path(
    delete,
    path = "/bookings/{id}",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Booking ID")),
    responses(
        (status = 204, description = "Booking deleted"),
        (status = 403, description = "Not authorized"),
        (status = 404, description = "Booking not found")
    )
)]
pub async fn delete_booking(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.bookings.delete(&claims, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
