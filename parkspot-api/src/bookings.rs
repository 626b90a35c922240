use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use parkspot_booking::CreateBookingInput;
use parkspot_shared::models::Booking;
use uuid::Uuid;

use crate::{error::AppError, middleware::UserContext, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings/{id}", get(get_booking))
        .route("/bookings/{id}/cancel", post(cancel_booking))
        .route("/bookings/{id}/checkin", post(check_in))
        .route("/bookings/{id}/checkout", post(check_out))
        .route("/history", get(history))
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(user): Extension<UserContext>,
    payload: Result<Json<CreateBookingInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let Json(input) = payload?;
    let booking = state.manager.create(user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(user): Extension<UserContext>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Booking>, AppError> {
    let Path(booking_id) = path?;
    Ok(Json(state.manager.booking(user.user_id, booking_id).await?))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(user): Extension<UserContext>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Booking>, AppError> {
    let Path(booking_id) = path?;
    Ok(Json(state.manager.cancel(user.user_id, booking_id).await?))
}

async fn check_in(
    State(state): State<AppState>,
    Extension(user): Extension<UserContext>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Booking>, AppError> {
    let Path(booking_id) = path?;
    Ok(Json(state.manager.check_in(user.user_id, booking_id).await?))
}

async fn check_out(
    State(state): State<AppState>,
    Extension(user): Extension<UserContext>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Booking>, AppError> {
    let Path(booking_id) = path?;
    Ok(Json(state.manager.check_out(user.user_id, booking_id).await?))
}

async fn history(
    State(state): State<AppState>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.manager.history(user.user_id).await?))
}
