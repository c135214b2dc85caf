use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use super::extract::{document, listing, ApiJson, ResourceId};
use crate::auth::CurrentUser;
use crate::booking::webhook::SIGNATURE_HEADER;
use crate::booking::WebhookOutcome;
use crate::error::AppError;
use crate::models::booking::{CreateBooking, UpdateBooking};
use crate::query::QueryParams;
use crate::repository::{bookings, Bookings, Repository};
use crate::state::AppState;

/// `GET /api/v1/bookings/checkout-session/:id`
pub async fn get_checkout_session(
    State(state): State<AppState>,
    ResourceId(tour_id): ResourceId,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, AppError> {
    let session = state.bookings.create_checkout_session(tour_id, &user).await?;
    Ok(Json(json!({
        "status": "success",
        "session": session
    })))
}

/// `POST /webhook-checkout`
///
/// Takes the raw body: the signature covers the exact bytes sent.
pub async fn webhook_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state
        .bookings
        .handle_payment_completed(&body, signature)
        .await?;

    if let WebhookOutcome::Materialized(booking) = &outcome {
        info!("Webhook materialized booking {}", booking.id);
    }
    Ok(Json(json!({ "received": true })))
}

/// The caller's own bookings.
pub async fn my_bookings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, AppError> {
    let bookings = bookings::bookings_for_user(&state.db, user.id).await?;
    Ok(Json(json!({
        "status": "success",
        "results": bookings.len(),
        "data": { "bookings": bookings }
    })))
}

pub async fn get_all_bookings(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, AppError> {
    let params = QueryParams::from_pairs(pairs);
    let result = Repository::<Bookings>::new(state.db).get_all(&params, None).await?;
    Ok(listing(result))
}

/// `GET /api/v1/tours/:id/bookings`
pub async fn get_tour_bookings(
    State(state): State<AppState>,
    ResourceId(tour_id): ResourceId,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, AppError> {
    let params = QueryParams::from_pairs(pairs);
    let result = Repository::<Bookings>::new(state.db)
        .get_all(&params, Some(tour_id))
        .await?;
    Ok(listing(result))
}

pub async fn get_booking(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
) -> Result<Json<Value>, AppError> {
    let booking = Repository::<Bookings>::new(state.db).get_one(id).await?;
    Ok(document(booking))
}

pub async fn create_booking(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateBooking>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let booking = bookings::create_booking(&Repository::new(state.db), request).await?;
    Ok((StatusCode::CREATED, document(booking)))
}

pub async fn update_booking(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
    ApiJson(update): ApiJson<UpdateBooking>,
) -> Result<Json<Value>, AppError> {
    let booking = bookings::update_booking(&Repository::new(state.db), id, update).await?;
    Ok(document(booking))
}

pub async fn delete_booking(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
) -> Result<StatusCode, AppError> {
    Repository::<Bookings>::new(state.db).delete_one(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
