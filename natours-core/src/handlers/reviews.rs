use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use super::extract::{document, listing, ApiJson, ResourceId};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::models::review::{CreateReview, UpdateReview};
use crate::query::QueryParams;
use crate::repository::{reviews, Repository, Reviews};
use crate::state::AppState;

async fn list(state: AppState, tour_id: Option<Uuid>, pairs: Vec<(String, String)>) -> Result<Json<Value>, AppError> {
    let params = QueryParams::from_pairs(pairs);
    let result = Repository::<Reviews>::new(state.db).get_all(&params, tour_id).await?;
    Ok(listing(result))
}

pub async fn get_all_reviews(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, AppError> {
    list(state, None, pairs).await
}

/// `GET /api/v1/tours/:id/reviews`
pub async fn get_tour_reviews(
    State(state): State<AppState>,
    ResourceId(tour_id): ResourceId,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, AppError> {
    list(state, Some(tour_id), pairs).await
}

pub async fn create_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<CreateReview>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let tour_id = request
        .tour_id
        .ok_or_else(|| AppError::Validation("Review must belong to a tour.".to_string()))?;
    let review = reviews::create_review(&state.db, tour_id, &user, request).await?;
    Ok((StatusCode::CREATED, document(review)))
}

/// `POST /api/v1/tours/:id/reviews`: the tour comes from the path.
pub async fn create_tour_review(
    State(state): State<AppState>,
    ResourceId(tour_id): ResourceId,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<CreateReview>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let review = reviews::create_review(&state.db, tour_id, &user, request).await?;
    Ok((StatusCode::CREATED, document(review)))
}

pub async fn get_review(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
) -> Result<Json<Value>, AppError> {
    let review = Repository::<Reviews>::new(state.db).get_one(id).await?;
    Ok(document(review))
}

pub async fn update_review(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
    CurrentUser(user): CurrentUser,
    ApiJson(update): ApiJson<UpdateReview>,
) -> Result<Json<Value>, AppError> {
    let review = reviews::update_review(&state.db, id, &user, update).await?;
    Ok(document(review))
}

pub async fn delete_review(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
    CurrentUser(user): CurrentUser,
) -> Result<StatusCode, AppError> {
    reviews::delete_review(&state.db, id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}
