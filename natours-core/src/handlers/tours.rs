use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::extract::{document, listing, ApiJson, ResourceId};
use crate::error::AppError;
use crate::models::tour::{CreateTour, UpdateTour};
use crate::query::QueryParams;
use crate::repository::{tours, Repository, Tours};
use crate::state::AppState;

/// Presets of the `top-5-cheap` alias route.
fn top_five_cheap_params(mut params: QueryParams) -> QueryParams {
    params.set("limit", "5");
    params.set("sort", "-ratings_average,price");
    params.set("fields", "name,price,ratings_average,summary,difficulty");
    params
}

pub async fn get_all_tours(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, AppError> {
    let params = QueryParams::from_pairs(pairs);
    let result = Repository::<Tours>::new(state.db).get_all(&params, None).await?;
    Ok(listing(result))
}

pub async fn top_five_cheap(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, AppError> {
    let params = top_five_cheap_params(QueryParams::from_pairs(pairs));
    let result = Repository::<Tours>::new(state.db).get_all(&params, None).await?;
    Ok(listing(result))
}

pub async fn tour_stats(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let stats = tours::tour_stats(&state.db).await?;
    Ok(Json(json!({
        "status": "success",
        "data": { "stats": stats }
    })))
}

/// Single tour with its reviews.
pub async fn get_tour(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
) -> Result<Json<Value>, AppError> {
    let tour = tours::get_tour(&Repository::new(state.db), id).await?;
    Ok(document(tour))
}

pub async fn create_tour(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateTour>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let tour = tours::create_tour(&state.db, request).await?;
    Ok((StatusCode::CREATED, document(tour)))
}

pub async fn update_tour(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
    ApiJson(update): ApiJson<UpdateTour>,
) -> Result<Json<Value>, AppError> {
    let tour = tours::update_tour(&Repository::new(state.db), id, update).await?;
    Ok(document(tour))
}

pub async fn delete_tour(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
) -> Result<StatusCode, AppError> {
    Repository::<Tours>::new(state.db).delete_one(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
