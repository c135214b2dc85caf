use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use super::extract::{document, listing, ApiJson, ResourceId};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::models::user::{AdminUpdateUser, UpdateMeRequest};
use crate::models::UserResponse;
use crate::query::QueryParams;
use crate::repository::{users, Repository, Users};
use crate::state::AppState;

pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<Value> {
    document(UserResponse::from(user))
}

/// Profile update by the account owner. Password fields are refused.
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<UpdateMeRequest>,
) -> Result<Json<Value>, AppError> {
    request.validate()?;
    let updated = users::update_profile(
        &state.db,
        user.id,
        request.name.as_deref(),
        request.email.as_deref(),
    )
    .await?;
    Ok(document(updated))
}

pub async fn delete_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<StatusCode, AppError> {
    users::deactivate(&state.db, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_all_users(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, AppError> {
    let params = QueryParams::from_pairs(pairs);
    let result = Repository::<Users>::new(state.db).get_all(&params, None).await?;
    Ok(listing(result))
}

pub async fn get_user(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
) -> Result<Json<Value>, AppError> {
    let user = Repository::<Users>::new(state.db).get_one(id).await?;
    Ok(document(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
    ApiJson(update): ApiJson<AdminUpdateUser>,
) -> Result<Json<Value>, AppError> {
    let user = users::admin_update(&state.db, id, update).await?;
    Ok(document(user))
}

/// Accounts are never hard-deleted; this deactivates them.
pub async fn delete_user(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
) -> Result<StatusCode, AppError> {
    users::deactivate(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
