use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, info, warn};

use super::extract::ApiJson;
use crate::auth::middleware::{is_secure_request, session_cookie, LOGGED_OUT, SESSION_COOKIE};
use crate::auth::{
    create_password_reset_token, hash_password, hash_reset_token, verify_password, CurrentUser,
};
use crate::error::AppError;
use crate::mailer::Email;
use crate::models::user::{
    ForgotPasswordRequest, LoginRequest, NewUser, ResetPasswordRequest, SignupRequest,
    UpdatePasswordRequest,
};
use crate::models::{Role, User, UserResponse};
use crate::repository::users;
use crate::state::AppState;
use crate::validation::require_password_pair;

/// Issues a session for `user`: token in the body and in the cookie.
fn send_token(
    state: &AppState,
    headers: &HeaderMap,
    user: User,
    status: StatusCode,
) -> Result<Response, AppError> {
    let token = state.sessions.issue(user.id)?;
    let cookie = session_cookie(
        &token,
        state.cookie_max_age(),
        is_secure_request(headers, &state.config),
    );

    let body = Json(json!({
        "status": "success",
        "token": token,
        "data": { "user": UserResponse::from(user) }
    }));
    Ok((status, [(header::SET_COOKIE, cookie)], body).into_response())
}

/// Handler for `POST /api/v1/users/signup`.
///
/// New accounts always get the `user` role.
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<SignupRequest>,
) -> Result<Response, AppError> {
    request.validate()?;

    let password_hash = hash_password(&request.password, state.config.bcrypt_cost).await?;
    let user = users::insert_user(
        &state.db,
        NewUser {
            name: request.name,
            email: request.email,
            password_hash,
            role: Role::User,
        },
    )
    .await?;

    let profile_url = format!("{}/me", state.config.public_base_url);
    if let Err(e) = state.mailer.send(&Email::welcome(&user, &profile_url)).await {
        error!("Failed to send welcome email to {}: {:#}", user.id, e);
    }

    send_token(&state, &headers, user, StatusCode::CREATED)
}

/// Handler for `POST /api/v1/users/login`.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Response, AppError> {
    let (Some(email), Some(password)) = (request.email, request.password) else {
        return Err(AppError::BadRequest(
            "Please provide email and password!".to_string(),
        ));
    };

    let incorrect = || AppError::Unauthenticated("Incorrect email or password".to_string());

    let user = users::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(incorrect)?;
    if !verify_password(&password, &user.password_hash).await? {
        warn!("Failed login for user {}", user.id);
        return Err(incorrect());
    }

    info!("User {} logged in", user.id);
    send_token(&state, &headers, user, StatusCode::OK)
}

/// Handler for `GET /api/v1/users/logout`: replaces the session cookie with
/// a short-lived placeholder.
pub async fn logout() -> Response {
    let cookie = format!(
        "{}={}; Path=/; Max-Age=10; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, LOGGED_OUT
    );
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "status": "success" })),
    )
        .into_response()
}

/// Handler for `POST /api/v1/users/forgotPassword`.
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = users::find_by_email(&state.db, &request.email)
        .await?
        .ok_or_else(|| AppError::NotFound("There is no user with that email address.".to_string()))?;

    let token = create_password_reset_token();
    users::store_reset_token(&state.db, user.id, Some((token.hash.as_str(), token.expires_at))).await?;

    let reset_url = format!(
        "{}/api/v1/users/resetPassword/{}",
        state.config.public_base_url, token.plain
    );
    if let Err(e) = state.mailer.send(&Email::password_reset(&user, &reset_url)).await {
        error!("Failed to send reset email to {}: {:#}", user.id, e);
        users::store_reset_token(&state.db, user.id, None).await?;
        return Err(AppError::Internal(anyhow::anyhow!(
            "There was an error sending the email. Try again later!"
        )));
    }

    Ok(Json(json!({
        "status": "success",
        "message": "Token sent to email!"
    })))
}

/// Handler for `PATCH /api/v1/users/resetPassword/:token`.
pub async fn reset_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(token): Path<String>,
    ApiJson(request): ApiJson<ResetPasswordRequest>,
) -> Result<Response, AppError> {
    let invalid = || AppError::BadRequest("Token is invalid or has expired".to_string());
    let digest = hash_reset_token(&token);
    users::find_by_reset_token(&state.db, &digest)
        .await?
        .ok_or_else(invalid)?;

    request.validate()?;
    let password_hash = hash_password(&request.password, state.config.bcrypt_cost).await?;
    let user = users::redeem_reset_token(&state.db, &digest, &password_hash)
        .await?
        .ok_or_else(invalid)?;

    info!("User {} reset their password", user.id);
    send_token(&state, &headers, user, StatusCode::OK)
}

/// Handler for `PATCH /api/v1/users/updateMyPassword`.
pub async fn update_my_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<UpdatePasswordRequest>,
) -> Result<Response, AppError> {
    let (Some(current), Some(password), Some(confirm)) =
        (request.password_current, request.password, request.password_confirm)
    else {
        return Err(AppError::BadRequest(
            "Please provide password_current, password and password_confirm".to_string(),
        ));
    };

    if !verify_password(&current, &user.password_hash).await? {
        return Err(AppError::Unauthenticated(
            "Your current password is wrong.".to_string(),
        ));
    }
    if password == current {
        return Err(AppError::BadRequest(
            "New password must differ from the current one".to_string(),
        ));
    }
    require_password_pair(&password, &confirm)?;

    let password_hash = hash_password(&password, state.config.bcrypt_cost).await?;
    let user = users::set_password(&state.db, user.id, &password_hash).await?;

    info!("User {} changed their password", user.id);
    send_token(&state, &headers, user, StatusCode::OK)
}
