//! Request authentication and role gating.
//!
//! `authenticate` must run before `restrict_to` on the same route; the
//! router installs them so that the role check always sees the user
//! attached by a successful authentication.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::config::Config;
use crate::error::AppError;
use crate::models::{Role, User};
use crate::repository::users;
use crate::state::AppState;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "jwt";

/// Placeholder value written on logout.
pub const LOGGED_OUT: &str = "loggedout";

/// The authenticated user, attached to request extensions by
/// [`authenticate`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(not_logged_in)
    }
}

fn not_logged_in() -> AppError {
    AppError::Unauthenticated("You are not logged in! Please log in to get access.".to_string())
}

/// Session token from the `Authorization: Bearer` header, else from the
/// session cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|c| c.trim().strip_prefix("jwt="))
        .find(|t| !t.is_empty() && *t != LOGGED_OUT)
        .map(str::to_string)
}

/// Resolves a token to a live, active user.
pub async fn validate_session(state: &AppState, token: &str) -> Result<User, AppError> {
    let claims = state.sessions.decode(token)?;

    let user = users::find_active_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| {
            AppError::Unauthenticated(
                "The user belonging to this token does no longer exist.".to_string(),
            )
        })?;

    claims.ensure_issued_after(user.password_changed_at)?;
    Ok(user)
}

/// Rejects the request with 401 unless it carries a valid session.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(request.headers()).ok_or_else(not_logged_in)?;
    let user = validate_session(&state, &token).await?;

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Rejects the request with 403 unless the authenticated user holds one of
/// `roles`. Install with `from_fn_with_state(roles, restrict_to)`.
pub async fn restrict_to(
    State(roles): State<&'static [Role]>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(not_logged_in)?;
    ensure_role(&user.0, roles)?;
    Ok(next.run(request).await)
}

pub fn ensure_role(user: &User, roles: &[Role]) -> Result<(), AppError> {
    if roles.contains(&user.role) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not have permission to perform this action".to_string(),
        ))
    }
}

/// Whether the client reached us over HTTPS, directly or through the
/// proxy in front of us.
pub fn is_secure_request(headers: &HeaderMap, config: &Config) -> bool {
    let forwarded_https = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map(|proto| proto.eq_ignore_ascii_case("https"))
        .unwrap_or(false);
    forwarded_https || config.serves_https()
}

/// `Set-Cookie` value carrying a session token.
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> HeaderValue {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static("jwt=; Path=/"))
}
