//! HTTP surface: handlers and the router that wires them to paths, guards
//! and response layers.

pub mod auth;
pub mod bookings;
pub mod extract;
pub mod reviews;
pub mod tours;
pub mod users;

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    middleware,
    response::Json,
    routing::{delete, get, patch, post, MethodRouter},
    Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::auth::{authenticate, restrict_to};
use crate::error::{expose_error_detail, AppError};
use crate::models::Role;
use crate::state::AppState;

const STAFF: &[Role] = &[Role::Admin, Role::LeadGuide];
const REVIEWERS: &[Role] = &[Role::User];
const REVIEW_EDITORS: &[Role] = &[Role::User, Role::Admin];
const ADMIN: &[Role] = &[Role::Admin];

/// Requires a valid session on every method of `route`.
fn protected(state: &AppState, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(state.clone(), authenticate))
}

/// Requires a valid session and one of `roles`. Authentication is the
/// outer layer so the role check sees the attached user.
fn restricted(
    state: &AppState,
    roles: &'static [Role],
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    protected(
        state,
        route.route_layer(middleware::from_fn_with_state(roles, restrict_to)),
    )
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "natours",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn db_health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(|e| {
            error!("Database health check failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        })?;

    Ok(Json(json!({
        "status": "ok",
        "database": "connected"
    })))
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("Can't find {} on this server!", uri))
}

fn tour_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(tours::get_all_tours).merge(restricted(state, STAFF, post(tours::create_tour))),
        )
        .route("/top-5-cheap", get(tours::top_five_cheap))
        .route("/tour-stats", get(tours::tour_stats))
        .route(
            "/:id",
            get(tours::get_tour).merge(restricted(
                state,
                STAFF,
                patch(tours::update_tour).delete(tours::delete_tour),
            )),
        )
        .route(
            "/:id/reviews",
            protected(state, get(reviews::get_tour_reviews))
                .merge(restricted(state, REVIEWERS, post(reviews::create_tour_review))),
        )
        .route(
            "/:id/bookings",
            restricted(state, STAFF, get(bookings::get_tour_bookings)),
        )
}

fn user_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/forgotPassword", post(auth::forgot_password))
        .route("/resetPassword/:token", patch(auth::reset_password))
        .route(
            "/updateMyPassword",
            protected(state, patch(auth::update_my_password)),
        )
        .route("/me", protected(state, get(users::get_me)))
        .route("/updateMe", protected(state, patch(users::update_me)))
        .route("/deleteMe", protected(state, delete(users::delete_me)))
        .route("/", restricted(state, ADMIN, get(users::get_all_users)))
        .route(
            "/:id",
            restricted(
                state,
                ADMIN,
                get(users::get_user)
                    .patch(users::update_user)
                    .delete(users::delete_user),
            ),
        )
}

fn review_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            protected(state, get(reviews::get_all_reviews))
                .merge(restricted(state, REVIEWERS, post(reviews::create_review))),
        )
        .route(
            "/:id",
            protected(state, get(reviews::get_review)).merge(restricted(
                state,
                REVIEW_EDITORS,
                patch(reviews::update_review).delete(reviews::delete_review),
            )),
        )
}

fn booking_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/checkout-session/:id",
            protected(state, get(bookings::get_checkout_session)),
        )
        .route("/me", protected(state, get(bookings::my_bookings)))
        .route(
            "/",
            restricted(
                state,
                STAFF,
                get(bookings::get_all_bookings).post(bookings::create_booking),
            ),
        )
        .route(
            "/:id",
            restricted(
                state,
                STAFF,
                get(bookings::get_booking)
                    .patch(bookings::update_booking)
                    .delete(bookings::delete_booking),
            ),
        )
}

/// Builds the application router.
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/health/db", get(db_health_check))
        .route("/webhook-checkout", post(bookings::webhook_checkout))
        .nest("/api/v1/tours", tour_routes(&state))
        .nest("/api/v1/users", user_routes(&state))
        .nest("/api/v1/reviews", review_routes(&state))
        .nest("/api/v1/bookings", booking_routes(&state))
        .fallback(not_found);

    let router = if state.config.environment.is_development() {
        router.layer(middleware::map_response(expose_error_detail))
    } else {
        router
    };

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
