use std::sync::Arc;

use chrono::Duration;
use sqlx::PgPool;

use crate::auth::SessionIssuer;
use crate::booking::{BookingWorkflow, PaymentProvider, WebhookVerifier};
use crate::config::Config;
use crate::mailer::Mailer;
use crate::repository::bookings::PgBookingStore;

/// Shared application state, built once at startup and cloned into every
/// handler.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub sessions: Arc<SessionIssuer>,
    pub bookings: Arc<BookingWorkflow>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// Wires the collaborators together. The payment provider and mailer
    /// are passed in so tests and local runs can swap them.
    pub fn new(
        db: PgPool,
        config: Config,
        payments: Arc<dyn PaymentProvider>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let sessions = SessionIssuer::new(
            config.jwt_secret.as_bytes(),
            Duration::days(config.jwt_expires_in_days),
        );
        let bookings = BookingWorkflow::new(
            Arc::new(PgBookingStore::new(db.clone())),
            payments,
            mailer.clone(),
            WebhookVerifier::new(config.stripe_webhook_secret.clone()),
            config.public_base_url.clone(),
        );

        Self {
            db,
            config: Arc::new(config),
            sessions: Arc::new(sessions),
            bookings: Arc::new(bookings),
            mailer,
        }
    }

    /// Max-Age of the session cookie, in seconds.
    pub fn cookie_max_age(&self) -> i64 {
        Duration::days(self.config.jwt_cookie_expires_in_days).num_seconds()
    }
}
