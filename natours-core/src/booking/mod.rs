//! Purchase flow: checkout session creation and webhook-driven booking
//! materialization.

pub mod provider;
pub mod state_machine;
pub mod webhook;
pub mod workflow;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Booking, NewBooking, Tour, User};

pub use provider::{CheckoutRequest, CheckoutSession, PaymentProvider, StripeClient};
pub use webhook::{WebhookError, WebhookVerifier};
pub use workflow::{BookingWorkflow, WebhookOutcome};

/// Persistence the booking workflow depends on.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Tour through the standard read path (secret tours excluded)
    async fn find_tour(&self, id: Uuid) -> Result<Option<Tour>, AppError>;

    /// Buyer lookup by email. Deactivated accounts are included: the
    /// payment already happened.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Inserts the booking unless one already exists for the same payment
    /// event. `None` means the event was seen before.
    async fn materialize(&self, booking: NewBooking) -> Result<Option<Booking>, AppError>;
}
