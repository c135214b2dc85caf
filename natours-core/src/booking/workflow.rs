use std::sync::Arc;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::provider::{CheckoutRequest, CheckoutSession, PaymentProvider};
use super::state_machine::{PurchaseAction, PurchaseEvent, PurchaseStateMachine, Transition};
use super::webhook::{CompletedCheckout, WebhookError, WebhookVerifier, CHECKOUT_COMPLETED};
use super::BookingStore;
use crate::error::AppError;
use crate::mailer::{Email, Mailer};
use crate::models::{Booking, NewBooking, User};

/// Result of processing one verified callback.
#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    /// A new booking was stored
    Materialized(Booking),
    /// The event had already produced a booking
    Duplicate { event_id: String },
    /// Event type this service does not act on
    Ignored { event_type: String },
}

/// Coordinates the payment provider, the booking store and the mailer.
pub struct BookingWorkflow {
    store: Arc<dyn BookingStore>,
    payments: Arc<dyn PaymentProvider>,
    mailer: Arc<dyn Mailer>,
    verifier: WebhookVerifier,
    public_base_url: String,
}

impl BookingWorkflow {
    pub fn new(
        store: Arc<dyn BookingStore>,
        payments: Arc<dyn PaymentProvider>,
        mailer: Arc<dyn Mailer>,
        verifier: WebhookVerifier,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            payments,
            mailer,
            verifier,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Opens a hosted checkout for `tour_id` on behalf of `buyer`.
    ///
    /// Nothing is stored: a purchase only becomes a booking once the
    /// provider confirms payment.
    #[instrument(skip(self, buyer), fields(user_id = %buyer.id))]
    pub async fn create_checkout_session(
        &self,
        tour_id: Uuid,
        buyer: &User,
    ) -> Result<CheckoutSession, AppError> {
        let tour = self
            .store
            .find_tour(tour_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Can't find tour for booking!".to_string()))?;

        let request = CheckoutRequest {
            tour_id: tour.id,
            tour_name: tour.name,
            tour_summary: tour.summary,
            image_url: format!("{}/img/tours/{}", self.public_base_url, tour.image_cover),
            price: tour.price,
            customer_email: buyer.email.clone(),
            success_url: format!("{}/my-tours", self.public_base_url),
            cancel_url: format!("{}/tour/{}", self.public_base_url, tour.slug),
        };

        let session = self.payments.create_checkout_session(request).await?;
        info!("Checkout session {} opened for tour {}", session.id, tour_id);
        Ok(session)
    }

    /// Handles a payment-completion callback.
    ///
    /// The signature is checked against the raw body before any field is
    /// read; a failed check stores nothing. Redelivered events are detected
    /// by their provider event id and acknowledged without side effects.
    #[instrument(skip_all)]
    pub async fn handle_payment_completed(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, AppError> {
        let signature = signature.ok_or(WebhookError::MissingSignature)?;
        let event = self.verifier.verify(payload, signature).map_err(|err| {
            warn!("Rejected payment callback: {}", err);
            err
        })?;

        if event.event_type != CHECKOUT_COMPLETED {
            info!("Ignoring payment event {} of type {}", event.id, event.event_type);
            return Ok(WebhookOutcome::Ignored {
                event_type: event.event_type,
            });
        }

        let (state, action) = PurchaseStateMachine::transition(
            PurchaseStateMachine::initial_state(),
            PurchaseEvent::PaymentConfirmed,
        );
        info!("Payment event {}: purchase {} ({})", event.id, state, action);

        let checkout = CompletedCheckout::from_event(&event)?;
        let tour_id = checkout.tour_id()?;
        let price = checkout.price()?;
        let email = checkout.buyer_email()?;

        let buyer = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No user found for {}", email)))?;

        let new_booking = NewBooking {
            tour_id,
            user_id: buyer.id,
            price,
            payment_event_id: Some(event.id.clone()),
        };

        let Some(booking) = self.store.materialize(new_booking).await? else {
            info!("Payment event {} already materialized, skipping", event.id);
            return Ok(WebhookOutcome::Duplicate { event_id: event.id });
        };

        let (state, action) = PurchaseStateMachine::transition(state, PurchaseEvent::BookingRecorded);
        info!("Booking {} recorded: purchase {}", booking.id, state);

        if action == PurchaseAction::SendConfirmation {
            self.send_confirmation(&buyer, &booking).await;
        }

        Ok(WebhookOutcome::Materialized(booking))
    }

    /// Email failures are logged; the booking stands.
    async fn send_confirmation(&self, buyer: &User, booking: &Booking) {
        let tour_name = match self.store.find_tour(booking.tour_id).await {
            Ok(Some(tour)) => tour.name,
            _ => "your tour".to_string(),
        };
        let url = format!("{}/my-tours", self.public_base_url);
        let email = Email::booking_confirmation(buyer, &tour_name, booking.price, &url);

        if let Err(e) = self.mailer.send(&email).await {
            error!("Failed to send booking confirmation for {}: {:#}", booking.id, e);
        }
    }
}
