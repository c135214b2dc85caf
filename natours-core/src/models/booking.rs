use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

/// Booking model: a user paid `price` for a tour.
///
/// `price` is the amount charged at purchase time and does not follow later
/// changes to the tour's price.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub price: Decimal,
    pub paid: bool,

    /// Payment provider event that produced this booking (idempotency key)
    pub payment_event_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Booking joined with the tour name and the buyer's contact details.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BookingDetails {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub tour_name: String,
    pub tour_slug: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub price: Decimal,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert payload shared by the payment webhook and manual creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub price: Decimal,
    pub payment_event_id: Option<String>,
}

/// Manual booking creation by staff
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBooking {
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub price: Decimal,
}

impl CreateBooking {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_price(self.price)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateBooking {
    pub price: Option<Decimal>,
    pub paid: Option<bool>,
}

impl UpdateBooking {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        Ok(())
    }
}

fn validate_price(price: Decimal) -> Result<(), AppError> {
    if price.is_sign_negative() {
        return Err(AppError::Validation("Booking must have a non-negative price".to_string()));
    }
    Ok(())
}
