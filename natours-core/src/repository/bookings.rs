use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{not_found, Repository, Resource, Tours};
use crate::booking::BookingStore;
use crate::error::AppError;
use crate::models::booking::{CreateBooking, UpdateBooking};
use crate::models::{Booking, BookingDetails, NewBooking, Tour, User};
use crate::query::{FieldKind, FieldSpec};

pub struct Bookings;

const BOOKING_COLUMNS: &str = "id, tour_id, user_id, price, paid, payment_event_id, created_at";

impl Resource for Bookings {
    type Row = BookingDetails;
    const TABLE: &'static str = "bookings";
    const SOURCE: &'static str = "(SELECT b.id, b.tour_id, t.name AS tour_name, t.slug AS tour_slug, \
         b.user_id, u.name AS user_name, u.email AS user_email, b.price, b.paid, b.created_at \
         FROM bookings b JOIN tours t ON t.id = b.tour_id JOIN users u ON u.id = b.user_id) AS bookings";
    const COLUMNS: &'static str = "id, tour_id, tour_name, tour_slug, user_id, user_name, \
         user_email, price, paid, created_at";
    const SINGULAR: &'static str = "booking";
    const PARENT_COLUMN: Option<&'static str> = Some("tour_id");
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("id", FieldKind::Uuid).filterable(),
        FieldSpec::new("tour_id", FieldKind::Uuid).filterable(),
        FieldSpec::new("tour_name", FieldKind::Text).filterable().sortable(),
        FieldSpec::new("tour_slug", FieldKind::Text).filterable(),
        FieldSpec::new("user_id", FieldKind::Uuid).filterable(),
        FieldSpec::new("user_name", FieldKind::Text).sortable(),
        FieldSpec::new("user_email", FieldKind::Text).filterable().sortable(),
        FieldSpec::new("price", FieldKind::Decimal).filterable().sortable(),
        FieldSpec::new("paid", FieldKind::Boolean).filterable(),
        FieldSpec::new("created_at", FieldKind::Timestamp).filterable().sortable(),
    ];
}

/// Whether the user holds a paid booking for the tour. Gates review
/// creation.
pub async fn has_paid_booking(pool: &PgPool, user_id: Uuid, tour_id: Uuid) -> Result<bool, AppError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM bookings WHERE user_id = $1 AND tour_id = $2 AND paid = true)",
    )
    .bind(user_id)
    .bind(tour_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Purchase history of one user, newest first.
pub async fn bookings_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<BookingDetails>, AppError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE user_id = $1 ORDER BY created_at DESC, id",
        Bookings::COLUMNS,
        Bookings::SOURCE
    );
    let bookings = sqlx::query_as::<_, BookingDetails>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(bookings)
}

/// Manual booking entered by staff; carries no payment event.
#[instrument(skip(repo, request))]
pub async fn create_booking(
    repo: &Repository<Bookings>,
    request: CreateBooking,
) -> Result<BookingDetails, AppError> {
    request.validate()?;
    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO bookings (tour_id, user_id, price) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(request.tour_id)
    .bind(request.user_id)
    .bind(request.price)
    .fetch_one(repo.pool())
    .await?;

    info!("Created manual booking {}", id);
    repo.get_one(id).await
}

#[instrument(skip(repo, update))]
pub async fn update_booking(
    repo: &Repository<Bookings>,
    id: Uuid,
    update: UpdateBooking,
) -> Result<BookingDetails, AppError> {
    update.validate()?;
    let result = sqlx::query(
        "UPDATE bookings SET price = COALESCE($1, price), paid = COALESCE($2, paid), \
         updated_at = NOW() WHERE id = $3",
    )
    .bind(update.price)
    .bind(update.paid)
    .bind(id)
    .execute(repo.pool())
    .await?;

    if result.rows_affected() == 0 {
        return Err(not_found::<Bookings>());
    }
    repo.get_one(id).await
}

/// Postgres-backed [`BookingStore`].
#[derive(Clone)]
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn find_tour(&self, id: Uuid) -> Result<Option<Tour>, AppError> {
        match Repository::<Tours>::new(self.pool.clone()).get_one(id).await {
            Ok(tour) => Ok(Some(tour)),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, photo, role, password_hash, password_changed_at, \
             password_reset_token, password_reset_expires, active, created_at, updated_at \
             FROM users WHERE email = $1",
        )
        .bind(super::users::normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// One statement: a concurrent redelivery either inserts or conflicts,
    /// never both.
    async fn materialize(&self, booking: NewBooking) -> Result<Option<Booking>, AppError> {
        let sql = format!(
            "INSERT INTO bookings (tour_id, user_id, price, paid, payment_event_id) \
             VALUES ($1, $2, $3, true, $4) \
             ON CONFLICT (payment_event_id) DO NOTHING RETURNING {}",
            BOOKING_COLUMNS
        );
        let inserted = sqlx::query_as::<_, Booking>(&sql)
            .bind(booking.tour_id)
            .bind(booking.user_id)
            .bind(booking.price)
            .bind(&booking.payment_event_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(inserted)
    }
}
