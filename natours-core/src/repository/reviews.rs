use sqlx::PgPool;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{bookings, not_found, Resource, Tours};
use crate::aggregate::recalc_tour_ratings;
use crate::error::AppError;
use crate::models::review::{CreateReview, UpdateReview};
use crate::models::{Review, ReviewWithAuthor, Role, User};
use crate::query::{FieldKind, FieldSpec};

pub struct Reviews;

const REVIEW_COLUMNS: &str = "id, review, rating, tour_id, user_id, created_at";

impl Resource for Reviews {
    type Row = ReviewWithAuthor;
    const TABLE: &'static str = "reviews";
    const SOURCE: &'static str = "(SELECT r.id, r.review, r.rating, r.created_at, r.tour_id, \
         r.user_id, u.name AS user_name, u.photo AS user_photo \
         FROM reviews r JOIN users u ON u.id = r.user_id) AS reviews";
    const COLUMNS: &'static str =
        "id, review, rating, created_at, tour_id, user_id, user_name, user_photo";
    const SINGULAR: &'static str = "review";
    const PARENT_COLUMN: Option<&'static str> = Some("tour_id");
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("id", FieldKind::Uuid).filterable(),
        FieldSpec::new("review", FieldKind::Text),
        FieldSpec::new("rating", FieldKind::Integer).filterable().sortable(),
        FieldSpec::new("created_at", FieldKind::Timestamp).filterable().sortable(),
        FieldSpec::new("tour_id", FieldKind::Uuid).filterable(),
        FieldSpec::new("user_id", FieldKind::Uuid).filterable(),
        FieldSpec::new("user_name", FieldKind::Text),
        FieldSpec::new("user_photo", FieldKind::Text),
    ];
}

/// Reviews of one tour with author names, newest first.
pub async fn reviews_for_tour(
    pool: &PgPool,
    tour_id: Uuid,
) -> Result<Vec<ReviewWithAuthor>, AppError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE tour_id = $1 ORDER BY created_at DESC, id",
        Reviews::COLUMNS,
        Reviews::SOURCE
    );
    let reviews = sqlx::query_as::<_, ReviewWithAuthor>(&sql)
        .bind(tour_id)
        .fetch_all(pool)
        .await?;
    Ok(reviews)
}

/// Creates a review for a tour the author has a paid booking for, then
/// refreshes the tour's rating summary.
#[instrument(skip(pool, author, request), fields(user_id = %author.id))]
pub async fn create_review(
    pool: &PgPool,
    tour_id: Uuid,
    author: &User,
    request: CreateReview,
) -> Result<Review, AppError> {
    request.validate()?;

    let tour_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tours WHERE id = $1)")
        .bind(tour_id)
        .fetch_one(pool)
        .await?;
    if !tour_exists {
        return Err(not_found::<Tours>());
    }

    if !bookings::has_paid_booking(pool, author.id, tour_id).await? {
        warn!("User {} tried to review unbooked tour {}", author.id, tour_id);
        return Err(AppError::Forbidden(
            "You can only review tours you have booked".to_string(),
        ));
    }

    let sql = format!(
        "INSERT INTO reviews (review, rating, tour_id, user_id) VALUES ($1, $2, $3, $4) RETURNING {}",
        REVIEW_COLUMNS
    );
    let review = sqlx::query_as::<_, Review>(&sql)
        .bind(request.review.trim())
        .bind(request.rating)
        .bind(tour_id)
        .bind(author.id)
        .fetch_one(pool)
        .await?;

    info!("Created review {} for tour {}", review.id, tour_id);
    recalc_tour_ratings(pool, tour_id).await?;
    Ok(review)
}

#[instrument(skip(pool, actor, update), fields(user_id = %actor.id))]
pub async fn update_review(
    pool: &PgPool,
    id: Uuid,
    actor: &User,
    update: UpdateReview,
) -> Result<Review, AppError> {
    update.validate()?;

    let existing = find_review(pool, id).await?;
    ensure_can_modify(&existing, actor)?;

    let sql = format!(
        "UPDATE reviews SET review = COALESCE($1, review), rating = COALESCE($2, rating), \
         updated_at = NOW() WHERE id = $3 RETURNING {}",
        REVIEW_COLUMNS
    );
    let review = sqlx::query_as::<_, Review>(&sql)
        .bind(update.review.as_deref().map(str::trim))
        .bind(update.rating)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(not_found::<Reviews>)?;

    recalc_tour_ratings(pool, existing.tour_id).await?;
    Ok(review)
}

/// Deletes a review. The owning tour is read before the row goes away so
/// its summary can be recomputed afterwards.
#[instrument(skip(pool, actor), fields(user_id = %actor.id))]
pub async fn delete_review(pool: &PgPool, id: Uuid, actor: &User) -> Result<(), AppError> {
    let existing = find_review(pool, id).await?;
    ensure_can_modify(&existing, actor)?;

    let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(not_found::<Reviews>());
    }

    info!("Deleted review {} of tour {}", id, existing.tour_id);
    recalc_tour_ratings(pool, existing.tour_id).await?;
    Ok(())
}

async fn find_review(pool: &PgPool, id: Uuid) -> Result<Review, AppError> {
    let sql = format!("SELECT {} FROM reviews WHERE id = $1", REVIEW_COLUMNS);
    sqlx::query_as::<_, Review>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(not_found::<Reviews>)
}

/// Admins may change any review; everyone else only their own.
pub fn ensure_can_modify(review: &Review, actor: &User) -> Result<(), AppError> {
    if actor.role == Role::Admin || review.user_id == actor.id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You can only modify your own reviews".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Lourdes Browning".to_string(),
            email: "lourdes@example.com".to_string(),
            photo: None,
            role,
            password_hash: String::new(),
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn review_by(author: &User) -> Review {
        Review {
            id: Uuid::new_v4(),
            review: "Amazing".to_string(),
            rating: 5,
            tour_id: Uuid::new_v4(),
            user_id: author.id,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_can_modify() {
        let author = user(Role::User);
        assert!(ensure_can_modify(&review_by(&author), &author).is_ok());
    }

    #[test]
    fn test_other_user_cannot_modify() {
        let author = user(Role::User);
        let other = user(Role::User);
        assert!(matches!(
            ensure_can_modify(&review_by(&author), &other),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_admin_can_modify_any_review() {
        let author = user(Role::User);
        let admin = user(Role::Admin);
        assert!(ensure_can_modify(&review_by(&author), &admin).is_ok());
    }

    #[test]
    fn test_nested_listing_narrows_by_tour() {
        assert_eq!(Reviews::PARENT_COLUMN, Some("tour_id"));
    }
}
