use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;
use crate::validation::require_present;

/// Inclusive rating bounds.
pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

/// Review model: a rating and comment bound to one tour and one user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub review: String,
    pub rating: i32,
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Review expanded with its author's public profile.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReviewWithAuthor {
    pub id: Uuid,
    pub review: String,
    pub rating: i32,
    pub created_at: DateTime<Utc>,
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_photo: Option<String>,
}

/// Review creation request. The tour may come from the nested route instead.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReview {
    pub review: String,
    pub rating: i32,
    pub tour_id: Option<Uuid>,
}

impl CreateReview {
    pub fn validate(&self) -> Result<(), AppError> {
        require_present("Review", &self.review)?;
        validate_rating(self.rating)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateReview {
    pub review: Option<String>,
    pub rating: Option<i32>,
}

impl UpdateReview {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(review) = &self.review {
            require_present("Review", review)?;
        }
        if let Some(rating) = self.rating {
            validate_rating(rating)?;
        }
        Ok(())
    }
}

fn validate_rating(rating: i32) -> Result<(), AppError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(AppError::Validation(format!(
            "Rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds_are_inclusive() {
        for rating in [1, 3, 5] {
            let request = CreateReview { review: "Great".into(), rating, tour_id: None };
            assert!(request.validate().is_ok(), "rating {} should be accepted", rating);
        }
        for rating in [0, 6, -1] {
            let request = CreateReview { review: "Great".into(), rating, tour_id: None };
            assert!(request.validate().is_err(), "rating {} should be rejected", rating);
        }
    }

    #[test]
    fn test_empty_review_text_rejected() {
        let update = UpdateReview { review: Some("   ".into()), rating: None };
        assert!(matches!(update.validate(), Err(AppError::Validation(_))));
    }
}
