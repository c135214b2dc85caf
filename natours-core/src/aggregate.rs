use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;

/// Rating shown for a tour with no reviews.
pub const DEFAULT_RATING: f64 = 4.5;
pub const MIN_AVERAGE: f64 = 1.0;
pub const MAX_AVERAGE: f64 = 5.0;

/// Denormalized rating summary stored on a tour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingStats {
    pub quantity: i32,
    pub average: f64,
}

impl RatingStats {
    /// Builds the summary from a `COUNT`/`AVG` pair.
    ///
    /// No reviews resets to the default rating. Otherwise the mean is
    /// clamped to the rating bounds and rounded to one decimal place.
    pub fn from_aggregate(count: i64, mean: Option<f64>) -> Self {
        match mean {
            Some(mean) if count > 0 => RatingStats {
                quantity: i32::try_from(count).unwrap_or(i32::MAX),
                average: (mean.clamp(MIN_AVERAGE, MAX_AVERAGE) * 10.0).round() / 10.0,
            },
            _ => RatingStats {
                quantity: 0,
                average: DEFAULT_RATING,
            },
        }
    }
}

/// Recomputes a tour's rating summary from its current reviews.
///
/// Runs after every review create, update and delete. The write is a single
/// row update, so concurrent recalculations converge on the last committed
/// review set.
#[instrument(skip(pool))]
pub async fn recalc_tour_ratings(pool: &PgPool, tour_id: Uuid) -> Result<RatingStats, AppError> {
    let (count, mean): (i64, Option<f64>) = sqlx::query_as(
        "SELECT COUNT(*), AVG(rating)::FLOAT8 FROM reviews WHERE tour_id = $1",
    )
    .bind(tour_id)
    .fetch_one(pool)
    .await?;

    let stats = RatingStats::from_aggregate(count, mean);

    sqlx::query(
        "UPDATE tours SET ratings_quantity = $1, ratings_average = $2, updated_at = NOW() WHERE id = $3",
    )
    .bind(stats.quantity)
    .bind(stats.average)
    .bind(tour_id)
    .execute(pool)
    .await?;

    info!(
        "Tour {} ratings recalculated: {} reviews, average {}",
        tour_id, stats.quantity, stats.average
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_reviews_resets_to_default() {
        assert_eq!(
            RatingStats::from_aggregate(0, None),
            RatingStats { quantity: 0, average: 4.5 }
        );
    }

    #[test]
    fn test_average_is_rounded_to_one_decimal() {
        // 4, 5, 5 -> 4.666...
        let stats = RatingStats::from_aggregate(3, Some(14.0 / 3.0));
        assert_eq!(stats, RatingStats { quantity: 3, average: 4.7 });

        let stats = RatingStats::from_aggregate(2, Some(4.25));
        assert_eq!(stats.average, 4.3);
    }

    #[test]
    fn test_average_is_clamped() {
        assert_eq!(RatingStats::from_aggregate(1, Some(0.2)).average, 1.0);
        assert_eq!(RatingStats::from_aggregate(1, Some(7.0)).average, 5.0);
    }

    #[test]
    fn test_single_review() {
        let stats = RatingStats::from_aggregate(1, Some(4.0));
        assert_eq!(stats, RatingStats { quantity: 1, average: 4.0 });
    }
}
