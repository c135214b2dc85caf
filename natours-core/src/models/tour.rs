use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use super::review::ReviewWithAuthor;
use crate::error::AppError;
use crate::validation::{require_length, require_present};

/// Difficulty tier of a tour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[sqlx(rename = "easy")]
    Easy,
    #[sqlx(rename = "medium")]
    Medium,
    #[sqlx(rename = "difficult")]
    Difficult,
}

/// Tour model representing a bookable product.
///
/// Maps to the `tours` table. Rating fields are owned by the rating
/// recalculator and never accepted from request bodies.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tour {
    pub id: Uuid,

    /// Unique tour name
    pub name: String,

    /// URL-safe form of the name, regenerated on rename
    pub slug: String,

    /// Length in days
    pub duration: i32,

    pub max_group_size: i32,

    pub difficulty: Difficulty,

    pub ratings_average: f64,

    pub ratings_quantity: i32,

    pub price: Decimal,

    /// Always strictly below `price`
    pub price_discount: Option<Decimal>,

    pub summary: String,

    pub description: Option<String>,

    pub image_cover: String,

    pub images: Vec<String>,

    pub start_dates: Vec<DateTime<Utc>>,

    /// GeoJSON point with address and description
    pub start_location: Option<Value>,

    /// GeoJSON waypoints
    pub locations: Value,

    /// Assigned guide user ids
    pub guides: Vec<Uuid>,

    pub secret_tour: bool,

    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing)]
    pub updated_at: DateTime<Utc>,
}

/// Tour with its reviews expanded, returned by the single-tour read.
#[derive(Debug, Clone, Serialize)]
pub struct TourWithReviews {
    #[serde(flatten)]
    pub tour: Tour,
    pub reviews: Vec<ReviewWithAuthor>,
}

/// Tour creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTour {
    pub name: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub price: Decimal,
    pub price_discount: Option<Decimal>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,
    pub start_location: Option<Value>,
    #[serde(default)]
    pub locations: Option<Value>,
    #[serde(default)]
    pub guides: Vec<Uuid>,
    #[serde(default)]
    pub secret_tour: bool,
}

impl CreateTour {
    pub fn validate(&self) -> Result<(), AppError> {
        require_length("A tour name", &self.name, 10, 40)?;
        require_present("A tour summary", &self.summary)?;
        require_present("A tour image cover", &self.image_cover)?;
        validate_numbers(self.duration, self.max_group_size, self.price, self.price_discount)
    }
}

/// Tour update request (partial)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTour {
    pub name: Option<String>,
    pub duration: Option<i32>,
    pub max_group_size: Option<i32>,
    pub difficulty: Option<Difficulty>,
    pub price: Option<Decimal>,
    pub price_discount: Option<Decimal>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    pub start_location: Option<Value>,
    pub locations: Option<Value>,
    pub guides: Option<Vec<Uuid>>,
    pub secret_tour: Option<bool>,
}

impl UpdateTour {
    /// Merges the update into the stored tour and re-runs validation on the
    /// result, so cross-field rules hold for the record as it will be saved.
    pub fn apply_to(self, mut tour: Tour) -> Result<Tour, AppError> {
        if let Some(name) = self.name {
            require_length("A tour name", &name, 10, 40)?;
            tour.name = name.trim().to_string();
        }
        if let Some(summary) = self.summary {
            require_present("A tour summary", &summary)?;
            tour.summary = summary.trim().to_string();
        }
        if let Some(image_cover) = self.image_cover {
            require_present("A tour image cover", &image_cover)?;
            tour.image_cover = image_cover;
        }
        tour.duration = self.duration.unwrap_or(tour.duration);
        tour.max_group_size = self.max_group_size.unwrap_or(tour.max_group_size);
        tour.difficulty = self.difficulty.unwrap_or(tour.difficulty);
        tour.price = self.price.unwrap_or(tour.price);
        tour.price_discount = self.price_discount.or(tour.price_discount);
        tour.description = self.description.or(tour.description);
        tour.images = self.images.unwrap_or(tour.images);
        tour.start_dates = self.start_dates.unwrap_or(tour.start_dates);
        tour.start_location = self.start_location.or(tour.start_location);
        tour.locations = self.locations.unwrap_or(tour.locations);
        tour.guides = self.guides.unwrap_or(tour.guides);
        tour.secret_tour = self.secret_tour.unwrap_or(tour.secret_tour);

        validate_numbers(tour.duration, tour.max_group_size, tour.price, tour.price_discount)?;
        Ok(tour)
    }
}

fn validate_numbers(
    duration: i32,
    max_group_size: i32,
    price: Decimal,
    price_discount: Option<Decimal>,
) -> Result<(), AppError> {
    if duration <= 0 {
        return Err(AppError::Validation("A tour duration must be positive".to_string()));
    }
    if max_group_size <= 0 {
        return Err(AppError::Validation("A tour group size must be positive".to_string()));
    }
    if price <= Decimal::ZERO {
        return Err(AppError::Validation("A tour price must be positive".to_string()));
    }
    if let Some(discount) = price_discount {
        if discount >= price {
            return Err(AppError::Validation(format!(
                "Discount price ({}) should be below regular price",
                discount
            )));
        }
    }
    Ok(())
}

/// Per-difficulty statistics over well-rated tours.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TourStats {
    pub difficulty: String,
    pub num_tours: i64,
    pub num_ratings: i64,
    pub avg_rating: f64,
    pub avg_price: Decimal,
    pub min_price: Decimal,
    pub max_price: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tour() -> Tour {
        Tour {
            id: Uuid::new_v4(),
            name: "The Forest Hiker".to_string(),
            slug: "the-forest-hiker".to_string(),
            duration: 5,
            max_group_size: 25,
            difficulty: Difficulty::Easy,
            ratings_average: 4.5,
            ratings_quantity: 0,
            price: Decimal::new(397, 0),
            price_discount: None,
            summary: "Breathtaking hike through the Canadian Banff National Park".to_string(),
            description: None,
            image_cover: "tour-1-cover.jpg".to_string(),
            images: vec![],
            start_dates: vec![],
            start_location: None,
            locations: json!([]),
            guides: vec![],
            secret_tour: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_discount_must_be_below_price() {
        let update = UpdateTour {
            price_discount: Some(Decimal::new(397, 0)),
            ..Default::default()
        };
        assert!(matches!(update.apply_to(sample_tour()), Err(AppError::Validation(_))));

        let update = UpdateTour {
            price_discount: Some(Decimal::new(297, 0)),
            ..Default::default()
        };
        let tour = update.apply_to(sample_tour()).unwrap();
        assert_eq!(tour.price_discount, Some(Decimal::new(297, 0)));
    }

    #[test]
    fn test_lowering_price_below_existing_discount_fails() {
        let mut tour = sample_tour();
        tour.price_discount = Some(Decimal::new(200, 0));

        let update = UpdateTour {
            price: Some(Decimal::new(150, 0)),
            ..Default::default()
        };
        assert!(update.apply_to(tour).is_err());
    }

    #[test]
    fn test_create_tour_rejects_short_name() {
        let request: CreateTour = serde_json::from_value(json!({
            "name": "Short",
            "duration": 5,
            "max_group_size": 10,
            "difficulty": "easy",
            "price": 497,
            "summary": "A short tour",
            "image_cover": "cover.jpg"
        }))
        .unwrap();
        assert!(matches!(request.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_rating_fields_are_not_accepted_on_create() {
        let request: CreateTour = serde_json::from_value(json!({
            "name": "The Sea Explorer",
            "duration": 7,
            "max_group_size": 15,
            "difficulty": "medium",
            "price": 497,
            "summary": "Exploring the jaw-dropping US east coast",
            "image_cover": "cover.jpg",
            "ratings_average": 1.0
        }))
        .unwrap();
        assert!(request.validate().is_ok());
        assert!(serde_json::to_value(&request).unwrap().get("ratings_average").is_none());
    }
}
