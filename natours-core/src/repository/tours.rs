use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{not_found, reviews, Repository, Resource};
use crate::error::AppError;
use crate::models::tour::{CreateTour, UpdateTour};
use crate::models::{Tour, TourStats, TourWithReviews};
use crate::query::{FieldKind, FieldSpec};

pub struct Tours;

const COLUMNS: &str = "id, name, slug, duration, max_group_size, difficulty, ratings_average, \
     ratings_quantity, price, price_discount, summary, description, image_cover, images, \
     start_dates, start_location, locations, guides, secret_tour, created_at, updated_at";

impl Resource for Tours {
    type Row = Tour;
    const TABLE: &'static str = "tours";
    const COLUMNS: &'static str = COLUMNS;
    const SINGULAR: &'static str = "tour";
    const BASE_PREDICATE: Option<&'static str> = Some("secret_tour = false");
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("id", FieldKind::Uuid).filterable(),
        FieldSpec::new("name", FieldKind::Text).filterable().sortable(),
        FieldSpec::new("slug", FieldKind::Text).filterable(),
        FieldSpec::new("duration", FieldKind::Integer).filterable().sortable(),
        FieldSpec::new("max_group_size", FieldKind::Integer).filterable().sortable(),
        FieldSpec::new("difficulty", FieldKind::Text).filterable().sortable(),
        FieldSpec::new("ratings_average", FieldKind::Float).filterable().sortable(),
        FieldSpec::new("ratings_quantity", FieldKind::Integer).filterable().sortable(),
        FieldSpec::new("price", FieldKind::Decimal).filterable().sortable(),
        FieldSpec::new("price_discount", FieldKind::Decimal).filterable().sortable(),
        FieldSpec::new("summary", FieldKind::Text),
        FieldSpec::new("description", FieldKind::Text),
        FieldSpec::new("image_cover", FieldKind::Text),
        FieldSpec::new("images", FieldKind::Document),
        FieldSpec::new("start_dates", FieldKind::Document),
        FieldSpec::new("start_location", FieldKind::Document),
        FieldSpec::new("locations", FieldKind::Document),
        FieldSpec::new("guides", FieldKind::Document),
        FieldSpec::new("secret_tour", FieldKind::Boolean),
        FieldSpec::new("created_at", FieldKind::Timestamp).sortable().internal(),
        FieldSpec::new("updated_at", FieldKind::Timestamp).internal(),
    ];
}

/// URL-safe form of a tour name: lowercase ASCII alphanumerics separated by
/// single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Single-tour read with its reviews expanded.
pub async fn get_tour(repo: &Repository<Tours>, id: Uuid) -> Result<TourWithReviews, AppError> {
    let tour = repo.get_one(id).await?;
    let reviews = reviews::reviews_for_tour(repo.pool(), id).await?;
    Ok(TourWithReviews { tour, reviews })
}

/// Validates and inserts a tour. Rating fields start at their defaults.
#[instrument(skip(pool, request), fields(name = %request.name))]
pub async fn create_tour(pool: &PgPool, request: CreateTour) -> Result<Tour, AppError> {
    request.validate()?;
    let name = request.name.trim().to_string();
    let slug = slugify(&name);

    let sql = format!(
        "INSERT INTO tours (name, slug, duration, max_group_size, difficulty, price, \
         price_discount, summary, description, image_cover, images, start_dates, \
         start_location, locations, guides, secret_tour) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
         RETURNING {}",
        COLUMNS
    );

    let tour = sqlx::query_as::<_, Tour>(&sql)
        .bind(&name)
        .bind(&slug)
        .bind(request.duration)
        .bind(request.max_group_size)
        .bind(request.difficulty)
        .bind(request.price)
        .bind(request.price_discount)
        .bind(request.summary.trim())
        .bind(request.description.as_deref().map(str::trim))
        .bind(&request.image_cover)
        .bind(&request.images)
        .bind(&request.start_dates)
        .bind(&request.start_location)
        .bind(request.locations.unwrap_or_else(|| serde_json::json!([])))
        .bind(&request.guides)
        .bind(request.secret_tour)
        .fetch_one(pool)
        .await?;

    info!("Created tour {} ({})", tour.id, tour.slug);
    Ok(tour)
}

/// Applies a partial update. The merged record is validated as a whole and
/// the slug follows the name.
#[instrument(skip(repo, update))]
pub async fn update_tour(
    repo: &Repository<Tours>,
    id: Uuid,
    update: UpdateTour,
) -> Result<Tour, AppError> {
    let current = repo.get_one(id).await?;
    let renamed = update.name.is_some();
    let mut tour = update.apply_to(current)?;
    if renamed {
        tour.slug = slugify(&tour.name);
    }

    let sql = format!(
        "UPDATE tours SET name = $1, slug = $2, duration = $3, max_group_size = $4, \
         difficulty = $5, price = $6, price_discount = $7, summary = $8, description = $9, \
         image_cover = $10, images = $11, start_dates = $12, start_location = $13, \
         locations = $14, guides = $15, secret_tour = $16, updated_at = NOW() \
         WHERE id = $17 RETURNING {}",
        COLUMNS
    );

    let updated = sqlx::query_as::<_, Tour>(&sql)
        .bind(&tour.name)
        .bind(&tour.slug)
        .bind(tour.duration)
        .bind(tour.max_group_size)
        .bind(tour.difficulty)
        .bind(tour.price)
        .bind(tour.price_discount)
        .bind(&tour.summary)
        .bind(&tour.description)
        .bind(&tour.image_cover)
        .bind(&tour.images)
        .bind(&tour.start_dates)
        .bind(&tour.start_location)
        .bind(&tour.locations)
        .bind(&tour.guides)
        .bind(tour.secret_tour)
        .bind(id)
        .fetch_optional(repo.pool())
        .await?
        .ok_or_else(not_found::<Tours>)?;

    info!("Updated tour {}", id);
    Ok(updated)
}

/// Per-difficulty statistics over tours rated 4.5 and above.
pub async fn tour_stats(pool: &PgPool) -> Result<Vec<TourStats>, AppError> {
    let stats = sqlx::query_as::<_, TourStats>(
        r#"
        SELECT
            UPPER(difficulty) AS difficulty,
            COUNT(*) AS num_tours,
            COALESCE(SUM(ratings_quantity), 0)::BIGINT AS num_ratings,
            AVG(ratings_average)::FLOAT8 AS avg_rating,
            ROUND(AVG(price), 2) AS avg_price,
            MIN(price) AS min_price,
            MAX(price) AS max_price
        FROM tours
        WHERE secret_tour = false AND ratings_average >= 4.5
        GROUP BY difficulty
        ORDER BY avg_price
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(stats)
}
