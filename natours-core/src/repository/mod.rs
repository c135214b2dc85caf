//! Generic data access for the API resources.
//!
//! Each resource describes its table, read source and query allow-list
//! through [`Resource`]; [`Repository`] provides the list, read and delete
//! operations they share. Writes live in the per-resource modules because
//! their column sets and follow-up steps differ.

pub mod bookings;
pub mod reviews;
pub mod tours;
pub mod users;

use std::marker::PhantomData;

use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::query::{FieldSpec, QueryParams, ResourceQuery, Scope};

pub use bookings::Bookings;
pub use reviews::Reviews;
pub use tours::Tours;
pub use users::Users;

/// A persisted entity type exposed through the API.
pub trait Resource: Send + Sync + 'static {
    /// Row type returned by single-record reads
    type Row: for<'r> FromRow<'r, PgRow> + Serialize + Send + Unpin;

    /// Table that owns the records (writes and deletes)
    const TABLE: &'static str;

    /// Relation that reads select from. May be a parenthesized join aliased
    /// to the table name, to expand referenced records.
    const SOURCE: &'static str = Self::TABLE;

    /// Column list matching `Row`
    const COLUMNS: &'static str;

    /// Name used in error messages, e.g. "tour"
    const SINGULAR: &'static str;

    /// Query-string allow-list
    const FIELDS: &'static [FieldSpec];

    /// Predicate every standard read carries
    const BASE_PREDICATE: Option<&'static str> = None;

    /// Column narrowed by the parent id on nested routes
    const PARENT_COLUMN: Option<&'static str> = None;

    const DEFAULT_ORDER: &'static str = "created_at DESC, id";
}

/// Result of a list query.
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub results: usize,
    pub documents: Vec<Value>,
}

/// Shared read and delete operations for one resource type.
pub struct Repository<R> {
    pool: PgPool,
    _resource: PhantomData<fn() -> R>,
}

impl<R> Clone for Repository<R> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _resource: PhantomData,
        }
    }
}

impl<R: Resource> Repository<R> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _resource: PhantomData,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn scope(parent: Option<Uuid>) -> Scope {
        Scope {
            table: R::SOURCE,
            base_predicate: R::BASE_PREDICATE,
            parent: parent.and_then(|id| R::PARENT_COLUMN.map(|column| (column, id))),
            default_order: R::DEFAULT_ORDER,
        }
    }

    /// Runs a filtered, sorted, projected and paginated list query.
    ///
    /// `parent` narrows the listing on nested routes (reviews of one tour).
    #[instrument(skip(self, params), fields(resource = R::TABLE))]
    pub async fn get_all(
        &self,
        params: &QueryParams,
        parent: Option<Uuid>,
    ) -> Result<Listing, AppError> {
        let query = ResourceQuery::new(R::FIELDS, params)
            .filter()?
            .sort()?
            .limit_fields()?
            .paginate();

        let mut builder = query.build_select(&Self::scope(parent));
        let documents: Vec<Value> = builder
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await?;

        Ok(Listing {
            results: documents.len(),
            documents,
        })
    }

    /// Fetches one record by id through the standard read path.
    pub async fn get_one(&self, id: Uuid) -> Result<R::Row, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1{}",
            R::COLUMNS,
            R::SOURCE,
            and_predicate(R::BASE_PREDICATE)
        );

        sqlx::query_as::<_, R::Row>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found::<R>())
    }

    /// Hard-deletes one record. Records hidden from standard reads cannot be
    /// deleted through this path.
    #[instrument(skip(self), fields(resource = R::TABLE))]
    pub async fn delete_one(&self, id: Uuid) -> Result<(), AppError> {
        let sql = format!(
            "DELETE FROM {} WHERE id = $1{}",
            R::TABLE,
            and_predicate(R::BASE_PREDICATE)
        );

        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(still_referenced::<R>)?;
        if result.rows_affected() == 0 {
            return Err(not_found::<R>());
        }

        info!("Deleted {} {}", R::SINGULAR, id);
        Ok(())
    }
}

fn and_predicate(predicate: Option<&str>) -> String {
    predicate
        .map(|p| format!(" AND {}", p))
        .unwrap_or_default()
}

/// A delete blocked by a restricting foreign key (a booked tour) is a
/// client error, not a missing reference.
fn still_referenced<R: Resource>(err: sqlx::Error) -> AppError {
    let restricted = err
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23503");
    if restricted {
        AppError::BadRequest(format!(
            "This {} is still referenced by bookings and cannot be deleted",
            R::SINGULAR
        ))
    } else {
        AppError::from(err)
    }
}

/// "No tour found with that ID"
pub fn not_found<R: Resource>() -> AppError {
    AppError::NotFound(format!("No {} found with that ID", R::SINGULAR))
}
