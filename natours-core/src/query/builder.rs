use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::fields::{lookup, FieldSpec, FieldValue};
use super::params::{split_operator, FilterOp, QueryParams};
use crate::error::AppError;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;
/// Highest page whose offset still fits a Postgres `bigint`.
pub const MAX_PAGE: i64 = i64::MAX / MAX_LIMIT;

/// One constraint on a column. Several equality values are OR-ed.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: &'static str,
    pub op: FilterOp,
    pub values: Vec<FieldValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: &'static str,
    pub descending: bool,
}

/// Which columns end up in each returned document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Every field except internal bookkeeping ones
    Default,
    /// `id` plus the requested fields, in request order
    Only(Vec<&'static str>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    pub fn skip(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Where a query runs: table, always-on predicate and optional parent.
#[derive(Debug, Clone, Copy)]
pub struct Scope {
    pub table: &'static str,
    pub base_predicate: Option<&'static str>,
    pub parent: Option<(&'static str, Uuid)>,
    pub default_order: &'static str,
}

/// A validated, bounded list query built from request parameters.
///
/// Built in stages (`filter`, `sort`, `limit_fields`, `paginate`). Each
/// stage only reads the parameters it owns, so stages are independent and
/// the result does not depend on which optional parameters were sent.
/// Nothing is executed here; [`ResourceQuery::build_select`] renders SQL
/// for the caller to run.
#[derive(Debug, Clone)]
pub struct ResourceQuery<'p> {
    fields: &'static [FieldSpec],
    params: &'p QueryParams,
    filters: Vec<Filter>,
    sort: Vec<SortKey>,
    projection: Projection,
    page: Page,
}

impl<'p> ResourceQuery<'p> {
    pub fn new(fields: &'static [FieldSpec], params: &'p QueryParams) -> Self {
        Self {
            fields,
            params,
            filters: Vec::new(),
            sort: Vec::new(),
            projection: Projection::Default,
            page: Page::default(),
        }
    }

    /// Turns every non-reserved parameter into a typed constraint.
    ///
    /// Keys outside the resource's filterable allow-list are rejected.
    pub fn filter(mut self) -> Result<Self, AppError> {
        for (key, raw) in self.params.filter_pairs() {
            let (name, op) = split_operator(key)?;
            let spec = lookup(self.fields, name)
                .filter(|spec| spec.filterable)
                .ok_or_else(|| AppError::Cast(format!("Cannot filter on field: {}", name)))?;

            if op != FilterOp::Eq && !spec.kind.is_ordered() {
                return Err(AppError::Cast(format!(
                    "Range filters are not supported on field: {}",
                    name
                )));
            }

            let value = FieldValue::parse(spec, raw)?;
            let existing = self
                .filters
                .iter_mut()
                .find(|f| op == FilterOp::Eq && f.op == FilterOp::Eq && f.field == spec.name);

            match existing {
                Some(filter) => filter.values.push(value),
                None => self.filters.push(Filter {
                    field: spec.name,
                    op,
                    values: vec![value],
                }),
            }
        }
        Ok(self)
    }

    /// Parses `sort=-price,ratings_average`; a leading `-` means descending.
    pub fn sort(mut self) -> Result<Self, AppError> {
        let Some(raw) = self.params.get("sort") else {
            return Ok(self);
        };

        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, descending) = match part.strip_prefix('-') {
                Some(name) => (name, true),
                None => (part, false),
            };
            let spec = lookup(self.fields, name)
                .filter(|spec| spec.sortable)
                .ok_or_else(|| AppError::Cast(format!("Cannot sort on field: {}", name)))?;

            if !self.sort.iter().any(|key| key.field == spec.name) {
                self.sort.push(SortKey {
                    field: spec.name,
                    descending,
                });
            }
        }
        Ok(self)
    }

    /// Parses `fields=name,price` into an explicit projection.
    pub fn limit_fields(mut self) -> Result<Self, AppError> {
        let Some(raw) = self.params.get("fields") else {
            return Ok(self);
        };

        let mut selected = vec!["id"];
        for name in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let spec = lookup(self.fields, name)
                .ok_or_else(|| AppError::Cast(format!("Unknown field: {}", name)))?;
            if !selected.contains(&spec.name) {
                selected.push(spec.name);
            }
        }
        self.projection = Projection::Only(selected);
        Ok(self)
    }

    /// Reads `page` (1-based) and `limit`; unusable values fall back to the
    /// defaults and `limit` is capped.
    pub fn paginate(mut self) -> Self {
        let read = |key: &str, default: i64| {
            self.params
                .get(key)
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|v| *v >= 1)
                .unwrap_or(default)
        };
        self.page = Page {
            page: read("page", DEFAULT_PAGE).min(MAX_PAGE),
            limit: read("limit", DEFAULT_LIMIT).min(MAX_LIMIT),
        };
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn page(&self) -> Page {
        self.page
    }

    fn projected_fields(&self) -> Vec<&'static str> {
        match &self.projection {
            Projection::Default => self
                .fields
                .iter()
                .filter(|spec| !spec.internal)
                .map(|spec| spec.name)
                .collect(),
            Projection::Only(fields) => fields.clone(),
        }
    }

    /// Renders the query as a single `SELECT` returning one JSON document
    /// per row in the `doc` column.
    ///
    /// Every value is bound as a parameter; identifiers come only from the
    /// static allow-list.
    pub fn build_select(&self, scope: &Scope) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT jsonb_build_object(");
        for (i, name) in self.projected_fields().into_iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(format!("'{name}', {name}"));
        }
        qb.push(") AS doc FROM ");
        qb.push(scope.table);

        self.push_where(&mut qb, scope);

        qb.push(" ORDER BY ");
        if self.sort.is_empty() {
            qb.push(scope.default_order);
        } else {
            for (i, key) in self.sort.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                qb.push(key.field);
                if key.descending {
                    qb.push(" DESC");
                }
            }
            if !self.sort.iter().any(|key| key.field == "id") {
                qb.push(", id");
            }
        }

        qb.push(" LIMIT ");
        qb.push_bind(self.page.limit);
        qb.push(" OFFSET ");
        qb.push_bind(self.page.skip());
        qb
    }

    fn push_where(&self, qb: &mut QueryBuilder<'static, Postgres>, scope: &Scope) {
        let mut separator = " WHERE ";

        if let Some(predicate) = scope.base_predicate {
            qb.push(separator);
            qb.push(predicate);
            separator = " AND ";
        }

        if let Some((column, parent_id)) = scope.parent {
            qb.push(separator);
            qb.push(column);
            qb.push(" = ");
            qb.push_bind(parent_id);
            separator = " AND ";
        }

        for filter in &self.filters {
            qb.push(separator);
            separator = " AND ";

            let grouped = filter.values.len() > 1;
            if grouped {
                qb.push("(");
            }
            for (i, value) in filter.values.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push(filter.field);
                qb.push(" ");
                qb.push(filter.op.as_sql());
                qb.push(" ");
                push_value(qb, value);
            }
            if grouped {
                qb.push(")");
            }
        }
    }
}

fn push_value(qb: &mut QueryBuilder<'static, Postgres>, value: &FieldValue) {
    match value {
        FieldValue::Text(v) => qb.push_bind(v.clone()),
        FieldValue::Integer(v) => qb.push_bind(*v),
        FieldValue::Float(v) => qb.push_bind(*v),
        FieldValue::Decimal(v) => qb.push_bind(*v),
        FieldValue::Boolean(v) => qb.push_bind(*v),
        FieldValue::Timestamp(v) => qb.push_bind(*v),
        FieldValue::Uuid(v) => qb.push_bind(*v),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::fields::FieldKind;
    use rust_decimal::Decimal;

    const FIELDS: &[FieldSpec] = &[
        FieldSpec::new("id", FieldKind::Uuid).filterable().sortable(),
        FieldSpec::new("name", FieldKind::Text).filterable().sortable(),
        FieldSpec::new("difficulty", FieldKind::Text).filterable(),
        FieldSpec::new("price", FieldKind::Decimal).filterable().sortable(),
        FieldSpec::new("summary", FieldKind::Text),
        FieldSpec::new("created_at", FieldKind::Timestamp).sortable().internal(),
    ];

    const SCOPE: Scope = Scope {
        table: "tours",
        base_predicate: Some("secret_tour = false"),
        parent: None,
        default_order: "created_at DESC, id",
    };

    fn params(query: &[(&str, &str)]) -> QueryParams {
        QueryParams::from_pairs(query.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    fn build(p: &QueryParams) -> Result<ResourceQuery<'_>, AppError> {
        Ok(ResourceQuery::new(FIELDS, p)
            .filter()?
            .sort()?
            .limit_fields()?
            .paginate())
    }

    #[test]
    fn test_filter_maps_keys_to_constraints() {
        let p = params(&[("price[gte]", "500"), ("difficulty", "easy"), ("page", "2")]);
        let query = build(&p).unwrap();

        assert_eq!(
            query.filters(),
            &[
                Filter {
                    field: "price",
                    op: FilterOp::Gte,
                    values: vec![FieldValue::Decimal(Decimal::new(500, 0))],
                },
                Filter {
                    field: "difficulty",
                    op: FilterOp::Eq,
                    values: vec![FieldValue::Text("easy".into())],
                },
            ]
        );
    }

    #[test]
    fn test_reserved_keys_never_become_constraints() {
        let p = params(&[("page", "1"), ("sort", "name"), ("limit", "3"), ("fields", "name")]);
        let query = build(&p).unwrap();
        assert!(query.filters().is_empty());
    }

    #[test]
    fn test_unlisted_field_is_rejected() {
        let p = params(&[("password_hash", "x")]);
        assert!(matches!(build(&p), Err(AppError::Cast(_))));

        let p = params(&[("summary", "x")]);
        assert!(matches!(build(&p), Err(AppError::Cast(_))));
    }

    #[test]
    fn test_range_on_text_field_is_rejected() {
        let p = params(&[("name[gt]", "a")]);
        assert!(matches!(build(&p), Err(AppError::Cast(_))));
    }

    #[test]
    fn test_repeated_equality_is_grouped() {
        let p = params(&[("difficulty", "easy"), ("difficulty", "medium")]);
        let query = build(&p).unwrap();
        assert_eq!(query.filters().len(), 1);
        assert_eq!(query.filters()[0].values.len(), 2);

        let sql = query.build_select(&SCOPE).into_sql();
        assert!(sql.contains("(difficulty = $1 OR difficulty = $2)"));
    }

    #[test]
    fn test_sort_parsing() {
        let p = params(&[("sort", "-price,name")]);
        let query = build(&p).unwrap();
        assert_eq!(
            query.sort_keys(),
            &[
                SortKey { field: "price", descending: true },
                SortKey { field: "name", descending: false },
            ]
        );

        let p = params(&[("sort", "summary")]);
        assert!(matches!(build(&p), Err(AppError::Cast(_))));
    }

    #[test]
    fn test_projection() {
        let p = params(&[]);
        let query = build(&p).unwrap();
        assert_eq!(query.projection(), &Projection::Default);
        assert_eq!(
            query.projected_fields(),
            vec!["id", "name", "difficulty", "price", "summary"]
        );

        let p = params(&[("fields", "name,price,name")]);
        let query = build(&p).unwrap();
        assert_eq!(query.projection(), &Projection::Only(vec!["id", "name", "price"]));

        let p = params(&[("fields", "name,secret")]);
        assert!(matches!(build(&p), Err(AppError::Cast(_))));
    }

    #[test]
    fn test_pagination_window() {
        let p = params(&[("page", "2"), ("limit", "5")]);
        let query = build(&p).unwrap();
        assert_eq!(query.page(), Page { page: 2, limit: 5 });
        assert_eq!(query.page().skip(), 5);

        let p = params(&[]);
        let query = build(&p).unwrap();
        assert_eq!(query.page(), Page { page: 1, limit: 10 });
        assert_eq!(query.page().skip(), 0);
    }

    #[test]
    fn test_pagination_falls_back_on_bad_input() {
        let p = params(&[("page", "0"), ("limit", "abc")]);
        let query = build(&p).unwrap();
        assert_eq!(query.page(), Page::default());

        let p = params(&[("limit", "5000")]);
        let query = build(&p).unwrap();
        assert_eq!(query.page().limit, MAX_LIMIT);
    }

    #[test]
    fn test_huge_page_is_capped() {
        let p = params(&[("page", "9223372036854775807"), ("limit", "100")]);
        let query = build(&p).unwrap();
        assert_eq!(query.page().page, MAX_PAGE);
        assert!(query.page().skip() > 0);

        let p = params(&[("page", "9223372036854775807")]);
        let query = build(&p).unwrap();
        assert!(query.page().skip() > 0);
    }

    #[test]
    fn test_build_select_sql() {
        let p = params(&[
            ("price[gte]", "500"),
            ("sort", "-price"),
            ("limit", "2"),
            ("page", "1"),
            ("fields", "name,price"),
        ]);
        let query = build(&p).unwrap();
        let sql = query.build_select(&SCOPE).into_sql();

        assert_eq!(
            sql,
            "SELECT jsonb_build_object('id', id, 'name', name, 'price', price) AS doc \
             FROM tours WHERE secret_tour = false AND price >= $1 \
             ORDER BY price DESC, id LIMIT $2 OFFSET $3"
        );
    }

    #[test]
    fn test_build_select_default_order_and_parent() {
        let parent = Uuid::new_v4();
        let scope = Scope {
            table: "reviews",
            base_predicate: None,
            parent: Some(("tour_id", parent)),
            default_order: "created_at DESC, id",
        };
        let p = params(&[("fields", "name")]);
        let sql = build(&p).unwrap().build_select(&scope).into_sql();

        assert_eq!(
            sql,
            "SELECT jsonb_build_object('id', id, 'name', name) AS doc FROM reviews \
             WHERE tour_id = $1 ORDER BY created_at DESC, id LIMIT $2 OFFSET $3"
        );
    }

    #[test]
    fn test_stage_order_is_independent_of_parameter_order() {
        let a = params(&[("limit", "2"), ("price[lt]", "900"), ("sort", "name")]);
        let b = params(&[("sort", "name"), ("price[lt]", "900"), ("limit", "2")]);

        let sql_a = build(&a).unwrap().build_select(&SCOPE).into_sql();
        let sql_b = build(&b).unwrap().build_select(&SCOPE).into_sql();
        assert_eq!(sql_a, sql_b);
    }
}
