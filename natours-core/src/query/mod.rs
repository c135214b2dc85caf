//! List queries driven by the request's query string: filtering, sorting,
//! field selection and pagination over an allow-list of fields.

pub mod builder;
pub mod fields;
pub mod params;

pub use builder::{Page, Projection, ResourceQuery, Scope, SortKey};
pub use fields::{FieldKind, FieldSpec, FieldValue};
pub use params::{FilterOp, QueryParams};
