use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Path};
use axum::http::request::Parts;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::repository::Listing;

/// JSON body whose rejections use the API error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `:id` path segment parsed as a UUID; a malformed id is a cast error.
#[derive(Debug, Clone, Copy)]
pub struct ResourceId(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ResourceId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<Uuid>::from_request_parts(parts, state).await?;
        Ok(ResourceId(id))
    }
}

/// `{ status: "success", data: { data: doc } }`
pub fn document(doc: impl serde::Serialize) -> Json<Value> {
    Json(json!({
        "status": "success",
        "data": { "data": doc }
    }))
}

/// `{ status: "success", results: n, data: { data: [...] } }`
pub fn listing(listing: Listing) -> Json<Value> {
    Json(json!({
        "status": "success",
        "results": listing.results,
        "data": { "data": listing.documents }
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::extract::Request;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use super::*;

    fn router() -> Router {
        Router::new().route(
            "/tours/:id",
            get(|ResourceId(id): ResourceId| async move { id.to_string() }),
        )
    }

    async fn fetch(uri: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_resource_id_parses_uuid() {
        let id = Uuid::new_v4();
        let (status, body) = fetch(&format!("/tours/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, id.to_string());
    }

    #[tokio::test]
    async fn test_malformed_resource_id_is_cast_error() {
        let (status, body) = fetch("/tours/5c88fa8cf4afda39").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Invalid ID"));
    }
}
