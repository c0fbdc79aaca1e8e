use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn categories_router() -> Router {
    Router::new().route("/", get(list_categories).post(create_category))
}

pub fn canonicals_router() -> Router {
    Router::new().route("/", get(list_canonicals).post(create_canonical))
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateCategoryRequest>,
) -> axum::response::Response {
    match services.catalog.create_category(&body.name, &body.slug).await {
        Ok(c) => (StatusCode::CREATED, Json(dto::category_to_json(&c))).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.catalog.list_categories().await {
        Ok(list) => {
            let items: Vec<_> = list.iter().map(dto::category_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn create_canonical(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateCanonicalRequest>,
) -> axum::response::Response {
    match services
        .catalog
        .create_canonical(&body.name, body.sku, body.normalized_name)
        .await
    {
        Ok(c) => (StatusCode::CREATED, Json(dto::canonical_to_json(&c))).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn list_canonicals(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.catalog.list_canonicals().await {
        Ok(list) => {
            let items: Vec<_> = list.iter().map(dto::canonical_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::catalog_error_to_response(e),
    }
}
