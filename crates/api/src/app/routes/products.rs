use std::sync::Arc;

use axum::{
    extract::{Extension, Multipart, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use hotelmenu_core::ProductId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequesterContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/compare", get(compare_products))
        .route("/upload-csv", post(upload_csv))
        .route("/:id", get(get_product))
        .route("/:id/archive", post(archive_product))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<RequesterContext>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let input = match body.into_new_product(&services.default_currency) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.catalog.create_product(requester.user_id(), input).await {
        Ok(p) => (StatusCode::CREATED, Json(dto::product_to_json(&p))).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

/// `?hotel=<slug>&product_type=room|food`; both are required for a non-empty list.
/// Optional `search=<terms>` and `ordering=price|-price|name|-name`.
pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<dto::ProductListQuery>,
) -> axum::response::Response {
    match services.catalog.list_products(&q.into_listing()).await {
        Ok(list) => {
            let items: Vec<_> = list.iter().map(dto::product_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::catalog_error_to_response(e),
    }
}

/// Multipart form with the CSV in a `file` field.
pub async fn upload_csv(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<RequesterContext>,
    mut multipart: Multipart,
) -> axum::response::Response {
    let mut data = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => match field.bytes().await {
                Ok(bytes) => {
                    data = Some(bytes);
                    break;
                }
                Err(e) => {
                    return errors::json_error(
                        StatusCode::BAD_REQUEST,
                        "invalid_upload",
                        format!("failed to read file: {e}"),
                    );
                }
            },
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_upload",
                    format!("multipart error: {e}"),
                );
            }
        }
    }

    let Some(data) = data else {
        return errors::json_error(StatusCode::BAD_REQUEST, "file_required", "file required");
    };

    match services
        .catalog
        .import_products_csv(requester.user_id(), &data, &services.default_currency)
        .await
    {
        Ok(summary) => (StatusCode::OK, Json(dto::csv_import_to_json(&summary))).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("product"),
    };

    match services.catalog.get_product(product_id).await {
        Ok(p) => (StatusCode::OK, Json(dto::product_to_json(&p))).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn archive_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<RequesterContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("product"),
    };

    match services
        .catalog
        .archive_product(requester.user_id(), product_id)
        .await
    {
        Ok(p) => (StatusCode::OK, Json(dto::product_to_json(&p))).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn compare_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<dto::CompareQuery>,
) -> axum::response::Response {
    match services
        .catalog
        .compare(q.sku.as_deref(), q.name.as_deref())
        .await
    {
        Ok(list) => {
            let items: Vec<_> = list.iter().map(dto::product_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::catalog_error_to_response(e),
    }
}
