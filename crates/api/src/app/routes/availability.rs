use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use hotelmenu_core::ProductId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", get(check_availability))
}

/// `?product=<id>&check_in=YYYY-MM-DD&check_out=YYYY-MM-DD`.
///
/// Advisory only: a `true` answer does not hold the room.
pub async fn check_availability(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<dto::AvailabilityQuery>,
) -> axum::response::Response {
    let product_id: ProductId = match q.product.as_deref().map(str::parse::<ProductId>) {
        Some(Ok(v)) => v,
        Some(Err(_)) => return errors::invalid_id("product"),
        None => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "missing_parameter",
                "product is required",
            );
        }
    };
    let check_in = match dto::parse_date("check_in", q.check_in.as_deref()) {
        Ok(d) => d,
        Err(res) => return res,
    };
    let check_out = match dto::parse_date("check_out", q.check_out.as_deref()) {
        Ok(d) => d,
        Err(res) => return res,
    };

    match services
        .oracle
        .is_available(product_id, check_in, check_out)
        .await
    {
        Ok(available) => (
            StatusCode::OK,
            Json(serde_json::json!({ "available": available })),
        )
            .into_response(),
        Err(e) => errors::booking_error_to_response(e),
    }
}
