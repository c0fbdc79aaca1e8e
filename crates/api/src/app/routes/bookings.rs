use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use hotelmenu_core::{BookingId, ProductId};
use hotelmenu_infra::BookingRequest;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequesterContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_booking).get(list_bookings))
        .route("/:id", get(get_booking))
        .route("/:id/confirm", post(confirm_booking))
        .route("/:id/cancel", post(cancel_booking))
}

pub async fn create_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<RequesterContext>,
    Json(body): Json<dto::CreateBookingRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match body.product_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("product"),
    };
    let check_in = match dto::parse_date("check_in", Some(&body.check_in)) {
        Ok(d) => d,
        Err(res) => return res,
    };
    let check_out = match dto::parse_date("check_out", Some(&body.check_out)) {
        Ok(d) => d,
        Err(res) => return res,
    };

    let request = BookingRequest {
        product_id,
        check_in,
        check_out,
        party_size: body.party_size.unwrap_or(1),
        requester: requester.user_id(),
        guest_name: body.guest_name.unwrap_or_default().trim().to_string(),
    };

    match services.lifecycle.create_booking(request).await {
        Ok(b) => (StatusCode::CREATED, Json(dto::booking_to_json(&b))).into_response(),
        Err(e) => errors::booking_error_to_response(e),
    }
}

/// Bookings the requester made plus those on hotels they staff.
pub async fn list_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<RequesterContext>,
) -> axum::response::Response {
    match services.lifecycle.list_visible(requester.user_id()).await {
        Ok(list) => {
            let items: Vec<_> = list.iter().map(dto::booking_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::booking_error_to_response(e),
    }
}

pub async fn get_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let booking_id: BookingId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("booking"),
    };

    match services.lifecycle.get_booking(booking_id).await {
        Ok(b) => (StatusCode::OK, Json(dto::booking_to_json(&b))).into_response(),
        Err(e) => errors::booking_error_to_response(e),
    }
}

pub async fn confirm_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let booking_id: BookingId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("booking"),
    };

    match services.lifecycle.confirm_booking(booking_id).await {
        Ok(b) => (StatusCode::OK, Json(dto::booking_to_json(&b))).into_response(),
        Err(e) => errors::booking_error_to_response(e),
    }
}

pub async fn cancel_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let booking_id: BookingId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("booking"),
    };

    match services.lifecycle.cancel_booking(booking_id).await {
        Ok(b) => (StatusCode::OK, Json(dto::booking_to_json(&b))).into_response(),
        Err(e) => errors::booking_error_to_response(e),
    }
}
