use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use hotelmenu_catalog::NewHotel;
use hotelmenu_core::{HotelId, UserId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequesterContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_hotels).post(create_hotel))
        .route("/:id", get(get_hotel))
        .route("/:id/members", get(list_members).post(add_member))
}

pub async fn create_hotel(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewHotel>,
) -> axum::response::Response {
    match services.catalog.create_hotel(body).await {
        Ok(hotel) => (StatusCode::CREATED, Json(dto::hotel_to_json(&hotel))).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn list_hotels(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.catalog.list_hotels().await {
        Ok(hotels) => {
            let items: Vec<_> = hotels.iter().map(dto::hotel_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::catalog_error_to_response(e),
    }
}

/// Accepts either the hotel id or its slug.
pub async fn get_hotel(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let found = match id.parse::<HotelId>() {
        Ok(hotel_id) => services.catalog.get_hotel(hotel_id).await,
        Err(_) => services.catalog.get_hotel_by_slug(&id).await,
    };
    match found {
        Ok(hotel) => (StatusCode::OK, Json(dto::hotel_to_json(&hotel))).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn add_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<RequesterContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddMemberRequest>,
) -> axum::response::Response {
    let hotel_id: HotelId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("hotel"),
    };
    let user_id: UserId = match body.user_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("user"),
    };

    match services
        .catalog
        .add_member(requester.user_id(), hotel_id, user_id, body.is_manager)
        .await
    {
        Ok(m) => (StatusCode::CREATED, Json(dto::membership_to_json(&m))).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn list_members(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let hotel_id: HotelId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("hotel"),
    };

    match services.catalog.list_members(hotel_id).await {
        Ok(members) => {
            let items: Vec<_> = members.iter().map(dto::membership_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::catalog_error_to_response(e),
    }
}
