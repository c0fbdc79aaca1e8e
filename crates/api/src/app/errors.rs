use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use hotelmenu_core::DomainError;
use hotelmenu_infra::{BookingError, CatalogError, StoreError};

pub fn booking_error_to_response(err: BookingError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        BookingError::InvalidDateRange { .. } => {
            json_error(StatusCode::BAD_REQUEST, "invalid_date_range", message)
        }
        BookingError::InvalidPartySize(_) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_party_size", message)
        }
        BookingError::ProductNotFound(_) => json_error(StatusCode::NOT_FOUND, "product_not_found", message),
        BookingError::BookingNotFound(_) => json_error(StatusCode::NOT_FOUND, "booking_not_found", message),
        BookingError::NotBookable { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "not_bookable", message)
        }
        BookingError::TotalOutOfRange(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "total_out_of_range", message)
        }
        BookingError::NoUnitsAvailable(_) => json_error(StatusCode::CONFLICT, "no_units_available", message),
        BookingError::DatesUnavailable(_) => json_error(StatusCode::CONFLICT, "dates_unavailable", message),
        BookingError::InvalidTransition { .. } => {
            json_error(StatusCode::CONFLICT, "invalid_transition", message)
        }
        BookingError::StorageConflict(_) => json_error(StatusCode::CONFLICT, "storage_conflict", message),
        BookingError::Store(e) => store_error_to_response(e),
    }
}

pub fn catalog_error_to_response(err: CatalogError) -> axum::response::Response {
    match err {
        CatalogError::Invalid(e) => domain_error_to_response(e),
        CatalogError::HotelNotFound(_) | CatalogError::ProductNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        CatalogError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        CatalogError::Duplicate(msg) => json_error(StatusCode::CONFLICT, "duplicate", msg),
        CatalogError::Store(e) => store_error_to_response(e),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
    }
}

fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        StoreError::Duplicate(msg) => json_error(StatusCode::CONFLICT, "duplicate", msg),
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "storage_conflict", msg),
        StoreError::Backend(msg) => {
            tracing::error!(error = %msg, "store backend failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "internal storage error",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn invalid_id(what: &str) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
}

#[cfg(test)]
mod tests {
    use hotelmenu_core::ProductId;

    use super::*;

    #[test]
    fn exhausted_inventory_is_a_conflict() {
        let res = booking_error_to_response(BookingError::NoUnitsAvailable(ProductId::new()));
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn backend_failures_are_not_leaked() {
        let res = catalog_error_to_response(CatalogError::Store(StoreError::Backend(
            "password authentication failed".to_string(),
        )));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn status_codes_by_kind() {
        let cases = [
            (
                booking_error_to_response(BookingError::InvalidPartySize(0)),
                StatusCode::BAD_REQUEST,
            ),
            (
                booking_error_to_response(BookingError::NotBookable {
                    product_id: ProductId::new(),
                    reason: "only rooms can be booked",
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                catalog_error_to_response(CatalogError::Forbidden("no".to_string())),
                StatusCode::FORBIDDEN,
            ),
            (
                catalog_error_to_response(CatalogError::HotelNotFound("x".to_string())),
                StatusCode::NOT_FOUND,
            ),
        ];
        for (res, expected) in cases {
            assert_eq!(res.status(), expected);
        }
    }
}
