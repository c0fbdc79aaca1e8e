use axum::Router;

pub mod availability;
pub mod bookings;
pub mod catalog;
pub mod hotels;
pub mod products;
pub mod system;

/// Router for every endpoint behind the requester middleware.
pub fn router() -> Router {
    Router::new()
        .nest("/hotels", hotels::router())
        .nest("/categories", catalog::categories_router())
        .nest("/canonicals", catalog::canonicals_router())
        .nest("/products", products::router())
        .nest("/availability", availability::router())
        .nest("/bookings", bookings::router())
}
