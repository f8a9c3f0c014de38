use axum::{routing::get, Router};

pub mod admin;
pub mod collection;
pub mod common;
pub mod listings;
pub mod sales;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .nest("/collection", collection::router())
        .nest("/listings", listings::router())
        .nest("/sales", sales::router())
        .nest("/admin", admin::router())
}
