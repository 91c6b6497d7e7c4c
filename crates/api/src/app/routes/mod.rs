use axum::{Router, routing::get};

pub mod kardex;
pub mod products;
pub mod sales;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/kardex", kardex::router())
        .nest("/sales", sales::router())
        .nest("/products", products::router())
}
