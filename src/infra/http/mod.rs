//! JSON surface served by `notion-feed serve`.

pub mod error;
mod handlers;
mod middleware;

use std::sync::Arc;

use axum::Router;
use axum::middleware as axum_middleware;
use axum::routing::{get, post};

use crate::application::posts::PostsService;
use crate::domain::ids::PageId;

pub use error::{ApiError, ErrorReport};
pub use handlers::{InvalidateResponse, PostsResponse};
pub use middleware::REQUEST_ID_HEADER;

#[derive(Clone)]
pub struct HttpState {
    pub posts: Arc<PostsService>,
    pub target: PageId,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/posts", get(handlers::list_posts))
        .route("/api/pages", get(handlers::list_pages))
        .route("/api/cache/invalidate", post(handlers::invalidate_cache))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::trace_requests))
}
