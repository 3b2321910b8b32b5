use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::posts::FetchOutcome;
use crate::domain::posts::PostRecord;

use super::HttpState;
use super::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct PostsQuery {
    /// Skip the cache and refetch from Notion.
    #[serde(default)]
    pub fresh: bool,
}

#[derive(Debug, Serialize)]
pub struct PostsResponse {
    pub posts: Vec<PostRecord>,
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub invalidated: bool,
}

pub async fn health() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

pub async fn list_posts(
    State(state): State<HttpState>,
    Query(query): Query<PostsQuery>,
) -> Result<Json<PostsResponse>, ApiError> {
    list(&state, false, query.fresh).await
}

pub async fn list_pages(
    State(state): State<HttpState>,
    Query(query): Query<PostsQuery>,
) -> Result<Json<PostsResponse>, ApiError> {
    list(&state, true, query.fresh).await
}

pub async fn invalidate_cache(State(state): State<HttpState>) -> Json<InvalidateResponse> {
    let invalidated = match state.posts.cache() {
        Some(cache) => {
            cache.invalidate(&state.target);
            true
        }
        None => false,
    };
    info!(
        target = "notion_feed::http::cache",
        id = %state.target,
        invalidated,
        "Cache invalidation requested"
    );
    Json(InvalidateResponse { invalidated })
}

async fn list(
    state: &HttpState,
    include_pages: bool,
    fresh: bool,
) -> Result<Json<PostsResponse>, ApiError> {
    let outcome = if fresh {
        state
            .posts
            .fetch_all_posts(&state.target, include_pages)
            .await?
    } else {
        state
            .posts
            .cached_posts(&state.target, include_pages)
            .await?
    };

    match outcome {
        FetchOutcome::Posts(posts) => Ok(Json(PostsResponse { posts })),
        FetchOutcome::NotADatabase { id } => Err(ApiError::not_a_database(id.as_str())),
    }
}
