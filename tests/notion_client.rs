use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use url::Url;

use notion_feed::application::ports::{DocumentSource, SourceError};
use notion_feed::application::posts::{FetchOutcome, FetchSettings, PostsService};
use notion_feed::domain::ids::PageId;
use notion_feed::infra::notion::{NotionClient, NotionClientConfig};

const ROOT: &str = "0b4c5d1e-2f3a-4b5c-8d6e-7f8091a2b3c4";

async fn load_page_chunk(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if headers.get("cookie").and_then(|v| v.to_str().ok()) != Some("token_v2=secret") {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "denied" })));
    }
    assert_eq!(body["pageId"], ROOT);

    (
        StatusCode::OK,
        Json(json!({
            "recordMap": {
                "block": {
                    ROOT: { "role": "reader", "value": {
                        "id": ROOT,
                        "type": "collection_view_page",
                        "collection_id": "c1",
                        "view_ids": ["v1"],
                        "format": { "page_full_width": true }
                    } }
                },
                "collection": { "c1": { "value": { "id": "c1", "schema": {
                    "t": { "name": "title", "type": "title" },
                    "s": { "name": "slug", "type": "text" },
                    "k": { "name": "type", "type": "select" },
                    "st": { "name": "status", "type": "select" },
                    "d": { "name": "date", "type": "date" }
                } } } }
            }
        })),
    )
}

async fn query_collection(Json(body): Json<Value>) -> Json<Value> {
    assert_eq!(body["collection"]["id"], "c1");
    assert_eq!(body["collectionView"]["id"], "v1");

    Json(json!({
        "result": {
            "type": "reducer",
            "reducerResults": {
                "collection_group_results": { "type": "results", "blockIds": ["p-a"] }
            }
        },
        "recordMap": {
            "block": {
                "p-a": { "value": { "value": {
                    "id": "p-a",
                    "properties": {
                        "t": [["A"]],
                        "s": [["a"]],
                        "k": [["Post"]],
                        "st": [["Published"]],
                        "d": [["‣", [["d", {
                            "type": "date",
                            "start_date": "2024-01-01",
                            "time_zone": "Asia/Tokyo"
                        }]]]]
                    }
                } } }
            }
        }
    }))
}

async fn spawn_fake_notion() -> SocketAddr {
    let app = Router::new()
        .route("/api/v3/loadPageChunk", post(load_page_chunk))
        .route("/api/v3/queryCollection", post(query_collection));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake notion");
    });
    addr
}

fn client(addr: SocketAddr, token: Option<&str>) -> NotionClient {
    NotionClient::new(NotionClientConfig {
        api_base: Url::parse(&format!("http://{addr}/api/v3")).expect("url"),
        token: token.map(str::to_string),
        active_user: None,
        timeout: Duration::from_secs(5),
        user_time_zone: "UTC".to_string(),
        page_chunk_limit: 100,
        collection_limit: 999,
    })
    .expect("client")
}

#[tokio::test]
async fn fetches_and_assembles_posts_over_http() {
    let addr = spawn_fake_notion().await;
    let service = PostsService::new(
        Arc::new(client(addr, Some("secret"))),
        FetchSettings::default(),
    );
    let now = DateTime::<Utc>::from_timestamp_millis(1_750_000_000_000).expect("now");
    let root = PageId::parse(ROOT).expect("root");

    let outcome = service
        .fetch_all_posts_at(&root, false, now)
        .await
        .expect("fetch");
    let posts = match outcome {
        FetchOutcome::Posts(posts) => posts,
        other => panic!("unexpected outcome: {other:?}"),
    };

    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id, "p-a");
    assert_eq!(posts[0].title(), Some("A"));
    assert!(!posts[0].full_width);
    // 2024-01-01T00:00 in Tokyo.
    assert_eq!(posts[0].date, 1_704_034_800_000);

    let metadata = service
        .page_metadata(&root)
        .await
        .expect("metadata")
        .expect("root block");
    assert_eq!(metadata.page_full_width, Some(true));
}

#[tokio::test]
async fn rejected_requests_surface_the_status() {
    let addr = spawn_fake_notion().await;
    let root = PageId::parse(ROOT).expect("root");

    let err = client(addr, None)
        .fetch_document_graph(&root)
        .await
        .expect_err("unauthorized");
    assert!(matches!(err, SourceError::Status { status: 401, .. }));
}
