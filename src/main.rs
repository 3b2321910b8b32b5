use std::{future::IntoFuture, io::Write, process, sync::Arc};

use notion_feed::{
    application::{
        error::AppError,
        posts::{FetchOutcome, FetchSettings, PostsService},
    },
    cache::{CacheConfig, PostsCache},
    config,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        notion::{NotionClient, NotionClientConfig},
        telemetry,
    },
};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args.command.unwrap_or_default();

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Posts(args) => run_posts(settings, args).await,
        config::Command::Metadata => run_metadata(settings).await,
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_posts(settings: config::Settings, args: config::PostsArgs) -> Result<(), AppError> {
    let service = build_posts_service(&settings)?;
    let target = &settings.notion.page_id;

    let posts = match service.fetch_all_posts(target, args.include_pages).await? {
        FetchOutcome::Posts(posts) => posts,
        FetchOutcome::NotADatabase { id } => {
            warn!(
                target = "notion_feed::cli",
                id = %id,
                "Page is not a database; no posts to list"
            );
            Vec::new()
        }
    };

    print_json(&posts)
}

async fn run_metadata(settings: config::Settings) -> Result<(), AppError> {
    let service = build_posts_service(&settings)?;
    let target = &settings.notion.page_id;

    match service.page_metadata(target).await? {
        Some(metadata) => print_json(&metadata),
        None => Err(AppError::validation(format!(
            "page `{target}` was not returned by Notion"
        ))),
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let cache = Arc::new(PostsCache::new(CacheConfig::from(&settings.cache)));
    let service = build_posts_service(&settings)?.with_cache(cache);

    let state = HttpState {
        posts: Arc::new(service),
        target: settings.notion.page_id.clone(),
    };
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::bind(settings.server.addr, err)))?;

    info!(
        target = "notion_feed::serve",
        addr = %settings.server.addr,
        id = %settings.notion.page_id,
        cache_enabled = settings.cache.enabled,
        "Listening"
    );

    let grace = settings.server.graceful_shutdown;
    let (draining_tx, draining_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!(
                target = "notion_feed::serve",
                grace_seconds = grace.as_secs(),
                "Shutdown requested; draining connections"
            );
            let _ = draining_tx.send(());
        })
        .into_future();

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = async {
            if draining_rx.await.is_ok() {
                tokio::time::sleep(grace).await;
            } else {
                std::future::pending::<()>().await;
            }
        } => {
            warn!(
                target = "notion_feed::serve",
                grace_seconds = grace.as_secs(),
                "Grace period elapsed; dropping open connections"
            );
        }
    }

    Ok(())
}

fn build_posts_service(settings: &config::Settings) -> Result<PostsService, AppError> {
    let client = NotionClient::new(NotionClientConfig {
        api_base: settings.notion.api_base.clone(),
        token: settings.notion.token.clone(),
        active_user: settings.notion.active_user.clone(),
        timeout: settings.notion.request_timeout,
        user_time_zone: settings.blog.timezone.name().to_string(),
        page_chunk_limit: settings.notion.page_chunk_limit,
        collection_limit: settings.notion.collection_limit,
    })?;

    let fetch = FetchSettings {
        zone: settings.blog.timezone,
        sort_by_date: settings.blog.sort_by_date,
        decode_concurrency: settings.fetch.decode_concurrency,
        view_id: settings.notion.view_id.clone(),
    };

    Ok(PostsService::new(Arc::new(client), fetch))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render output: {err}")))?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}").map_err(|err| AppError::from(InfraError::Output(err)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "notion_feed::serve", error = %err, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(target = "notion_feed::serve", error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
