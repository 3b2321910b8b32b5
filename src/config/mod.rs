//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{net::SocketAddr, num::NonZeroUsize, str::FromStr, time::Duration};

use chrono_tz::Tz;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::domain::ids::PageId;

pub use cli::{CliArgs, Command, GlobalOverrides, PostsArgs, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "notion-feed";
const ENV_PREFIX: &str = "NOTION_FEED";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_API_BASE: &str = "https://www.notion.so/api/v3/";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAGE_CHUNK_LIMIT: u32 = 100;
const DEFAULT_COLLECTION_LIMIT: u32 = 999;
const DEFAULT_DECODE_CONCURRENCY: usize = 8;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_CACHE_CAPACITY: usize = 16;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub notion: NotionSettings,
    pub blog: BlogSettings,
    pub fetch: FetchTuning,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct NotionSettings {
    pub page_id: PageId,
    pub api_base: Url,
    /// `token_v2` cookie; only private workspaces need it.
    pub token: Option<String>,
    pub active_user: Option<String>,
    /// Only this view's rows are listed when set.
    pub view_id: Option<String>,
    pub request_timeout: Duration,
    pub page_chunk_limit: u32,
    pub collection_limit: u32,
}

#[derive(Debug, Clone)]
pub struct BlogSettings {
    pub sort_by_date: bool,
    pub timezone: Tz,
}

#[derive(Debug, Clone)]
pub struct FetchTuning {
    pub decode_concurrency: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl: Duration,
    pub capacity: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    raw.apply_global_overrides(&cli.overrides);
    if let Some(Command::Serve(args)) = cli.command.as_ref() {
        raw.apply_serve_overrides(&args.overrides);
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    notion: RawNotionSettings,
    blog: RawBlogSettings,
    fetch: RawFetchSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_global_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(page_id) = overrides.page_id.as_ref() {
            self.notion.page_id = Some(page_id.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(sort) = overrides.sort_by_date {
            self.blog.sort_by_date = Some(sort);
        }
        if let Some(zone) = overrides.timezone.as_ref() {
            self.blog.timezone = Some(zone.clone());
        }
    }

    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(seconds) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(seconds);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            notion,
            blog,
            fetch,
            cache,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            notion: build_notion_settings(notion)?,
            blog: build_blog_settings(blog)?,
            fetch: build_fetch_tuning(fetch)?,
            cache: build_cache_settings(cache)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_notion_settings(notion: RawNotionSettings) -> Result<NotionSettings, LoadError> {
    let raw_id = non_empty(notion.page_id).ok_or_else(|| {
        LoadError::invalid(
            "notion.page_id",
            "must be set (config, NOTION_PAGE_ID or --page-id)",
        )
    })?;
    let page_id = PageId::parse(&raw_id)
        .map_err(|err| LoadError::invalid("notion.page_id", err.to_string()))?;

    let api_base = non_empty(notion.api_base).unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    let api_base = Url::parse(&api_base)
        .map_err(|err| LoadError::invalid("notion.api_base", format!("invalid url: {err}")))?;
    if !matches!(api_base.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "notion.api_base",
            "scheme must be http or https",
        ));
    }

    let timeout_secs = notion
        .request_timeout_seconds
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "notion.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let page_chunk_limit = notion.page_chunk_limit.unwrap_or(DEFAULT_PAGE_CHUNK_LIMIT);
    if page_chunk_limit == 0 {
        return Err(LoadError::invalid(
            "notion.page_chunk_limit",
            "must be greater than zero",
        ));
    }
    let collection_limit = notion.collection_limit.unwrap_or(DEFAULT_COLLECTION_LIMIT);
    if collection_limit == 0 {
        return Err(LoadError::invalid(
            "notion.collection_limit",
            "must be greater than zero",
        ));
    }

    Ok(NotionSettings {
        page_id,
        api_base,
        token: non_empty(notion.token),
        active_user: non_empty(notion.active_user),
        view_id: non_empty(notion.view_id),
        request_timeout: Duration::from_secs(timeout_secs),
        page_chunk_limit,
        collection_limit,
    })
}

fn build_blog_settings(blog: RawBlogSettings) -> Result<BlogSettings, LoadError> {
    let timezone = match non_empty(blog.timezone) {
        Some(name) => name
            .parse::<Tz>()
            .map_err(|err| LoadError::invalid("blog.timezone", err.to_string()))?,
        None => Tz::UTC,
    };

    Ok(BlogSettings {
        sort_by_date: blog.sort_by_date.unwrap_or(false),
        timezone,
    })
}

fn build_fetch_tuning(fetch: RawFetchSettings) -> Result<FetchTuning, LoadError> {
    let value = fetch
        .decode_concurrency
        .unwrap_or(DEFAULT_DECODE_CONCURRENCY);
    let decode_concurrency = NonZeroUsize::new(value).ok_or_else(|| {
        LoadError::invalid("fetch.decode_concurrency", "must be greater than zero")
    })?;

    Ok(FetchTuning { decode_concurrency })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let ttl_secs = cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS);
    if ttl_secs == 0 {
        return Err(LoadError::invalid(
            "cache.ttl_seconds",
            "must be greater than zero",
        ));
    }
    let capacity = NonZeroUsize::new(cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY))
        .ok_or_else(|| LoadError::invalid("cache.capacity", "must be greater than zero"))?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        ttl: Duration::from_secs(ttl_secs),
        capacity,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawNotionSettings {
    page_id: Option<String>,
    api_base: Option<String>,
    token: Option<String>,
    active_user: Option<String>,
    view_id: Option<String>,
    request_timeout_seconds: Option<u64>,
    page_chunk_limit: Option<u32>,
    collection_limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBlogSettings {
    sort_by_date: Option<bool>,
    timezone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFetchSettings {
    decode_concurrency: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    ttl_seconds: Option<u64>,
    capacity: Option<usize>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[cfg(test)]
mod tests;
