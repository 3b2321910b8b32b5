use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the notion-feed binary.
#[derive(Debug, Parser)]
#[command(
    name = "notion-feed",
    version,
    about = "Published posts of a Notion blog database"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "NOTION_FEED_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the published posts of the database as JSON.
    Posts(PostsArgs),
    /// Print display metadata of the root page as JSON.
    Metadata,
    /// Serve posts over HTTP.
    Serve(Box<ServeArgs>),
}

impl Default for Command {
    fn default() -> Self {
        Self::Posts(PostsArgs::default())
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Root page or database to read, as an id or Notion URL.
    #[arg(long = "page-id", env = "NOTION_PAGE_ID", value_name = "ID", global = true)]
    pub page_id: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Sort posts newest first.
    #[arg(
        long = "sort-by-date",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub sort_by_date: Option<bool>,

    /// IANA zone for dates without their own zone.
    #[arg(long = "timezone", value_name = "ZONE", global = true)]
    pub timezone: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct PostsArgs {
    /// Keep rows typed `Page` next to `Post`.
    #[arg(long = "include-pages", action = clap::ArgAction::SetTrue)]
    pub include_pages: bool,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Toggle the posts cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override how long a cached fetch stays fresh.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,
}
