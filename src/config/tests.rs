use std::io::Write;

use super::*;

const PAGE: &str = "0b4c5d1e2f3a4b5c8d6e7f8091a2b3c4";

fn raw_with_page() -> RawSettings {
    let mut raw = RawSettings::default();
    raw.notion.page_id = Some(PAGE.to_string());
    raw
}

#[test]
fn defaults_resolve_with_only_a_page_id() {
    let settings = Settings::from_raw(raw_with_page()).expect("valid settings");

    assert_eq!(
        settings.notion.page_id.as_str(),
        "0b4c5d1e-2f3a-4b5c-8d6e-7f8091a2b3c4"
    );
    assert_eq!(settings.notion.api_base.as_str(), DEFAULT_API_BASE);
    assert_eq!(settings.notion.token, None);
    assert_eq!(settings.notion.view_id, None);
    assert!(!settings.blog.sort_by_date);
    assert_eq!(settings.blog.timezone, Tz::UTC);
    assert_eq!(settings.fetch.decode_concurrency.get(), DEFAULT_DECODE_CONCURRENCY);
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.ttl, Duration::from_secs(DEFAULT_CACHE_TTL_SECS));
    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
}

#[test]
fn missing_page_id_is_rejected() {
    let err = Settings::from_raw(RawSettings::default()).expect_err("page id required");
    assert!(matches!(err, LoadError::Invalid { key: "notion.page_id", .. }));
}

#[test]
fn malformed_page_id_is_rejected() {
    let mut raw = RawSettings::default();
    raw.notion.page_id = Some("not-a-page".to_string());
    let err = Settings::from_raw(raw).expect_err("invalid id");
    assert!(matches!(err, LoadError::Invalid { key: "notion.page_id", .. }));
}

#[test]
fn unknown_timezone_is_rejected() {
    let mut raw = raw_with_page();
    raw.blog.timezone = Some("Mars/Olympus".to_string());
    let err = Settings::from_raw(raw).expect_err("invalid zone");
    assert!(matches!(err, LoadError::Invalid { key: "blog.timezone", .. }));
}

#[test]
fn zero_limits_are_rejected() {
    let mut raw = raw_with_page();
    raw.fetch.decode_concurrency = Some(0);
    assert!(matches!(
        Settings::from_raw(raw).expect_err("zero concurrency"),
        LoadError::Invalid { key: "fetch.decode_concurrency", .. }
    ));

    let mut raw = raw_with_page();
    raw.cache.capacity = Some(0);
    assert!(matches!(
        Settings::from_raw(raw).expect_err("zero capacity"),
        LoadError::Invalid { key: "cache.capacity", .. }
    ));
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = raw_with_page();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.blog.sort_by_date = Some(false);

    raw.apply_global_overrides(&GlobalOverrides {
        log_level: Some("debug".to_string()),
        sort_by_date: Some(true),
        timezone: Some("Asia/Tokyo".to_string()),
        ..Default::default()
    });
    raw.apply_serve_overrides(&ServeOverrides {
        server_port: Some(4321),
        cache_enabled: Some(false),
        ..Default::default()
    });
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert!(settings.blog.sort_by_date);
    assert_eq!(settings.blog.timezone, chrono_tz::Asia::Tokyo);
    assert!(!settings.cache.enabled);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = raw_with_page();
    raw.apply_global_overrides(&GlobalOverrides {
        log_json: Some(true),
        ..Default::default()
    });
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn default_to_posts_command() {
    let args = CliArgs::parse_from(["notion-feed", "--page-id", PAGE]);
    let command = args.command.unwrap_or_default();
    match command {
        Command::Posts(posts) => assert!(!posts.include_pages),
        other => panic!("wrong command parsed: {other:?}"),
    }
}

#[test]
fn parse_posts_arguments() {
    let args = CliArgs::parse_from(["notion-feed", "posts", "--include-pages", "--page-id", PAGE]);

    assert_eq!(args.overrides.page_id.as_deref(), Some(PAGE));
    match args.command.expect("posts command") {
        Command::Posts(posts) => assert!(posts.include_pages),
        other => panic!("wrong command parsed: {other:?}"),
    }
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "notion-feed",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--cache-ttl-seconds",
        "60",
        "--log-json=true",
    ]);

    assert_eq!(args.overrides.log_json, Some(true));
    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(serve.overrides.cache_ttl_seconds, Some(60));
        }
        other => panic!("wrong command parsed: {other:?}"),
    }
}

#[test]
fn explicit_config_file_is_layered() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    writeln!(
        file,
        "[notion]\npage_id = \"https://www.notion.so/Blog-{PAGE}\"\nview_id = \"v2\"\n\n[blog]\nsort_by_date = true\ntimezone = \"Europe/Berlin\"\n\n[cache]\nttl_seconds = 42"
    )
    .expect("write config");

    let args = CliArgs::parse_from([
        "notion-feed",
        "--config-file",
        file.path().to_str().expect("utf-8 path"),
        "metadata",
    ]);
    let settings = load(&args).expect("settings");

    assert_eq!(
        settings.notion.page_id.as_str(),
        "0b4c5d1e-2f3a-4b5c-8d6e-7f8091a2b3c4"
    );
    assert!(settings.blog.sort_by_date);
    assert_eq!(settings.blog.timezone, chrono_tz::Europe::Berlin);
    assert_eq!(settings.cache.ttl, Duration::from_secs(42));
    assert_eq!(settings.notion.view_id.as_deref(), Some("v2"));
}

#[test]
fn blank_view_id_reads_every_view() {
    let mut raw = raw_with_page();
    raw.notion.view_id = Some("  ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.notion.view_id, None);
}
