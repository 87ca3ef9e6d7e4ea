//! orangelogic - command-line client for the OrangeLogic asset manager API.

/// Application configuration (TOML).
mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use orangelogic_api::{HttpMethod, OrangeLogicClient, SearchQuery, SessionStore, SortBy};
use orangelogic_session::SqliteSessionStore;
use serde_json::Value;
use tracing::instrument;
use tracing_subscriber::filter::EnvFilter;
#[cfg(not(feature = "otel"))]
use tracing_subscriber::fmt;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::AppConfig;

/// CLI argument parser.
#[derive(Parser)]
#[command(about, version)]
struct Cli {
    /// Override config/data directory.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Search assets.
    Search(SearchArgs),
    /// Inspect or clear the cached API token.
    Token(TokenCommand),
    /// Send a raw GET request and print the decoded response.
    Get(RawArgs),
    /// Send a raw form-encoded POST request and print the decoded response.
    Post(RawArgs),
}

/// Arguments for the `search` subcommand.
#[derive(clap::Args)]
struct SearchArgs {
    /// Free text matched against titles, captions and keywords.
    #[arg(long)]
    text: Option<String>,

    /// Exact keyword filter.
    #[arg(long)]
    keyword: Option<String>,

    /// Media type: Image, Video, Audio, Album, Story or Graphic.
    /// Unknown values are ignored.
    #[arg(long)]
    media_type: Option<String>,

    /// Page number (1-based).
    #[arg(long, default_value_t = 1)]
    page: u32,

    /// Sort order: Newest, Oldest, Ranking or Relevancy.
    #[arg(long, default_value = "Newest")]
    sort: String,

    /// Comma-separated fields to return (default: built-in field list).
    #[arg(long, value_delimiter = ',')]
    fields: Option<Vec<String>>,

    /// Results per page (default: config or 20).
    #[arg(long)]
    count_per_page: Option<u32>,

    /// Print the normalized result as JSON.
    #[arg(long)]
    json: bool,
}

/// Arguments for the `token` subcommand.
#[derive(clap::Args)]
struct TokenCommand {
    /// Token subcommand to run.
    #[command(subcommand)]
    command: TokenSubcommands,
}

/// Available token subcommands.
#[derive(Subcommand)]
enum TokenSubcommands {
    /// Acquire a token (cached or renewed) and show its state and expiry.
    Show,
    /// Forget the cached session token.
    Clear,
}

/// Arguments for the `get` and `post` subcommands.
#[derive(clap::Args)]
struct RawArgs {
    /// API path below the endpoint, e.g. `search/v3.0/search`.
    path: String,

    /// Request parameter as NAME=VALUE (repeatable).
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Do not attach the session token as `token`.
    #[arg(long)]
    no_token: bool,
}

/// Parses a `NAME=VALUE` request parameter.
fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{raw}`"))?;
    if name.trim().is_empty() {
        return Err(format!("parameter name is empty in `{raw}`"));
    }
    Ok((String::from(name.trim()), String::from(value)))
}

/// Opens the session store named by the config.
///
/// # Errors
///
/// Returns an error if the session database cannot be opened.
fn open_store(config: &AppConfig, dir: Option<&Path>) -> Result<Arc<SqliteSessionStore>> {
    let store = SqliteSessionStore::open(dir, config.session_id())
        .context("failed to open session database")?;
    Ok(Arc::new(store))
}

/// Builds an API client from the config.
///
/// # Errors
///
/// Returns an error if the domain is missing or invalid, or the client fails to build.
#[instrument(skip_all)]
fn build_client(config: &AppConfig, store: Arc<dyn SessionStore>) -> Result<OrangeLogicClient> {
    let api = &config.api;
    let mut builder = OrangeLogicClient::builder()
        .domain(api.domain.clone().unwrap_or_default())
        .login(api.login.clone().unwrap_or_default())
        .password(api.password.clone().unwrap_or_default())
        .session_store(store)
        .danger_accept_invalid_certs(!api.verify_tls.unwrap_or(true))
        .quote_escaping(api.quote_escaping.unwrap_or_default());
    if let Some(secs) = api.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if let Some(count) = api.count_per_page {
        builder = builder.count_per_page(count);
    }
    if let Some(ua) = &api.user_agent {
        builder = builder.user_agent(ua);
    }

    builder.build().context("failed to build OrangeLogic client")
}

/// Loads config, opens the store and builds the client.
///
/// # Errors
///
/// Returns an error if any setup step fails.
fn connect(dir: Option<&Path>) -> Result<OrangeLogicClient> {
    let config = AppConfig::load_from(dir)?;
    let store = open_store(&config, dir)?;
    build_client(&config, store)
}

/// Describes the last recorded request failure.
fn describe_error(client: &OrangeLogicClient) -> String {
    client
        .last_error()
        .map_or_else(|| String::from("unknown error"), ToString::to_string)
}

/// Shortens a token for display.
fn mask_token(token: &str) -> String {
    if token.chars().count() <= 8 {
        return String::from("********");
    }
    let head: String = token.chars().take(4).collect();
    format!("{head}...")
}

/// Returns a string field of a result item, or `-`.
fn item_field<'a>(item: &'a Value, name: &str) -> &'a str {
    item.get(name).and_then(Value::as_str).unwrap_or("-")
}

/// Runs the `search` subcommand.
///
/// # Errors
///
/// Returns an error if setup fails or the search is unsuccessful.
#[instrument(skip_all)]
async fn run_search(args: &SearchArgs, dir: Option<&Path>) -> Result<()> {
    let sort = args.sort.parse::<SortBy>().map_err(anyhow::Error::msg)?;
    let mut client = connect(dir)?;
    if let Some(count) = args.count_per_page {
        client.set_count_per_page(count);
    }

    let mut query = SearchQuery::new(args.text.clone().unwrap_or_default())
        .keyword(args.keyword.clone().unwrap_or_default())
        .media_type(args.media_type.as_deref().unwrap_or_default())
        .page(args.page)
        .sort_by(sort);
    if let Some(fields) = &args.fields {
        query = query.fields(fields.iter().cloned());
    }

    if !client.search(&query).await {
        bail!("search failed: {}", describe_error(&client));
    }

    if args.json {
        let json = serde_json::to_string_pretty(client.search_result())
            .context("failed to serialize search result")?;
        tracing::info!("{json}");
        return Ok(());
    }

    let result = client.search_result();
    tracing::info!(
        "Total: {} (page {}, {} per page, sort {})",
        result.total_count,
        args.page,
        client.count_per_page(),
        result.sort
    );
    tracing::info!("SystemIdentifier\tMediaType\tTitle");
    for item in &result.items {
        tracing::info!(
            "{}\t{}\t{}",
            item_field(item, "SystemIdentifier"),
            item_field(item, "MediaType"),
            item_field(item, "Title")
        );
    }
    if result.has_next_page {
        tracing::info!("More results: --page {}", args.page.saturating_add(1));
    }
    Ok(())
}

/// Runs the `token show` subcommand.
///
/// # Errors
///
/// Returns an error if setup fails or no token can be obtained.
#[instrument(skip_all)]
async fn run_token_show(dir: Option<&Path>) -> Result<()> {
    let mut client = connect(dir)?;
    let Some(token) = client.get_token().await else {
        bail!("failed to obtain token: {}", describe_error(&client));
    };

    tracing::info!("State: {:?}", client.token_state());
    tracing::info!("Token: {}", mask_token(&token));
    if let Some(expires_at) = client.token_expires_at() {
        tracing::info!(
            "Expires: {}",
            expires_at
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

/// Runs the `token clear` subcommand.
///
/// # Errors
///
/// Returns an error if the session database cannot be opened or written.
fn run_token_clear(dir: Option<&Path>) -> Result<()> {
    let config = AppConfig::load_from(dir)?;
    let store = open_store(&config, dir)?;
    let removed = store.clear()?;
    tracing::info!(
        "Cleared {} session entries (session: {})",
        removed,
        store.session_id()
    );
    Ok(())
}

/// Runs the `get` and `post` subcommands.
///
/// # Errors
///
/// Returns an error if setup fails, no token can be obtained, or the request
/// is unsuccessful.
#[instrument(skip_all)]
async fn run_raw(method: HttpMethod, args: &RawArgs, dir: Option<&Path>) -> Result<()> {
    let mut client = connect(dir)?;

    let mut params: Vec<(&str, String)> = args
        .params
        .iter()
        .map(|(name, value)| (name.as_str(), value.clone()))
        .collect();
    if !args.no_token && !params.iter().any(|(name, _)| *name == "token") {
        let Some(token) = client.get_token().await else {
            bail!("failed to obtain token: {}", describe_error(&client));
        };
        params.push(("token", token));
    }

    let timeout = Duration::from_secs(args.timeout);
    let body = match method {
        HttpMethod::Get => client.get(&args.path, &params, timeout).await,
        HttpMethod::Post => client.post(&args.path, &params, timeout).await,
    };
    let Some(body) = body else {
        bail!("{method} {} failed: {}", args.path, describe_error(&client));
    };

    let json = serde_json::to_string_pretty(&body).context("failed to serialize response")?;
    tracing::info!("{json}");
    Ok(())
}

/// Entry point.
///
/// # Errors
///
/// Returns an error if subcommand execution fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    #[cfg(not(feature = "otel"))]
    {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .init();
    }

    #[cfg(feature = "otel")]
    {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

        let otel_layer = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .and_then(|_| {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .build()
                    .ok()?;

                let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                    .with_simple_exporter(exporter)
                    .build();

                let tracer = opentelemetry::trace::TracerProvider::tracer(
                    &tracer_provider,
                    env!("CARGO_PKG_NAME"),
                );
                opentelemetry::global::set_tracer_provider(tracer_provider);

                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();
    }

    let cli = Cli::parse();
    match cli.command {
        Commands::Search(args) => run_search(&args, cli.dir.as_deref()).await,
        Commands::Token(token) => match token.command {
            TokenSubcommands::Show => run_token_show(cli.dir.as_deref()).await,
            TokenSubcommands::Clear => run_token_clear(cli.dir.as_deref()),
        },
        Commands::Get(args) => run_raw(HttpMethod::Get, &args, cli.dir.as_deref()).await,
        Commands::Post(args) => run_raw(HttpMethod::Post, &args, cli.dir.as_deref()).await,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use orangelogic_api::{ConfigError, MemorySessionStore};

    use super::*;

    #[test]
    fn test_parse_param() {
        // Arrange & Act & Assert
        assert_eq!(
            parse_param("query=Text:\"a=b\"").unwrap(),
            (String::from("query"), String::from("Text:\"a=b\""))
        );
        assert_eq!(
            parse_param("empty=").unwrap(),
            (String::from("empty"), String::new())
        );
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=x").is_err());
    }

    #[test]
    fn test_mask_token() {
        // Arrange & Act & Assert
        assert_eq!(mask_token("abcdefghijkl"), "abcd...");
        assert_eq!(mask_token("short"), "********");
    }

    #[test]
    fn test_item_field_falls_back_to_dash() {
        // Arrange
        let item = serde_json::json!({"Title": "Harbor", "MaxWidth": 4000});

        // Act & Assert
        assert_eq!(item_field(&item, "Title"), "Harbor");
        assert_eq!(item_field(&item, "MaxWidth"), "-");
        assert_eq!(item_field(&item, "Caption"), "-");
    }

    #[test]
    fn test_build_client_without_domain_fails() {
        // Arrange
        let config = AppConfig::default();

        // Act
        let result = build_client(&config, Arc::new(MemorySessionStore::new()));

        // Assert
        let err = result.unwrap_err();
        assert_eq!(
            err.root_cause().downcast_ref::<ConfigError>(),
            Some(&ConfigError::EmptyDomain)
        );
    }

    #[test]
    fn test_build_client_from_config() {
        // Arrange
        let mut config = AppConfig::default();
        config.api.domain = Some(String::from("acme-dam.com"));
        config.api.count_per_page = Some(50);

        // Act
        let client = build_client(&config, Arc::new(MemorySessionStore::new())).unwrap();

        // Assert
        assert_eq!(client.domain().as_str(), "acme-dam.com");
        assert_eq!(client.count_per_page(), 50);
    }
}
