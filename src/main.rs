use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use feedparser::config::Config;
use feedparser::feed::ControlCharSanitizer;
use feedparser::{FeedParser, ItemField, ParserOptions};

/// Get the default config file path (~/.config/feedparser/config.toml)
fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("feedparser")
            .join("config.toml"),
    )
}

#[derive(Parser, Debug)]
#[command(
    name = "feedparser",
    version,
    about = "Fetch an RSS or Atom feed and print it as normalized JSON"
)]
struct Args {
    /// Feed URL (http or https; user:password@ credentials are sent as basic auth)
    #[arg(required_unless_present = "file")]
    url: Option<String>,

    /// Parse a local feed document instead of fetching
    #[arg(long, value_name = "FILE", conflicts_with = "url")]
    file: Option<PathBuf>,

    /// Config file (defaults to ~/.config/feedparser/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Item field to sanitize (repeatable; overrides the config file)
    #[arg(long = "sanitize", value_name = "FIELD")]
    sanitize: Vec<ItemField>,

    /// Strip terminal control characters from sanitized fields
    #[arg(long)]
    strip_control: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match args.config.clone().or_else(default_config_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config file '{}'", path.display()))?,
        None => Config::default(),
    };
    tracing::debug!(config = ?config, "Effective configuration");

    let source = match (&args.file, &args.url) {
        (Some(path), _) => {
            let document = std::fs::read(path)
                .with_context(|| format!("Failed to read feed file '{}'", path.display()))?;
            ParserOptions::from_document(document)
        }
        (None, Some(url)) => ParserOptions::from_url(url.as_str()),
        (None, None) => anyhow::bail!("A feed URL or --file is required"),
    };

    let mut options = config.apply(source);
    if !args.sanitize.is_empty() {
        options = options.with_sanitize_fields(args.sanitize.iter().copied());
    }
    if args.strip_control {
        options = options.with_sanitizer(Arc::new(ControlCharSanitizer));
    }

    let parser = FeedParser::new(options).context("Failed to set up feed parser")?;
    let feed = parser.parse().await.context("Failed to parse feed")?;

    let record = feed.as_record();
    let json = if args.pretty {
        serde_json::to_string_pretty(&record)?
    } else {
        serde_json::to_string(&record)?
    };
    println!("{json}");

    Ok(())
}
