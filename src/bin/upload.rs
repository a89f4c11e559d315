//! Source Map Upload CLI
//!
//! Scans build output for source maps and uploads the ones that match
//! exactly one generated file.
//!
//! Usage:
//!   sourcemap-upload --group web --api-key $KEY dist/
//!   sourcemap-upload --dry-run --verbose dist/ public/js/app.js

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sourcemap_upload::{upload, LogLevel, LogSink, Settings};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sourcemap-upload")]
#[command(about = "Upload source maps matched to their generated files")]
#[command(version)]
struct Cli {
    /// Files or directories to scan
    #[arg(required = true)]
    paths: Vec<String>,

    /// Group the maps are uploaded under
    #[arg(short, long)]
    group: Option<String>,

    /// API key
    #[arg(long, env = "SOURCEMAPS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<String>,

    /// Directory uploaded file names are relative to (default: current directory)
    #[arg(long)]
    root: Option<PathBuf>,

    /// File suffix to pick up when walking directories (repeatable)
    #[arg(short, long = "extension")]
    extensions: Vec<String>,

    /// Glob to exclude from directory walks (repeatable)
    #[arg(short, long)]
    ignore: Vec<String>,

    /// Only show what would be uploaded
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::load_from(cli.config.as_deref())
        .context("loading configuration")?;

    if cli.group.is_some() {
        settings.upload.group = cli.group;
    }
    if cli.api_key.is_some() {
        settings.upload.api_key = cli.api_key;
    }
    if cli.root.is_some() {
        settings.upload.root = cli.root;
    }
    if !cli.extensions.is_empty() {
        settings.upload.extensions = cli.extensions;
    }
    if !cli.ignore.is_empty() {
        settings.upload.ignore = cli.ignore;
    }
    settings.upload.dry_run |= cli.dry_run;

    let verbose = cli.verbose;
    let log: LogSink = Arc::new(move |level: LogLevel, message: &str| match level {
        LogLevel::Normal => println!("{}", message),
        LogLevel::Verbose if verbose => println!("{}", message),
        LogLevel::Verbose => {}
    });

    let cwd = std::env::current_dir()
        .context("reading current directory")?;
    let config = settings.into_upload_config(cwd, cli.paths, log);

    upload(&config).await?;
    Ok(())
}
