use std::path::PathBuf;

use artifact_resolver::artifact::cache::ResolutionCache;
use artifact_resolver::artifact::request::ResolutionRequest;
use artifact_resolver::artifact::resolver::ArtifactResolver;
use artifact_resolver::artifact::types::{ArtifactType, SelectStrategy};
use artifact_resolver::config::{self, ResolverConfig};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

const LOG_FILE_NAME: &str = "artifact-resolver.log";

#[derive(Parser)]
#[command(name = "artifact-resolver")]
#[command(version, about = "Resolve build artifact requests to download URLs")]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write logs to a daily-rolling file in the data directory instead of stderr
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a request and print the matching URLs, one per line
    Resolve(ResolveArgs),
}

#[derive(Args)]
struct ResolveArgs {
    /// Artifact type: sandbox or onprem
    #[arg(long = "type", default_value = "sandbox")]
    artifact_type: ArtifactType,

    /// Locale code, empty for every locale
    #[arg(long, default_value = "")]
    country: String,

    /// Version prefix, or the full version for --select closest
    #[arg(long, default_value = "")]
    version: String,

    /// Selection strategy
    #[arg(long, default_value = "latest")]
    select: SelectStrategy,

    /// Only artifacts modified after this RFC 3339 instant
    #[arg(long)]
    after: Option<DateTime<Utc>>,

    /// Only artifacts modified before this RFC 3339 instant
    #[arg(long)]
    before: Option<DateTime<Utc>>,

    /// Storage account to list instead of the configured default
    #[arg(long, default_value = "")]
    storage_account: String,

    #[arg(long)]
    accept_insider_eula: bool,

    /// Accept locale artifacts without a matching platform artifact
    #[arg(long)]
    do_not_check_platform: bool,

    /// Cache freshness window in seconds (minimum 900). The cache lives only
    /// for one invocation, so from the command line this only validates the
    /// value.
    #[arg(long)]
    expiration: Option<u64>,
}

impl ResolveArgs {
    fn to_request(&self) -> ResolutionRequest {
        let mut request = ResolutionRequest::new(self.artifact_type, &self.country, self.select)
            .with_version(&self.version)
            .with_storage_account(&self.storage_account)
            .accept_insider_eula(self.accept_insider_eula)
            .do_not_check_platform(self.do_not_check_platform);
        request.after = self.after;
        request.before = self.before;
        request
    }
}

/// RUST_LOG controls the level, info when unset or invalid
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::INFO.into()))
}

fn init_logging(log_file: bool) -> WorkerGuard {
    let (writer, guard) = if log_file {
        let appender = tracing_appender::rolling::daily(config::data_dir(), LOG_FILE_NAME);
        tracing_appender::non_blocking(appender)
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(!log_file)
        .init();

    guard
}

async fn resolve(config: ResolverConfig, args: ResolveArgs) -> anyhow::Result<()> {
    let resolver = ArtifactResolver::from_config(&config)?;
    let cache = ResolutionCache::new();

    let resolution = resolver
        .resolve_cached(&args.to_request(), &cache, args.expiration)
        .await?;
    debug!(
        "from_cache={} cached_at={:?}",
        resolution.from_cache, resolution.cached_at
    );

    for url in resolution.url.lines() {
        println!("{}", url);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.log_file);

    let config_path = cli.config.unwrap_or_else(config::config_path);
    let config = ResolverConfig::load(&config_path)?;

    match cli.command {
        Command::Resolve(args) => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(resolve(config, args)),
    }
}
