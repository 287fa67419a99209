use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use datasync::{
    ConflictPolicy, Direction, RetryPolicy, SyncConfig, SyncEngine, SyncMode, SyncResult,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "datasync")]
#[command(about = "Synchronize items between a source and a destination")]
#[command(version)]
struct Cli {
    /// Source locator (directory path or file:// URL)
    #[arg(short, long)]
    source: String,

    /// Destination locator (directory path or file:// URL)
    #[arg(short, long)]
    destination: String,

    /// Only sync keys matching this glob (repeatable)
    #[arg(long)]
    include: Vec<String>,

    /// Skip keys matching this glob (repeatable)
    #[arg(long)]
    exclude: Vec<String>,

    #[arg(long, value_enum, default_value_t = DirectionArg::SourceToDestination)]
    direction: DirectionArg,

    #[arg(long, value_enum, default_value_t = ModeArg::Mirror)]
    mode: ModeArg,

    /// Who wins when both sides changed since the last sync
    #[arg(long, value_enum, default_value_t = PolicyArg::SourceWins)]
    conflict_policy: PolicyArg,

    /// Maximum transfers in flight
    #[arg(short, long, default_value_t = 4)]
    concurrency: usize,

    /// Show what would change without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Stop starting new transfers after the first failure
    #[arg(long)]
    abort_on_error: bool,

    /// Total attempts per transfer, the first one included
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,

    /// Log level when RUST_LOG is not set
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    SourceToDestination,
    DestinationToSource,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Mirror,
    InsertUpdate,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    SourceWins,
    DestinationWins,
    Skip,
    Manual,
}

impl Cli {
    fn to_config(&self) -> SyncConfig {
        SyncConfig {
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            direction: match self.direction {
                DirectionArg::SourceToDestination => Direction::SourceToDestination,
                DirectionArg::DestinationToSource => Direction::DestinationToSource,
            },
            mode: match self.mode {
                ModeArg::Mirror => SyncMode::Mirror,
                ModeArg::InsertUpdate => SyncMode::InsertUpdate,
            },
            conflict_policy: match self.conflict_policy {
                PolicyArg::SourceWins => ConflictPolicy::SourceWins,
                PolicyArg::DestinationWins => ConflictPolicy::DestinationWins,
                PolicyArg::Skip => ConflictPolicy::Skip,
                PolicyArg::Manual => ConflictPolicy::Manual,
            },
            concurrency: self.concurrency,
            dry_run: self.dry_run,
            abort_on_error: self.abort_on_error,
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                ..RetryPolicy::default()
            },
            ..SyncConfig::new(&self.source, &self.destination)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = cli.to_config();
    info!("Syncing from {} to {}", config.source, config.destination);

    let result = SyncEngine::default().run(&config).await;

    if cli.json {
        let output = serde_json::to_string_pretty(&result).context("Failed to serialize result")?;
        println!("{}", output);
    } else {
        print_summary(&result);
    }

    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("datasync={}", log_level))),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_summary(result: &SyncResult) {
    for line in &result.logs {
        println!("{}", line);
    }

    if !result.failures.is_empty() {
        println!();
        println!("Failures:");
        for failure in &result.failures {
            match &failure.key {
                Some(key) => println!("  {}: {}", key, failure.reason),
                None => println!("  {}", failure.reason),
            }
        }
    }

    if !result.conflicts.is_empty() {
        println!();
        println!("Unresolved conflicts:");
        for key in &result.conflicts {
            println!("  {}", key);
        }
    }

    println!();
    println!("Run {} finished in {:.2}s", result.run_id, result.duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_attempts_sets_total_attempts() {
        let cli = Cli::try_parse_from([
            "datasync", "-s", "src", "-d", "dst", "--max-attempts", "5", "--mode", "insert-update",
        ])
        .unwrap();
        let config = cli.to_config();

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.mode, SyncMode::InsertUpdate);
        assert_eq!(config.source, "src");
    }

    #[test]
    fn test_defaults_match_library() {
        let cli = Cli::try_parse_from(["datasync", "-s", "src", "-d", "dst"]).unwrap();
        let config = cli.to_config();

        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.concurrency, SyncConfig::default().concurrency);
        assert!(Cli::try_parse_from(["datasync", "-s", "a", "-d", "b", "--retries", "2"]).is_err());
    }
}
