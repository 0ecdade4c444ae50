//! Price-Watch main entry point
//!
//! This is the command-line interface for the Price-Watch listing tracker.

use anyhow::Context;
use clap::Parser;
use price_watch::config::{load_config_with_hash, Config};
use price_watch::{ConfirmOutcome, PriceWatch};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Price-Watch: listing price tracker with email alerts
///
/// Price-Watch re-polls every tracked listing on a fixed interval and emails
/// confirmed subscribers whenever a listing's price changes.
#[derive(Parser, Debug)]
#[command(name = "price-watch")]
#[command(version = "1.0.0")]
#[command(about = "Listing price tracker with email alerts", long_about = None)]
#[command(group(
    clap::ArgGroup::new("mode")
        .multiple(false)
        .args(["dry_run", "stats", "subscribe", "confirm", "resend", "once"])
))]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the effective settings without running
    #[arg(long)]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long)]
    stats: bool,

    /// Subscribe EMAIL to the listing at URL and exit
    #[arg(long, num_args = 2, value_names = ["EMAIL", "URL"])]
    subscribe: Option<Vec<String>>,

    /// Resolve a confirmation hash and exit
    #[arg(long, value_name = "HASH")]
    confirm: Option<String>,

    /// Mail a fresh confirmation link to an unverified email and exit
    #[arg(long, value_name = "EMAIL")]
    resend: Option<String>,

    /// Run a single rescan pass and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let service = PriceWatch::from_config(&config).context("Failed to start service")?;

    if cli.stats {
        handle_stats(&config, &service)?;
    } else if let Some(args) = cli.subscribe.as_deref() {
        handle_subscribe(&service, args).await?;
    } else if let Some(hash) = cli.confirm.as_deref() {
        handle_confirm(&service, hash).await?;
    } else if let Some(email) = cli.resend.as_deref() {
        handle_resend(&service, email).await?;
    } else if cli.once {
        handle_once(&service).await;
    } else {
        handle_watch(&config, &service).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("price_watch=info,warn"),
            1 => EnvFilter::new("price_watch=debug,info"),
            2 => EnvFilter::new("price_watch=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Price-Watch Dry Run ===\n");

    println!("Tracker:");
    println!("  Workers: {}", config.tracker.worker_count);
    println!("  Rescan interval: {} min", config.tracker.rescan_interval);
    println!("  Page timeout: {}ms", config.tracker.page_timeout);
    println!("  Task timeout: {}ms", config.tracker.task_timeout);
    println!("  Queue capacity: {}", config.tracker.queue_capacity);
    println!("  Max TLS version: {}", config.tracker.max_tls_version);

    println!("\nListing markup:");
    println!("  Price prefix: {}", config.listing.price_prefix);
    println!("  Price terminator: {}", config.listing.price_terminator);

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);

    println!("\nMail:");
    println!(
        "  SMTP: {}:{} as {}",
        config.mail.smtp_host, config.mail.smtp_port, config.mail.username
    );
    println!("  From: {}", config.mail.from);

    println!("\nConfirmation:");
    println!("  Link base: {}", config.confirmation.link_base);
    println!("  Validity: {}h", config.confirmation.validity_hours);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config, service: &PriceWatch) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let stats = service.storage().stats()?;

    println!("Subscriptions:          {}", stats.subscriptions);
    println!("  verified:             {}", stats.verified_subscriptions);
    println!("Tracked listings:       {}", stats.tracked_urls);
    println!("Pending confirmations:  {}", stats.pending_confirmations);

    Ok(())
}

/// Handles the --subscribe mode
async fn handle_subscribe(service: &PriceWatch, args: &[String]) -> anyhow::Result<()> {
    let [email, url] = args else {
        anyhow::bail!("--subscribe expects EMAIL and URL");
    };

    match service.admit(email, url).await {
        Ok(sub) => {
            println!("✓ Subscribed {} to {} at price {}", sub.email, sub.url, sub.price);
            if !sub.verified {
                println!("  A confirmation link was mailed to {}", sub.email);
            }
            Ok(())
        }
        Err(e) if e.is_client_error() => {
            println!("✗ {}", e);
            std::process::exit(2);
        }
        Err(e) => Err(e.into()),
    }
}

/// Handles the --confirm mode
async fn handle_confirm(service: &PriceWatch, hash: &str) -> anyhow::Result<()> {
    match service.confirm_by_hash(hash).await {
        Ok(ConfirmOutcome::Confirmed { email }) => {
            println!("✓ {} is confirmed", email);
            Ok(())
        }
        Ok(ConfirmOutcome::Reissued { email }) => {
            println!("The link has expired. A new one was mailed to {}", email);
            Ok(())
        }
        Err(e) if e.is_client_error() => {
            println!("✗ {}", e);
            std::process::exit(2);
        }
        Err(e) => Err(e.into()),
    }
}

/// Handles the --resend mode
async fn handle_resend(service: &PriceWatch, email: &str) -> anyhow::Result<()> {
    match service.resend_confirmation(email).await {
        Ok(record) => {
            println!(
                "✓ Confirmation link mailed to {} (valid until {})",
                record.email, record.deadline
            );
            Ok(())
        }
        Err(e) if e.is_client_error() => {
            println!("✗ {}", e);
            std::process::exit(2);
        }
        Err(e) => Err(e.into()),
    }
}

/// Handles the --once mode: a single rescan pass
async fn handle_once(service: &PriceWatch) {
    let stats = service.run_single_pass().await;
    println!(
        "Rescanned {} listings: {} changed, {} unchanged, {} skipped, {} alerts sent",
        stats.tasks, stats.changed, stats.unchanged, stats.skipped, stats.notified
    );
}

/// Handles the main watch operation: rescans until interrupted
async fn handle_watch(config: &Config, service: &PriceWatch) -> anyhow::Result<()> {
    tracing::info!(
        "Watching listings with {} workers every {} min",
        config.tracker.worker_count,
        config.tracker.rescan_interval
    );

    let mut rescan = service.start_rescan_loop();
    tokio::select! {
        joined = &mut rescan => {
            joined.context("Rescan loop stopped unexpectedly")?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutting down");
            rescan.abort();
        }
    }

    Ok(())
}
