//! Racing odds opportunity scanner entry point.

use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use racewatch::api::{create_router, AppState};
use racewatch::config::Config;
use racewatch::metrics;
use racewatch::poll::PollLoop;
use racewatch::provider::{BetwatchClient, RaceCollector};
use racewatch::scanner::OpportunityScanner;
use racewatch::sink::LogSink;
use racewatch::utils::shutdown_signal;

/// Racing odds opportunity scanner.
#[derive(Parser, Debug)]
#[command(name = "racewatch")]
#[command(about = "Scans racing odds for bookmaker fixed win prices at or above the exchange lay")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// Poll interval in milliseconds (overrides environment).
    #[arg(long)]
    interval_ms: Option<u64>,

    /// HTTP server port for health/metrics.
    #[arg(short, long, default_value = "8080")]
    port: u16,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scanner loop (default).
    Run {
        /// Poll interval in milliseconds (overrides environment).
        #[arg(long)]
        interval_ms: Option<u64>,

        /// HTTP server port for health/metrics.
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Suppress the per-cycle stdout markers.
        #[arg(long)]
        quiet: bool,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Fetch one cycle of races and summarize (diagnostic).
    FetchRaces,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("racewatch=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Handle subcommands
    match args.command {
        Some(Command::CheckConfig) => cmd_check_config().await,
        Some(Command::FetchRaces) => cmd_fetch_races().await,
        Some(Command::Run {
            interval_ms,
            port,
            quiet,
        }) => cmd_run(interval_ms, port, quiet).await,
        None => cmd_run(args.interval_ms, args.port, false).await,
    }
}

/// Check configuration validity.
async fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("RACEWATCH - CONFIGURATION CHECK");
    println!("======================================================================");

    // Load configuration
    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    // Validate configuration
    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    // Show configuration summary
    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Endpoint: {}", config.betwatch_url);
    println!("  API Key: present");
    println!("  Bookmakers: {}", config.target_bookmakers.join(", "));
    println!("  Race Types: {}", config.target_race_types.join(", "));
    println!("  Locations: {}", config.target_locations.join(", "));
    println!(
        "  Window: {}-{} minutes before the jump",
        config.min_minutes_to_jump, config.max_minutes_to_jump
    );
    println!("  Page Size: {}", config.page_size);
    println!("  Poll Interval: {}ms", config.poll_interval_ms);
    println!(
        "  Retry Budget: {} attempts / {}s",
        config.retry_max_attempts, config.retry_max_elapsed_secs
    );
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Fetch one cycle of races and summarize what came back.
async fn cmd_fetch_races() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("RACEWATCH - FETCH PROBE");
    println!("======================================================================");

    let config = Config::load()?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    println!("Endpoint: {}", config.betwatch_url);
    println!(
        "Filters:  {} in {}",
        config.target_race_types.join(","),
        config.target_locations.join(",")
    );

    let client = BetwatchClient::new(&config);
    let collector = RaceCollector::new(client, config.page_size, config.page_delay());

    println!("\nCollecting today's races...");
    let races = collector.collect().await?;
    println!("Fetched {} races", races.len());

    let active = races.iter().filter(|r| r.status.is_active()).count();
    println!("Active (open/suspended): {}", active);

    let now = OffsetDateTime::now_utc();
    let mut upcoming: Vec<_> = races
        .iter()
        .filter_map(|race| {
            let raw = race.start_time.as_deref()?;
            let start = OffsetDateTime::parse(raw, &Rfc3339).ok()?;
            (start > now).then_some((start, race))
        })
        .collect();
    upcoming.sort_by_key(|(start, _)| *start);

    println!("\nNext races:");
    for (start, race) in upcoming.iter().take(10) {
        let track = race
            .meeting
            .as_ref()
            .map(|m| m.track.as_str())
            .unwrap_or("?");
        let minutes = (*start - now).whole_seconds() as f64 / 60.0;
        println!(
            "  {} R{} in {:.1} min ({} runners)",
            track,
            race.number,
            minutes,
            race.runners.len()
        );
    }

    println!("======================================================================");

    Ok(())
}

/// Run the scanner loop.
async fn cmd_run(interval_override: Option<u64>, port: u16, quiet: bool) -> anyhow::Result<()> {
    // Load configuration
    info!("Loading configuration...");
    let mut config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    // Override with CLI args if provided
    if let Some(interval_ms) = interval_override {
        config.poll_interval_ms = interval_ms;
    }

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    info!("Configuration loaded successfully");

    // Initialize metrics
    let prometheus = metrics::install_prometheus();
    metrics::init_metrics();

    // Create app state
    let app_state = AppState::new();

    // Start HTTP server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state.clone(), prometheus);

    // Spawn HTTP server
    let _server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    print_banner(&config);

    // Wire up the pipeline
    let client = BetwatchClient::new(&config);
    let collector = RaceCollector::new(client, config.page_size, config.page_delay());
    let scanner = OpportunityScanner::new(&config);
    let mut poll = PollLoop::new(
        collector,
        scanner,
        LogSink::new(),
        config.poll_interval(),
        app_state,
    );
    if quiet {
        poll = poll.quiet();
    }

    // Forward the process signal into the loop's cancellation channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    poll.run(shutdown_rx).await?;

    println!();
    info!("Scanner shut down cleanly");

    Ok(())
}

fn print_banner(config: &Config) {
    println!("--------------------------------------------------------");
    println!("Racewatch opportunity scanner");
    println!("  Bookmakers: {}", config.target_bookmakers.join(", "));
    println!("  Race types: {}", config.target_race_types.join(", "));
    println!("  Locations:  {}", config.target_locations.join(", "));
    println!(
        "  Window:     {}-{} minutes before the jump",
        config.min_minutes_to_jump, config.max_minutes_to_jump
    );
    println!("  Interval:   {}ms", config.poll_interval_ms);
    println!("  Condition:  bookmaker fixed win >= exchange lay");
    println!("Each unique race/runner/bookmaker combination is reported ONCE per run.");
    println!("Press Ctrl+C to stop.");
    println!("--------------------------------------------------------");
}
