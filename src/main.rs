//! Dual-Venue Hedger - Main Entry Point
//!
//! Drives the hedge controller, the submit scheduler or a single manual action
//! against either the paper backend or live browser sessions behind the bridge.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dual_venue_hedger::config::Config;
use dual_venue_hedger::control::{ControlSurface, HedgeStatus, StatusEvent, SubmitStatus};
use dual_venue_hedger::venue::{
    BridgeLocator, Direction, PairDirection, PaperVenue, SessionLocator, SessionRegistry, Venue,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Dual-Venue Hedger CLI
#[derive(Parser)]
#[command(name = "dual-venue-hedger")]
#[command(version, about = "Delta-neutral order-form automation on Lighter and Variational")]
struct Cli {
    /// Where venue sessions come from
    #[arg(long, global = true, value_enum, default_value = "paper")]
    backend: Backend,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
enum Backend {
    /// In-memory order forms seeded from the `paper` config section
    Paper,
    /// Browser sessions exposed by the automation bridge
    Bridge,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep the combined position delta-neutral until Ctrl-C
    Hedge {
        /// Symbol to monitor
        #[arg(short, long)]
        symbol: Option<String>,

        /// Milliseconds between position checks
        #[arg(long)]
        poll_ms: Option<u64>,

        /// Absolute net exposure that triggers a corrective order
        #[arg(short, long)]
        threshold: Option<Decimal>,

        /// Milliseconds a corrective order blocks the next one
        #[arg(long)]
        lock_timeout_ms: Option<u64>,
    },

    /// Press submit on both venues a fixed number of times
    Submit {
        /// Number of cycles
        #[arg(short, long)]
        clicks: Option<u32>,

        /// Lower bound of the delay between cycles (ms)
        #[arg(long)]
        min_ms: Option<u64>,

        /// Upper bound of the delay between cycles (ms)
        #[arg(long)]
        max_ms: Option<u64>,

        /// Fixed jitter seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List the venue sessions that can be driven
    Sessions,

    /// Show position and account value on both venues
    Snapshot {
        #[arg(short, long)]
        symbol: Option<String>,
    },

    /// Manual order actions
    Order {
        /// Size typed into every open venue
        #[arg(short, long)]
        quantity: Option<String>,

        /// long-lighter (buy Lighter, sell Variational) or short-lighter
        #[arg(short, long)]
        pair: Option<String>,

        /// Click an order-book level on this venue (requires --side and --level)
        #[arg(long)]
        venue: Option<String>,

        /// Book side for --level
        #[arg(long)]
        side: Option<String>,

        /// Price level index, 0 is the top of book
        #[arg(long)]
        level: Option<usize>,

        /// Submit on one venue only instead of both
        #[arg(long)]
        only: Option<String>,

        /// Prepare the forms without submitting
        #[arg(long)]
        no_submit: bool,
    },

    /// Open a symbol's trading page on every open venue
    Symbol { symbol: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    let config = Config::load()?;
    config.validate()?;
    log_config(&config, cli.backend);

    match cli.command {
        Commands::Hedge {
            symbol,
            poll_ms,
            threshold,
            lock_timeout_ms,
        } => {
            let mut config = config;
            if let Some(symbol) = symbol {
                config.hedge.symbol = symbol;
            }
            if let Some(poll_ms) = poll_ms {
                config.hedge.poll_interval_ms = poll_ms;
            }
            if let Some(threshold) = threshold {
                config.hedge.imbalance_threshold = threshold;
            }
            if let Some(lock_timeout_ms) = lock_timeout_ms {
                config.hedge.lock_timeout_ms = lock_timeout_ms;
            }
            config.validate()?;
            run_hedge(cli.backend, &config).await
        }
        Commands::Submit {
            clicks,
            min_ms,
            max_ms,
            seed,
        } => {
            let mut config = config;
            if let Some(clicks) = clicks {
                config.submit.total_clicks = clicks;
            }
            if let Some(min_ms) = min_ms {
                config.submit.min_interval_ms = min_ms;
            }
            if let Some(max_ms) = max_ms {
                config.submit.max_interval_ms = max_ms;
            }
            if seed.is_some() {
                config.submit.seed = seed;
            }
            config.validate()?;
            run_submit(cli.backend, &config).await
        }
        Commands::Sessions => list_sessions(cli.backend, &config).await,
        Commands::Snapshot { symbol } => {
            let symbol = symbol.unwrap_or_else(|| config.hedge.symbol.clone());
            show_snapshot(cli.backend, &config, &symbol).await
        }
        Commands::Order {
            quantity,
            pair,
            venue,
            side,
            level,
            only,
            no_submit,
        } => {
            let request = OrderRequest {
                quantity,
                pair: pair.as_deref().map(str::parse::<PairDirection>).transpose()?,
                level: match (venue, side, level) {
                    (Some(venue), Some(side), Some(level)) => {
                        Some((venue.parse::<Venue>()?, side.parse::<Direction>()?, level))
                    }
                    (None, None, None) => None,
                    _ => anyhow::bail!("--venue, --side and --level must be given together"),
                },
                only: only.as_deref().map(str::parse::<Venue>).transpose()?,
                submit: !no_submit,
            };
            place_order(cli.backend, &config, request).await
        }
        Commands::Symbol { symbol } => {
            let surface = build_surface(cli.backend, &config).await?;
            let venues = surface.manual().switch_symbol(&symbol).await?;
            info!("Switched {:?} to {}", venues, symbol.to_uppercase());
            Ok(())
        }
    }
}

struct OrderRequest {
    quantity: Option<String>,
    pair: Option<PairDirection>,
    level: Option<(Venue, Direction, usize)>,
    only: Option<Venue>,
    submit: bool,
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "dual-venue-hedger.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("dual_venue_hedger=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config, backend: Backend) {
    info!("📋 Configuration:");
    info!("   Backend: {:?}", backend);
    info!("   Symbol: {}", config.hedge.symbol);
    info!(
        "   Poll Interval: {}ms, Threshold: {}, Lock Timeout: {}ms",
        config.hedge.poll_interval_ms, config.hedge.imbalance_threshold, config.hedge.lock_timeout_ms
    );
    info!("   Corrective Venue: {}", config.hedge.corrective_venue);
    info!(
        "   Submit: {} clicks, {}-{}ms apart",
        config.submit.total_clicks, config.submit.min_interval_ms, config.submit.max_interval_ms
    );
    if backend == Backend::Bridge {
        info!("   Bridge: {}", config.bridge.base_url);
    }
}

async fn build_locator(backend: Backend, config: &Config) -> Result<Arc<dyn SessionLocator>> {
    match backend {
        Backend::Bridge => {
            let locator = BridgeLocator::new(&config.bridge, &config.venues)
                .context("Failed to create bridge client")?;
            Ok(Arc::new(locator))
        }
        Backend::Paper => {
            let registry = SessionRegistry::new();
            let symbol = config.hedge.symbol.to_uppercase();
            for (venue, position) in [
                (Venue::Lighter, config.paper.lighter_position),
                (Venue::Variational, config.paper.variational_position),
            ] {
                let paper = PaperVenue::new(venue, &symbol, config.paper.account_value);
                paper.set_position(&symbol, position).await;
                registry.open(Arc::new(paper)).await;
            }
            Ok(Arc::new(registry))
        }
    }
}

async fn build_surface(backend: Backend, config: &Config) -> Result<ControlSurface> {
    let locator = build_locator(backend, config).await?;
    Ok(ControlSurface::with_hub(
        locator,
        config.hedge_settings(),
        Default::default(),
        config.submit.seed,
    ))
}

async fn run_hedge(backend: Backend, config: &Config) -> Result<()> {
    let surface = build_surface(backend, config).await?;
    let events = surface.subscribe();

    info!("🛡️  Starting hedge controller for {}", config.hedge.symbol);
    surface.start_hedge(config.hedge_params()).await?;
    relay_until_done(&surface, events).await;
    Ok(())
}

async fn run_submit(backend: Backend, config: &Config) -> Result<()> {
    let surface = build_surface(backend, config).await?;
    let events = surface.subscribe();

    info!("🖱️  Starting submit scheduler");
    surface.start_submit(config.submit_params()).await?;
    relay_until_done(&surface, events).await;
    Ok(())
}

/// Log every status event until the run ends or Ctrl-C stops it.
async fn relay_until_done(
    surface: &ControlSurface,
    mut events: tokio::sync::broadcast::Receiver<StatusEvent>,
) {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Ctrl-C received, stopping");
                surface.shutdown().await;
                break;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    log_event(&event);
                    if is_terminal(&event) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Status relay lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    let display = surface.display_state();
    if let Some(hedge) = display.hedge {
        info!("Final hedge status: {}", hedge);
    }
    if let Some(submit) = display.submit {
        info!("Final submit status: {}", submit);
    }
}

fn log_event(event: &StatusEvent) {
    match event {
        StatusEvent::Hedge(HedgeStatus::Error { .. })
        | StatusEvent::Submit(SubmitStatus::Error { .. }) => error!("{}", event),
        StatusEvent::Hedge(HedgeStatus::Hedging { .. })
        | StatusEvent::Hedge(HedgeStatus::LockTimedOut { .. }) => warn!("{}", event),
        _ => info!("{}", event),
    }
}

fn is_terminal(event: &StatusEvent) -> bool {
    match event {
        StatusEvent::Hedge(status) => status.is_terminal(),
        StatusEvent::Submit(status) => status.is_terminal(),
    }
}

async fn list_sessions(backend: Backend, config: &Config) -> Result<()> {
    match backend {
        Backend::Bridge => {
            let locator = BridgeLocator::new(&config.bridge, &config.venues)?;
            let sessions = locator
                .list_sessions()
                .await
                .context("Failed to list bridge sessions")?;
            if sessions.is_empty() {
                info!("No sessions open on the bridge");
            }
            for session in sessions {
                match locator.venue_for_url(&session.url) {
                    Some(venue) => info!("{:<12} {} {}", venue.to_string(), session.id, session.url),
                    None => info!("{:<12} {} {}", "-", session.id, session.url),
                }
            }
        }
        Backend::Paper => {
            let locator = build_locator(backend, config).await?;
            for session in locator.open_sessions().await? {
                info!("{:<12} paper", session.venue().to_string());
            }
        }
    }
    Ok(())
}

async fn show_snapshot(backend: Backend, config: &Config, symbol: &str) -> Result<()> {
    let surface = build_surface(backend, config).await?;
    let snapshots = surface.manual().snapshot(&symbol.to_uppercase()).await?;

    info!("📊 {} positions:", symbol.to_uppercase());
    let mut net = Decimal::ZERO;
    for snapshot in &snapshots {
        info!("   {}", snapshot);
        net += snapshot.position;
    }
    info!("   net exposure {}", net);
    Ok(())
}

async fn place_order(backend: Backend, config: &Config, request: OrderRequest) -> Result<()> {
    let surface = build_surface(backend, config).await?;
    let desk = surface.manual();

    if let Some(quantity) = &request.quantity {
        desk.set_quantity(quantity).await?;
    }
    if let Some(pair) = request.pair {
        desk.select_pair(pair).await?;
    }
    if let Some((venue, side, level)) = request.level {
        desk.select_order_book_level(venue, side, level).await?;
        info!("Selected {} level {} on {}", side, level, venue);
    }

    if request.submit {
        match request.only {
            Some(venue) => desk.submit(venue).await?,
            None => {
                let venues = desk.submit_all().await?;
                info!("Submitted on {:?}", venues);
            }
        }
    }

    if backend == Backend::Paper {
        for snapshot in desk.snapshot(&config.hedge.symbol.to_uppercase()).await? {
            info!("   {}", snapshot);
        }
    }
    Ok(())
}
