//! Soundscape Surface
//!
//! Runs the sound object controller against a remote processor over OSC,
//! persisting processors and UI layout in an XML state document.

use anyhow::{Context, Result};
use clap::Parser;
use soundscape_surface::bridge::{reconnect, ProtocolBridge, RemoteMessage};
use soundscape_surface::change::ChangeType;
use soundscape_surface::config::{AppConfig, BridgeConfig, ConfigWatcher};
use soundscape_surface::controller::Controller;
use soundscape_surface::paths::AppPaths;
use soundscape_surface::state_xml::{load_state_file, save_state_file};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Soundscape Surface - spatial audio sound object control surface
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults to the application data directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the XML state document
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Print the state document and exit
    #[arg(long)]
    dump_state: bool,

    /// Validate the configuration file and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let paths = AppPaths::detect();
    let config_path = args.config.clone().unwrap_or_else(|| paths.config.clone());

    if args.check_config {
        return check_config(&config_path).await;
    }

    paths
        .ensure_directories()
        .context("Failed to create application directories")?;

    let config = if config_path.exists() {
        AppConfig::load(&config_path).await?
    } else {
        AppConfig::default()
    };

    let log_dir = config.logging.file.then_some(paths.logs_dir.as_path());
    let _log_guard = init_logging(&args.log_level, log_dir)?;

    info!("Starting Soundscape Surface v{}...", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {}", paths.base_dir().display());
    if !config_path.exists() {
        warn!("No config at {}, using defaults", config_path.display());
    }

    let state_path = args
        .state
        .clone()
        .or_else(|| config.state_file.clone())
        .unwrap_or_else(|| paths.state_file.clone());

    let mut controller = Controller::new(&config);
    restore_state(&mut controller, &state_path).await;

    if args.dump_state {
        let document = controller
            .create_state_xml()
            .to_document()
            .context("Failed to serialize state document")?;
        println!("{}", document);
        return Ok(());
    }

    let config_watcher = if config_path.exists() {
        let (watcher, _) = ConfigWatcher::new(config_path.clone()).await?;
        Some(watcher)
    } else {
        None
    };

    run_app(controller, config_watcher, &state_path, shutdown_signal()).await?;

    info!("Soundscape Surface shutdown complete");
    Ok(())
}

async fn run_app(
    mut controller: Controller,
    mut config_watcher: Option<ConfigWatcher>,
    state_path: &Path,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let mut bridge = connect_bridge(controller.bridge_config()).await?;
    let mut inbound = bridge.take_inbound();
    let mut ticker = make_ticker(controller.bridge_config());

    info!(
        "Controlling {} processors via {} bridge",
        controller.processor_count(),
        bridge.name()
    );

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for message in controller.tick() {
                    if let Err(e) = bridge.send(&message).await {
                        debug!("Failed to send {:?}: {}", message.kind, e);
                    }
                }

                // No plugin host is attached to the standalone binary
                for (id, event) in controller.drain_host_events() {
                    trace!("Processor {} host event {:?}", id, event);
                }

                if controller.take_state_dirty() {
                    save_state(&controller, state_path).await;
                }
            }

            Some(message) = recv_inbound(&mut inbound) => {
                let updated = controller.handle_remote(&message);
                trace!("{:?} from device updated {} processors", message.kind, updated);
            }

            Some(new_config) = next_config(&mut config_watcher) => {
                info!("Configuration file changed, applying...");
                let mut accepted = new_config.clone();

                if controller.bridge_changes(&new_config.bridge).contains(ChangeType::IP_ADDRESS) {
                    let reconnected = reconnect(&bridge, controller.bridge_config(), &new_config.bridge).await;
                    match reconnected {
                        Ok(Some(new_bridge)) => {
                            bridge = new_bridge;
                            inbound = bridge.take_inbound();
                            info!("Reconnected via {} bridge", bridge.name());
                        }
                        Ok(None) => info!(
                            "{} bridge now targets {}:{}",
                            bridge.name(),
                            new_config.bridge.host,
                            new_config.bridge.port
                        ),
                        Err(e) => {
                            // Keep the live address so the next reload retries
                            warn!("Failed to reconnect (keeping old bridge): {}", e);
                            accepted.bridge = new_config.bridge.with_endpoint_of(controller.bridge_config());
                        }
                    }
                }

                let changed = controller.apply_config(&accepted);
                if changed.contains(ChangeType::MESSAGE_RATE) {
                    ticker = make_ticker(controller.bridge_config());
                    info!("Refresh interval now {} ms", controller.bridge_config().refresh_interval_ms);
                }
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    info!("Shutting down...");
    save_state(&controller, state_path).await;
    bridge.shutdown().await?;

    Ok(())
}

async fn connect_bridge(config: &BridgeConfig) -> Result<Arc<dyn ProtocolBridge>> {
    soundscape_surface::bridge::connect(config)
        .await
        .with_context(|| format!("Failed to open {:?} bridge to {}:{}", config.protocol, config.host, config.port))
}

fn make_ticker(config: &BridgeConfig) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(Duration::from_millis(config.refresh_interval_ms));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker
}

async fn recv_inbound(inbound: &mut Option<mpsc::Receiver<RemoteMessage>>) -> Option<RemoteMessage> {
    match inbound {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_config(watcher: &mut Option<ConfigWatcher>) -> Option<AppConfig> {
    match watcher {
        Some(watcher) => watcher.next_config().await,
        None => std::future::pending().await,
    }
}

async fn restore_state(controller: &mut Controller, path: &Path) {
    if !path.exists() {
        info!("No state document at {}, starting fresh", path.display());
        return;
    }

    match load_state_file(path).await {
        Ok(root) => {
            if controller.set_state_xml(&root) {
                info!("State restored from {}", path.display());
            } else {
                warn!("State document {} was only partially applied", path.display());
            }
        }
        Err(e) => warn!("Failed to load state document {}: {}", path.display(), e),
    }
}

async fn save_state(controller: &Controller, path: &Path) {
    match save_state_file(path, &controller.create_state_xml()).await {
        Ok(()) => debug!("State saved to {}", path.display()),
        Err(e) => warn!("Failed to save state to {}: {}", path.display(), e),
    }
}

async fn check_config(path: &Path) -> Result<()> {
    use colored::*;

    println!("\n{} {}", "Checking".bold().cyan(), path.display());

    let config = match AppConfig::load(path).await {
        Ok(config) => config,
        Err(e) => {
            println!("{} {:#}", "Invalid config:".red().bold(), e);
            return Err(e);
        }
    };

    let bridge = &config.bridge;
    println!(
        "  Bridge: {:?} -> {}:{} (listen {}), every {} ms",
        bridge.protocol,
        bridge.host.yellow(),
        bridge.port,
        bridge.listen_port,
        bridge.refresh_interval_ms
    );
    println!("  Processors: {}", config.processors.len().to_string().green());
    for processor in &config.processors {
        println!(
            "    sound object {} mapping {} ({:?})",
            processor.soundobject_id.to_string().yellow(),
            processor.mapping_id,
            processor.coms_mode
        );
    }

    println!("\n{}", "Config is valid".green().bold());
    Ok(())
}

fn init_logging(level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "soundscape-surface.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}
