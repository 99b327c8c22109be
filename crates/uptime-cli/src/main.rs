mod config;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::{fmt, EnvFilter};

use uptime_api::app::CorsOrigins;
use uptime_api::state::AppState;
use uptime_core::{
    HttpProber, MonitorRegistry, OutcomeClass, Purger, QueryFacade, Scheduler, Store,
    NO_DATA_STATUS,
};

use crate::config::AppConfig;

fn version_string() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");

    if GIT_HASH.is_empty() {
        Box::leak(VERSION.to_string().into_boxed_str())
    } else {
        Box::leak(format!("{VERSION} ({GIT_HASH})").into_boxed_str())
    }
}

/// HTTP uptime monitor: probe endpoints on a schedule and serve their history.
#[derive(Parser)]
#[command(name = "uptime-monitor", version = version_string(), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the probe scheduler, the retention purger and the HTTP API.
    Serve {
        /// Listen address (e.g. 0.0.0.0:8080). Overrides config file.
        #[arg(short, long)]
        listen: Option<SocketAddr>,

        /// Path to TOML config file.
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Probe every configured monitor once and print its summary.
    Check {
        /// Path to TOML config file.
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { listen, config } => {
            run_serve(listen, &config).await;
        }
        Commands::Check { config } => {
            fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
                )
                .init();
            run_check(&config).await;
        }
    }
}

/// Everything the engine needs, built from a validated config.
struct Engine {
    registry: Arc<MonitorRegistry>,
    store: Arc<Store>,
    scheduler: Arc<Scheduler>,
}

async fn build_engine(app_config: &AppConfig) -> Result<Engine, String> {
    let registry = MonitorRegistry::new(app_config.monitors())
        .map(Arc::new)
        .map_err(|e| e.to_string())?;

    let engine_config = app_config.engine.to_engine_config();
    let prober = HttpProber::from_config(&engine_config)
        .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

    let store = Store::open(&app_config.engine.db_path)
        .map(Arc::new)
        .map_err(|e| e.to_string())?;

    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        Arc::new(prober),
        engine_config,
    ));
    scheduler
        .register()
        .await
        .map_err(|e| format!("Failed to register monitors: {}", e))?;

    Ok(Engine {
        registry,
        store,
        scheduler,
    })
}

fn load_config(path: &Path) -> AppConfig {
    match AppConfig::load(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            std::process::exit(1);
        }
    }
}

async fn run_serve(listen_override: Option<SocketAddr>, config_path: &Path) {
    let app_config = load_config(config_path);
    init_tracing(&app_config.server.log_format);
    tracing::info!(path = %config_path.display(), "Loaded config file");

    let listen = listen_override.unwrap_or(app_config.server.listen);

    let engine = match build_engine(&app_config).await {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start engine");
            std::process::exit(1);
        }
    };

    if let Err(e) = engine.scheduler.start().await {
        tracing::error!(error = %e, "Failed to start scheduler");
        std::process::exit(1);
    }

    let purger = Arc::new(Purger::new(
        Arc::clone(&engine.store),
        engine.scheduler.config(),
    ));
    if let Err(e) = purger.start().await {
        tracing::error!(error = %e, "Failed to start purger");
        engine.scheduler.stop().await;
        std::process::exit(1);
    }

    let facade = QueryFacade::new(Arc::clone(&engine.store), Arc::clone(&engine.registry));
    let state = AppState::new(facade)
        .with_scheduler(Arc::clone(&engine.scheduler))
        .with_purger(Arc::clone(&purger));
    let cors = CorsOrigins::from_config(&app_config.server.cors_allowed_origins);

    tracing::info!(%listen, monitors = engine.registry.len(), "Starting uptime monitor API server");

    let served =
        uptime_api::serve_with_state(listen, state, cors, uptime_api::shutdown_signal()).await;

    tracing::info!("Stopping scheduler and purger...");
    engine.scheduler.stop().await;
    purger.stop().await;
    engine.store.close().await;

    if let Err(e) = served {
        tracing::error!(error = %e, "Server failed");
        std::process::exit(1);
    }
    tracing::info!("Shutdown complete");
}

async fn run_check(config_path: &Path) {
    let app_config = load_config(config_path);

    let engine = match build_engine(&app_config).await {
        Ok(e) => e,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    println!(
        "{} {}",
        style("uptime-monitor").bold(),
        style(env!("CARGO_PKG_VERSION")).dim()
    );
    println!(
        "  {} {}",
        style("database:").dim(),
        app_config.engine.db_path.display()
    );
    println!("  {} {}", style("monitors:").dim(), engine.registry.len());
    println!();

    futures::future::join_all(engine.scheduler.run_pass()).await;

    let facade = QueryFacade::new(Arc::clone(&engine.store), Arc::clone(&engine.registry));
    for monitor in facade.list_monitors() {
        let key = monitor.key();
        match facade.summarize(&monitor.group, &monitor.name).await {
            Ok(summary) => {
                let status = match OutcomeClass::classify(&summary.current_status) {
                    _ if summary.current_status == NO_DATA_STATUS => {
                        style(summary.current_status.clone()).dim()
                    }
                    OutcomeClass::Up => style(summary.current_status.clone()).green(),
                    OutcomeClass::Down => style(summary.current_status.clone()).red(),
                    OutcomeClass::Unknown => style(summary.current_status.clone()).yellow(),
                };
                println!(
                    "  {:<32} {}  {} {:.2}%  {} {:.1}ms",
                    style(key.to_string()).bold(),
                    status,
                    style("24h:").dim(),
                    summary.uptime_percentage_24h,
                    style("avg:").dim(),
                    summary.average_response_time_24h
                );
            }
            Err(e) => println!("  {:<32} {}", style(key.to_string()).bold(), style(e).red()),
        }
    }

    engine.store.close().await;
}

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_format {
        "json" => {
            fmt().with_env_filter(filter).json().init();
        }
        _ => {
            fmt().with_env_filter(filter).init();
        }
    }
}
