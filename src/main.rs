use std::{path::PathBuf, sync::Arc};

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use lpg_fleet_sim::{
    api::{self, AppState},
    config::SimConfig,
    io::bootstrap,
    simulation::{orchestrator::run_loop, SimulationHandle},
};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "lpg-fleet-sim")]
#[command(about = "LPG tanker-truck fleet routing and discrete-time simulation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap the environment from `--data-dir` and serve the control API.
    Serve {
        /// HTTP port the control API binds to (defaults to the configured
        /// `http_port` when omitted).
        #[arg(long)]
        port: Option<u16>,

        /// Directory holding `ventas<YYYY><MM>`, `<YYYY><MM>.bloqueos`,
        /// `mantpreventivo`, `averias.txt` and an optional `config.toml`.
        #[arg(long)]
        data_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Serve { port, data_dir } => serve(port, data_dir).await,
    };
    std::process::exit(exit_code);
}

async fn serve(port: Option<u16>, data_dir: PathBuf) -> i32 {
    let config = match SimConfig::load(Some(&data_dir)) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            return 1;
        }
    };
    let port = port.unwrap_or(config.http_port);

    let start: NaiveDateTime = chrono::Local::now().naive_local().date().and_hms_opt(0, 0, 0).expect("midnight always parses");

    let bootstrap_started = std::time::Instant::now();
    let (environment, events) = match bootstrap::bootstrap(&config, &data_dir, start) {
        Ok(result) => result,
        Err(err) => {
            error!(error = %err, data_dir = %data_dir.display(), "failed to bootstrap environment");
            return 1;
        }
    };
    info!(
        vehicles = environment.vehicles.len(),
        elapsed = %humantime::format_duration(bootstrap_started.elapsed()),
        "environment bootstrapped"
    );

    let handle = Arc::new(tokio::sync::Mutex::new(SimulationHandle::new(environment, events, None)));
    let cancel = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let tick_task = tokio::spawn(run_loop(handle.clone(), cancel.clone()));

    let state = AppState { handle, cancel };
    let app = api::router(state).layer(tower_http::trace::TraceLayer::new_for_http()).layer(tower_http::cors::CorsLayer::permissive());

    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, port, "failed to bind control API port");
            tick_task.abort();
            return 1;
        }
    };
    info!(port, "control API listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(err) = result {
                error!(error = %err, "control API server error");
                tick_task.abort();
                return 1;
            }
            tick_task.abort();
            0
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            tick_task.abort();
            130
        }
    }
}
