mod collectors;
mod config;
mod host;
mod http;
mod metrics;
mod publisher;
mod scheduler;
mod state;

use axum::serve;
use clap::Parser;
use collectors::Sampler;
use config::{Config, DEFAULT_CONFIG_PATH};
use host::SystemHost;
use metrics::Metrics;
use publisher::JsonFilePublisher;
use scheduler::{LatestSnapshot, Scheduler};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::sync::{watch, RwLock};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hostdash")]
#[command(version)]
#[command(about = "Publishes a JSON snapshot of host health for a static dashboard")]
struct Cli {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,
    /// Print the annotated default configuration and exit.
    #[arg(long)]
    print_default_config: bool,
    /// Collect and publish a single snapshot, then exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match Config::load_or_default(&cli.config) {
        Ok((cfg, true)) => cfg,
        Ok((cfg, false)) => {
            warn!(path = %cli.config, "config file not found, using built-in defaults");
            cfg
        }
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "failed to initialise metrics");
            std::process::exit(1);
        }
    };

    info!(
        interval = %humantime::format_duration(cfg.interval()),
        command_timeout = %humantime::format_duration(cfg.command_timeout()),
        output = %cfg.output_path.display(),
        services = ?cfg.services,
        listen = cfg.listen.as_deref().unwrap_or("-"),
        "starting hostdash"
    );

    let host = Arc::new(SystemHost::new(cfg.command_timeout(), Handle::current()));
    let sampler = Sampler::new(host, cfg.services.clone()).with_metrics(metrics.clone());
    let publisher = JsonFilePublisher::new(&cfg.output_path);
    let latest: LatestSnapshot = Arc::new(RwLock::new(None));
    let scheduler = Scheduler::new(
        sampler,
        publisher,
        cfg.interval(),
        metrics.clone(),
        latest.clone(),
    );

    if cli.once {
        match scheduler.run_cycle().await {
            Ok(()) => info!(output = %cfg.output_path.display(), "snapshot published"),
            Err(err) => {
                error!(stage = err.stage(), error = %err, "snapshot cycle failed");
                std::process::exit(1);
            }
        }
        return;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_task = match &cfg.listen {
        Some(listen) => {
            let listener = match bind(listen).await {
                Ok(l) => l,
                Err(err) => {
                    error!(error = %err, listen = %listen, "failed to start HTTP server");
                    std::process::exit(1);
                }
            };
            let app = http::build_router(metrics.clone(), latest.clone());
            let mut shutdown_rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                let server = serve(listener, app).with_graceful_shutdown(async move {
                    let _ = shutdown_rx.changed().await;
                });
                if let Err(err) = server.await {
                    error!(error = %err, "HTTP server error");
                }
            }))
        }
        None => None,
    };

    let scheduler_task = tokio::spawn(scheduler.run(shutdown_rx));

    wait_for_shutdown().await;
    let _ = shutdown_tx.send(true);

    if let Err(err) = scheduler_task.await {
        error!(error = %err, "scheduler task ended abnormally");
    }
    if let Some(task) = http_task {
        let _ = task.await;
    }
    info!("hostdash stopped");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn bind(listen: &str) -> std::io::Result<TcpListener> {
    let addr: SocketAddr = listen
        .parse()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP server listening");
    Ok(listener)
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
