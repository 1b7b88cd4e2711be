use crate::clock::SystemClock;
use crate::metrics::ReconcileCounters;
use crate::state::{AppState, ControllerContext};
use std::env;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod api;
mod clock;
mod config;
mod controller;
mod error;
mod image_reference;
mod metrics;
mod registry;
mod resource;
mod state;
mod version;
mod webserver;

#[cfg(target_env = "musl")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    info!("Starting kube-component-versions {}", env!("CARGO_PKG_VERSION"));

    let config_path =
        env::var("CONFIG_PATH").unwrap_or_else(|_| "/config/config.yaml".to_string());
    let config = Arc::new(config::load_config(&config_path)?);

    let client = controller::create_client().await?;
    let http_client = registry::create_http_client(&config.registry)?;
    let registry = prometheus::Registry::new();
    let counters = Arc::new(ReconcileCounters::new(&registry)?);
    let ready = Arc::new(AtomicBool::new(false));
    let shutdown = CancellationToken::new();

    let ctx = ControllerContext {
        kube_client: client,
        config: config.clone(),
        http_client,
        clock: Arc::new(SystemClock),
        counters,
        ready: ready.clone(),
        shutdown: shutdown.clone(),
    };

    let cron_schedule = config.reconcile.schedule.clone();
    info!("Executing job scheduler at cron schedule {}", cron_schedule);
    let mut scheduler = JobScheduler::new().await?;

    let job = Job::new_async(cron_schedule, move |_uuid, _l| {
        let ctx = ctx.clone();
        Box::pin(async move {
            if ctx.shutdown.is_cancelled() {
                return;
            }
            if let Err(e) = controller::run(ctx).await {
                error!("Error running controller job: {:?}", e);
            }
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;

    let app = webserver::create_app(AppState { registry, ready });
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.webserver.port));
    info!("Starting webserver on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {:?}", e);
            }
            info!("Shutdown signal received");
            server_shutdown.cancel();
        })
        .await?;

    scheduler.shutdown().await?;
    info!("Stopped kube-component-versions");
    Ok(())
}
