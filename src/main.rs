use queue_dashboard::animation::spawn_frame_driver;
use queue_dashboard::channel::run_channel;
use queue_dashboard::config::FRAME_INTERVAL;
use queue_dashboard::refresh::{refresh_stats, spawn_refresher};
use queue_dashboard::{router, AppState, Config};
use std::net::SocketAddr;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env()?;
    let port = config.port;
    let refresh_interval = config.refresh_interval;
    info!(server = %config.server_url, "starting queue dashboard");

    let state = AppState::new(config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    spawn_frame_driver(state.clone(), FRAME_INTERVAL);
    let channel = tokio::spawn(run_channel(state.clone(), shutdown_rx));
    match refresh_interval {
        Some(period) => spawn_refresher(state.clone(), period),
        None => {
            let state = state.clone();
            tokio::spawn(async move {
                if let Err(err) = refresh_stats(&state).await {
                    warn!("initial stats pull failed: {err}");
                }
            });
        }
    }

    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("mirror listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for shutdown signal: {err}");
                std::future::pending::<()>().await;
            }
            let _ = shutdown_tx.send(true);
        })
        .await?;

    channel.await?;
    Ok(())
}
