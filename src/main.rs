use std::{net::SocketAddr, time::Duration};

use tokio::net::TcpListener;
use tokio::time::interval;

use smart_attend_guard::{
    app::{
        api::{create_api_router, AppContext},
        state::AppState,
    },
    config::GlobalConfig,
    managers::lifecycle::{LifecycleEvent, LifecycleMonitor, SuspendReason},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    tracing::info!("Starting Smart Attend session guard");

    let config = GlobalConfig::from_env()?;
    let (state, lifecycle_rx) = AppState::from_config(&config)?;

    tokio::spawn(LifecycleMonitor::run(
        lifecycle_rx,
        state.coordinator.clone(),
    ));
    state.lifecycle.on_launch();

    let tick_coordinator = state.coordinator.clone();
    let tick_interval_ms = config.session.tick_interval_ms.max(1);
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_millis(tick_interval_ms));

        loop {
            interval.tick().await;
            if let Some(finalizing) = tick_coordinator.tick().await {
                tokio::spawn(async move {
                    match finalizing.await {
                        Ok(outcome) => tracing::info!("Expired session finalized: {:?}", outcome),
                        Err(e) => tracing::error!("Finalize task failed: {}", e),
                    }
                });
            }
        }
    });

    let shutdown_coordinator = state.coordinator.clone();
    let context = AppContext {
        state,
        config: config.clone(),
    };
    let app = create_api_router(context);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://{}:{}/swagger-ui",
        config.server.host,
        config.server.port
    );

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            return;
        }

        tracing::info!("Shutdown requested - checkpointing active session");
        let event = LifecycleEvent::Suspending(SuspendReason::Terminating);
        if let Err(e) = shutdown_coordinator.handle_lifecycle(event).await {
            tracing::error!("Checkpoint on shutdown failed: {}", e);
        }
    })
    .await?;

    Ok(())
}
