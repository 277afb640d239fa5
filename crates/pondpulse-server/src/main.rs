mod api;
mod middleware;
mod scheduler;
mod sensors;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
    sensors::HttpSensorSource,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(pondpulse_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = pondpulse_store::PoolConfig::from_app_config(&config);
    let pool = pondpulse_store::connect_pool(&config.database_url, pool_config).await?;
    pondpulse_store::run_migrations(&pool).await?;
    let store = pondpulse_store::PgStore::new(pool);

    let sensors = HttpSensorSource::new(
        &config.sensor_base_url,
        Duration::from_secs(config.sensor_request_timeout_secs),
    )?;

    let _scheduler = scheduler::build_scheduler(store.clone(), sensors.clone()).await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        pondpulse_core::Environment::Development
    ))?;
    let state = AppState {
        store,
        sensors,
        export_row_limit: config.export_row_limit,
    };
    let app = build_app(state, auth, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
