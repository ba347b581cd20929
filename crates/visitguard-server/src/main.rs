mod api;
mod middleware;

use tracing_subscriber::EnvFilter;
use visitguard_core::{Environment, VisitPolicy};

use crate::{
    api::{build_app, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = visitguard_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = visitguard_db::PoolConfig::from_app_config(&config);
    let pool = visitguard_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = visitguard_db::run_migrations(&pool).await?;
    tracing::info!(applied, "database migrations complete");

    let auth = AuthState::from_env(matches!(config.env, Environment::Development))?;
    let state = AppState::new(pool, VisitPolicy::from_app_config(&config));
    let app = build_app(state, auth);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(bind_addr = %config.bind_addr, env = %config.env, "visitguard server listening");
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
