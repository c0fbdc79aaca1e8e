use std::sync::Arc;

use hotelmenu_api::{app, config::ApiConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    hotelmenu_observability::init();

    let config = ApiConfig::from_env()?;
    tracing::info!(
        persistent = config.use_persistent_stores,
        policy = ?config.admission_policy,
        currency = %config.default_currency,
        "starting hotelmenu-api"
    );

    let services = Arc::new(app::services::build_services(&config).await?);
    let app = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
