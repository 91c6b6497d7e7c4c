use anyhow::Context;

use kardexpos_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kardexpos_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let app = kardexpos_api::app::build_app(&config)
        .await
        .context("failed to initialize storage")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
