use anyhow::Context;

use stockmaster_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real environment variables win.
    dotenvy::dotenv().ok();
    stockmaster_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let app = stockmaster_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
