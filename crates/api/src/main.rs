use anyhow::Context;

use sickfits_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sickfits_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = sickfits_api::app::build_services(&config)
        .await
        .context("failed to initialise backends")?;
    let app = sickfits_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, frontend = %config.frontend_url, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
