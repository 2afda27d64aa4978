use sqlx::postgres::PgPoolOptions;

use storefront_api::{app, config::Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    storefront_observability::init();

    let config = Config::from_env()?;
    // Fail fast on a broken tier table instead of at first checkout.
    config.load_tier_table()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    storefront_infra::ensure_schema(&pool).await?;

    let bind_addr = config.bind_addr.clone();
    let router = app::build_app(config, pool)?;

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}
