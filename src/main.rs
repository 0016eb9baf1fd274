use movieshelf::{AppState, app, config::Config, purge_seeds};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,movieshelf=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Config::from_env()?;
    let addr = config.addr;

    if std::env::args().nth(1).as_deref() == Some("purge-seeds") {
        purge_seeds(&config).await?;
        return Ok(());
    }

    let state = AppState::build(config).await?;
    tracing::info!(
        seed_policy = ?state.config.seed_delete_policy,
        require_auth = state.config.require_auth,
        "state ready"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app(state)).await?;

    Ok(())
}
