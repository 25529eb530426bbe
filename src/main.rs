use axum::{routing::get, Router};
use tempchat::{config::Config, index, rooms, store, AppState};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tempchat=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    let app_state = AppState {
        store: store::open(&config.backend).await?,
        expiry: config.expiry,
    };
    info!(
        "Using {} store, messages live {:?}, sweeping every {:?}",
        config.backend.kind(), config.expiry.ttl, config.expiry.interval
    );

    let app = Router::new()
        .route("/", get(index::index))
        .nest("/r", rooms::router())

        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("Listening on {}", config.bind);
    axum::serve(listener, app).await?;

    Ok(())
}
