use clap::Parser as _;
use groq_relay::client::create_hyper_client;
use groq_relay::config::Config;
use groq_relay::relay::Upstream;
use groq_relay::{AppState, build_router};
use tokio::net::TcpListener;
use tracing::{info, instrument};

#[tokio::main]
#[instrument]
pub async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // A missing or empty credential fails here, before anything binds.
    let config = Config::parse().validate()?;
    info!("Starting Groq relay with config: {:?}", config);

    let upstream = Upstream::from_config(&config)?;
    let http_client = create_hyper_client(config.pool_settings());
    let app_state = AppState::with_client(upstream, http_client);
    let router = build_router(app_state);

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Groq relay listening on {}", bind_addr);

    axum::serve(listener, router).await?;

    Ok(())
}
