use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;
use tracing_subscriber::EnvFilter;

use escrowd::api::{self, ApiState};
use escrowd::config::Config;
use escrowd::escrow::EscrowService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;

    let (requests, inbox) = mpsc::channel(config.request_buffer);
    let service = tokio::spawn(async move {
        let mut service = EscrowService::in_memory();
        service.run(ReceiverStream::new(inbox)).await;
    });

    let app = api::router(Arc::new(ApiState::new(requests)));
    let addr = format!("0.0.0.0:{}", config.api_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "escrow api listening");
    axum::serve(listener, app).await.context("serving api")?;

    service.await.context("escrow service task")?;
    Ok(())
}
