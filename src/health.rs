//! Liveness endpoint for external uptime checks.

use std::net::{Ipv4Addr, SocketAddr};

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tracing::info;

pub const STATUS_TEXT: &str = "Discord cloner running!";

pub fn router() -> Router {
    Router::new()
        .route("/", get(status))
        .route("/health", get(status))
}

async fn status() -> &'static str {
    STATUS_TEXT
}

pub async fn serve(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = TcpListener::bind(addr).await?;
    info!("🌐 Liveness endpoint on http://{}", addr);
    axum::serve(listener, router()).await?;
    Ok(())
}
