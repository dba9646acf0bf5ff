pub mod classify;
pub mod config;
pub mod editor;
pub mod error;
pub mod export;
pub mod logging;
pub mod palette;
pub mod ports;
pub mod raster;
pub mod session;
pub mod state;
pub mod style;
pub mod typeset;

mod app;
mod assets;
mod interactive;
mod math;
mod templates;

pub use app::app;

use std::net::SocketAddr;

pub async fn serve(addr: SocketAddr, config: config::AppConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening on http://{addr}");
    axum::serve(listener, app(config)).await
}
