//! # dlnaserver - Frontal HTTP basé sur Axum
//!
//! - [`server`] : serveur axum dont toutes les routes aboutissent au moteur
//! - [`engine_thread`] : thread propriétaire du `DeviceEngine`, piloté par canal
//! - [`logs`] : installation du subscriber `tracing`
//!
//! ```rust,no_run
//! use dlnaserver::{EngineThread, Server};
//! # async fn example(build: impl FnOnce() -> anyhow::Result<dlnaupnp::DeviceEngine> + Send + 'static) -> anyhow::Result<()> {
//! let engine = EngineThread::spawn(build).await?;
//! let mut server = Server::new("DLNAKit", "http://192.168.1.20:8080", 8080, engine.client());
//! server.start().await?;
//! tokio::signal::ctrl_c().await?;
//! server.stop().await;
//! tokio::task::spawn_blocking(move || engine.shutdown()).await?;
//! # Ok(())
//! # }
//! ```

pub mod engine_thread;
pub mod logs;
pub mod server;

pub use engine_thread::{EngineClient, EngineThread, EngineThreadError};
pub use logs::{LoggingOptions, init_logging};
pub use server::{Server, ServerInfo, router};
