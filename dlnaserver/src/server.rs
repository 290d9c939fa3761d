//! # Module Server - frontal HTTP du device
//!
//! Toute requête reçue par axum est mise en mémoire puis confiée au moteur via
//! [`EngineClient`] : description, SCPD, contrôle SOAP et abonnements GENA
//! (y compris les méthodes `SUBSCRIBE`/`UNSUBSCRIBE`, qui ne sont pas des
//! méthodes HTTP standard et passent donc par le `fallback`).

use std::net::SocketAddr;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use dlnaupnp::http::{BufferedReply, BufferedRequest};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine_thread::EngineClient;

/// Taille maximale d'un corps de requête (enveloppes SOAP)
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Info serveur sérialisable
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub base_url: String,
    pub http_port: u16,
}

/// Serveur HTTP
pub struct Server {
    name: String,
    base_url: String,
    http_port: u16,
    router: Router,
    local_addr: Option<SocketAddr>,
    shutdown: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl Server {
    /// * `base_url` - URL annoncée (ex: "http://192.168.1.20:8080")
    /// * `http_port` - port d'écoute, 0 pour un port libre
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        http_port: u16,
        engine: EngineClient,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
            router: router(engine),
            local_addr: None,
            shutdown: None,
            join_handle: None,
        }
    }

    /// Démarre l'écoute et retourne l'adresse effective.
    pub async fn start(&mut self) -> anyhow::Result<SocketAddr> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.http_port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(
            "✅ Server {} running at {} (port {})",
            self.name,
            self.base_url,
            local_addr.port()
        );

        let (tx, rx) = oneshot::channel::<()>();
        let router = self.router.clone();
        self.join_handle = Some(tokio::spawn(async move {
            let served = axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await;
            if let Err(e) = served {
                error!("❌ HTTP server error: {}", e);
            }
        }));
        self.shutdown = Some(tx);
        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    /// Arrête l'écoute et attend la fin des requêtes en cours.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.wait().await;
        info!("Server {} stopped", self.name);
    }

    /// Attend la fin du serveur
    pub async fn wait(&mut self) {
        if let Some(h) = self.join_handle.take() {
            let _ = h.await;
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            name: self.name.clone(),
            base_url: self.base_url.clone(),
            http_port: self.local_addr.map_or(self.http_port, |a| a.port()),
        }
    }
}

/// Router dont le `fallback` transmet tout au moteur.
pub fn router(engine: EngineClient) -> Router {
    Router::new().fallback(forward).with_state(engine)
}

async fn forward(State(engine): State<EngineClient>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    debug!("{} {}", parts.method, parts.uri.path());

    let body = match to_bytes(body, MAX_BODY_SIZE).await {
        Ok(body) => body,
        Err(e) => {
            warn!("Rejected body of {} {}: {}", parts.method, parts.uri.path(), e);
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let mut buffered = BufferedRequest::new(parts.method.as_str(), parts.uri.path());
    for (name, value) in &parts.headers {
        match value.to_str() {
            Ok(value) => buffered = buffered.with_header(name.as_str(), value),
            Err(_) => debug!("Skipping non-ASCII header {}", name),
        }
    }
    let buffered = buffered.with_body(body.to_vec());

    match engine.call(buffered).await {
        Ok(reply) => into_response(reply),
        Err(e) => {
            warn!("❌ {} {}: {}", parts.method, parts.uri.path(), e);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

fn into_response(reply: BufferedReply) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = Response::new(Body::from(reply.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in &reply.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!("Dropping invalid reply header {}: {}", name, value),
        }
    }
    response
}
