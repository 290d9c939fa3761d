use std::net::Ipv4Addr;
use std::time::Duration;

use dlnaconfig::{Config, get_config};
use dlnamediarenderer::{MediaRenderer, RendererIdentity, media_renderer_device};
use dlnaserver::{EngineThread, LoggingOptions, Server, init_logging};
use dlnaupnp::engine::{DeviceEngine, EngineConfig};
use dlnaupnp::events::HttpEventSender;
use dlnaupnp::ssdp::SsdpSocket;
use tracing::{info, warn};

const DEVICE_TYPE: &str = "mediarenderer";
const DEVICE_NAME: &str = "main";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ========== PHASE 1 : Configuration et logs ==========
    let config = get_config()?;
    init_logging(&LoggingOptions {
        min_level: config.get_log_min_level(),
        enable_console: config.get_log_enable_console(),
    });
    info!("🎵 DLNAKit {} starting", env!("CARGO_PKG_VERSION"));

    let base_url = config.get_base_url();
    let http_port = config.get_http_port();
    let identity = RendererIdentity {
        udn: config.get_device_udn(DEVICE_TYPE, DEVICE_NAME)?,
        friendly_name: config.get_device_friendly_name(DEVICE_TYPE, DEVICE_NAME, "DLNAKit Renderer"),
        base_url: base_url.clone(),
        local_ip: local_ip(&base_url),
    };
    let engine_config = engine_config(&config);
    let queue_capacity = config.get_udp_queue_capacity() as usize;
    let notify_timeout = Duration::from_millis(config.get_notify_timeout_ms());

    // ========== PHASE 2 : Device et moteur ==========
    let renderer = MediaRenderer::new();
    renderer.set_media_event_handler(|event, state| {
        info!(
            "🎶 {:?}: {} {} (volume {}{})",
            event,
            state.transport_state,
            state.current_uri,
            state.volume,
            if state.muted { ", muted" } else { "" }
        );
    });

    info!("📡 Registering MediaRenderer {}...", identity.friendly_name);
    let engine_renderer = renderer.clone();
    let engine = EngineThread::spawn(move || {
        let device = media_renderer_device(&identity)?;
        let udp = SsdpSocket::bind(queue_capacity)?;
        let sender = HttpEventSender::new(notify_timeout, device.server())?;
        let engine = DeviceEngine::new(
            device,
            engine_renderer.dispatcher()?,
            Box::new(udp),
            Box::new(sender),
            engine_config,
        )?
        .with_initial_event(engine_renderer.initial_event_hook())
        .with_event_source(engine_renderer.event_source());
        Ok(engine)
    })
    .await?;

    // ========== PHASE 3 : Démarrage du serveur ==========
    info!("🌐 Starting HTTP server...");
    let mut server = Server::new("DLNAKit", base_url.as_str(), http_port, engine.client());
    server.start().await?;

    info!("✅ DLNAKit is ready!");
    info!("Press Ctrl+C to stop...");
    tokio::signal::ctrl_c().await?;
    info!("Ctrl+C reçu, arrêt gracieux");

    server.stop().await;
    tokio::task::spawn_blocking(move || engine.shutdown()).await?;
    Ok(())
}

fn engine_config(config: &Config) -> EngineConfig {
    let defaults = EngineConfig::default();
    EngineConfig {
        max_age: u32::try_from(config.get_max_age()).unwrap_or(defaults.max_age),
        alive_repeat: Duration::from_millis(config.get_alive_repeat_ms()),
        bye_repeat: Duration::from_millis(config.get_bye_repeat_ms()),
        bye_duration: Duration::from_millis(config.get_bye_duration_ms()),
        subscription_timeout_sec: u32::try_from(config.get_subscription_timeout_sec())
            .unwrap_or(defaults.subscription_timeout_sec),
        xml_chunk_size: (config.get_xml_chunk_size() as usize).max(1),
        discovery_netmask: config.get_discovery_netmask(),
        loop_delay: Duration::from_millis(config.get_loop_delay_ms()),
        ..defaults
    }
}

/// Adresse IPv4 de l'URL de base, sinon celle de l'interface par défaut.
fn local_ip(base_url: &str) -> Option<Ipv4Addr> {
    let host = base_url
        .split("://")
        .nth(1)
        .unwrap_or(base_url)
        .split(['/', ':'])
        .next()
        .unwrap_or_default();
    match host.parse() {
        Ok(ip) => Some(ip),
        Err(_) => {
            let guessed = dlnautils::guess_local_ip();
            let ip = guessed.parse().ok();
            if ip.is_none() {
                warn!("⚠️ No local IPv4 address, subnet filter disabled");
            }
            ip
        }
    }
}
