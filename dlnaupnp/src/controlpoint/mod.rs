//! # Module ControlPoint - Point de contrôle UPnP
//!
//! Pendant côté client de [`DeviceEngine`](crate::engine::DeviceEngine) :
//! recherche des devices (M-SEARCH), suivi de leurs annonces, abonnement à
//! leurs événements et réception des NOTIFY GENA.
//!
//! Toutes les émissions et remises passent par le même [`Scheduler`] que le
//! device :
//!
//! ```text
//! search / subscribe  -> Schedule::MSearch / PostSubscribe -> UDP
//! UDP (alive, byebye, réponses) -> NotifyReplyCp -> DeviceRegistry + handler
//! HTTP NOTIFY (GENA)  -> NotifyReplyCp -> handler
//! ```
//!
//! La socket d'un point de contrôle ne doit pas partager le port 1900 avec un
//! device : voir [`SsdpSocket::bind_control_point`](crate::ssdp::SsdpSocket::bind_control_point).

mod parser;
mod registry;

pub use parser::{PropertyChange, parse_datagram, parse_event, parse_property_set};
pub use registry::{DeviceRegistry, DiscoveredDevice, udn_of};

use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use dlnaxml::XmlError;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::http::{HttpReply, HttpRequest};
use crate::ssdp::{
    MAX_AGE, NotifyHandler, NotifyReplyCp, Schedule, ScheduleContext, ScheduleId, Scheduler,
    UdpTransport,
};

/// Refus d'une opération du point de contrôle.
#[derive(Error, Debug)]
pub enum ControlPointError {
    #[error("Control point is not started")]
    Inactive,

    /// `subscribe` sans URL de rappel configurée
    #[error("No callback URL configured")]
    MissingCallbackUrl,

    #[error("Missing NT or NTS header")]
    MissingEventHeaders,

    #[error("Invalid event headers NT='{nt}' NTS='{nts}'")]
    InvalidEventHeaders { nt: String, nts: String },

    #[error("Missing SID header")]
    MissingSid,

    #[error("Event body exceeds {0} bytes")]
    EventTooLarge(usize),

    #[error("Failed to read event body: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid event body: {0}")]
    Xml(#[from] XmlError),
}

impl ControlPointError {
    /// Statut HTTP de la réponse à un NOTIFY refusé.
    pub fn status_code(&self) -> u16 {
        match self {
            ControlPointError::MissingEventHeaders => 400,
            ControlPointError::EventTooLarge(_) => 413,
            ControlPointError::Io(_) | ControlPointError::Xml(_) => 400,
            _ => 412,
        }
    }
}

/// Réglages du point de contrôle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPointConfig {
    /// ST de la recherche lancée par `begin`, aussi filtre des annonces
    pub search_target: String,
    pub mx: u32,
    /// Période de répétition du M-SEARCH initial
    pub search_repeat: Duration,
    /// Durée pendant laquelle le M-SEARCH initial est répété
    pub search_duration: Duration,
    /// URL annoncée dans `CALLBACK` des abonnements
    pub callback_url: Option<String>,
    pub subscription_timeout_sec: u32,
    /// Taille maximale du corps d'un NOTIFY GENA
    pub max_event_body: usize,
    /// Datagrammes traités au plus par `poll`
    pub max_datagrams_per_poll: usize,
}

impl Default for ControlPointConfig {
    fn default() -> Self {
        Self {
            search_target: "ssdp:all".to_string(),
            mx: 3,
            search_repeat: Duration::from_secs(1),
            search_duration: Duration::from_secs(3),
            callback_url: None,
            subscription_timeout_sec: 1800,
            max_event_body: 64 * 1024,
            max_datagrams_per_poll: 32,
        }
    }
}

/// Bilan d'un `poll`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlPointStats {
    pub received: usize,
    pub scheduled: usize,
    pub processed: usize,
}

pub struct ControlPoint {
    config: ControlPointConfig,
    scheduler: Scheduler,
    registry: DeviceRegistry,
    udp: Box<dyn UdpTransport + Send>,
    handler: Option<Box<NotifyHandler<'static>>>,
    active: bool,
}

impl ControlPoint {
    pub fn new(udp: Box<dyn UdpTransport + Send>, config: ControlPointConfig) -> Self {
        Self {
            config,
            scheduler: Scheduler::new(),
            registry: DeviceRegistry::new(),
            udp,
            handler: None,
            active: false,
        }
    }

    /// Gestionnaire applicatif des annonces et événements reçus ; appelé après
    /// la mise à jour de la table des devices.
    pub fn with_notify_handler<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&NotifyReplyCp) -> bool + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    pub fn config(&self) -> &ControlPointConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn devices(&self) -> &[DiscoveredDevice] {
        self.registry.devices()
    }

    pub fn device(&self, udn: &str) -> Option<&DiscoveredDevice> {
        self.registry.get(udn)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Lance la recherche initiale, répétée toutes les `search_repeat`
    /// pendant `search_duration`.
    pub fn begin(&mut self, now: Instant) -> Option<ScheduleId> {
        self.active = true;
        let search = Schedule::msearch(self.config.search_target.clone(), self.config.mx, now)
            .repeat_every(self.config.search_repeat)
            .until(now + self.config.search_duration);
        info!(
            "🔍 Control point started (ST={})",
            self.config.search_target
        );
        self.scheduler.add(search)
    }

    /// M-SEARCH supplémentaire, émis au prochain `poll`.
    pub fn search(
        &mut self,
        search_target: &str,
        mx: u32,
        now: Instant,
    ) -> Result<ScheduleId, ControlPointError> {
        if !self.active {
            return Err(ControlPointError::Inactive);
        }
        self.scheduler
            .add(Schedule::msearch(search_target, mx, now))
            .ok_or(ControlPointError::Inactive)
    }

    /// Abonnement aux événements d'un service, émis en datagramme vers
    /// `device` avec l'URL de rappel configurée.
    pub fn subscribe(
        &mut self,
        device: SocketAddr,
        event_path: &str,
        now: Instant,
    ) -> Result<ScheduleId, ControlPointError> {
        if !self.active {
            return Err(ControlPointError::Inactive);
        }
        let callback = self
            .config
            .callback_url
            .clone()
            .ok_or(ControlPointError::MissingCallbackUrl)?;
        let schedule = Schedule::post_subscribe(
            device,
            event_path,
            callback,
            self.config.subscription_timeout_sec,
            now,
        );
        self.scheduler.add(schedule).ok_or(ControlPointError::Inactive)
    }

    /// Un tour de boucle : datagrammes entrants, expirations, émissions et
    /// remises échues.
    pub fn poll(&mut self, now: Instant) -> ControlPointStats {
        let mut stats = ControlPointStats::default();
        if !self.active {
            return stats;
        }

        while stats.received < self.config.max_datagrams_per_poll {
            let Some(request) = self.udp.receive() else {
                break;
            };
            stats.received += 1;
            trace!("SSDP datagram from {} ({} bytes)", request.peer, request.data.len());
            if let Some(schedule) = parse_datagram(&request, now) {
                if self.scheduler.add(schedule).is_some() {
                    stats.scheduled += 1;
                }
            }
        }

        self.registry.remove_expired(now);
        if !self.scheduler.is_empty() {
            stats.processed = self.tick(now);
        }
        stats
    }

    fn tick(&mut self, now: Instant) -> usize {
        let registry = &mut self.registry;
        let filter = self.config.search_target.as_str();
        let app = &mut self.handler;
        let mut handler = move |notify: &NotifyReplyCp| {
            let known = registry.apply(notify, filter, now);
            let handled = match app.as_mut() {
                Some(app) => app(notify),
                None => false,
            };
            known || handled
        };
        let mut ctx =
            ScheduleContext::new(self.udp.as_mut(), MAX_AGE).with_notify_handler(&mut handler);
        self.scheduler.tick(now, &mut ctx)
    }

    /// Reçoit un NOTIFY GENA sur l'URL de rappel.
    ///
    /// Répond 200 et programme la remise au gestionnaire pour le prochain
    /// `poll`, ou répond avec le statut d'erreur GENA.
    pub fn handle_http(
        &mut self,
        request: &mut dyn HttpRequest,
        reply: &mut dyn HttpReply,
        now: Instant,
    ) {
        if !request.method().eq_ignore_ascii_case("NOTIFY") {
            warn!("Method {} not allowed on control point", request.method());
            reply.set_status(405);
            return;
        }
        match parse_event(request, self.config.max_event_body) {
            Ok(notify) => {
                debug!(
                    "Event {} SEQ={} on {}",
                    notify.subscription_id, notify.event_key, notify.delivery_path
                );
                let from = parser::host_addr(&notify.delivery_host_and_port);
                self.scheduler.add(Schedule::notify_reply(notify, from, now));
                reply.set_status(200);
                reply.set_header("Content-Length", "0");
            }
            Err(e) => {
                warn!("❌ Event refused: {}", e);
                reply.set_status(e.status_code());
            }
        }
    }

    /// Arrête la recherche et oublie les devices.
    pub fn end(&mut self) {
        self.scheduler.clear();
        self.registry.clear();
        self.active = false;
        info!("Control point stopped");
    }
}
