//! Moteur d'un device UPnP.
//!
//! [`DeviceEngine`] regroupe l'ordonnanceur SSDP, le classifieur, le
//! gestionnaire d'abonnements et la table d'actions SOAP. Il est possédé par
//! un seul thread qui appelle [`DeviceEngine::poll`] en boucle et lui confie
//! les requêtes HTTP via [`DeviceEngine::handle_http`].
//!
//! ```text
//! UDP  -> classify -> Scheduler::tick -> UDP
//! HTTP -> SOAP / GENA / description
//! poll -> SubscriptionManager::publish -> NOTIFY
//! ```

use std::io::Write;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::devices::{DeviceError, DeviceInfo, ServiceInfo};
use crate::events::{DEFAULT_TIMEOUT_SEC, EventSender, SubscriptionManager};
use crate::http::{ByteCounter, HttpReply, HttpRequest};
use crate::soap::{
    ActionContext, ActionDispatcher, CONTENT_TYPE_XML, error_codes, parse_action_request,
    parse_soap_action_header, reply_fault,
};
use crate::ssdp::{
    Classification, MAX_AGE, SECOND_ALIVE_DELAY, Schedule, ScheduleContext, ScheduleId, Scheduler,
    SsdpClassifier, UdpTransport,
};

/// Appelé après un nouvel abonnement, pour publier l'état complet du service
/// au seul nouvel abonné.
pub type InitialEventHook = Box<dyn FnMut(&ServiceInfo, &str, &mut SubscriptionManager) + Send>;

/// Appelé à chaque `poll`, pour injecter des changements produits hors du moteur.
pub type EventSource = Box<dyn FnMut(&mut SubscriptionManager) + Send>;

/// Réglages du moteur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// `CACHE-CONTROL: max-age` des annonces
    pub max_age: u32,
    /// Période des annonces alive ; zéro pour les deux annonces de démarrage seulement
    pub alive_repeat: Duration,
    pub bye_repeat: Duration,
    pub bye_duration: Duration,
    pub subscription_timeout_sec: u32,
    /// Taille des morceaux lus dans le corps SOAP
    pub xml_chunk_size: usize,
    /// Filtre de sous-réseau des M-SEARCH (avec l'IP locale du device)
    pub discovery_netmask: Option<Ipv4Addr>,
    /// Datagrammes traités au plus par `poll`
    pub max_datagrams_per_poll: usize,
    /// Pause entre deux `poll` dans [`DeviceEngine::end`]
    pub loop_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_age: MAX_AGE,
            alive_repeat: Duration::from_secs(900),
            bye_repeat: Duration::from_millis(800),
            bye_duration: Duration::from_millis(2000),
            subscription_timeout_sec: DEFAULT_TIMEOUT_SEC,
            xml_chunk_size: 256,
            discovery_netmask: None,
            max_datagrams_per_poll: 32,
            loop_delay: Duration::from_millis(8),
        }
    }
}

/// Bilan d'un `poll`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub received: usize,
    pub scheduled: usize,
    pub sent: usize,
    pub published: usize,
}

pub struct DeviceEngine {
    device: DeviceInfo,
    config: EngineConfig,
    scheduler: Scheduler,
    classifier: SsdpClassifier,
    subscriptions: SubscriptionManager,
    dispatcher: ActionDispatcher,
    udp: Box<dyn UdpTransport + Send>,
    sender: Box<dyn EventSender + Send>,
    initial_event: Option<InitialEventHook>,
    event_source: Option<EventSource>,
    started: bool,
}

impl DeviceEngine {
    /// Construit le moteur ; le device est validé (URL de base routable, UDN).
    pub fn new(
        device: DeviceInfo,
        dispatcher: ActionDispatcher,
        udp: Box<dyn UdpTransport + Send>,
        sender: Box<dyn EventSender + Send>,
        config: EngineConfig,
    ) -> Result<Self, DeviceError> {
        device.validate()?;

        let mut classifier = SsdpClassifier::for_device(&device);
        match (config.discovery_netmask, device.local_ip()) {
            (Some(netmask), Some(local)) => {
                info!("Discovery restricted to {}/{}", local, netmask);
                classifier.set_subnet_filter(local, netmask);
            }
            (Some(_), None) => warn!("Discovery netmask set but device has no local IP: ignored"),
            _ => {}
        }

        Ok(Self {
            subscriptions: SubscriptionManager::new(config.subscription_timeout_sec),
            device,
            config,
            scheduler: Scheduler::new(),
            classifier,
            dispatcher,
            udp,
            sender,
            initial_event: None,
            event_source: None,
            started: false,
        })
    }

    pub fn with_initial_event(mut self, hook: InitialEventHook) -> Self {
        self.initial_event = Some(hook);
        self
    }

    pub fn with_event_source(mut self, source: EventSource) -> Self {
        self.event_source = Some(source);
        self
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    pub fn subscriptions_mut(&mut self) -> &mut SubscriptionManager {
        &mut self.subscriptions
    }

    pub fn classifier_mut(&mut self) -> &mut SsdpClassifier {
        &mut self.classifier
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn set_scheduler_active(&mut self, active: bool) {
        self.scheduler.set_active(active);
    }

    pub fn is_scheduler_active(&self) -> bool {
        self.scheduler.is_active()
    }

    /// Plus rien à émettre.
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_empty()
    }

    /// Ajoute une émission supplémentaire.
    pub fn schedule(&mut self, schedule: Schedule) -> Option<ScheduleId> {
        self.scheduler.add(schedule)
    }

    /// Programme les annonces alive : une immédiate, une seconde 100 ms plus
    /// tard, toutes deux répétées selon `alive_repeat`.
    pub fn begin(&mut self, now: Instant) -> Result<(), DeviceError> {
        if self.started {
            return Err(DeviceError::AlreadyStarted);
        }
        self.device.validate()?;

        for due in [now, now + SECOND_ALIVE_DELAY] {
            self.scheduler
                .add(Schedule::post_alive(due).repeat_every(self.config.alive_repeat));
        }
        self.started = true;
        info!(
            "✅ Device {} started at {}",
            self.device.friendly_name(),
            self.device.location()
        );
        Ok(())
    }

    /// Un tour de boucle : datagrammes entrants, émissions échues, NOTIFY.
    pub fn poll(&mut self, now: Instant) -> PollStats {
        let mut stats = PollStats::default();

        if self.scheduler.is_active() {
            while stats.received < self.config.max_datagrams_per_poll {
                let Some(request) = self.udp.receive() else {
                    break;
                };
                stats.received += 1;
                trace!("SSDP datagram from {} ({} bytes)", request.peer, request.data.len());
                if let Classification::Reply(reply) = self.classifier.classify(&request, now) {
                    if self.scheduler.add(reply).is_some() {
                        stats.scheduled += 1;
                    }
                }
            }
        }

        if let Some(source) = self.event_source.as_mut() {
            source(&mut self.subscriptions);
        }

        if !self.scheduler.is_empty() {
            stats.sent = self.tick(now);
        }

        stats.published = self.subscriptions.publish(now, self.sender.as_mut());
        stats
    }

    fn tick(&mut self, now: Instant) -> usize {
        let mut ctx =
            ScheduleContext::new(self.udp.as_mut(), self.config.max_age).with_device(&self.device);
        self.scheduler.tick(now, &mut ctx)
    }

    /// Route une requête HTTP vers la description, le SCPD, le contrôle SOAP
    /// ou l'abonnement GENA du service concerné.
    pub fn handle_http(
        &mut self,
        request: &mut dyn HttpRequest,
        reply: &mut dyn HttpReply,
        now: Instant,
    ) {
        let method = request.method().to_ascii_uppercase();
        let path = request.path().split('?').next().unwrap_or_default().to_string();
        debug!("{} {}", method, path);

        if path == self.device.description_path() || path == "/" {
            if method == "GET" || method == "HEAD" {
                self.reply_description(reply);
            } else {
                reply.set_status(405);
            }
            return;
        }

        let Some(index) = self.device.services().iter().position(|s| {
            s.scpd_url() == path || s.control_url() == path || s.event_sub_url() == path
        }) else {
            debug!("No route for {}", path);
            reply.set_status(404);
            return;
        };
        let service = &self.device.services()[index];

        match method.as_str() {
            "GET" if service.scpd_url() == path => match service.scpd() {
                Some(scpd) => {
                    reply.set_status(200);
                    reply.set_header("Content-Type", CONTENT_TYPE_XML);
                    if let Err(e) = reply.body().write_all(scpd.as_bytes()) {
                        error!("Failed to write SCPD of {}: {}", service.abbrev(), e);
                    }
                }
                None => reply.set_status(404),
            },
            "POST" if service.control_url() == path => self.handle_control(index, request, reply, now),
            "SUBSCRIBE" if service.event_sub_url() == path => {
                let abbrev = service.abbrev().to_string();
                let outcome =
                    self.subscriptions
                        .process_subscribe_request(&abbrev, &*request, reply, now);
                if let (Ok(outcome), Some(hook)) = (outcome, self.initial_event.as_mut()) {
                    if outcome.is_new() {
                        hook(&self.device.services()[index], outcome.sid(), &mut self.subscriptions);
                    }
                }
            }
            "UNSUBSCRIBE" if service.event_sub_url() == path => {
                let abbrev = service.abbrev().to_string();
                let _ = self
                    .subscriptions
                    .process_unsubscribe_request(&abbrev, &*request, reply);
            }
            _ => {
                warn!("Method {} not allowed on {}", method, path);
                reply.set_status(405);
            }
        }
    }

    /// Décrit le device sans tamponner le document : une passe de comptage
    /// fixe `Content-Length`, la seconde écrit directement dans la réponse.
    fn reply_description(&self, reply: &mut dyn HttpReply) {
        let mut counter = ByteCounter::default();
        if let Err(e) = self.device.write_description(&mut counter) {
            error!("Failed to build device description: {}", e);
            reply.set_status(500);
            return;
        }
        reply.set_status(200);
        reply.set_header("Content-Type", CONTENT_TYPE_XML);
        reply.set_header("Content-Length", &counter.count().to_string());
        if let Err(e) = self.device.write_description(reply.body()) {
            error!("Failed to write device description: {}", e);
        }
    }

    fn handle_control(
        &mut self,
        index: usize,
        request: &mut dyn HttpRequest,
        reply: &mut dyn HttpReply,
        now: Instant,
    ) {
        let service = &self.device.services()[index];
        let header_action = request
            .header("SOAPACTION")
            .and_then(parse_soap_action_header)
            .map(|(_, action)| action.to_string());

        let action = match parse_action_request(
            service.abbrev(),
            request.body(),
            self.config.xml_chunk_size,
        ) {
            Ok(action) => action,
            Err(e) => {
                warn!("❌ Invalid SOAP request on {}: {}", service.control_url(), e);
                if let Err(e) = reply_fault(reply, 400, error_codes::INVALID_ACTION, "Invalid Action") {
                    error!("Failed to write SOAP fault: {}", e);
                }
                return;
            }
        };

        if let Some(expected) = header_action.filter(|a| a != action.action()) {
            warn!(
                "SOAPACTION names {} but body invokes {}",
                expected,
                action.action()
            );
        }

        let mut ctx = ActionContext {
            service,
            subscriptions: &mut self.subscriptions,
            now,
        };
        if let Err(e) = self.dispatcher.dispatch(&action, &mut ctx, reply) {
            debug!("Dispatch of {} failed: {}", action.action(), e);
        }
    }

    /// Remplace les annonces par une rafale byebye et clôt les abonnements.
    pub fn begin_shutdown(&mut self, now: Instant) {
        self.scheduler.clear();
        self.scheduler.set_active(true);
        self.scheduler.add(
            Schedule::post_bye(now)
                .repeat_every(self.config.bye_repeat)
                .until(now + self.config.bye_duration),
        );
        self.subscriptions.end();
        info!("👋 Device {} shutting down", self.device.friendly_name());
    }

    /// Émet les byebye pendant `bye_duration` puis s'arrête.
    pub fn end(&mut self) {
        let start = Instant::now();
        self.begin_shutdown(start);
        let deadline = start + self.config.bye_duration + self.config.bye_repeat;
        loop {
            let now = Instant::now();
            self.tick(now);
            if self.scheduler.is_empty() || now >= deadline {
                break;
            }
            std::thread::sleep(self.config.loop_delay);
        }
        self.scheduler.clear();
        self.started = false;
        info!("Device {} stopped", self.device.friendly_name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{NotifyBody, NotifyError, NotifyRequest};
    use crate::http::{BufferedReply, BufferedRequest};
    use crate::ssdp::RequestData;
    use std::io::{self, Write};
    use std::net::SocketAddr;

    #[derive(Default)]
    struct NullUdp {
        sent: Vec<String>,
    }

    impl UdpTransport for NullUdp {
        fn send_to(&mut self, data: &[u8], _to: SocketAddr) -> io::Result<usize> {
            self.sent.push(String::from_utf8_lossy(data).into_owned());
            Ok(data.len())
        }

        fn receive(&mut self) -> Option<RequestData> {
            None
        }
    }

    struct NullSender;

    impl EventSender for NullSender {
        fn send_notify(
            &mut self,
            _request: &NotifyRequest<'_>,
            body: NotifyBody,
        ) -> Result<(), NotifyError> {
            body.write_to(io::sink())?;
            Ok(())
        }
    }

    fn device() -> DeviceInfo {
        let mut device = DeviceInfo::new(
            "urn:schemas-upnp-org:device:MediaRenderer:1",
            "1234-abcd",
            "http://192.168.1.10:8080",
        )
        .with_friendly_name("Test");
        device
            .add_service(ServiceInfo::new("AVTransport", 1, "AVT").with_scpd("<scpd/>"))
            .unwrap();
        device
    }

    fn engine() -> DeviceEngine {
        DeviceEngine::new(
            device(),
            ActionDispatcher::builder().build().unwrap(),
            Box::new(NullUdp::default()),
            Box::new(NullSender),
            EngineConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_localhost() {
        let device = DeviceInfo::new("urn:x:device:Y:1", "abcd-1234", "http://localhost:8080");
        let err = DeviceEngine::new(
            device,
            ActionDispatcher::builder().build().unwrap(),
            Box::new(NullUdp::default()),
            Box::new(NullSender),
            EngineConfig::default(),
        );
        assert!(matches!(err, Err(DeviceError::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_begin_schedules_two_alive() {
        let mut engine = engine();
        let now = Instant::now();
        engine.begin(now).unwrap();
        assert_eq!(engine.scheduler().len(), 2);
        assert!(matches!(engine.begin(now), Err(DeviceError::AlreadyStarted)));

        let due: Vec<_> = engine.scheduler().iter().map(|(_, s)| s.due_time).collect();
        assert_eq!(due, vec![now, now + SECOND_ALIVE_DELAY]);
    }

    #[test]
    fn test_routes() {
        let mut engine = engine();
        let now = Instant::now();

        let mut reply = BufferedReply::new();
        engine.handle_http(&mut BufferedRequest::new("GET", "/device.xml"), &mut reply, now);
        assert_eq!(reply.status, 200);
        assert!(reply.body_text().contains("<UDN>uuid:1234-abcd</UDN>"));

        let mut reply = BufferedReply::new();
        engine.handle_http(&mut BufferedRequest::new("GET", "/AVT/service.xml"), &mut reply, now);
        assert_eq!(reply.body_text(), "<scpd/>");

        let mut reply = BufferedReply::new();
        engine.handle_http(&mut BufferedRequest::new("GET", "/nope"), &mut reply, now);
        assert_eq!(reply.status, 404);

        let mut reply = BufferedReply::new();
        engine.handle_http(&mut BufferedRequest::new("DELETE", "/AVT/control"), &mut reply, now);
        assert_eq!(reply.status, 405);
    }

    /// Réponse dont le corps refuse les écritures de plus de 64 octets.
    #[derive(Default)]
    struct CappedReply {
        status: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    }

    impl HttpReply for CappedReply {
        fn set_status(&mut self, status: u16) {
            self.status = status;
        }

        fn set_header(&mut self, name: &str, value: &str) {
            self.headers.push((name.to_string(), value.to_string()));
        }

        fn body(&mut self) -> &mut dyn Write {
            self
        }
    }

    impl Write for CappedReply {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if buf.len() > 64 {
                return Err(io::Error::other("write too large"));
            }
            self.body.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_description_streamed_with_length() {
        let mut engine = engine();
        let mut reply = CappedReply::default();
        engine.handle_http(
            &mut BufferedRequest::new("GET", "/device.xml"),
            &mut reply,
            Instant::now(),
        );
        assert_eq!(reply.status, 200);
        assert!(reply.body.len() > 64);
        let length = reply
            .headers
            .iter()
            .find(|(k, _)| k == "Content-Length")
            .map(|(_, v)| v.clone());
        assert_eq!(length, Some(reply.body.len().to_string()));
        assert!(String::from_utf8(reply.body).unwrap().ends_with("</root>"));
    }

    #[test]
    fn test_shutdown_replaces_schedules() {
        let mut engine = engine();
        let now = Instant::now();
        engine.begin(now).unwrap();
        engine.begin_shutdown(now);
        assert_eq!(engine.scheduler().len(), 1);
        let (_, bye) = engine.scheduler().iter().next().unwrap();
        assert_eq!(bye.name(), "PostBye");
        assert_eq!(bye.end_time, Some(now + Duration::from_millis(2000)));
        assert!(!engine.subscriptions().is_active());
    }
}
