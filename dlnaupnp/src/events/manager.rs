//! Gestion des abonnements GENA.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

use dlnaxml::{DynPrinter, XmlPrinter};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use super::{
    ChangeWriter, DEFAULT_TIMEOUT_SEC, EVENT_NS, EventSender, NotifyBody, NotifyRequest,
    Subscription, SubscriptionError, SubscriptionState,
};
use crate::http::{HttpReply, HttpRequest};

/// Résultat d'un SUBSCRIBE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeOutcome {
    New(String),
    Renewed(String),
}

impl SubscribeOutcome {
    pub fn sid(&self) -> &str {
        match self {
            SubscribeOutcome::New(sid) | SubscribeOutcome::Renewed(sid) => sid,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, SubscribeOutcome::New(_))
    }
}

/// Table des abonnements, dans l'ordre d'arrivée.
pub struct SubscriptionManager {
    subscriptions: Vec<Subscription>,
    default_timeout_sec: u32,
    active: bool,
}

impl SubscriptionManager {
    pub fn new(default_timeout_sec: u32) -> Self {
        Self {
            subscriptions: Vec::new(),
            default_timeout_sec: if default_timeout_sec == 0 {
                DEFAULT_TIMEOUT_SEC
            } else {
                default_timeout_sec
            },
            active: true,
        }
    }

    pub fn default_timeout_sec(&self) -> u32 {
        self.default_timeout_sec
    }

    /// Crée ou renouvelle un abonnement.
    ///
    /// Sans `sid`, un nouvel identifiant `uuid:...` est généré. Avec un `sid`,
    /// seule l'expiration est rafraîchie ; un SID inconnu est refusé.
    /// Un `timeout_sec` nul prend la valeur par défaut.
    pub fn subscribe(
        &mut self,
        service: &str,
        callback_url: &str,
        sid: Option<&str>,
        timeout_sec: u32,
        now: Instant,
    ) -> Result<SubscribeOutcome, SubscriptionError> {
        let timeout_sec = if timeout_sec == 0 {
            self.default_timeout_sec
        } else {
            timeout_sec
        };

        if let Some(sid) = sid {
            let sub = self
                .subscriptions
                .iter_mut()
                .find(|s| s.service == service && s.sid == sid)
                .ok_or_else(|| SubscriptionError::UnknownSid(sid.to_string()))?;
            sub.renew(timeout_sec, now);
            info!("♻️ Renewed SID {} for {} s", sid, timeout_sec);
            return Ok(SubscribeOutcome::Renewed(sid.to_string()));
        }

        let sid = format!("uuid:{}", Uuid::new_v4());
        let mut sub = Subscription::new(service, sid.clone(), callback_url, timeout_sec, now);
        trace!("{} {:?} -> Subscribed", sid, sub.state);
        sub.state = SubscriptionState::Subscribed;
        self.subscriptions.push(sub);
        info!(
            "✅ New subscription {} on {} -> {} ({} s)",
            sid, service, callback_url, timeout_sec
        );
        Ok(SubscribeOutcome::New(sid))
    }

    /// Supprime un abonnement et le retourne.
    pub fn unsubscribe(
        &mut self,
        service: &str,
        sid: &str,
    ) -> Result<Subscription, SubscriptionError> {
        let pos = self
            .subscriptions
            .iter()
            .position(|s| s.service == service && s.sid == sid)
            .ok_or_else(|| SubscriptionError::UnknownSid(sid.to_string()))?;
        let mut sub = self.subscriptions.remove(pos);
        sub.state = SubscriptionState::Unsubscribing;
        if !sub.pending.is_empty() {
            debug!("Dropping {} pending changes of {}", sub.pending.len(), sid);
            sub.pending.clear();
        }
        sub.state = SubscriptionState::Unsubscribed;
        info!("👋 Unsubscribed {} from {}", sid, service);
        Ok(sub)
    }

    pub fn get(&self, sid: &str) -> Option<&Subscription> {
        self.subscriptions.iter().find(|s| s.sid == sid)
    }

    pub fn subscriptions(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.iter()
    }

    pub fn subscriptions_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn subscriptions_count_for(&self, service: &str) -> usize {
        self.subscriptions
            .iter()
            .filter(|s| s.service == service)
            .count()
    }

    /// Nombre total de changements en attente de publication.
    pub fn pending_count(&self) -> usize {
        self.subscriptions.iter().map(|s| s.pending.len()).sum()
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Ajoute un changement à la file de chaque abonné du service.
    /// Retourne le nombre d'abonnés concernés.
    pub fn add_change(&mut self, service: &str, writer: ChangeWriter) -> usize {
        if !self.active {
            debug!("Subscription manager inactive: change on {} ignored", service);
            return 0;
        }
        let mut count = 0;
        for sub in self.subscriptions.iter_mut().filter(|s| s.service == service) {
            sub.pending.push_back(Arc::clone(&writer));
            count += 1;
        }
        if count == 0 {
            trace!("No subscriber for {}: change dropped", service);
        }
        count
    }

    /// Variante de [`add_change`](Self::add_change) pour un fragment déjà écrit.
    pub fn add_change_text(&mut self, service: &str, fragment: impl Into<String>) -> usize {
        let fragment = fragment.into();
        if fragment.is_empty() {
            warn!("Empty change for {} ignored", service);
            return 0;
        }
        self.add_change(
            service,
            Arc::new(move |xp: &mut DynPrinter<'_>| xp.raw(&fragment)),
        )
    }

    /// Ajoute un changement pour un seul abonné (événement initial).
    pub fn add_change_for(&mut self, sid: &str, writer: ChangeWriter) -> bool {
        match self.subscriptions.iter_mut().find(|s| s.sid == sid) {
            Some(sub) => {
                sub.pending.push_back(writer);
                true
            }
            None => {
                error!("No subscription {} for initial event", sid);
                false
            }
        }
    }

    /// Retire les abonnements expirés et retourne leur nombre.
    pub fn remove_expired(&mut self, now: Instant) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| {
            let expired = s.is_expired(now);
            if expired {
                info!("Removing expired subscription {}", s.sid);
            }
            !expired
        });
        before - self.subscriptions.len()
    }

    /// Envoie un NOTIFY par abonné ayant des changements en attente.
    ///
    /// Les files sont vidées que l'envoi réussisse ou non ; retourne le
    /// nombre d'envois réussis.
    pub fn publish(&mut self, now: Instant, sender: &mut dyn EventSender) -> usize {
        if !self.active {
            return 0;
        }
        self.remove_expired(now);

        let mut published = 0;
        let mut attempted = 0;
        for sub in self.subscriptions.iter_mut() {
            if sub.pending.is_empty() {
                continue;
            }
            attempted += 1;
            let changes: Vec<ChangeWriter> = sub.pending.drain(..).collect();
            let request = NotifyRequest {
                callback_url: &sub.callback_url,
                sid: &sub.sid,
                seq: sub.seq,
            };
            let body = NotifyBody::new(sub.service.as_str(), changes);
            match sender.send_notify(&request, body) {
                Ok(()) => published += 1,
                Err(e) => warn!("❌ Failed to notify {} ({}): {}", sub.callback_url, sub.sid, e),
            }
            sub.advance_seq();
        }

        if attempted > 0 {
            info!(
                "Published: {} of {} notifications ({} subscriptions)",
                published,
                attempted,
                self.subscriptions.len()
            );
        }
        published
    }

    /// Supprime tous les abonnements et désactive le gestionnaire.
    pub fn end(&mut self) {
        for sub in self.subscriptions.iter_mut() {
            sub.state = SubscriptionState::Unsubscribed;
        }
        self.subscriptions.clear();
        self.active = false;
    }

    /// Traite un SUBSCRIBE (nouvel abonnement ou renouvellement).
    ///
    /// Répond 200 avec `SID` et `TIMEOUT`, ou le statut d'erreur GENA.
    pub fn process_subscribe_request(
        &mut self,
        service: &str,
        request: &dyn HttpRequest,
        reply: &mut dyn HttpReply,
        now: Instant,
    ) -> Result<SubscribeOutcome, SubscriptionError> {
        let outcome = self.subscribe_from_headers(service, request, now);
        match &outcome {
            Ok(outcome) => {
                let timeout = self
                    .get(outcome.sid())
                    .map(Subscription::timeout_sec)
                    .unwrap_or(self.default_timeout_sec);
                reply.set_status(200);
                reply.set_header("SID", outcome.sid());
                reply.set_header("TIMEOUT", &format!("Second-{}", timeout));
                reply.set_header("Content-Length", "0");
            }
            Err(e) => {
                warn!("❌ SUBSCRIBE on {} refused: {}", service, e);
                reply.set_status(e.status_code());
            }
        }
        outcome
    }

    fn subscribe_from_headers(
        &mut self,
        service: &str,
        request: &dyn HttpRequest,
        now: Instant,
    ) -> Result<SubscribeOutcome, SubscriptionError> {
        let timeout = parse_timeout(request.header("TIMEOUT"));
        let sid = request.header("SID").map(str::trim).filter(|s| !s.is_empty());
        let callback = request.header("CALLBACK");
        let nt = request.header("NT");

        if let Some(sid) = sid {
            if callback.is_some() || nt.is_some() {
                return Err(SubscriptionError::IncompatibleHeaders);
            }
            return self.subscribe(service, "", Some(sid), timeout, now);
        }

        match nt.map(str::trim) {
            Some("upnp:event") => {}
            Some(other) => return Err(SubscriptionError::InvalidNt(other.to_string())),
            None => return Err(SubscriptionError::InvalidNt(String::new())),
        }
        let callback = parse_callback(callback.ok_or(SubscriptionError::MissingCallback)?)?;
        self.subscribe(service, &callback, None, timeout, now)
    }

    /// Traite un UNSUBSCRIBE.
    pub fn process_unsubscribe_request(
        &mut self,
        service: &str,
        request: &dyn HttpRequest,
        reply: &mut dyn HttpReply,
    ) -> Result<(), SubscriptionError> {
        let outcome = match request.header("SID").map(str::trim) {
            None | Some("") => Err(SubscriptionError::MissingSid),
            Some(_) if request.header("CALLBACK").is_some() || request.header("NT").is_some() => {
                Err(SubscriptionError::IncompatibleHeaders)
            }
            Some(sid) => self.unsubscribe(service, sid).map(|_| ()),
        };
        match &outcome {
            Ok(()) => {
                reply.set_status(200);
                reply.set_header("Content-Length", "0");
            }
            Err(e) => {
                warn!("❌ UNSUBSCRIBE on {} refused: {}", service, e);
                reply.set_status(e.status_code());
            }
        }
        outcome
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_SEC)
    }
}

/// Premier URL de l'en-tête CALLBACK `<http://a/><http://b/>`.
fn parse_callback(header: &str) -> Result<String, SubscriptionError> {
    let url = header
        .trim()
        .trim_start_matches('<')
        .split('>')
        .next()
        .unwrap_or_default()
        .trim();
    if !url.to_ascii_lowercase().starts_with("http://") {
        return Err(SubscriptionError::InvalidCallback(header.to_string()));
    }
    Ok(url.to_string())
}

/// `Second-N` ; `infinite` et les valeurs illisibles donnent 0 (défaut).
fn parse_timeout(header: Option<&str>) -> u32 {
    header
        .map(str::trim)
        .and_then(|v| {
            v.get(..7)
                .filter(|p| p.eq_ignore_ascii_case("Second-"))
                .map(|_| &v[7..])
        })
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// Écrit le corps d'un NOTIFY `LastChange` regroupant `changes`.
pub fn write_property_set<W: Write>(
    out: W,
    service: &str,
    changes: &[ChangeWriter],
) -> io::Result<usize> {
    let namespace = format!("urn:schemas-upnp-org:metadata-1-0/{}/", service);
    let mut xp = XmlPrinter::new(out);
    let mut n = xp.xml_header()?;
    n += xp.node_with("e:propertyset", &[("xmlns:e", EVENT_NS)], |xp| {
        xp.node_with("e:property", &[], |xp| {
            xp.node_with("LastChange", &[], |xp| {
                xp.escaped(|inner| {
                    inner.node_with("Event", &[("xmlns", &namespace)], |inner| {
                        inner.node_with("InstanceID", &[("val", "0")], |inner| {
                            let mut n = 0;
                            for change in changes {
                                n += change(inner)?;
                            }
                            Ok(n)
                        })
                    })
                })
            })
        })
    })?;
    Ok(n)
}
