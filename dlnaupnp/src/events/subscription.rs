//! Abonnement GENA d'un point de contrôle.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dlnaxml::DynPrinter;

/// Producteur différé d'un fragment XML de changement d'état.
///
/// Il est invoqué au moment de la publication, à l'intérieur de
/// `<InstanceID val="0">`.
pub type ChangeWriter = Arc<dyn Fn(&mut DynPrinter<'_>) -> io::Result<usize> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribing,
    Subscribed,
    Unsubscribing,
}

/// Abonné d'un service.
pub struct Subscription {
    pub(crate) service: String,
    pub(crate) sid: String,
    pub(crate) callback_url: String,
    pub(crate) timeout_sec: u32,
    pub(crate) created_at: Instant,
    pub(crate) expires_at: Instant,
    pub(crate) seq: u32,
    pub(crate) state: SubscriptionState,
    pub(crate) pending: VecDeque<ChangeWriter>,
}

impl Subscription {
    pub(crate) fn new(
        service: &str,
        sid: String,
        callback_url: &str,
        timeout_sec: u32,
        now: Instant,
    ) -> Self {
        Self {
            service: service.to_string(),
            sid,
            callback_url: callback_url.to_string(),
            timeout_sec,
            created_at: now,
            expires_at: now + Duration::from_secs(u64::from(timeout_sec)),
            seq: 0,
            state: SubscriptionState::Subscribing,
            pending: VecDeque::new(),
        }
    }

    /// Abréviation du service.
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    pub fn timeout_sec(&self) -> u32 {
        self.timeout_sec
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Prochain numéro de séquence (0 pour l'événement initial).
    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }

    pub(crate) fn renew(&mut self, timeout_sec: u32, now: Instant) {
        self.timeout_sec = timeout_sec;
        self.expires_at = now + Duration::from_secs(u64::from(timeout_sec));
    }

    /// Avance SEQ ; après `u32::MAX` la séquence reprend à 1.
    pub(crate) fn advance_seq(&mut self) {
        self.seq = match self.seq {
            u32::MAX => 1,
            n => n + 1,
        };
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("service", &self.service)
            .field("sid", &self.sid)
            .field("callback_url", &self.callback_url)
            .field("timeout_sec", &self.timeout_sec)
            .field("seq", &self.seq)
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .finish()
    }
}
