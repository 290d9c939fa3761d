//! Émissions SSDP programmées.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{REPLY_GAP, ScheduleError, UdpTransport, messages, multicast_addr};
use crate::devices::DeviceInfo;

/// Gestionnaire applicatif des notifications reçues par un point de contrôle.
/// Retourne `true` si la notification a été prise en compte.
pub type NotifyHandler<'h> = dyn FnMut(&NotifyReplyCp) -> bool + Send + 'h;

/// Ressources prêtées à une émission pendant son exécution.
pub struct ScheduleContext<'a> {
    pub udp: &'a mut dyn UdpTransport,
    pub device: Option<&'a DeviceInfo>,
    pub max_age: u32,
    pub notify_handler: Option<&'a mut NotifyHandler<'a>>,
    /// Horloge murale pour l'en-tête DATE
    pub wall_clock: DateTime<Utc>,
}

impl<'a> ScheduleContext<'a> {
    pub fn new(udp: &'a mut dyn UdpTransport, max_age: u32) -> Self {
        Self {
            udp,
            device: None,
            max_age,
            notify_handler: None,
            wall_clock: Utc::now(),
        }
    }

    pub fn with_device(mut self, device: &'a DeviceInfo) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_notify_handler(mut self, handler: &'a mut NotifyHandler<'a>) -> Self {
        self.notify_handler = Some(handler);
        self
    }

    fn device(&self, schedule: &'static str) -> Result<&'a DeviceInfo, ScheduleError> {
        self.device.ok_or(ScheduleError::MissingDevice(schedule))
    }

    fn send(&mut self, msg: &str, to: SocketAddr) -> Result<(), ScheduleError> {
        let written = self.udp.send_to(msg.as_bytes(), to)?;
        if written < msg.len() {
            return Err(ScheduleError::ShortWrite {
                written,
                expected: msg.len(),
            });
        }
        Ok(())
    }
}

/// Issue d'une exécution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Travail terminé pour cette échéance
    Done,
    /// Reste du travail : rappeler après ce délai
    Continue(Duration),
}

/// Réponse à un M-SEARCH, envoyée datagramme par datagramme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MSearchReply {
    pub search_target: String,
    pub mx: u32,
    sent: usize,
}

impl MSearchReply {
    pub fn new(search_target: impl Into<String>, mx: u32) -> Self {
        Self {
            search_target: search_target.into(),
            mx,
            sent: 0,
        }
    }

    /// Nombre de datagrammes déjà envoyés.
    pub fn sent(&self) -> usize {
        self.sent
    }

    fn targets(&self, device: &DeviceInfo) -> Vec<String> {
        if self.search_target == "ssdp:all" {
            device.notification_types()
        } else {
            vec![self.search_target.clone()]
        }
    }
}

/// Abonnement envoyé par datagramme à un device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSubscribe {
    pub path: String,
    pub callback_url: String,
    pub timeout_sec: u32,
}

/// Notification reçue par un point de contrôle, à remettre à l'application :
/// annonce ou réponse SSDP (`nts` `ssdp:alive`/`ssdp:byebye`), ou événement
/// GENA (`nts` `upnp:propchange`, `xml` = `e:propertyset`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyReplyCp {
    pub nts: String,
    /// NT d'une annonce, ST d'une réponse
    pub search_target: String,
    pub location: String,
    pub usn: String,
    pub max_age: u32,
    pub delivery_host_and_port: String,
    pub delivery_path: String,
    pub subscription_id: String,
    pub event_key: String,
    pub xml: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleKind {
    MSearch { search_target: String, mx: u32 },
    MSearchReply(MSearchReply),
    PostAlive,
    PostBye,
    PostSubscribe(PostSubscribe),
    NotifyReplyCp(NotifyReplyCp),
}

/// Émission programmée.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub due_time: Instant,
    /// Période de répétition ; `None` pour une émission unique
    pub repeat_interval: Option<Duration>,
    /// Au-delà, l'émission n'est plus répétée
    pub end_time: Option<Instant>,
    pub active: bool,
    pub address: SocketAddr,
    pub kind: ScheduleKind,
}

impl Schedule {
    pub fn new(kind: ScheduleKind, address: SocketAddr, due_time: Instant) -> Self {
        Self {
            due_time,
            repeat_interval: None,
            end_time: None,
            active: true,
            address,
            kind,
        }
    }

    /// Annonce ssdp:alive de tous les types de notification du device.
    pub fn post_alive(due_time: Instant) -> Self {
        Self::new(ScheduleKind::PostAlive, multicast_addr(), due_time)
    }

    pub fn post_bye(due_time: Instant) -> Self {
        Self::new(ScheduleKind::PostBye, multicast_addr(), due_time)
    }

    pub fn msearch(search_target: impl Into<String>, mx: u32, due_time: Instant) -> Self {
        Self::new(
            ScheduleKind::MSearch {
                search_target: search_target.into(),
                mx,
            },
            multicast_addr(),
            due_time,
        )
    }

    pub fn msearch_reply(
        peer: SocketAddr,
        search_target: impl Into<String>,
        mx: u32,
        due_time: Instant,
    ) -> Self {
        Self::new(
            ScheduleKind::MSearchReply(MSearchReply::new(search_target, mx)),
            peer,
            due_time,
        )
    }

    pub fn post_subscribe(
        device: SocketAddr,
        path: impl Into<String>,
        callback_url: impl Into<String>,
        timeout_sec: u32,
        due_time: Instant,
    ) -> Self {
        Self::new(
            ScheduleKind::PostSubscribe(PostSubscribe {
                path: path.into(),
                callback_url: callback_url.into(),
                timeout_sec,
            }),
            device,
            due_time,
        )
    }

    pub fn notify_reply(notify: NotifyReplyCp, from: SocketAddr, due_time: Instant) -> Self {
        Self::new(ScheduleKind::NotifyReplyCp(notify), from, due_time)
    }

    pub fn repeat_every(mut self, interval: Duration) -> Self {
        self.repeat_interval = (!interval.is_zero()).then_some(interval);
        self
    }

    pub fn until(mut self, end_time: Instant) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            ScheduleKind::MSearch { .. } => "MSearch",
            ScheduleKind::MSearchReply(_) => "MSearchReply",
            ScheduleKind::PostAlive => "PostAlive",
            ScheduleKind::PostBye => "PostBye",
            ScheduleKind::PostSubscribe(_) => "PostSubscribe",
            ScheduleKind::NotifyReplyCp(_) => "NotifyReplyCp",
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.due_time <= now
    }

    /// Vrai si l'émission peut être reprogrammée à `now + repeat_interval`.
    pub fn can_repeat(&self, now: Instant) -> bool {
        match self.repeat_interval {
            Some(interval) => self.end_time.is_none_or(|end| now + interval <= end),
            None => false,
        }
    }

    /// Exécute l'émission.
    pub fn process(&mut self, ctx: &mut ScheduleContext<'_>) -> Result<Progress, ScheduleError> {
        let name = self.name();
        let address = self.address;
        match &mut self.kind {
            ScheduleKind::PostAlive => {
                let device = ctx.device(name)?;
                let location = device.location();
                for nt in device.notification_types() {
                    let msg = messages::alive(
                        ctx.max_age,
                        &location,
                        &nt,
                        device.server(),
                        &device.usn(&nt),
                    );
                    ctx.send(&msg, address)?;
                }
                debug!("✅ NOTIFY alive sent for {}", device.udn());
                Ok(Progress::Done)
            }
            ScheduleKind::PostBye => {
                let device = ctx.device(name)?;
                for nt in device.notification_types() {
                    ctx.send(&messages::byebye(&nt, &device.usn(&nt)), address)?;
                }
                info!("👋 NOTIFY byebye sent for {}", device.udn());
                Ok(Progress::Done)
            }
            ScheduleKind::MSearchReply(reply) => {
                let device = ctx.device(name)?;
                let targets = reply.targets(device);
                let Some(st) = targets.get(reply.sent) else {
                    return Ok(Progress::Done);
                };
                let msg = messages::search_reply(
                    ctx.max_age,
                    &messages::http_date(ctx.wall_clock),
                    &device.location(),
                    device.server(),
                    st,
                    &device.usn(st),
                );
                ctx.send(&msg, address)?;
                reply.sent += 1;
                debug!("📡 M-SEARCH response sent to {} with ST={}", address, st);
                if reply.sent < targets.len() {
                    Ok(Progress::Continue(REPLY_GAP))
                } else {
                    Ok(Progress::Done)
                }
            }
            ScheduleKind::MSearch { search_target, mx } => {
                ctx.send(&messages::msearch(address, search_target, *mx), address)?;
                debug!("🔍 M-SEARCH sent for {}", search_target);
                Ok(Progress::Done)
            }
            ScheduleKind::PostSubscribe(sub) => {
                let msg =
                    messages::subscribe(&sub.path, address, &sub.callback_url, sub.timeout_sec);
                ctx.send(&msg, address)?;
                debug!("Subscribe sent to {}{}", address, sub.path);
                Ok(Progress::Done)
            }
            ScheduleKind::NotifyReplyCp(notify) => {
                let handler = ctx
                    .notify_handler
                    .as_mut()
                    .ok_or(ScheduleError::NoNotifyHandler)?;
                if handler(notify) {
                    debug!("{} -> {}", name, notify.nts);
                } else {
                    debug!("-> {} not processed", notify.nts);
                }
                Ok(Progress::Done)
            }
        }
    }
}
