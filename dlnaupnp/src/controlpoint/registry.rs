//! Devices découverts par un point de contrôle.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::ssdp::NotifyReplyCp;

/// Device vu par SSDP, identifié par son UDN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub udn: String,
    /// URL de la description
    pub location: String,
    /// NT/ST annoncés par ce device
    pub targets: Vec<String>,
    pub expires_at: Instant,
}

impl DiscoveredDevice {
    pub fn announces(&self, target: &str) -> bool {
        self.targets.iter().any(|t| t == target)
    }
}

/// `uuid:xxx` d'un USN `uuid:xxx::urn:...`.
pub fn udn_of(usn: &str) -> &str {
    usn.split("::").next().unwrap_or(usn)
}

/// Table des devices, alimentée par les annonces et les réponses.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<DiscoveredDevice>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn devices(&self) -> &[DiscoveredDevice] {
        &self.devices
    }

    pub fn get(&self, udn: &str) -> Option<&DiscoveredDevice> {
        self.devices.iter().find(|d| d.udn == udn)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Applique une annonce ; retourne `true` si la table l'a prise en compte.
    ///
    /// Seules les annonces correspondant à `filter` (`ssdp:all`, NT/ST exact
    /// ou contenu dans l'USN) ajoutent un device.
    pub fn apply(&mut self, notify: &NotifyReplyCp, filter: &str, now: Instant) -> bool {
        match notify.nts.as_str() {
            "ssdp:alive" => self.alive(notify, filter, now),
            "ssdp:byebye" => self.byebye(notify),
            _ => false,
        }
    }

    fn alive(&mut self, notify: &NotifyReplyCp, filter: &str, now: Instant) -> bool {
        let udn = udn_of(&notify.usn);
        if udn.is_empty() || notify.location.is_empty() {
            debug!("Announcement without USN or LOCATION ignored");
            return false;
        }
        let selected = filter == "ssdp:all"
            || notify.search_target == filter
            || notify.usn.contains(filter);
        let expires_at = now + Duration::from_secs(u64::from(notify.max_age));

        if let Some(device) = self.devices.iter_mut().find(|d| d.udn == udn) {
            device.location = notify.location.clone();
            device.expires_at = expires_at;
            if !notify.search_target.is_empty() && !device.announces(&notify.search_target) {
                device.targets.push(notify.search_target.clone());
            }
            return true;
        }
        if !selected {
            debug!("Announcement {} filtered", notify.usn);
            return false;
        }
        info!("✅ Device {} found at {}", udn, notify.location);
        self.devices.push(DiscoveredDevice {
            udn: udn.to_string(),
            location: notify.location.clone(),
            targets: vec![notify.search_target.clone()],
            expires_at,
        });
        true
    }

    fn byebye(&mut self, notify: &NotifyReplyCp) -> bool {
        let udn = udn_of(&notify.usn);
        let Some(pos) = self.devices.iter().position(|d| d.udn == udn) else {
            return false;
        };
        let whole_device = notify.usn == udn || notify.search_target == "upnp:rootdevice";
        let device = &mut self.devices[pos];
        device.targets.retain(|t| *t != notify.search_target);
        if whole_device || device.targets.is_empty() {
            info!("👋 Device {} left", udn);
            self.devices.remove(pos);
        }
        true
    }

    /// Retire les devices dont l'annonce a expiré.
    pub fn remove_expired(&mut self, now: Instant) -> usize {
        let before = self.devices.len();
        self.devices.retain(|d| {
            let expired = d.expires_at <= now;
            if expired {
                info!("Device {} expired", d.udn);
            }
            !expired
        });
        before - self.devices.len()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }
}
