//! Classement des datagrammes SSDP reçus par un device.

use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, error, info, warn};

use super::{RequestData, Schedule};
use crate::devices::DeviceInfo;

/// Valeur de MX retenue quand l'en-tête est absent ou illisible.
const DEFAULT_MX: u32 = 1;

/// Borne haute de MX (UPnP 1.1 : au-delà de 5, traiter comme 5).
const MAX_MX: u32 = 5;

/// Motif d'abandon d'un datagramme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// M-SEARCH sans en-tête ST
    MissingSearchTarget,
    /// ST qui ne désigne pas ce device
    UnknownSearchTarget(String),
    /// Pair hors du sous-réseau autorisé
    OutsideSubnet(IpAddr),
}

/// Résultat du classement.
#[derive(Debug)]
pub enum Classification {
    /// Réponse à programmer
    Reply(Schedule),
    /// Datagramme sans intérêt pour un device (NOTIFY, réponse...)
    Ignored,
    Dropped(DropReason),
}

/// Classe les requêtes SSDP destinées à un device.
#[derive(Debug, Clone, Default)]
pub struct SsdpClassifier {
    search_targets: Vec<String>,
    subnet: Option<(Ipv4Addr, Ipv4Addr)>,
}

impl SsdpClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cibles acceptées : rootdevice, `ssdp:all`, UDN, type du device et
    /// type de chaque service.
    pub fn for_device(device: &DeviceInfo) -> Self {
        let mut classifier = Self::new();
        classifier.add_search_target("upnp:rootdevice");
        classifier.add_search_target("ssdp:all");
        classifier.add_search_target(device.udn());
        classifier.add_search_target(device.device_type());
        for service in device.services() {
            classifier.add_search_target(service.service_type());
        }
        classifier
    }

    pub fn add_search_target(&mut self, st: impl Into<String>) {
        let st = st.into();
        if !self.search_targets.contains(&st) {
            self.search_targets.push(st);
        }
    }

    pub fn search_targets(&self) -> &[String] {
        &self.search_targets
    }

    /// N'accepte que les pairs du sous-réseau `local_ip/netmask`.
    pub fn set_subnet_filter(&mut self, local_ip: Ipv4Addr, netmask: Ipv4Addr) {
        self.subnet = Some((local_ip, netmask));
    }

    pub fn is_valid_search_target(&self, st: &str) -> bool {
        self.search_targets.iter().any(|t| t == st)
    }

    pub fn classify(&self, request: &RequestData, now: Instant) -> Classification {
        self.classify_with_rng(request, now, &mut rand::rng())
    }

    /// Variante à générateur explicite, pour des délais reproductibles.
    pub fn classify_with_rng<R: Rng + ?Sized>(
        &self,
        request: &RequestData,
        now: Instant,
        rng: &mut R,
    ) -> Classification {
        let text = String::from_utf8_lossy(&request.data);

        if text.contains("M-SEARCH") {
            return self.classify_search(&text, request, now, rng);
        }
        if text.contains("NOTIFY") && text.contains("ssdp:alive") {
            debug!("NOTIFY alive from {} ignored", request.peer);
            return Classification::Ignored;
        }
        warn!(
            "Unsupported SSDP datagram from {}: {}",
            request.peer,
            text.lines().next().unwrap_or_default()
        );
        Classification::Ignored
    }

    fn classify_search<R: Rng + ?Sized>(
        &self,
        text: &str,
        request: &RequestData,
        now: Instant,
        rng: &mut R,
    ) -> Classification {
        let Some(st) = header_value(text, "ST") else {
            error!("M-SEARCH from {} without ST header", request.peer);
            return Classification::Dropped(DropReason::MissingSearchTarget);
        };

        let mx = header_value(text, "MX")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MX)
            .clamp(1, MAX_MX);
        let delay = Duration::from_millis(rng.random_range(0..u64::from(mx) * 1000));

        let mut reply = Schedule::msearch_reply(request.peer, st, mx, now + delay);
        reply.active = self.is_valid_search_target(st);
        if !reply.active {
            debug!("Ignoring M-SEARCH for {}", st);
            return Classification::Dropped(DropReason::UnknownSearchTarget(st.to_string()));
        }

        if let (Some((local, netmask)), IpAddr::V4(peer)) = (self.subnet, request.peer.ip()) {
            if !dlnautils::same_subnet(local, peer, netmask) {
                info!(
                    "Discovery request from {} filtered (not in same subnet as {}/{})",
                    peer, local, netmask
                );
                return Classification::Dropped(DropReason::OutsideSubnet(IpAddr::V4(peer)));
            }
        }

        info!(
            "✅ M-SEARCH from {} with ST={} (MX={}, reply in {} ms)",
            request.peer,
            st,
            mx,
            delay.as_millis()
        );
        Classification::Reply(reply)
    }
}

/// Valeur d'un en-tête, nom insensible à la casse et ancré en début de ligne.
pub(crate) fn header_value<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    text.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim())
            .filter(|v| !v.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::ServiceInfo;
    use crate::ssdp::ScheduleKind;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn device() -> DeviceInfo {
        let mut dev = DeviceInfo::new(
            "urn:schemas-upnp-org:device:MediaRenderer:1",
            "1234",
            "http://192.168.1.20:8080",
        );
        dev.add_service(ServiceInfo::new("AVTransport", 1, "AVT")).unwrap();
        dev
    }

    fn search(st: Option<&str>, mx: Option<&str>) -> RequestData {
        let mut text = String::from("M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\n");
        text.push_str("MAN: \"ssdp:discover\"\r\n");
        if let Some(mx) = mx {
            text.push_str(&format!("MX: {}\r\n", mx));
        }
        if let Some(st) = st {
            text.push_str(&format!("ST: {}\r\n", st));
        }
        text.push_str("\r\n");
        RequestData {
            data: text.into_bytes(),
            peer: "192.168.1.50:40000".parse().unwrap(),
        }
    }

    #[test]
    fn test_header_value() {
        let text = "M-SEARCH * HTTP/1.1\r\nst:ssdp:all\r\nMx:  3\r\nHOST: x\r\n\r\n";
        assert_eq!(header_value(text, "ST"), Some("ssdp:all"));
        assert_eq!(header_value(text, "MX"), Some("3"));
        assert_eq!(header_value(text, "MAN"), None);
    }

    #[test]
    fn test_rootdevice_reply_delay_bounds() {
        let classifier = SsdpClassifier::for_device(&device());
        let mut rng = StdRng::seed_from_u64(7);
        let now = Instant::now();
        for _ in 0..50 {
            let req = search(Some("upnp:rootdevice"), Some("3"));
            match classifier.classify_with_rng(&req, now, &mut rng) {
                Classification::Reply(s) => {
                    assert!(s.due_time >= now);
                    assert!(s.due_time < now + Duration::from_millis(3000));
                    assert_eq!(s.address, req.peer);
                    match s.kind {
                        ScheduleKind::MSearchReply(r) => {
                            assert_eq!(r.search_target, "upnp:rootdevice");
                            assert_eq!(r.mx, 3);
                        }
                        other => panic!("unexpected {other:?}"),
                    }
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_missing_mx_defaults_to_one() {
        let classifier = SsdpClassifier::for_device(&device());
        let now = Instant::now();
        for mx in [None, Some("0"), Some("abc")] {
            match classifier.classify(&search(Some("ssdp:all"), mx), now) {
                Classification::Reply(s) => {
                    assert!(s.due_time < now + Duration::from_millis(1000))
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_unknown_target_dropped() {
        let classifier = SsdpClassifier::for_device(&device());
        let out = classifier.classify(
            &search(Some("urn:schemas-upnp-org:service:ContentDirectory:1"), Some("1")),
            Instant::now(),
        );
        assert!(matches!(
            out,
            Classification::Dropped(DropReason::UnknownSearchTarget(_))
        ));
    }

    #[test]
    fn test_missing_st_dropped() {
        let classifier = SsdpClassifier::for_device(&device());
        let out = classifier.classify(&search(None, Some("1")), Instant::now());
        assert!(matches!(
            out,
            Classification::Dropped(DropReason::MissingSearchTarget)
        ));
    }

    #[test]
    fn test_service_type_and_udn_accepted() {
        let dev = device();
        let classifier = SsdpClassifier::for_device(&dev);
        for st in [
            "urn:schemas-upnp-org:service:AVTransport:1",
            dev.udn(),
            dev.device_type(),
        ] {
            assert!(matches!(
                classifier.classify(&search(Some(st), None), Instant::now()),
                Classification::Reply(_)
            ));
        }
    }

    #[test]
    fn test_subnet_filter() {
        let mut classifier = SsdpClassifier::for_device(&device());
        classifier.set_subnet_filter(
            Ipv4Addr::new(192, 168, 1, 20),
            Ipv4Addr::new(255, 255, 255, 0),
        );
        assert!(matches!(
            classifier.classify(&search(Some("ssdp:all"), None), Instant::now()),
            Classification::Reply(_)
        ));

        let mut req = search(Some("ssdp:all"), None);
        req.peer = "10.1.1.1:1900".parse().unwrap();
        assert!(matches!(
            classifier.classify(&req, Instant::now()),
            Classification::Dropped(DropReason::OutsideSubnet(_))
        ));
    }

    #[test]
    fn test_notify_and_junk_ignored() {
        let classifier = SsdpClassifier::for_device(&device());
        let notify = RequestData {
            data: b"NOTIFY * HTTP/1.1\r\nNTS: ssdp:alive\r\n\r\n".to_vec(),
            peer: "192.168.1.50:1900".parse().unwrap(),
        };
        assert!(matches!(
            classifier.classify(&notify, Instant::now()),
            Classification::Ignored
        ));
        let junk = RequestData {
            data: vec![0xff, 0xfe, 0x00],
            peer: "192.168.1.50:1900".parse().unwrap(),
        };
        assert!(matches!(
            classifier.classify(&junk, Instant::now()),
            Classification::Ignored
        ));
    }
}
