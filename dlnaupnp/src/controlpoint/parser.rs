//! Lecture des messages reçus par un point de contrôle.

use std::io::Read;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Instant;

use dlnaxml::{XmlError, XmlParser, local_name};
use tracing::{debug, trace};

use super::ControlPointError;
use crate::http::HttpRequest;
use crate::ssdp::{MAX_AGE, NotifyReplyCp, RequestData, Schedule, header_value};

/// Annonce ou réponse SSDP à remettre au point de contrôle.
///
/// Une réponse à un M-SEARCH est traitée comme une annonce `ssdp:alive`.
pub fn parse_datagram(request: &RequestData, now: Instant) -> Option<Schedule> {
    let text = String::from_utf8_lossy(&request.data);
    let first = text.lines().next().unwrap_or_default().trim();
    let upper = first.to_ascii_uppercase();

    let nts = if upper.starts_with("NOTIFY") {
        match header_value(&text, "NTS") {
            Some(nts) => nts.to_string(),
            None => {
                debug!("NOTIFY from {} without NTS ignored", request.peer);
                return None;
            }
        }
    } else if upper.starts_with("HTTP/1.1 200") {
        "ssdp:alive".to_string()
    } else if upper.starts_with("M-SEARCH") {
        trace!("M-SEARCH from {} ignored by control point", request.peer);
        return None;
    } else {
        debug!("Not handled from {}: {}", request.peer, first);
        return None;
    };

    let search_target = header_value(&text, "NT")
        .or_else(|| header_value(&text, "ST"))
        .unwrap_or_default();
    let notify = NotifyReplyCp {
        nts,
        search_target: search_target.to_string(),
        location: header_value(&text, "LOCATION").unwrap_or_default().to_string(),
        usn: header_value(&text, "USN").unwrap_or_default().to_string(),
        max_age: header_value(&text, "CACHE-CONTROL")
            .and_then(parse_max_age)
            .unwrap_or(MAX_AGE),
        delivery_host_and_port: header_value(&text, "HOST").unwrap_or_default().to_string(),
        ..Default::default()
    };
    Some(Schedule::notify_reply(notify, request.peer, now))
}

/// `max-age=N` parmi les directives de `CACHE-CONTROL`.
fn parse_max_age(value: &str) -> Option<u32> {
    value.split(',').find_map(|directive| {
        let (key, n) = directive.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("max-age")
            .then(|| n.trim().parse().ok())
            .flatten()
    })
}

/// NOTIFY GENA reçu sur l'URL de rappel.
pub fn parse_event(
    request: &mut dyn HttpRequest,
    max_body: usize,
) -> Result<NotifyReplyCp, ControlPointError> {
    let nt = request.header("NT").map(str::trim).unwrap_or_default().to_string();
    let nts = request.header("NTS").map(str::trim).unwrap_or_default().to_string();
    if nt.is_empty() || nts.is_empty() {
        return Err(ControlPointError::MissingEventHeaders);
    }
    if nt != "upnp:event" || nts != "upnp:propchange" {
        return Err(ControlPointError::InvalidEventHeaders { nt, nts });
    }
    let sid = request
        .header("SID")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ControlPointError::MissingSid)?
        .to_string();
    let seq = request.header("SEQ").map(str::trim).unwrap_or("0").to_string();
    let host = request.header("HOST").map(str::trim).unwrap_or_default().to_string();
    let path = request.path().to_string();

    let mut body = Vec::new();
    request
        .body()
        .take(max_body as u64 + 1)
        .read_to_end(&mut body)?;
    if body.len() > max_body {
        return Err(ControlPointError::EventTooLarge(max_body));
    }

    Ok(NotifyReplyCp {
        nts,
        search_target: nt,
        delivery_host_and_port: host,
        delivery_path: path,
        subscription_id: sid,
        event_key: seq,
        xml: String::from_utf8(body).map_err(XmlError::from)?,
        ..Default::default()
    })
}

/// Adresse indiquée par l'en-tête `HOST`, ou l'adresse non spécifiée.
pub(crate) fn host_addr(host: &str) -> SocketAddr {
    host.parse()
        .unwrap_or_else(|_| SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
}

/// Variable d'état annoncée dans un `e:propertyset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChange {
    pub name: String,
    pub value: String,
}

/// Variables d'un `e:propertyset`.
///
/// Une propriété `LastChange` est développée : chaque `<Name val="..."/>`
/// de son `InstanceID` devient une variable.
pub fn parse_property_set(xml: &str) -> Result<Vec<PropertyChange>, XmlError> {
    let mut changes = Vec::new();
    for event in parse_all(xml)? {
        if event.parent().map(local_name) != Some("property") {
            continue;
        }
        if local_name(&event.name) == "LastChange" {
            for inner in parse_all(&event.text)? {
                if inner.parent().map(local_name) == Some("InstanceID") {
                    changes.push(PropertyChange {
                        name: local_name(&inner.name).to_string(),
                        value: inner.attribute("val").unwrap_or_default().to_string(),
                    });
                }
            }
        } else {
            changes.push(PropertyChange {
                name: local_name(&event.name).to_string(),
                value: event.text,
            });
        }
    }
    Ok(changes)
}

fn parse_all(xml: &str) -> Result<Vec<dlnaxml::XmlEvent>, XmlError> {
    let mut parser = XmlParser::new();
    parser.write(xml.as_bytes())?;
    parser.end()?;
    Ok(std::iter::from_fn(|| parser.next_event()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::BufferedRequest;
    use crate::ssdp::ScheduleKind;

    fn datagram(text: &str) -> RequestData {
        RequestData {
            data: text.as_bytes().to_vec(),
            peer: "192.168.1.30:1900".parse().unwrap(),
        }
    }

    fn notify_of(schedule: Schedule) -> NotifyReplyCp {
        match schedule.kind {
            ScheduleKind::NotifyReplyCp(notify) => notify,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_max_age() {
        assert_eq!(parse_max_age("max-age=1800"), Some(1800));
        assert_eq!(parse_max_age("no-cache, MAX-AGE = 60"), Some(60));
        assert_eq!(parse_max_age("no-cache"), None);
    }

    #[test]
    fn test_alive_announcement() {
        let req = datagram(
            "NOTIFY * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nCACHE-CONTROL: max-age=900\r\n\
             LOCATION: http://192.168.1.30:8080/device.xml\r\nNT: upnp:rootdevice\r\n\
             NTS: ssdp:alive\r\nUSN: uuid:abc::upnp:rootdevice\r\n\r\n",
        );
        let now = Instant::now();
        let schedule = parse_datagram(&req, now).unwrap();
        assert_eq!(schedule.due_time, now);
        assert_eq!(schedule.address, req.peer);
        let notify = notify_of(schedule);
        assert_eq!(notify.nts, "ssdp:alive");
        assert_eq!(notify.search_target, "upnp:rootdevice");
        assert_eq!(notify.location, "http://192.168.1.30:8080/device.xml");
        assert_eq!(notify.usn, "uuid:abc::upnp:rootdevice");
        assert_eq!(notify.max_age, 900);
        assert_eq!(notify.delivery_host_and_port, "239.255.255.250:1900");
    }

    #[test]
    fn test_search_reply_counts_as_alive() {
        let req = datagram(
            "HTTP/1.1 200 OK\r\nCACHE-CONTROL: max-age=1800\r\nEXT:\r\n\
             LOCATION: http://192.168.1.30:8080/device.xml\r\n\
             ST: urn:schemas-upnp-org:device:MediaRenderer:1\r\n\
             USN: uuid:abc::urn:schemas-upnp-org:device:MediaRenderer:1\r\n\r\n",
        );
        let notify = notify_of(parse_datagram(&req, Instant::now()).unwrap());
        assert_eq!(notify.nts, "ssdp:alive");
        assert_eq!(notify.search_target, "urn:schemas-upnp-org:device:MediaRenderer:1");
    }

    #[test]
    fn test_search_and_junk_ignored() {
        let now = Instant::now();
        assert!(parse_datagram(&datagram("M-SEARCH * HTTP/1.1\r\nST: ssdp:all\r\n\r\n"), now).is_none());
        assert!(parse_datagram(&datagram("NOTIFY * HTTP/1.1\r\nNT: x\r\n\r\n"), now).is_none());
        assert!(parse_datagram(&datagram("GARBAGE"), now).is_none());
    }

    #[test]
    fn test_parse_event_headers() {
        let mut req = BufferedRequest::new("NOTIFY", "/events/avt")
            .with_header("HOST", "192.168.1.5:49152")
            .with_header("NT", "upnp:event")
            .with_header("NTS", "upnp:propchange")
            .with_header("SID", "uuid:1234")
            .with_header("SEQ", "3")
            .with_body("<e:propertyset/>");
        let notify = parse_event(&mut req, 1024).unwrap();
        assert_eq!(notify.subscription_id, "uuid:1234");
        assert_eq!(notify.event_key, "3");
        assert_eq!(notify.delivery_path, "/events/avt");
        assert_eq!(notify.xml, "<e:propertyset/>");

        let mut req = BufferedRequest::new("NOTIFY", "/events/avt")
            .with_header("NT", "upnp:event")
            .with_header("NTS", "upnp:propchange")
            .with_header("SID", "uuid:1234")
            .with_body(vec![b'x'; 65]);
        assert!(matches!(
            parse_event(&mut req, 64),
            Err(ControlPointError::EventTooLarge(64))
        ));
    }

    #[test]
    fn test_property_set_with_last_change() {
        let xml = "<?xml version=\"1.0\"?>\
            <e:propertyset xmlns:e=\"urn:schemas-upnp-org:event-1-0\">\
            <e:property><LastChange>&lt;Event xmlns=&quot;urn:schemas-upnp-org:metadata-1-0/AVT/&quot;&gt;\
            &lt;InstanceID val=&quot;0&quot;&gt;&lt;TransportState val=&quot;PLAYING&quot;/&gt;\
            &lt;CurrentTrack val=&quot;1&quot;/&gt;&lt;/InstanceID&gt;&lt;/Event&gt;</LastChange></e:property>\
            <e:property><SystemUpdateID>7</SystemUpdateID></e:property>\
            </e:propertyset>";
        let changes = parse_property_set(xml).unwrap();
        let pairs: Vec<_> = changes
            .iter()
            .map(|c| (c.name.as_str(), c.value.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("TransportState", "PLAYING"),
                ("CurrentTrack", "1"),
                ("SystemUpdateID", "7")
            ]
        );
    }
}
