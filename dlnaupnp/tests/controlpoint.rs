mod common;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use common::RecordingUdp;
use dlnaupnp::controlpoint::{ControlPoint, ControlPointConfig, parse_property_set};
use dlnaupnp::http::{BufferedReply, BufferedRequest};
use dlnaupnp::ssdp::NotifyReplyCp;

const DEVICE: &str = "192.168.1.30:1900";

fn alive(usn: &str, nt: &str) -> String {
    format!(
        "NOTIFY * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nCACHE-CONTROL: max-age=1800\r\n\
         LOCATION: http://192.168.1.30:8080/device.xml\r\nNT: {}\r\nNTS: ssdp:alive\r\n\
         SERVER: Linux/6 UPnP/1.0 Test/1\r\nUSN: {}\r\n\r\n",
        nt, usn
    )
}

fn control_point(udp: &RecordingUdp, config: ControlPointConfig) -> (ControlPoint, Arc<Mutex<Vec<NotifyReplyCp>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let cp = ControlPoint::new(Box::new(udp.clone()), config).with_notify_handler(move |n| {
        log.lock().unwrap().push(n.clone());
        true
    });
    (cp, seen)
}

#[test]
fn begin_repeats_msearch_with_clamped_mx() {
    let udp = RecordingUdp::default();
    let config = ControlPointConfig {
        mx: 0,
        ..Default::default()
    };
    let (mut cp, _) = control_point(&udp, config);
    let now = Instant::now();
    cp.begin(now);

    cp.poll(now);
    cp.poll(now + Duration::from_secs(1));
    cp.poll(now + Duration::from_secs(2));
    cp.poll(now + Duration::from_secs(5));

    let sent = udp.sent();
    assert_eq!(sent.len(), 3);
    for (msg, to) in &sent {
        assert!(msg.starts_with("M-SEARCH * HTTP/1.1\r\n"));
        assert!(msg.contains("MX: 1\r\n"));
        assert!(msg.contains("ST: ssdp:all\r\n"));
        assert_eq!(to.to_string(), "239.255.255.250:1900");
    }
}

#[test]
fn announcements_feed_registry_and_handler() {
    let udp = RecordingUdp::default();
    let (mut cp, seen) = control_point(&udp, ControlPointConfig::default());
    let now = Instant::now();
    cp.begin(now);

    udp.inject(&alive("uuid:abc::upnp:rootdevice", "upnp:rootdevice"), DEVICE);
    udp.inject(
        "HTTP/1.1 200 OK\r\nCACHE-CONTROL: max-age=1800\r\nEXT:\r\n\
         LOCATION: http://192.168.1.31:8080/desc.xml\r\n\
         ST: urn:schemas-upnp-org:device:MediaServer:1\r\n\
         USN: uuid:srv::urn:schemas-upnp-org:device:MediaServer:1\r\n\r\n",
        "192.168.1.31:1900",
    );
    udp.inject("M-SEARCH * HTTP/1.1\r\nST: ssdp:all\r\nMX: 1\r\n\r\n", "192.168.1.40:1900");

    let stats = cp.poll(now);
    assert_eq!(stats.received, 3);
    assert_eq!(stats.scheduled, 2);
    assert_eq!(cp.devices().len(), 2);
    assert_eq!(
        cp.device("uuid:abc").unwrap().location,
        "http://192.168.1.30:8080/device.xml"
    );
    assert_eq!(seen.lock().unwrap().len(), 2);

    udp.inject(
        "NOTIFY * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nNT: upnp:rootdevice\r\n\
         NTS: ssdp:byebye\r\nUSN: uuid:abc::upnp:rootdevice\r\n\r\n",
        DEVICE,
    );
    cp.poll(now);
    assert!(cp.device("uuid:abc").is_none());
    assert!(cp.device("uuid:srv").is_some());
    assert_eq!(seen.lock().unwrap()[2].nts, "ssdp:byebye");
}

#[test]
fn filtered_search_target_ignores_other_devices() {
    let udp = RecordingUdp::default();
    let config = ControlPointConfig {
        search_target: "urn:schemas-upnp-org:device:MediaRenderer:1".into(),
        ..Default::default()
    };
    let (mut cp, _) = control_point(&udp, config);
    let now = Instant::now();
    cp.begin(now);

    udp.inject(&alive("uuid:srv::upnp:rootdevice", "upnp:rootdevice"), DEVICE);
    udp.inject(
        &alive(
            "uuid:abc::urn:schemas-upnp-org:device:MediaRenderer:1",
            "urn:schemas-upnp-org:device:MediaRenderer:1",
        ),
        DEVICE,
    );
    cp.poll(now);
    assert_eq!(cp.devices().len(), 1);
    assert_eq!(cp.devices()[0].udn, "uuid:abc");
}

#[test]
fn subscribe_sends_request_with_callback() {
    let udp = RecordingUdp::default();
    let config = ControlPointConfig {
        callback_url: Some("http://192.168.1.5:49152/events".into()),
        subscription_timeout_sec: 300,
        ..Default::default()
    };
    let (mut cp, _) = control_point(&udp, config);
    let now = Instant::now();
    cp.begin(now);
    cp.poll(now);
    udp.clear();

    let device = "192.168.1.30:8080".parse().unwrap();
    cp.subscribe(device, "/AVT/event", now).unwrap();
    cp.poll(now);

    let sent = udp.sent();
    assert_eq!(sent.len(), 1);
    let (msg, to) = &sent[0];
    assert_eq!(*to, device);
    assert!(msg.starts_with("SUBSCRIBE /AVT/event HTTP/1.1\r\n"));
    assert!(msg.contains("CALLBACK: <http://192.168.1.5:49152/events>\r\n"));
    assert!(msg.contains("TIMEOUT: Second-300\r\n"));
}

#[test]
fn gena_notify_reaches_handler() {
    let udp = RecordingUdp::default();
    let (mut cp, seen) = control_point(&udp, ControlPointConfig::default());
    let now = Instant::now();
    cp.begin(now);

    let mut req = BufferedRequest::new("NOTIFY", "/events")
        .with_header("HOST", "192.168.1.5:49152")
        .with_header("NT", "upnp:event")
        .with_header("NTS", "upnp:propchange")
        .with_header("SID", "uuid:sub-1")
        .with_header("SEQ", "4")
        .with_body(
            "<?xml version=\"1.0\"?><e:propertyset xmlns:e=\"urn:schemas-upnp-org:event-1-0\">\
             <e:property><Volume>42</Volume></e:property></e:propertyset>",
        );
    let mut reply = BufferedReply::new();
    cp.handle_http(&mut req, &mut reply, now);
    assert_eq!(reply.status, 200);

    cp.poll(now);
    let seen = seen.lock().unwrap();
    let event = seen.iter().find(|n| n.nts == "upnp:propchange").unwrap();
    assert_eq!(event.subscription_id, "uuid:sub-1");
    assert_eq!(event.event_key, "4");
    assert_eq!(event.delivery_path, "/events");
    let changes = parse_property_set(&event.xml).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].name, "Volume");
    assert_eq!(changes[0].value, "42");
}

#[test]
fn gena_notify_errors_map_to_status() {
    let udp = RecordingUdp::default();
    let (mut cp, _) = control_point(&udp, ControlPointConfig::default());
    let now = Instant::now();
    cp.begin(now);

    let mut reply = BufferedReply::new();
    cp.handle_http(&mut BufferedRequest::new("NOTIFY", "/events"), &mut reply, now);
    assert_eq!(reply.status, 400);

    let mut reply = BufferedReply::new();
    let mut req = BufferedRequest::new("NOTIFY", "/events")
        .with_header("NT", "upnp:event")
        .with_header("NTS", "upnp:propchange");
    cp.handle_http(&mut req, &mut reply, now);
    assert_eq!(reply.status, 412);

    let mut reply = BufferedReply::new();
    cp.handle_http(&mut BufferedRequest::new("GET", "/events"), &mut reply, now);
    assert_eq!(reply.status, 405);
}
