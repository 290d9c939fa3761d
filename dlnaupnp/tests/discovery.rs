mod common;

use std::time::{Duration, Instant};

use common::{RENDERER, RecordingUdp, msearch, renderer};
use dlnaupnp::ssdp::{
    Classification, DropReason, RequestData, Schedule, ScheduleContext, ScheduleKind, Scheduler,
    SsdpClassifier,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn datagram(text: &str) -> RequestData {
    RequestData {
        data: text.as_bytes().to_vec(),
        peer: "192.168.1.42:51000".parse().unwrap(),
    }
}

#[test]
fn media_renderer_search_yields_one_reply() {
    let classifier = SsdpClassifier::for_device(&renderer());
    let now = Instant::now();

    let outcome = classifier.classify(&datagram(&msearch(RENDERER, "2")), now);
    let Classification::Reply(schedule) = outcome else {
        panic!("expected a reply, got {:?}", outcome);
    };
    assert!(schedule.active);
    assert!(schedule.due_time >= now);
    assert!(schedule.due_time < now + Duration::from_millis(2000));
    match &schedule.kind {
        ScheduleKind::MSearchReply(reply) => {
            assert_eq!(reply.search_target, RENDERER);
            assert_eq!(reply.mx, 2);
        }
        other => panic!("unexpected kind {:?}", other),
    }
}

#[test]
fn unknown_search_target_never_scheduled() {
    let classifier = SsdpClassifier::for_device(&renderer());
    let outcome = classifier.classify(
        &datagram(&msearch("urn:schemas-upnp-org:device:MediaServer:1", "1")),
        Instant::now(),
    );
    assert!(matches!(
        outcome,
        Classification::Dropped(DropReason::UnknownSearchTarget(_))
    ));
}

#[test]
fn mx_five_delay_stays_in_window() {
    let classifier = SsdpClassifier::for_device(&renderer());
    let mut rng = StdRng::seed_from_u64(7);
    let request = datagram(&msearch("upnp:rootdevice", "5"));
    let now = Instant::now();
    for _ in 0..500 {
        let Classification::Reply(s) = classifier.classify_with_rng(&request, now, &mut rng) else {
            panic!("rootdevice must be answered");
        };
        let delay = s.due_time - now;
        assert!(delay < Duration::from_millis(5000), "delay {:?}", delay);
    }
}

#[test]
fn mx_out_of_range_is_clamped() {
    let classifier = SsdpClassifier::for_device(&renderer());
    let now = Instant::now();
    for (mx, expected) in [("0", 1), ("abc", 1), ("120", 5)] {
        match classifier.classify(&datagram(&msearch("ssdp:all", mx)), now) {
            Classification::Reply(Schedule {
                kind: ScheduleKind::MSearchReply(reply),
                ..
            }) => assert_eq!(reply.mx, expected, "MX: {}", mx),
            other => panic!("unexpected {:?}", other),
        }
    }
}

#[test]
fn lowercase_headers_accepted() {
    let classifier = SsdpClassifier::for_device(&renderer());
    let text = "M-SEARCH * HTTP/1.1\r\nhost: 239.255.255.250:1900\r\nman: \"ssdp:discover\"\r\nmx: 1\r\nst: upnp:rootdevice\r\n\r\n";
    assert!(matches!(
        classifier.classify(&datagram(text), Instant::now()),
        Classification::Reply(_)
    ));
}

#[test]
fn alive_notify_ignored() {
    let classifier = SsdpClassifier::for_device(&renderer());
    let text = "NOTIFY * HTTP/1.1\r\nNT: upnp:rootdevice\r\nNTS: ssdp:alive\r\n\r\n";
    assert!(matches!(
        classifier.classify(&datagram(text), Instant::now()),
        Classification::Ignored
    ));
}

#[test]
fn ssdp_all_reply_spaced_by_gap() {
    let device = renderer();
    let mut udp = RecordingUdp::default();
    let mut scheduler = Scheduler::new();
    let t0 = Instant::now();
    scheduler.add(Schedule::msearch_reply(
        "192.168.1.42:51000".parse().unwrap(),
        "ssdp:all",
        1,
        t0,
    ));

    let expected = device.notification_types().len();
    let mut now = t0;
    let mut ticks = 0;
    while !scheduler.is_empty() {
        let mut ctx = ScheduleContext::new(&mut udp, 1800).with_device(&device);
        scheduler.tick(now, &mut ctx);
        now += Duration::from_millis(80);
        ticks += 1;
        assert!(ticks <= expected + 1);
    }

    let sent = udp.sent();
    assert_eq!(sent.len(), expected);
    assert!(sent.iter().all(|(msg, _)| msg.starts_with("HTTP/1.1 200 OK\r\n")));
    assert!(sent.iter().any(|(msg, _)| msg.contains("ST: upnp:rootdevice\r\n")));
}

#[test]
fn repeating_schedule_rearmed_from_tick_time() {
    let device = renderer();
    let mut udp = RecordingUdp::default();
    let mut scheduler = Scheduler::new();
    let t0 = Instant::now();
    let interval = Duration::from_secs(900);
    let id = scheduler
        .add(Schedule::post_alive(t0).repeat_every(interval))
        .unwrap();

    let late = t0 + Duration::from_millis(37);
    let mut ctx = ScheduleContext::new(&mut udp, 1800).with_device(&device);
    assert_eq!(scheduler.tick(late, &mut ctx), 1);
    assert_eq!(scheduler.get(id).unwrap().due_time, late + interval);

    let alive = udp.sent();
    assert_eq!(alive.len(), device.notification_types().len());
    assert!(alive.iter().all(|(m, _)| m.contains("NTS: ssdp:alive\r\n")));
}
