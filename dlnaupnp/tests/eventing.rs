mod common;

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::RecordingSender;
use dlnaupnp::events::{
    ChangeWriter, EventSender, NotifyBody, NotifyError, NotifyRequest, SubscriptionError,
    SubscriptionManager,
};
use dlnaxml::{DynPrinter, XmlParser, local_name};

fn transport_state(value: &'static str) -> ChangeWriter {
    Arc::new(move |xp: &mut DynPrinter<'_>| xp.state_variable("TransportState", value))
}

#[test]
fn two_changes_one_notify_per_subscriber() {
    let now = Instant::now();
    let mut mgr = SubscriptionManager::new(1800);
    let a = mgr.subscribe("AVT", "http://10.0.0.5/a", None, 0, now).unwrap();
    let b = mgr.subscribe("AVT", "http://10.0.0.6/b", None, 0, now).unwrap();
    mgr.subscribe("RCS", "http://10.0.0.7/c", None, 0, now).unwrap();

    assert_eq!(mgr.add_change("AVT", transport_state("TRANSITIONING")), 2);
    assert_eq!(
        mgr.add_change(
            "AVT",
            Arc::new(|xp: &mut DynPrinter<'_>| xp.state_variable("CurrentTrack", "1")),
        ),
        2
    );

    let mut sender = RecordingSender::default();
    assert_eq!(mgr.publish(now, &mut sender), 2);

    let notified = sender.notified();
    assert_eq!(notified.len(), 2);
    for (n, sid) in notified.iter().zip([a.sid(), b.sid()]) {
        assert_eq!(n.sid, sid);
        assert_eq!(n.seq, 0);
        let first = n
            .body
            .find("&lt;TransportState val=&quot;TRANSITIONING&quot;/&gt;")
            .unwrap();
        let second = n.body.find("&lt;CurrentTrack val=&quot;1&quot;/&gt;").unwrap();
        assert!(first < second);
    }
    assert_eq!(mgr.pending_count(), 0);
}

#[test]
fn notify_body_parses_back() {
    let now = Instant::now();
    let mut mgr = SubscriptionManager::new(1800);
    mgr.subscribe("AVT", "http://10.0.0.5/a", None, 0, now).unwrap();
    mgr.add_change("AVT", transport_state("PLAYING"));

    let mut sender = RecordingSender::default();
    mgr.publish(now, &mut sender);
    let body = &sender.notified()[0].body;

    let mut parser = XmlParser::new();
    parser.write(body.as_bytes()).unwrap();
    parser.end().unwrap();
    let last_change = std::iter::from_fn(|| parser.next_event())
        .find(|e| local_name(&e.name) == "LastChange")
        .unwrap();
    assert_eq!(
        last_change.text,
        "<Event xmlns=\"urn:schemas-upnp-org:metadata-1-0/AVT/\">\
         <InstanceID val=\"0\"><TransportState val=\"PLAYING\"/></InstanceID></Event>"
    );
}

#[test]
fn sequence_advances_per_notify() {
    let now = Instant::now();
    let mut mgr = SubscriptionManager::new(1800);
    let sid = mgr
        .subscribe("AVT", "http://10.0.0.5/a", None, 0, now)
        .unwrap()
        .sid()
        .to_string();
    let mut sender = RecordingSender::default();
    for state in ["PLAYING", "PAUSED_PLAYBACK", "STOPPED"] {
        mgr.add_change("AVT", transport_state(state));
        mgr.publish(now, &mut sender);
    }
    let seqs: Vec<u32> = sender.notified().iter().map(|n| n.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2]);
    assert_eq!(mgr.get(&sid).unwrap().seq(), 3);
}

#[test]
fn failed_notify_not_retried() {
    let now = Instant::now();
    let mut mgr = SubscriptionManager::new(1800);
    mgr.subscribe("AVT", "http://10.0.0.5/a", None, 0, now).unwrap();
    mgr.add_change("AVT", transport_state("PLAYING"));

    let mut sender = RecordingSender::default();
    sender.fail = true;
    assert_eq!(mgr.publish(now, &mut sender), 0);
    assert_eq!(mgr.pending_count(), 0);
    sender.fail = false;
    assert_eq!(mgr.publish(now, &mut sender), 0);
    assert!(sender.notified().is_empty());
}

#[test]
fn subscribe_then_unsubscribe_restores_count() {
    let now = Instant::now();
    let mut mgr = SubscriptionManager::new(1800);
    mgr.subscribe("AVT", "http://10.0.0.5/a", None, 0, now).unwrap();
    let before = mgr.subscriptions_count();

    let sid = mgr
        .subscribe("AVT", "http://10.0.0.6/b", None, 300, now)
        .unwrap()
        .sid()
        .to_string();
    assert!(sid.starts_with("uuid:"));
    assert_eq!(mgr.subscriptions_count(), before + 1);

    mgr.unsubscribe("AVT", &sid).unwrap();
    assert_eq!(mgr.subscriptions_count(), before);
}

#[test]
fn unsubscribe_unknown_sid_fails() {
    let now = Instant::now();
    let mut mgr = SubscriptionManager::new(1800);
    mgr.subscribe("AVT", "http://10.0.0.5/a", None, 0, now).unwrap();
    assert!(matches!(
        mgr.unsubscribe("AVT", "sid-never-issued"),
        Err(SubscriptionError::UnknownSid(_))
    ));
    assert_eq!(mgr.subscriptions_count(), 1);
}

#[test]
fn expired_subscribers_skipped_by_publish() {
    let now = Instant::now();
    let mut mgr = SubscriptionManager::new(1800);
    mgr.subscribe("AVT", "http://10.0.0.5/a", None, 5, now).unwrap();
    mgr.add_change("AVT", transport_state("PLAYING"));

    let mut sender = RecordingSender::default();
    assert_eq!(mgr.publish(now + Duration::from_secs(5), &mut sender), 0);
    assert_eq!(mgr.subscriptions_count(), 0);
}

#[test]
fn inactive_manager_ignores_changes() {
    let now = Instant::now();
    let mut mgr = SubscriptionManager::new(1800);
    mgr.subscribe("AVT", "http://10.0.0.5/a", None, 0, now).unwrap();
    mgr.set_active(false);
    assert_eq!(mgr.add_change("AVT", transport_state("PLAYING")), 0);
    assert_eq!(mgr.pending_count(), 0);
}

/// Flux qui refuse toute écriture de plus de `cap` octets.
struct CappedWriter {
    cap: usize,
    out: Vec<u8>,
}

impl Write for CappedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.len() > self.cap {
            return Err(io::Error::other(format!("write of {} bytes", buf.len())));
        }
        self.out.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Expéditeur qui copie le corps par morceaux de 32 octets.
#[derive(Default)]
struct ChunkedSender {
    announced: Vec<u64>,
    bodies: Vec<Vec<u8>>,
}

impl EventSender for ChunkedSender {
    fn send_notify(
        &mut self,
        _request: &NotifyRequest<'_>,
        body: NotifyBody,
    ) -> Result<(), NotifyError> {
        self.announced.push(body.content_length()?);
        let mut out = CappedWriter { cap: 32, out: Vec::new() };
        let mut reader = body.into_reader();
        let mut chunk = [0u8; 32];
        loop {
            let n = reader.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            out.write_all(&chunk[..n])?;
        }
        self.bodies.push(out.out);
        Ok(())
    }
}

#[test]
fn large_notify_streamed_in_small_chunks() {
    let now = Instant::now();
    let mut mgr = SubscriptionManager::new(1800);
    mgr.subscribe("AVT", "http://10.0.0.5/a", None, 0, now).unwrap();
    for i in 0..200 {
        let track = i.to_string();
        mgr.add_change(
            "AVT",
            Arc::new(move |xp: &mut DynPrinter<'_>| xp.state_variable("CurrentTrack", &track)),
        );
    }

    let mut sender = ChunkedSender::default();
    assert_eq!(mgr.publish(now, &mut sender), 1);

    let body = String::from_utf8(sender.bodies.remove(0)).unwrap();
    assert!(body.len() > 4096);
    assert_eq!(sender.announced[0], body.len() as u64);
    assert!(body.starts_with("<?xml"));
    assert!(body.ends_with("</e:propertyset>"));
    assert!(body.contains("&lt;CurrentTrack val=&quot;199&quot;/&gt;"));
}
