//! Fakes partagés par les tests d'intégration.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use dlnaupnp::devices::{DeviceInfo, ServiceInfo};
use dlnaupnp::events::{EventSender, NotifyBody, NotifyError, NotifyRequest};
use dlnaupnp::ssdp::{RequestData, UdpTransport};

pub const RENDERER: &str = "urn:schemas-upnp-org:device:MediaRenderer:1";

pub fn renderer() -> DeviceInfo {
    let mut device = DeviceInfo::new(RENDERER, "5f9ec1b3-ed59-4bd9-a2a5-c06b1a9a3b1e", "http://192.168.1.20:8080/")
        .with_friendly_name("Living Room")
        .with_local_ip("192.168.1.20".parse().unwrap());
    device
        .add_service(ServiceInfo::new("AVTransport", 1, "AVT").with_scpd("<scpd>avt</scpd>"))
        .unwrap();
    device
        .add_service(ServiceInfo::new("RenderingControl", 1, "RCS").with_path("/RC"))
        .unwrap();
    device
}

#[derive(Default)]
struct UdpState {
    inbound: VecDeque<RequestData>,
    sent: Vec<(String, SocketAddr)>,
}

/// UDP en mémoire ; les clones partagent le même état.
#[derive(Clone, Default)]
pub struct RecordingUdp {
    state: Arc<Mutex<UdpState>>,
}

impl RecordingUdp {
    pub fn inject(&self, text: &str, peer: &str) {
        self.state.lock().unwrap().inbound.push_back(RequestData {
            data: text.as_bytes().to_vec(),
            peer: peer.parse().unwrap(),
        });
    }

    pub fn sent(&self) -> Vec<(String, SocketAddr)> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().sent.clear();
    }
}

impl UdpTransport for RecordingUdp {
    fn send_to(&mut self, data: &[u8], to: SocketAddr) -> io::Result<usize> {
        self.state
            .lock()
            .unwrap()
            .sent
            .push((String::from_utf8_lossy(data).into_owned(), to));
        Ok(data.len())
    }

    fn receive(&mut self) -> Option<RequestData> {
        self.state.lock().unwrap().inbound.pop_front()
    }
}

/// NOTIFY reçu par le faux abonné.
#[derive(Debug, Clone)]
pub struct Notified {
    pub callback_url: String,
    pub sid: String,
    pub seq: u32,
    pub body: String,
}

/// Expéditeur en mémoire ; `fail` simule un abonné injoignable.
#[derive(Clone, Default)]
pub struct RecordingSender {
    notified: Arc<Mutex<Vec<Notified>>>,
    pub fail: bool,
}

impl RecordingSender {
    pub fn notified(&self) -> Vec<Notified> {
        self.notified.lock().unwrap().clone()
    }
}

impl EventSender for RecordingSender {
    fn send_notify(
        &mut self,
        request: &NotifyRequest<'_>,
        body: NotifyBody,
    ) -> Result<(), NotifyError> {
        let mut xml = Vec::new();
        body.write_to(&mut xml)?;
        if self.fail {
            return Err(NotifyError::Status(503));
        }
        self.notified.lock().unwrap().push(Notified {
            callback_url: request.callback_url.to_string(),
            sid: request.sid.to_string(),
            seq: request.seq,
            body: String::from_utf8(xml).unwrap(),
        });
        Ok(())
    }
}

pub fn msearch(st: &str, mx: &str) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nMAN: \"ssdp:discover\"\r\nMX: {}\r\nST: {}\r\n\r\n",
        mx, st
    )
}
