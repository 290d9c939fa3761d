//! Transport UDP des messages SSDP.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, warn};

use super::{SSDP_MULTICAST_ADDR, SSDP_PORT, TransportError};

/// Taille maximale d'un datagramme SSDP lu.
const MAX_DATAGRAM: usize = 8192;

/// Pause après une erreur de lecture autre qu'un délai expiré.
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Datagramme reçu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestData {
    pub data: Vec<u8>,
    pub peer: SocketAddr,
}

/// Accès au réseau utilisé par le moteur.
pub trait UdpTransport {
    /// Envoie un datagramme, retourne le nombre d'octets émis.
    fn send_to(&mut self, data: &[u8], to: SocketAddr) -> io::Result<usize>;

    /// Datagramme suivant, sans bloquer.
    fn receive(&mut self) -> Option<RequestData>;
}

/// Socket SSDP multicast sur le port 1900.
///
/// Un thread de lecture pousse les datagrammes reçus dans une file bornée
/// (un seul producteur, un seul consommateur) ; [`UdpTransport::receive`] les
/// retire depuis la boucle du moteur. File pleine : le datagramme est perdu.
pub struct SsdpSocket {
    socket: Arc<UdpSocket>,
    inbound: Receiver<RequestData>,
    running: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl SsdpSocket {
    /// Ouvre la socket d'un device sur le port 1900, rejoint le groupe
    /// multicast sur chaque interface IPv4 et démarre le thread de lecture.
    pub fn bind(queue_capacity: usize) -> Result<Self, TransportError> {
        Self::open(SSDP_PORT, queue_capacity)
    }

    /// Socket d'un point de contrôle, sur un port éphémère.
    ///
    /// Partager le port 1900 avec un device répartirait les datagrammes entre
    /// les deux sockets : les réponses unicast aux M-SEARCH seraient perdues.
    /// Le groupe multicast est tout de même rejoint pour recevoir les annonces.
    pub fn bind_control_point(queue_capacity: usize) -> Result<Self, TransportError> {
        Self::open(0, queue_capacity)
    }

    fn open(port: u16, queue_capacity: usize) -> Result<Self, TransportError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        if port != 0 {
            socket.set_reuse_port(true)?;
        }

        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        socket.bind(&bind_addr.into())?;

        let socket: UdpSocket = socket.into();
        let local = socket.local_addr()?;
        socket.set_read_timeout(Some(Duration::from_millis(200)))?;
        socket.set_multicast_loop_v4(true)?;

        let interfaces = dlnautils::ipv4_interfaces();
        let mut joined = 0;
        for ipv4 in &interfaces {
            match socket.join_multicast_v4(&SSDP_MULTICAST_ADDR, ipv4) {
                Ok(()) => {
                    debug!("SSDP: joined {} on {}", SSDP_MULTICAST_ADDR, ipv4);
                    joined += 1;
                }
                Err(e) => warn!(
                    "SSDP: failed to join {} on {}: {}",
                    SSDP_MULTICAST_ADDR, ipv4, e
                ),
            }
        }
        if joined == 0 {
            socket.join_multicast_v4(&SSDP_MULTICAST_ADDR, &Ipv4Addr::UNSPECIFIED)?;
        }

        let socket = Arc::new(socket);
        let running = Arc::new(AtomicBool::new(true));
        let (producer, inbound) = crossbeam_channel::bounded(queue_capacity.max(1));

        let reader = std::thread::Builder::new()
            .name("ssdp-reader".into())
            .spawn({
                let socket = Arc::clone(&socket);
                let running = Arc::clone(&running);
                move || read_loop(&*socket, &producer, &running)
            })
            .map_err(TransportError::Thread)?;

        info!(
            "✅ SSDP socket listening on {} (group {}:{})",
            local,
            SSDP_MULTICAST_ADDR,
            SSDP_PORT
        );

        Ok(Self {
            socket,
            inbound,
            running,
            reader: Some(reader),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

/// Source de datagrammes lue par le thread de lecture.
pub(crate) trait DatagramSource {
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

impl DatagramSource for UdpSocket {
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf)
    }
}

fn read_loop<S: DatagramSource + ?Sized>(
    socket: &S,
    queue: &Sender<RequestData>,
    running: &AtomicBool,
) {
    let mut buf = [0u8; MAX_DATAGRAM];
    while running.load(Ordering::Acquire) {
        match socket.recv_from(&mut buf) {
            Ok((n, peer)) => {
                enqueue(
                    queue,
                    RequestData {
                        data: buf[..n].to_vec(),
                        peer,
                    },
                );
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => {
                warn!("❌ SSDP read error: {}", e);
                std::thread::sleep(READ_ERROR_BACKOFF);
            }
        }
    }
    debug!("SSDP reader stopped");
}

/// Dépose un datagramme sans bloquer ; retourne `false` s'il a été perdu.
fn enqueue(queue: &Sender<RequestData>, request: RequestData) -> bool {
    match queue.try_send(request) {
        Ok(()) => true,
        Err(TrySendError::Full(request)) => {
            warn!("SSDP queue full: datagram from {} dropped", request.peer);
            false
        }
        Err(TrySendError::Disconnected(_)) => {
            debug!("SSDP queue closed");
            false
        }
    }
}

impl UdpTransport for SsdpSocket {
    fn send_to(&mut self, data: &[u8], to: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(data, to)
    }

    fn receive(&mut self) -> Option<RequestData> {
        self.inbound.try_recv().ok()
    }
}

impl Drop for SsdpSocket {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!("SSDP reader thread panicked");
            }
        }
    }
}
