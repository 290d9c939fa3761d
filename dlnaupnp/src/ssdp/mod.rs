//! # Module SSDP - Simple Service Discovery Protocol
//!
//! Découverte des devices sur le réseau local, pilotée par un ordonnanceur
//! coopératif : aucune émission n'est faite en dehors de [`Scheduler::tick`].
//!
//! ## Architecture
//!
//! - [`Schedule`] : une émission programmée (annonce, réponse, recherche...)
//! - [`Scheduler`] : arène des émissions, exécutées quand elles sont échues
//! - [`SsdpClassifier`] : transforme un datagramme reçu en réponse programmée
//! - [`UdpTransport`] / [`SsdpSocket`] : accès au réseau
//!
//! ## Constantes SSDP
//!
//! - **Multicast Address**: 239.255.255.250:1900
//! - **Max-Age**: 1800 secondes par défaut

mod classifier;
mod errors;
pub mod messages;
mod schedule;
mod scheduler;
mod transport;

pub use classifier::{Classification, DropReason, SsdpClassifier};
pub(crate) use classifier::header_value;
pub use errors::{ScheduleError, TransportError};
pub use schedule::{
    MSearchReply, NotifyHandler, NotifyReplyCp, PostSubscribe, Progress, Schedule,
    ScheduleContext, ScheduleKind,
};
pub use scheduler::{ScheduleId, Scheduler};
pub use transport::{RequestData, SsdpSocket, UdpTransport};

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

/// Adresse multicast SSDP
pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// Port SSDP
pub const SSDP_PORT: u16 = 1900;

/// Durée de validité des annonces (en secondes)
pub const MAX_AGE: u32 = 1800;

/// Délai entre deux datagrammes d'une réponse multiple à `ssdp:all`
pub const REPLY_GAP: Duration = Duration::from_millis(80);

/// Délai entre les deux salves d'annonces initiales
pub const SECOND_ALIVE_DELAY: Duration = Duration::from_millis(100);

/// Adresse de groupe SSDP.
pub fn multicast_addr() -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(SSDP_MULTICAST_ADDR, SSDP_PORT))
}
