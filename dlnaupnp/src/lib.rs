//! # dlnaupnp - Moteur DLNA/UPnP
//!
//! Découverte SSDP, abonnements GENA et actions SOAP d'un device UPnP,
//! construits sur le codec XML incrémental de `dlnaxml`.
//!
//! Le moteur ([`engine::DeviceEngine`]) ne dépend ni d'un serveur HTTP ni
//! d'une socket : il consomme les traits [`http::HttpRequest`],
//! [`http::HttpReply`], [`ssdp::UdpTransport`] et [`events::EventSender`].
//! [`ssdp::SsdpSocket`] et [`events::HttpEventSender`] en sont les
//! implémentations réseau.
//!
//! [`controlpoint::ControlPoint`] est le pendant côté client : recherche,
//! suivi des annonces et réception des événements des autres devices.

pub mod actions;
pub mod controlpoint;
pub mod devices;
pub mod engine;
pub mod events;
pub mod http;
pub mod soap;
pub mod ssdp;

pub use crate::actions::{ActionError, ActionReply, ActionRequest};
pub use crate::controlpoint::{ControlPoint, ControlPointConfig, ControlPointError};
pub use crate::devices::{DeviceError, DeviceInfo, ServiceInfo};
pub use crate::engine::{DeviceEngine, EngineConfig, EventSource, InitialEventHook, PollStats};
pub use crate::events::{
    ChangeWriter, EventSender, HttpEventSender, NotifyError, SubscriptionError,
    SubscriptionManager,
};
pub use crate::http::{BufferedReply, BufferedRequest, HttpReply, HttpRequest};
pub use crate::soap::{ActionContext, ActionDispatcher, DispatchError};
pub use crate::ssdp::{Schedule, Scheduler, SsdpClassifier, SsdpSocket, UdpTransport};
