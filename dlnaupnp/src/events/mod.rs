//! # Module Events - GENA
//!
//! Abonnements aux événements des services et publication des changements
//! d'état sous forme de NOTIFY `LastChange`.
//!
//! ## Architecture
//!
//! - [`Subscription`] : un abonné (SID, callback, expiration, SEQ, changements en attente)
//! - [`SubscriptionManager`] : cycle de vie des abonnements et agrégation des changements
//! - [`NotifyBody`] : `e:propertyset` réécrit à la demande, jamais tamponné
//! - [`EventSender`] : envoi HTTP d'un NOTIFY, [`HttpEventSender`] via reqwest

mod body;
mod errors;
mod manager;
mod sender;
mod subscription;

pub use body::{NotifyBody, NotifyBodyReader};
pub use errors::{NotifyError, SubscriptionError};
pub use manager::{SubscribeOutcome, SubscriptionManager, write_property_set};
pub use sender::{EventSender, HttpEventSender, NotifyRequest};
pub use subscription::{ChangeWriter, Subscription, SubscriptionState};

/// Durée d'abonnement par défaut (secondes)
pub const DEFAULT_TIMEOUT_SEC: u32 = 1800;

/// Espace de noms des `e:propertyset`
pub const EVENT_NS: &str = "urn:schemas-upnp-org:event-1-0";
