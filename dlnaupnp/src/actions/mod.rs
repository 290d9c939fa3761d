//! # Module Actions
//!
//! Requêtes d'action reçues par le contrôle SOAP et réponses associées.
//!
//! - [`ActionRequest`] : action et arguments extraits d'une enveloppe SOAP
//! - [`ActionReply`] : arguments de sortie d'une action
//! - [`ActionError`] : échec typé, traduit en faute UPnP

mod errors;
mod reply;
mod request;

pub use errors::ActionError;
pub use reply::ActionReply;
pub use request::ActionRequest;
