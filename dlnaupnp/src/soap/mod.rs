//! # Module SOAP - Simple Object Access Protocol
//!
//! Contrôle des services UPnP : lecture des enveloppes d'action par morceaux,
//! écriture des réponses et des fautes directement dans le corps HTTP, et
//! table de routage des actions.
//!
//! ## Architecture
//!
//! - [`parse_action_request`] : enveloppe SOAP vers [`ActionRequest`](crate::actions::ActionRequest)
//! - [`write_soap_response`] / [`reply_action`] : réponses `u:{Action}Response`
//! - [`write_soap_fault`] / [`SoapFault`] : fautes UPnP
//! - [`ActionDispatcher`] : règles `(service, action) -> handler`

mod builder;
mod dispatcher;
mod fault;
mod parser;

pub use builder::{reply_action, reply_arguments, write_soap_response};
pub use dispatcher::{
    ActionContext, ActionDispatcher, ActionHandler, ActionRule, DispatchError, DispatcherBuilder,
};
pub use fault::{SoapFault, UpnpError, reply_fault, write_soap_fault};
pub use parser::{SoapParseError, parse_action_request, parse_soap_action_header};

/// Espace de noms de l'enveloppe SOAP
pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Style d'encodage SOAP
pub const SOAP_ENCODING_STYLE: &str = "http://schemas.xmlsoap.org/soap/encoding/";

/// Espace de noms du détail `UPnPError`
pub const UPNP_CONTROL_NS: &str = "urn:schemas-upnp-org:control-1-0";

/// Type de contenu des réponses SOAP
pub const CONTENT_TYPE_XML: &str = "text/xml; charset=\"utf-8\"";

/// Codes d'erreur SOAP UPnP standards
pub mod error_codes {
    /// Action invalide
    pub const INVALID_ACTION: &str = "401";

    /// Arguments invalides
    pub const INVALID_ARGS: &str = "402";

    /// Action échouée
    pub const ACTION_FAILED: &str = "501";

    /// Valeur d'argument invalide
    pub const ARGUMENT_VALUE_INVALID: &str = "600";

    /// Argument hors limites
    pub const ARGUMENT_VALUE_OUT_OF_RANGE: &str = "601";

    /// Action optionnelle non implémentée
    pub const OPTIONAL_ACTION_NOT_IMPLEMENTED: &str = "602";

    /// Transition non disponible (AVTransport)
    pub const TRANSITION_NOT_AVAILABLE: &str = "701";

    /// Objet inconnu (ContentDirectory)
    pub const NO_SUCH_OBJECT: &str = "701";

    /// Critère de recherche invalide (ContentDirectory)
    pub const INVALID_SEARCH_CRITERIA: &str = "708";

    /// Critère de tri invalide (ContentDirectory)
    pub const INVALID_SORT_CRITERIA: &str = "709";

    /// Container inconnu (ContentDirectory)
    pub const NO_SUCH_CONTAINER: &str = "710";
}
