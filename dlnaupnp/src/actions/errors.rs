//! Erreurs d'exécution d'une action.

use std::io;

use thiserror::Error;

use crate::soap::error_codes;

/// Échec d'une action, porteur d'un code d'erreur UPnP.
#[derive(Error, Debug)]
pub enum ActionError {
    /// Argument manquant ou en trop
    #[error("Invalid args: {0}")]
    InvalidArgs(String),

    #[error("Action failed: {0}")]
    ActionFailed(String),

    #[error("Argument value invalid: {0}")]
    ArgumentValueInvalid(String),

    #[error("Argument value out of range: {0}")]
    ArgumentValueOutOfRange(String),

    /// Transition refusée par l'état courant (AVTransport 701)
    #[error("Transition not available: {0}")]
    TransitionNotAvailable(String),

    /// ObjectID inconnu du ContentDirectory
    #[error("No such object: {0}")]
    NoSuchObject(String),

    /// ContainerID inconnu ou qui n'est pas un container
    #[error("No such container: {0}")]
    NoSuchContainer(String),

    #[error("Invalid search criteria: {0}")]
    InvalidSearchCriteria(String),

    #[error("Invalid sort criteria: {0}")]
    InvalidSortCriteria(String),

    /// Écriture de la réponse impossible
    #[error("Failed to write response: {0}")]
    Io(#[from] io::Error),
}

impl ActionError {
    /// Code d'erreur UPnP de la faute SOAP.
    pub fn upnp_code(&self) -> &'static str {
        match self {
            ActionError::InvalidArgs(_) => error_codes::INVALID_ARGS,
            ActionError::ActionFailed(_) | ActionError::Io(_) => error_codes::ACTION_FAILED,
            ActionError::ArgumentValueInvalid(_) => error_codes::ARGUMENT_VALUE_INVALID,
            ActionError::ArgumentValueOutOfRange(_) => error_codes::ARGUMENT_VALUE_OUT_OF_RANGE,
            ActionError::TransitionNotAvailable(_) => error_codes::TRANSITION_NOT_AVAILABLE,
            ActionError::NoSuchObject(_) => error_codes::NO_SUCH_OBJECT,
            ActionError::NoSuchContainer(_) => error_codes::NO_SUCH_CONTAINER,
            ActionError::InvalidSearchCriteria(_) => error_codes::INVALID_SEARCH_CRITERIA,
            ActionError::InvalidSortCriteria(_) => error_codes::INVALID_SORT_CRITERIA,
        }
    }

    /// Description courte placée dans `errorDescription`.
    pub fn upnp_description(&self) -> &'static str {
        match self {
            ActionError::InvalidArgs(_) => "Invalid Args",
            ActionError::ActionFailed(_) | ActionError::Io(_) => "Action Failed",
            ActionError::ArgumentValueInvalid(_) => "Argument Value Invalid",
            ActionError::ArgumentValueOutOfRange(_) => "Argument Value Out of Range",
            ActionError::TransitionNotAvailable(_) => "Transition not available",
            ActionError::NoSuchObject(_) => "No such object",
            ActionError::NoSuchContainer(_) => "No such container",
            ActionError::InvalidSearchCriteria(_) => "Unsupported or invalid search criteria",
            ActionError::InvalidSortCriteria(_) => "Unsupported or invalid sort criteria",
        }
    }
}
