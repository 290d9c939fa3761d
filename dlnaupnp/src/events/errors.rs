//! Erreurs GENA.

use std::io;

use thiserror::Error;

/// Refus d'une requête d'abonnement.
#[derive(Error, Debug)]
pub enum SubscriptionError {
    /// SID inconnu (renouvellement ou désabonnement)
    #[error("Unknown subscription {0}")]
    UnknownSid(String),

    #[error("Missing CALLBACK header")]
    MissingCallback,

    #[error("Invalid CALLBACK URL '{0}'")]
    InvalidCallback(String),

    /// NT différent de `upnp:event`
    #[error("Invalid NT header '{0}'")]
    InvalidNt(String),

    #[error("Missing SID header")]
    MissingSid,

    /// SID combiné avec CALLBACK ou NT
    #[error("Incompatible SID and CALLBACK/NT headers")]
    IncompatibleHeaders,
}

impl SubscriptionError {
    /// Statut HTTP de la réponse d'erreur.
    pub fn status_code(&self) -> u16 {
        match self {
            SubscriptionError::IncompatibleHeaders => 400,
            _ => 412,
        }
    }
}

/// Échec d'envoi d'un NOTIFY.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Subscriber answered with status {0}")]
    Status(u16),

    #[error("Failed to render NOTIFY body: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid HTTP method")]
    Method,
}
