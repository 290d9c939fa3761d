//! Erreurs relatives aux devices UPnP.

use thiserror::Error;

/// Erreurs liées à la description d'un device.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Service déjà existant (même abréviation ou même URL)
    #[error("Service '{0}' already exists in device")]
    ServiceAlreadyExists(String),

    /// URL de base refusée (vide, non HTTP ou pointant sur localhost)
    #[error("Invalid base URL '{0}': expected a routable http:// address")]
    InvalidBaseUrl(String),

    /// UDN absent ou sans préfixe `uuid:`
    #[error("Invalid UDN '{0}'")]
    InvalidUdn(String),

    /// Type de device vide
    #[error("Device type must not be empty")]
    MissingDeviceType,

    /// Le moteur a déjà été démarré
    #[error("Device engine already started")]
    AlreadyStarted,
}
