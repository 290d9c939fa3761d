//! Erreurs SSDP.

use std::io;

use thiserror::Error;

/// Échec d'exécution d'une émission programmée.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("UDP send failed: {0}")]
    Io(#[from] io::Error),

    /// Le datagramme n'a été que partiellement envoyé
    #[error("Short UDP write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// L'émission a besoin d'un device et aucun n'est fourni
    #[error("Schedule '{0}' requires a device")]
    MissingDevice(&'static str),

    /// Aucun gestionnaire enregistré pour les NOTIFY côté point de contrôle
    #[error("No notify handler registered")]
    NoNotifyHandler,
}

/// Échec d'ouverture du transport UDP.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to open SSDP socket: {0}")]
    Socket(#[from] io::Error),

    #[error("Failed to spawn SSDP reader thread: {0}")]
    Thread(io::Error),
}
