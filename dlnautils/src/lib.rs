//! Petits utilitaires réseau et système partagés par les crates DLNAKit.
//!
//! - [`guess_local_ip`] : adresse IP locale utilisée pour les connexions sortantes
//! - [`ipv4_interfaces`] : adresses IPv4 non-loopback des interfaces
//! - [`same_subnet`] : test d'appartenance à un même sous-réseau
//! - [`server_string`] : valeur de l'en-tête SSDP/HTTP `SERVER`

mod ip_utils;

pub use ip_utils::{guess_local_ip, ipv4_interfaces, same_subnet};

/// Retourne une chaîne décrivant le système d'exploitation et sa version.
///
/// # Format
/// - Linux: "Linux/6.5.0" ou "Ubuntu/22.04"
/// - macOS: "Macos/15.1"
/// - Autre: "{OS}/Unknown"
pub fn get_os_string() -> String {
    let info = os_info::get();
    let os_type = format!("{:?}", info.os_type());

    let version = info.version();
    if version != &os_info::Version::Unknown {
        format!("{}/{}", os_type, version)
    } else {
        format!("{}/Unknown", os_type)
    }
}

/// Valeur de l'en-tête `SERVER` : `OS/version UPnP/1.0 produit/version`.
///
/// ```
/// let server = dlnautils::server_string("DLNAKit", "0.1.0");
/// assert!(server.ends_with(" UPnP/1.0 DLNAKit/0.1.0"));
/// ```
pub fn server_string(product: &str, version: &str) -> String {
    format!("{} UPnP/1.0 {}/{}", get_os_string(), product, version)
}
