//! Description du device MediaServer:1.

use std::net::Ipv4Addr;

use dlnaupnp::devices::{DeviceError, DeviceInfo, device_type_urn};

use crate::{connectionmanager, contentdirectory};

/// Paramètres d'identité du serveur.
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    pub udn: String,
    pub friendly_name: String,
    pub base_url: String,
    pub local_ip: Option<Ipv4Addr>,
}

/// Construit le device avec ContentDirectory (`/CD/...`) et
/// ConnectionManager (`/CM/...`).
pub fn media_server_device(identity: &ServerIdentity) -> Result<DeviceInfo, DeviceError> {
    let mut device = DeviceInfo::new(
        device_type_urn("MediaServer", 1),
        &identity.udn,
        identity.base_url.as_str(),
    )
    .with_friendly_name(identity.friendly_name.as_str())
    .with_manufacturer("DLNAKit", None)
    .with_model(
        "DLNAKit Server",
        Some(env!("CARGO_PKG_VERSION")),
        Some("UPnP AV MediaServer"),
        None,
    );
    if let Some(ip) = identity.local_ip {
        device = device.with_local_ip(ip);
    }

    device.add_service(contentdirectory::service())?;
    device.add_service(connectionmanager::service())?;
    device.validate()?;
    Ok(device)
}
