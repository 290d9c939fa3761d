//! Description du device MediaRenderer:1.

use std::net::Ipv4Addr;

use dlnaupnp::devices::{DeviceError, DeviceInfo, device_type_urn};

use crate::{avtransport, connectionmanager, renderingcontrol};

/// Paramètres d'identité du renderer.
#[derive(Debug, Clone)]
pub struct RendererIdentity {
    pub udn: String,
    pub friendly_name: String,
    pub base_url: String,
    pub local_ip: Option<Ipv4Addr>,
}

/// Construit le device avec ses trois services : AVTransport,
/// RenderingControl (`/RC/...`) et ConnectionManager (`/CM/...`).
pub fn media_renderer_device(identity: &RendererIdentity) -> Result<DeviceInfo, DeviceError> {
    let mut device = DeviceInfo::new(
        device_type_urn("MediaRenderer", 1),
        &identity.udn,
        identity.base_url.as_str(),
    )
    .with_friendly_name(identity.friendly_name.as_str())
    .with_manufacturer("DLNAKit", None)
    .with_model(
        "DLNAKit Renderer",
        Some(env!("CARGO_PKG_VERSION")),
        Some("UPnP AV MediaRenderer"),
        None,
    );
    if let Some(ip) = identity.local_ip {
        device = device.with_local_ip(ip);
    }

    device.add_service(avtransport::service())?;
    device.add_service(renderingcontrol::service())?;
    device.add_service(connectionmanager::service())?;
    device.validate()?;
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> RendererIdentity {
        RendererIdentity {
            udn: "0e3a7b42-3f0c-4a8f-9d55-6f1d2c3b4a59".to_string(),
            friendly_name: "Kitchen".to_string(),
            base_url: "http://10.0.0.7:8080".to_string(),
            local_ip: Some(Ipv4Addr::new(10, 0, 0, 7)),
        }
    }

    #[test]
    fn test_three_services() {
        let device = media_renderer_device(&identity()).unwrap();
        assert_eq!(
            device.device_type(),
            "urn:schemas-upnp-org:device:MediaRenderer:1"
        );
        assert_eq!(device.udn(), "uuid:0e3a7b42-3f0c-4a8f-9d55-6f1d2c3b4a59");
        assert_eq!(device.services().len(), 3);
        assert_eq!(device.service("RCS").unwrap().control_url(), "/RC/control");
        assert_eq!(device.service("CMS").unwrap().event_sub_url(), "/CM/event");
        assert!(device.service("AVT").unwrap().scpd().is_some());
    }

    #[test]
    fn test_description_lists_services() {
        let device = media_renderer_device(&identity()).unwrap();
        let mut out = Vec::new();
        device.write_description(&mut out).unwrap();
        let xml = String::from_utf8(out).unwrap();
        assert!(xml.contains("<friendlyName>Kitchen</friendlyName>"));
        assert!(xml.contains("urn:schemas-upnp-org:service:ConnectionManager:1"));
        assert!(xml.contains("<controlURL>/RC/control</controlURL>"));
    }
}
