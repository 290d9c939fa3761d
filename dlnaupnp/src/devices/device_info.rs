//! Identité et description d'un device UPnP.

use std::io::{self, Write};
use std::net::Ipv4Addr;

use dlnaxml::XmlPrinter;

use super::{errors::DeviceError, service_info::ServiceInfo};

/// Chemin par défaut de la description du device.
pub const DESCRIPTION_PATH: &str = "/device.xml";

/// Type de device `urn:schemas-upnp-org:device:{name}:{version}`.
pub fn device_type_urn(name: &str, version: u8) -> String {
    format!("urn:schemas-upnp-org:device:{}:{}", name, version)
}

/// Device UPnP tel qu'annoncé sur le réseau.
///
/// Les données sont figées une fois le moteur démarré.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    device_type: String,
    udn: String,
    friendly_name: String,
    manufacturer: String,
    manufacturer_url: Option<String>,
    model_description: Option<String>,
    model_name: String,
    model_number: Option<String>,
    model_url: Option<String>,
    serial_number: Option<String>,
    upc: Option<String>,
    presentation_url: Option<String>,

    /// URL HTTP de base, ex: `http://192.168.1.20:8080`
    base_url: String,
    description_path: String,

    /// Valeur de l'en-tête SERVER
    server: String,

    /// Adresse locale utilisée par le filtre de sous-réseau
    local_ip: Option<Ipv4Addr>,

    services: Vec<ServiceInfo>,
}

impl DeviceInfo {
    /// Crée un device. `udn` reçoit le préfixe `uuid:` s'il manque.
    pub fn new(device_type: impl Into<String>, udn: &str, base_url: impl Into<String>) -> Self {
        let udn = if udn.starts_with("uuid:") {
            udn.to_string()
        } else {
            format!("uuid:{}", udn)
        };
        let base_url: String = base_url.into();
        Self {
            device_type: device_type.into(),
            udn,
            friendly_name: String::new(),
            manufacturer: String::new(),
            manufacturer_url: None,
            model_description: None,
            model_name: String::new(),
            model_number: None,
            model_url: None,
            serial_number: None,
            upc: None,
            presentation_url: None,
            base_url: base_url.trim_end_matches('/').to_string(),
            description_path: DESCRIPTION_PATH.to_string(),
            server: dlnautils::server_string(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            local_ip: None,
            services: Vec::new(),
        }
    }

    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = name.into();
        self
    }

    pub fn with_manufacturer(mut self, name: impl Into<String>, url: Option<&str>) -> Self {
        self.manufacturer = name.into();
        self.manufacturer_url = url.map(str::to_string);
        self
    }

    pub fn with_model(
        mut self,
        name: impl Into<String>,
        number: Option<&str>,
        description: Option<&str>,
        url: Option<&str>,
    ) -> Self {
        self.model_name = name.into();
        self.model_number = number.map(str::to_string);
        self.model_description = description.map(str::to_string);
        self.model_url = url.map(str::to_string);
        self
    }

    pub fn with_serial_number(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    pub fn with_upc(mut self, upc: impl Into<String>) -> Self {
        self.upc = Some(upc.into());
        self
    }

    pub fn with_presentation_url(mut self, url: impl Into<String>) -> Self {
        self.presentation_url = Some(url.into());
        self
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    pub fn with_local_ip(mut self, ip: Ipv4Addr) -> Self {
        self.local_ip = Some(ip);
        self
    }

    pub fn with_description_path(mut self, path: impl Into<String>) -> Self {
        self.description_path = path.into();
        self
    }

    /// Ajoute un service. L'abréviation et les URLs doivent être uniques.
    pub fn add_service(&mut self, service: ServiceInfo) -> Result<(), DeviceError> {
        let clash = self.services.iter().any(|s| {
            s.abbrev() == service.abbrev()
                || s.service_type() == service.service_type()
                || s.urls().iter().any(|u| service.urls().contains(u))
        });
        if clash {
            return Err(DeviceError::ServiceAlreadyExists(service.name().to_string()));
        }
        self.services.push(service);
        Ok(())
    }

    /// Vérifie que le device peut être annoncé.
    pub fn validate(&self) -> Result<(), DeviceError> {
        if self.device_type.is_empty() {
            return Err(DeviceError::MissingDeviceType);
        }
        if self.udn.len() <= "uuid:".len() {
            return Err(DeviceError::InvalidUdn(self.udn.clone()));
        }
        let url = self.base_url.to_ascii_lowercase();
        if !url.starts_with("http://") || url.contains("localhost") || url.contains("127.0.0.1") {
            return Err(DeviceError::InvalidBaseUrl(self.base_url.clone()));
        }
        Ok(())
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    /// UDN complet, préfixe `uuid:` inclus.
    pub fn udn(&self) -> &str {
        &self.udn
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn description_path(&self) -> &str {
        &self.description_path
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn local_ip(&self) -> Option<Ipv4Addr> {
        self.local_ip
    }

    pub fn services(&self) -> &[ServiceInfo] {
        &self.services
    }

    /// URL absolue de la description (en-tête LOCATION).
    pub fn location(&self) -> String {
        format!("{}{}", self.base_url, self.description_path)
    }

    pub fn service(&self, abbrev: &str) -> Option<&ServiceInfo> {
        self.services.iter().find(|s| s.abbrev() == abbrev)
    }

    pub fn service_by_type(&self, service_type: &str) -> Option<&ServiceInfo> {
        self.services
            .iter()
            .find(|s| s.service_type() == service_type)
    }

    /// Types de notification annoncés : rootdevice, UDN, type du device puis
    /// type de chaque service.
    pub fn notification_types(&self) -> Vec<String> {
        let mut nts = vec![
            "upnp:rootdevice".to_string(),
            self.udn.clone(),
            self.device_type.clone(),
        ];
        nts.extend(self.services.iter().map(ServiceInfo::service_type));
        nts
    }

    /// USN associé à un type de notification.
    pub fn usn(&self, nt: &str) -> String {
        if nt == self.udn {
            self.udn.clone()
        } else {
            format!("{}::{}", self.udn, nt)
        }
    }

    /// Écrit le document de description du device.
    pub fn write_description<W: Write>(&self, out: W) -> io::Result<usize> {
        let mut xp = XmlPrinter::new(out);
        let mut n = xp.xml_header()?;
        n += xp.node_with(
            "root",
            &[("xmlns", "urn:schemas-upnp-org:device-1-0")],
            |xp| {
                let mut n = xp.node_with("specVersion", &[], |xp| {
                    Ok(xp.node_text("major", "1")? + xp.node_text("minor", "0")?)
                })?;
                n += xp.node_text("URLBase", &self.base_url)?;
                n += xp.node_with("device", &[], |xp| self.write_device(xp))?;
                Ok(n)
            },
        )?;
        Ok(n)
    }

    fn write_device<W: Write>(&self, xp: &mut XmlPrinter<W>) -> io::Result<usize> {
        let mut n = xp.node_text("deviceType", &self.device_type)?;
        n += xp.node_text("friendlyName", &self.friendly_name)?;
        n += xp.node_text("manufacturer", &self.manufacturer)?;
        if let Some(url) = &self.manufacturer_url {
            n += xp.node_text("manufacturerURL", url)?;
        }
        if let Some(desc) = &self.model_description {
            n += xp.node_text("modelDescription", desc)?;
        }
        n += xp.node_text("modelName", &self.model_name)?;
        if let Some(number) = &self.model_number {
            n += xp.node_text("modelNumber", number)?;
        }
        if let Some(url) = &self.model_url {
            n += xp.node_text("modelURL", url)?;
        }
        if let Some(serial) = &self.serial_number {
            n += xp.node_text("serialNumber", serial)?;
        }
        n += xp.node_text("UDN", &self.udn)?;
        if let Some(upc) = &self.upc {
            n += xp.node_text("UPC", upc)?;
        }
        n += xp.node_with("serviceList", &[], |xp| {
            let mut n = 0;
            for service in &self.services {
                n += xp.node_with("service", &[], |xp| {
                    let mut n = xp.node_text("serviceType", &service.service_type())?;
                    n += xp.node_text("serviceId", &service.service_id())?;
                    n += xp.node_text("SCPDURL", service.scpd_url())?;
                    n += xp.node_text("controlURL", service.control_url())?;
                    n += xp.node_text("eventSubURL", service.event_sub_url())?;
                    Ok(n)
                })?;
            }
            Ok(n)
        })?;
        if let Some(url) = &self.presentation_url {
            n += xp.node_text("presentationURL", url)?;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> DeviceInfo {
        let mut dev = DeviceInfo::new(
            device_type_urn("MediaRenderer", 1),
            "0a1b2c3d-0000-4000-8000-000000000001",
            "http://192.168.1.20:8080/",
        )
        .with_friendly_name("Salon")
        .with_manufacturer("DLNAKit", None)
        .with_model("Renderer", Some("1"), None, None);
        dev.add_service(ServiceInfo::new("AVTransport", 1, "AVT")).unwrap();
        dev.add_service(ServiceInfo::new("RenderingControl", 1, "RC")).unwrap();
        dev
    }

    #[test]
    fn test_udn_prefix_added() {
        let dev = renderer();
        assert_eq!(dev.udn(), "uuid:0a1b2c3d-0000-4000-8000-000000000001");
        assert_eq!(dev.base_url(), "http://192.168.1.20:8080");
        assert_eq!(dev.location(), "http://192.168.1.20:8080/device.xml");
    }

    #[test]
    fn test_duplicate_service_rejected() {
        let mut dev = renderer();
        let err = dev.add_service(ServiceInfo::new("AVTransport", 1, "AVT2"));
        assert!(matches!(err, Err(DeviceError::ServiceAlreadyExists(_))));
        let err = dev.add_service(ServiceInfo::new("Other", 1, "RC"));
        assert!(matches!(err, Err(DeviceError::ServiceAlreadyExists(_))));
    }

    #[test]
    fn test_notification_types_and_usn() {
        let dev = renderer();
        let nts = dev.notification_types();
        assert_eq!(nts.len(), 5);
        assert_eq!(nts[0], "upnp:rootdevice");
        assert_eq!(nts[1], dev.udn());
        assert_eq!(dev.usn(dev.udn()), dev.udn());
        assert_eq!(
            dev.usn("upnp:rootdevice"),
            format!("{}::upnp:rootdevice", dev.udn())
        );
    }

    #[test]
    fn test_validate_rejects_localhost() {
        let dev = DeviceInfo::new("urn:x", "abc", "http://localhost:8080");
        assert!(matches!(dev.validate(), Err(DeviceError::InvalidBaseUrl(_))));
        let dev = DeviceInfo::new("urn:x", "abc", "http://127.0.0.1:8080");
        assert!(dev.validate().is_err());
        let dev = DeviceInfo::new("", "abc", "http://10.0.0.2:8080");
        assert!(matches!(dev.validate(), Err(DeviceError::MissingDeviceType)));
        assert!(renderer().validate().is_ok());
    }

    #[test]
    fn test_description_lists_services() {
        let mut out = Vec::new();
        let n = renderer().write_description(&mut out).unwrap();
        assert_eq!(n, out.len());
        let xml = String::from_utf8(out).unwrap();
        assert!(xml.contains("<root xmlns=\"urn:schemas-upnp-org:device-1-0\">"));
        assert!(xml.contains("<major>1</major><minor>0</minor>"));
        assert!(xml.contains("<URLBase>http://192.168.1.20:8080</URLBase>"));
        assert!(xml.contains("<friendlyName>Salon</friendlyName>"));
        assert!(xml.contains("<controlURL>/AVT/control</controlURL>"));
        assert!(xml.contains("<eventSubURL>/RC/event</eventSubURL>"));
        assert!(!xml.contains("modelURL"));
    }
}
