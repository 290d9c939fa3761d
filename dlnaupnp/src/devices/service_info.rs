//! Description statique d'un service UPnP.

use std::borrow::Cow;

/// Service exposé par un device.
///
/// Les URLs sont dérivées de l'abréviation : `/{ABBR}/service.xml`,
/// `/{ABBR}/control` et `/{ABBR}/event`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Nom court du service (ex: "AVTransport")
    name: String,

    /// Version du service
    version: u8,

    /// Abréviation utilisée dans les URLs et l'espace de noms LastChange (ex: "AVT")
    abbrev: String,

    scpd_url: String,
    control_url: String,
    event_sub_url: String,

    /// Document SCPD servi sur `scpd_url`
    scpd: Option<Cow<'static, str>>,
}

impl ServiceInfo {
    pub fn new(name: impl Into<String>, version: u8, abbrev: impl Into<String>) -> Self {
        let abbrev = abbrev.into();
        Self {
            name: name.into(),
            version,
            scpd_url: format!("/{}/service.xml", abbrev),
            control_url: format!("/{}/control", abbrev),
            event_sub_url: format!("/{}/event", abbrev),
            abbrev,
            scpd: None,
        }
    }

    /// Remplace le préfixe des URLs (`/RC` au lieu de `/RCS`).
    pub fn with_path(mut self, prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        self.scpd_url = format!("{}/service.xml", prefix);
        self.control_url = format!("{}/control", prefix);
        self.event_sub_url = format!("{}/event", prefix);
        self
    }

    /// Attache le document SCPD du service.
    pub fn with_scpd(mut self, scpd: impl Into<Cow<'static, str>>) -> Self {
        self.scpd = Some(scpd.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn abbrev(&self) -> &str {
        &self.abbrev
    }

    /// `urn:schemas-upnp-org:service:{name}:{version}`
    pub fn service_type(&self) -> String {
        format!("urn:schemas-upnp-org:service:{}:{}", self.name, self.version)
    }

    /// `urn:upnp-org:serviceId:{name}`
    pub fn service_id(&self) -> String {
        format!("urn:upnp-org:serviceId:{}", self.name)
    }

    pub fn scpd_url(&self) -> &str {
        &self.scpd_url
    }

    pub fn control_url(&self) -> &str {
        &self.control_url
    }

    pub fn event_sub_url(&self) -> &str {
        &self.event_sub_url
    }

    pub fn scpd(&self) -> Option<&str> {
        self.scpd.as_deref()
    }

    /// Espace de noms de l'événement LastChange de ce service.
    pub fn event_namespace(&self) -> String {
        format!("urn:schemas-upnp-org:metadata-1-0/{}/", self.abbrev)
    }

    pub(crate) fn urls(&self) -> [&str; 3] {
        [&self.scpd_url, &self.control_url, &self.event_sub_url]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_names() {
        let svc = ServiceInfo::new("RenderingControl", 1, "RC");
        assert_eq!(
            svc.service_type(),
            "urn:schemas-upnp-org:service:RenderingControl:1"
        );
        assert_eq!(svc.service_id(), "urn:upnp-org:serviceId:RenderingControl");
        assert_eq!(svc.control_url(), "/RC/control");
        assert_eq!(svc.event_sub_url(), "/RC/event");
        assert_eq!(svc.scpd_url(), "/RC/service.xml");
        assert_eq!(svc.event_namespace(), "urn:schemas-upnp-org:metadata-1-0/RC/");
        assert!(svc.scpd().is_none());
    }

    #[test]
    fn test_path_override() {
        let svc = ServiceInfo::new("RenderingControl", 1, "RCS").with_path("/RC/");
        assert_eq!(svc.control_url(), "/RC/control");
        assert_eq!(svc.scpd_url(), "/RC/service.xml");
        assert_eq!(svc.event_namespace(), "urn:schemas-upnp-org:metadata-1-0/RCS/");
    }
}
