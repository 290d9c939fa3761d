//! Réponse d'action.

use std::io::{self, Write};

use dlnaxml::XmlPrinter;

use crate::soap::write_soap_response;

/// Arguments de sortie d'une action, dans l'ordre d'ajout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReply {
    valid: bool,
    arguments: Vec<(String, String)>,
}

impl ActionReply {
    pub fn new() -> Self {
        Self {
            valid: true,
            arguments: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    /// Ajoute ou remplace un argument (les valeurs vides sont conservées).
    pub fn add_argument(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.arguments.iter_mut().find(|(n, _)| *n == name) {
            Some(arg) => arg.1 = value,
            None => self.arguments.push((name, value)),
        }
    }

    pub fn find_argument(&self, name: &str) -> Option<&str> {
        self.arguments
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Fusionne une autre réponse ; une réponse invalide invalide le tout.
    pub fn merge(&mut self, other: ActionReply) {
        if !other.valid {
            self.valid = false;
        }
        for (name, value) in other.arguments {
            self.add_argument(name, value);
        }
    }

    pub fn arguments(&self) -> &[(String, String)] {
        &self.arguments
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// Écrit les arguments sous forme `<Name>value</Name>`.
    pub fn write_arguments<W: Write>(&self, xp: &mut XmlPrinter<W>) -> io::Result<usize> {
        let mut n = 0;
        for (name, value) in &self.arguments {
            n += xp.argument(name, value)?;
        }
        Ok(n)
    }

    /// Écrit l'enveloppe complète `u:{action}Response` de service
    /// `service_type` avec ces arguments.
    pub fn write_envelope<W: Write>(
        &self,
        out: W,
        service_type: &str,
        action: &str,
    ) -> io::Result<usize> {
        write_soap_response(out, service_type, action, |xp| self.write_arguments(xp))
    }
}

impl Default for ActionReply {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_and_find() {
        let mut reply = ActionReply::new();
        reply.add_argument("CurrentVolume", "10");
        reply.add_argument("CurrentVolume", "20");
        reply.add_argument("TrackMetaData", "");
        assert_eq!(reply.len(), 2);
        assert_eq!(reply.find_argument("CurrentVolume"), Some("20"));
        assert_eq!(reply.find_argument("TrackMetaData"), Some(""));
    }

    #[test]
    fn test_merge_invalid() {
        let mut a = ActionReply::new();
        let mut b = ActionReply::new();
        b.set_valid(false);
        b.add_argument("X", "1");
        a.merge(b);
        assert!(!a.is_valid());
        assert_eq!(a.find_argument("X"), Some("1"));
    }

    #[test]
    fn test_write_arguments() {
        let mut reply = ActionReply::new();
        reply.add_argument("CurrentMute", "0");
        reply.add_argument("Empty", "");
        let mut out = Vec::new();
        reply.write_arguments(&mut XmlPrinter::new(&mut out)).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<CurrentMute>0</CurrentMute><Empty></Empty>"
        );
    }

    #[test]
    fn test_write_envelope() {
        let mut reply = ActionReply::new();
        reply.add_argument("CurrentVolume", "7");
        let mut out = Vec::new();
        let n = reply
            .write_envelope(
                &mut out,
                "urn:schemas-upnp-org:service:RenderingControl:1",
                "GetVolume",
            )
            .unwrap();
        assert_eq!(n, out.len());
        let xml = String::from_utf8(out).unwrap();
        assert!(xml.contains("<s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\""));
        assert!(xml.ends_with(
            "<u:GetVolumeResponse xmlns:u=\"urn:schemas-upnp-org:service:RenderingControl:1\">\
             <CurrentVolume>7</CurrentVolume></u:GetVolumeResponse></s:Body></s:Envelope>"
        ));
    }
}
