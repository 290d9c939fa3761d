//! Lecture des requêtes d'action SOAP.

use std::io::{self, Read};

use dlnaxml::{XmlError, XmlEvent, XmlParser, local_name};
use thiserror::Error;
use tracing::trace;

use crate::actions::ActionRequest;

/// Échec de lecture d'une enveloppe SOAP.
#[derive(Error, Debug)]
pub enum SoapParseError {
    #[error("Malformed SOAP envelope: {0}")]
    Xml(#[from] XmlError),

    #[error("Failed to read SOAP body: {0}")]
    Io(#[from] io::Error),

    #[error("SOAP envelope has no Body")]
    MissingBody,

    #[error("SOAP Body contains no action")]
    NoAction,
}

/// Lit une enveloppe SOAP par morceaux de `chunk_size` octets.
///
/// L'élément enfant direct de `Body` donne le nom de l'action ; ses propres
/// enfants sont les arguments. Les préfixes d'espace de noms sont ignorés.
pub fn parse_action_request(
    service: &str,
    body: &mut dyn Read,
    chunk_size: usize,
) -> Result<ActionRequest, SoapParseError> {
    let mut parser = XmlParser::new();
    let mut request = ActionRequest::new(service);
    let mut saw_body = false;
    let mut buf = vec![0u8; chunk_size.max(1)];

    loop {
        let n = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        parser.write(&buf[..n])?;
        while let Some(event) = parser.next_event() {
            saw_body |= collect(&event, &mut request);
        }
    }
    parser.end()?;
    while let Some(event) = parser.next_event() {
        saw_body |= collect(&event, &mut request);
    }

    if !saw_body {
        return Err(SoapParseError::MissingBody);
    }
    if request.action().is_empty() {
        return Err(SoapParseError::NoAction);
    }
    Ok(request)
}

/// Range un événement dans la requête ; vrai si l'événement est le `Body`.
fn collect(event: &XmlEvent, request: &mut ActionRequest) -> bool {
    let depth = event.path.len();
    let ancestor = |up: usize| depth.checked_sub(up).map(|i| local_name(&event.path[i]));

    if ancestor(2) == Some("Body") {
        // argument : le parent est l'action
        if request.action().is_empty() {
            request.set_action(local_name(&event.path[depth - 1]));
        }
        trace!("SOAP argument {} = {}", event.name, event.text);
        request.add_argument(local_name(&event.name), event.text.clone());
    } else if ancestor(1) == Some("Body") {
        if request.action().is_empty() {
            request.set_action(local_name(&event.name));
        }
    } else if local_name(&event.name) == "Body" {
        return true;
    }
    false
}

/// Décompose l'en-tête SOAPACTION `"urn:...:service:AVTransport:1#Play"`.
pub fn parse_soap_action_header(value: &str) -> Option<(&str, &str)> {
    let value = value.trim().trim_matches('"');
    let (service_type, action) = value.split_once('#')?;
    (!action.is_empty()).then_some((service_type, action))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAY: &str = r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <u:Play xmlns:u="urn:schemas-upnp-org:service:AVTransport:1">
      <InstanceID>0</InstanceID>
      <Speed>1</Speed>
    </u:Play>
  </s:Body>
</s:Envelope>"#;

    #[test]
    fn test_parse_play() {
        for chunk in [1, 7, 256, 4096] {
            let req = parse_action_request("AVT", &mut PLAY.as_bytes(), chunk).unwrap();
            assert_eq!(req.service(), "AVT");
            assert_eq!(req.action(), "Play");
            assert_eq!(req.argument_value("InstanceID"), Some("0"));
            assert_eq!(req.argument_value("Speed"), Some("1"));
        }
    }

    #[test]
    fn test_parse_no_arguments() {
        let xml = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:Stop xmlns:u="urn:x"/></s:Body></s:Envelope>"#;
        let req = parse_action_request("AVT", &mut xml.as_bytes(), 16).unwrap();
        assert_eq!(req.action(), "Stop");
        assert!(req.arguments().is_empty());
    }

    #[test]
    fn test_missing_body() {
        let xml = "<s:Envelope><s:Header/></s:Envelope>";
        let err = parse_action_request("AVT", &mut xml.as_bytes(), 16).unwrap_err();
        assert!(matches!(err, SoapParseError::MissingBody));
    }

    #[test]
    fn test_empty_body() {
        let xml = "<s:Envelope><s:Body></s:Body></s:Envelope>";
        let err = parse_action_request("AVT", &mut xml.as_bytes(), 16).unwrap_err();
        assert!(matches!(err, SoapParseError::NoAction));
    }

    #[test]
    fn test_truncated() {
        let err = parse_action_request("AVT", &mut &PLAY.as_bytes()[..120], 64).unwrap_err();
        assert!(matches!(err, SoapParseError::Xml(_)));
    }

    #[test]
    fn test_soap_action_header() {
        assert_eq!(
            parse_soap_action_header("\"urn:schemas-upnp-org:service:AVTransport:1#Play\""),
            Some(("urn:schemas-upnp-org:service:AVTransport:1", "Play"))
        );
        assert_eq!(parse_soap_action_header("nonsense"), None);
    }
}
