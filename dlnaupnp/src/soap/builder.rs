//! Construction de réponses SOAP

use std::io::{self, Write};

use dlnaxml::{DynPrinter, XmlPrinter};

use super::{CONTENT_TYPE_XML, SOAP_ENCODING_STYLE, SOAP_ENVELOPE_NS};
use crate::actions::ActionReply;
use crate::http::HttpReply;

/// Écrit `<s:Envelope><s:Body>...</s:Body></s:Envelope>` autour de `body`.
pub(crate) fn write_envelope<W, F>(out: W, body: F) -> io::Result<usize>
where
    W: Write,
    F: FnOnce(&mut XmlPrinter<W>) -> io::Result<usize>,
{
    let mut xp = XmlPrinter::new(out);
    let mut n = xp.xml_header()?;
    n += xp.node_with(
        "s:Envelope",
        &[
            ("xmlns:s", SOAP_ENVELOPE_NS),
            ("s:encodingStyle", SOAP_ENCODING_STYLE),
        ],
        |xp| xp.node_with("s:Body", &[], body),
    )?;
    Ok(n)
}

/// Écrit une réponse UPnP `u:{action}Response`.
///
/// # Arguments
///
/// * `service_urn` - URN du service (ex: "urn:schemas-upnp-org:service:AVTransport:1")
/// * `action` - Nom de l'action (ex: "GetPositionInfo")
/// * `content` - Écrit les arguments de sortie
pub fn write_soap_response<W, F>(
    out: W,
    service_urn: &str,
    action: &str,
    content: F,
) -> io::Result<usize>
where
    W: Write,
    F: FnOnce(&mut XmlPrinter<W>) -> io::Result<usize>,
{
    let response_name = format!("u:{}Response", action);
    write_envelope(out, |xp| {
        xp.node_with(&response_name, &[("xmlns:u", service_urn)], content)
    })
}

/// Répond 200 avec une réponse d'action écrite par `content`.
pub fn reply_action<F>(
    reply: &mut dyn HttpReply,
    service_urn: &str,
    action: &str,
    content: F,
) -> io::Result<usize>
where
    F: FnOnce(&mut DynPrinter<'_>) -> io::Result<usize>,
{
    reply.set_status(200);
    reply.set_header("Content-Type", CONTENT_TYPE_XML);
    reply.set_header("EXT", "");
    write_soap_response(reply.body(), service_urn, action, content)
}

/// Répond 200 avec les arguments d'une [`ActionReply`].
pub fn reply_arguments(
    reply: &mut dyn HttpReply,
    service_urn: &str,
    action: &str,
    arguments: &ActionReply,
) -> io::Result<usize> {
    reply.set_status(200);
    reply.set_header("Content-Type", CONTENT_TYPE_XML);
    reply.set_header("EXT", "");
    arguments.write_envelope(reply.body(), service_urn, action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::BufferedReply;

    const AVT: &str = "urn:schemas-upnp-org:service:AVTransport:1";

    #[test]
    fn test_build_response() {
        let mut out = Vec::new();
        let n = write_soap_response(&mut out, AVT, "GetTransportInfo", |xp| {
            Ok(xp.argument("CurrentTransportState", "PLAYING")?
                + xp.argument("CurrentSpeed", "1")?)
        })
        .unwrap();
        assert_eq!(n, out.len());
        let xml = String::from_utf8(out).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains(
            "<u:GetTransportInfoResponse xmlns:u=\"urn:schemas-upnp-org:service:AVTransport:1\">"
        ));
        assert!(xml.contains("<CurrentTransportState>PLAYING</CurrentTransportState>"));
        assert!(xml.ends_with("</u:GetTransportInfoResponse></s:Body></s:Envelope>"));
    }

    #[test]
    fn test_reply_arguments() {
        let mut args = ActionReply::new();
        args.add_argument("CurrentVolume", "33");
        let mut reply = BufferedReply::new();
        reply_arguments(
            &mut reply,
            "urn:schemas-upnp-org:service:RenderingControl:1",
            "GetVolume",
            &args,
        )
        .unwrap();
        assert_eq!(reply.status, 200);
        assert_eq!(reply.header("content-type"), Some(CONTENT_TYPE_XML));
        assert!(reply.body_text().contains("<CurrentVolume>33</CurrentVolume>"));
    }
}
