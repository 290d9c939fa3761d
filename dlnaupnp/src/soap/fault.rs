//! SOAP Faults pour UPnP

use std::io::{self, Write};

use super::{CONTENT_TYPE_XML, UPNP_CONTROL_NS, builder::write_envelope};
use crate::http::HttpReply;

/// Erreur SOAP (Fault)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapFault {
    /// Code du fault (ex: "s:Client")
    pub fault_code: String,

    /// Description de l'erreur
    pub fault_string: String,

    /// Détails UPnP optionnels
    pub upnp_error: Option<UpnpError>,
}

/// Erreur UPnP spécifique
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpnpError {
    /// Code d'erreur UPnP (ex: "401", "501")
    pub error_code: String,

    /// Description de l'erreur
    pub error_description: String,
}

impl SoapFault {
    /// Fault `s:Client` / "UPnPError" portant un code UPnP.
    pub fn upnp(error_code: &str, error_description: &str) -> Self {
        Self {
            fault_code: "s:Client".to_string(),
            fault_string: "UPnPError".to_string(),
            upnp_error: Some(UpnpError {
                error_code: error_code.to_string(),
                error_description: error_description.to_string(),
            }),
        }
    }

    pub fn write<W: Write>(&self, out: W) -> io::Result<usize> {
        write_soap_fault(
            out,
            &self.fault_code,
            &self.fault_string,
            self.upnp_error.as_ref().map(|e| e.error_code.as_str()),
            self.upnp_error.as_ref().map(|e| e.error_description.as_str()),
        )
    }
}

/// Écrit un SOAP Fault.
///
/// # Arguments
///
/// * `fault_code` - Code du fault (ex: "s:Client")
/// * `fault_string` - Message d'erreur
/// * `upnp_error_code` - Code d'erreur UPnP optionnel (ex: "401")
/// * `upnp_error_desc` - Description d'erreur UPnP optionnelle
pub fn write_soap_fault<W: Write>(
    out: W,
    fault_code: &str,
    fault_string: &str,
    upnp_error_code: Option<&str>,
    upnp_error_desc: Option<&str>,
) -> io::Result<usize> {
    write_envelope(out, |xp| {
        xp.node_with("s:Fault", &[], |xp| {
            let mut n = xp.node_text("faultcode", fault_code)?;
            n += xp.node_text("faultstring", fault_string)?;
            if let (Some(code), Some(desc)) = (upnp_error_code, upnp_error_desc) {
                n += xp.node_with("detail", &[], |xp| {
                    xp.node_with("UPnPError", &[("xmlns", UPNP_CONTROL_NS)], |xp| {
                        Ok(xp.node_text("errorCode", code)?
                            + xp.node_text("errorDescription", desc)?)
                    })
                })?;
            }
            Ok(n)
        })
    })
}

/// Répond avec un fault UPnP et le statut HTTP donné.
pub fn reply_fault(
    reply: &mut dyn HttpReply,
    status: u16,
    error_code: &str,
    error_description: &str,
) -> io::Result<usize> {
    reply.set_status(status);
    reply.set_header("Content-Type", CONTENT_TYPE_XML);
    SoapFault::upnp(error_code, error_description).write(reply.body())
}
