//! # dlnaxml - Incremental XML codec for UPnP payloads
//!
//! UPnP messages (SOAP envelopes, GENA property sets, device descriptions)
//! are small, flat XML documents. This crate reads and writes them without
//! ever building a document tree:
//!
//! - [`XmlPrinter`] writes one element per call straight to an [`std::io::Write`]
//!   sink. Nested content comes from a closure called between the open and
//!   close tags, so a parent never buffers its children.
//! - [`XmlParser`] accepts bytes in arbitrary chunks and yields an
//!   [`XmlEvent`] each time an element closes, together with the path of its
//!   ancestors.
//!
//! ## Example
//!
//! ```
//! use dlnaxml::{XmlParser, XmlPrinter};
//!
//! let mut out = Vec::new();
//! let mut xp = XmlPrinter::new(&mut out);
//! xp.node_with("u:Play", &[("xmlns:u", "urn:schemas-upnp-org:service:AVTransport:1")], |xp| {
//!     xp.argument("InstanceID", "0")
//! })
//! .unwrap();
//!
//! let mut parser = XmlParser::new();
//! for chunk in out.chunks(3) {
//!     parser.write(chunk).unwrap();
//! }
//! parser.end().unwrap();
//!
//! let arg = parser.next_event().unwrap();
//! assert_eq!(arg.name, "InstanceID");
//! assert_eq!(arg.path, vec!["u:Play".to_string()]);
//! assert_eq!(arg.text, "0");
//! ```

mod errors;
mod escape;
mod parser;
mod printer;

pub use errors::XmlError;
pub use escape::EscapeWriter;
pub use parser::{XmlEvent, XmlParser, DEFAULT_MAX_PENDING};
pub use printer::{DynPrinter, XmlPrinter};

/// Returns the local part of a possibly prefixed name (`s:Body` -> `Body`).
pub fn local_name(name: &str) -> &str {
    match name.rfind(':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}
