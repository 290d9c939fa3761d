//! Abstractions HTTP vues par le moteur.
//!
//! Le moteur ne dépend d'aucun serveur HTTP : il lit une requête et écrit une
//! réponse au travers de ces deux traits. Les implémentations tamponnées
//! servent au frontal HTTP et aux tests.

use std::io::{self, Cursor, Read, Write};

/// Requête HTTP entrante.
pub trait HttpRequest {
    fn method(&self) -> &str;
    fn path(&self) -> &str;
    /// Valeur d'un en-tête, nom insensible à la casse.
    fn header(&self, name: &str) -> Option<&str>;
    fn body(&mut self) -> &mut dyn Read;
}

/// Réponse HTTP en cours de construction.
pub trait HttpReply {
    fn set_status(&mut self, status: u16);
    fn set_header(&mut self, name: &str, value: &str);
    fn body(&mut self) -> &mut dyn Write;
}

/// Requête entièrement en mémoire.
#[derive(Debug, Clone)]
pub struct BufferedRequest {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Cursor<Vec<u8>>,
}

impl BufferedRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: Vec::new(),
            body: Cursor::new(Vec::new()),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Cursor::new(body.into());
        self
    }
}

impl HttpRequest for BufferedRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn body(&mut self) -> &mut dyn Read {
        &mut self.body
    }
}

/// Réponse entièrement en mémoire, statut 200 par défaut.
#[derive(Debug, Clone)]
pub struct BufferedReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl BufferedReply {
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Corps décodé en UTF-8 (avec remplacement des séquences invalides).
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl Default for BufferedReply {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpReply for BufferedReply {
    fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    fn set_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    fn body(&mut self) -> &mut dyn Write {
        &mut self.body
    }
}

/// Écrivain qui ne conserve que le nombre d'octets reçus, pour calculer un
/// `Content-Length` avant d'écrire le corps en flux.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteCounter {
    count: u64,
}

impl ByteCounter {
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.count += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Lit tout le corps d'une requête.
pub fn read_body(request: &mut dyn HttpRequest) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    request.body().read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_header_case_insensitive() {
        let req = BufferedRequest::new("SUBSCRIBE", "/AVT/event")
            .with_header("CALLBACK", "<http://cp/>")
            .with_header("Nt", "upnp:event");
        assert_eq!(req.header("callback"), Some("<http://cp/>"));
        assert_eq!(req.header("NT"), Some("upnp:event"));
        assert_eq!(req.header("SID"), None);
    }

    #[test]
    fn test_reply_header_replaced() {
        let mut reply = BufferedReply::new();
        reply.set_header("Content-Type", "text/plain");
        reply.set_header("content-type", "text/xml");
        assert_eq!(reply.headers.len(), 1);
        assert_eq!(reply.header("CONTENT-TYPE"), Some("text/xml"));
    }

    #[test]
    fn test_read_body() {
        let mut req = BufferedRequest::new("POST", "/").with_body("hello");
        assert_eq!(read_body(&mut req).unwrap(), b"hello");
    }
}
