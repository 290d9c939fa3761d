//! Envoi des NOTIFY GENA.

use std::time::Duration;

use reqwest::Method;
use reqwest::blocking::{Body, Client};
use tracing::{debug, info};

use super::{NotifyBody, NotifyError};

/// En-têtes d'un NOTIFY destiné à un abonné.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyRequest<'a> {
    pub callback_url: &'a str,
    pub sid: &'a str,
    pub seq: u32,
}

/// Envoi HTTP d'un NOTIFY.
///
/// `body` produit le `e:propertyset` à la demande : l'implémentation l'écrit
/// dans son flux ([`NotifyBody::write_to`]) ou le lit par morceaux
/// ([`NotifyBody::into_reader`]).
pub trait EventSender {
    fn send_notify(
        &mut self,
        request: &NotifyRequest<'_>,
        body: NotifyBody,
    ) -> Result<(), NotifyError>;
}

/// Envoi bloquant via reqwest, à utiliser hors d'un runtime tokio.
pub struct HttpEventSender {
    client: Client,
    user_agent: String,
}

impl HttpEventSender {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            user_agent: user_agent.into(),
        })
    }
}

impl EventSender for HttpEventSender {
    fn send_notify(
        &mut self,
        request: &NotifyRequest<'_>,
        body: NotifyBody,
    ) -> Result<(), NotifyError> {
        let length = body.content_length()?;
        debug!("NOTIFY {} SEQ={} ({} bytes)", request.sid, request.seq, length);

        let method = Method::from_bytes(b"NOTIFY").map_err(|_| NotifyError::Method)?;
        let response = self
            .client
            .request(method, request.callback_url)
            .header("Content-Type", r#"text/xml; charset="utf-8""#)
            .header("User-Agent", &self.user_agent)
            .header("NT", "upnp:event")
            .header("NTS", "upnp:propchange")
            .header("SID", request.sid)
            .header("SEQ", request.seq.to_string())
            .body(Body::sized(body.into_reader(), length))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        info!("✅ Notified subscriber {}", request.callback_url);
        Ok(())
    }
}
