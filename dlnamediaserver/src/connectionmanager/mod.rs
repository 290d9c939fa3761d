//! Service ConnectionManager:1 côté serveur : source seule, connexion 0.

use dlnaupnp::actions::ActionError;
use dlnaupnp::devices::ServiceInfo;
use dlnaupnp::soap::DispatcherBuilder;

use crate::server::{MediaServer, Properties, respond};

pub const ABBREV: &str = "CMS";
pub const SCPD: &str = include_str!("scpd.xml");

/// Formats servis par défaut.
pub const SOURCE_PROTOCOL_INFO: &str = "http-get:*:audio/mpeg:*,\
http-get:*:audio/flac:*,\
http-get:*:audio/x-flac:*,\
http-get:*:audio/wav:*,\
http-get:*:audio/L16:*,\
http-get:*:audio/ogg:*,\
http-get:*:audio/mp4:*,\
http-get:*:image/jpeg:*";

pub fn service() -> ServiceInfo {
    ServiceInfo::new("ConnectionManager", 1, ABBREV)
        .with_path("/CM")
        .with_scpd(SCPD)
}

pub(crate) fn register(builder: DispatcherBuilder, server: &MediaServer) -> DispatcherBuilder {
    let s = server.clone();
    let builder = builder.rule(ABBREV, "GetProtocolInfo", move |req, ctx, reply| {
        let protocols = s.protocols();
        respond(
            req,
            ctx,
            reply,
            &[("Source", protocols.source), ("Sink", protocols.sink)],
        )
    });
    let builder = builder.rule(ABBREV, "GetCurrentConnectionIDs", |req, ctx, reply| {
        respond(req, ctx, reply, &[("ConnectionIDs", "0".to_string())])
    });
    builder.rule(ABBREV, "GetCurrentConnectionInfo", |req, ctx, reply| {
        match req.argument_value("ConnectionID").map(str::trim) {
            Some("0") => {}
            other => {
                return Err(ActionError::ArgumentValueInvalid(format!(
                    "ConnectionID {}",
                    other.unwrap_or("<missing>")
                )));
            }
        }
        respond(
            req,
            ctx,
            reply,
            &[
                ("RcsID", "-1".to_string()),
                ("AVTransportID", "-1".to_string()),
                ("ProtocolInfo", String::new()),
                ("PeerConnectionManager", String::new()),
                ("PeerConnectionID", "-1".to_string()),
                ("Direction", "Output".to_string()),
                ("Status", "OK".to_string()),
            ],
        )
    })
}

pub(crate) fn full_state(server: &MediaServer) -> Properties {
    let protocols = server.protocols();
    vec![
        ("SourceProtocolInfo", protocols.source),
        ("SinkProtocolInfo", protocols.sink),
        ("CurrentConnectionIDs", "0".to_string()),
    ]
}
