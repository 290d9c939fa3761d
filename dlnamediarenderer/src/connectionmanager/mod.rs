//! Service ConnectionManager:1. Une seule connexion, d'identifiant 0.

use dlnaupnp::actions::ActionError;
use dlnaupnp::devices::ServiceInfo;
use dlnaupnp::soap::DispatcherBuilder;

use crate::renderer::{MediaRenderer, Properties, respond};
use crate::state::RendererState;

pub const ABBREV: &str = "CMS";
pub const SCPD: &str = include_str!("scpd.xml");

/// Formats acceptés en lecture.
pub const SINK_PROTOCOL_INFO: &str = "http-get:*:audio/mpeg:*,\
http-get:*:audio/flac:*,\
http-get:*:audio/x-flac:*,\
http-get:*:audio/wav:*,\
http-get:*:audio/x-wav:*,\
http-get:*:audio/L16:*,\
http-get:*:audio/ogg:*,\
http-get:*:audio/mp4:*,\
http-get:*:audio/aac:*";

pub fn service() -> ServiceInfo {
    ServiceInfo::new("ConnectionManager", 1, ABBREV)
        .with_path("/CM")
        .with_scpd(SCPD)
}

pub(crate) fn register(builder: DispatcherBuilder, renderer: &MediaRenderer) -> DispatcherBuilder {
    let builder = builder.rule(ABBREV, "GetProtocolInfo", |req, ctx, reply| {
        respond(
            req,
            ctx,
            reply,
            &[
                ("Source", String::new()),
                ("Sink", SINK_PROTOCOL_INFO.to_string()),
            ],
        )
    });
    let builder = builder.rule(ABBREV, "GetCurrentConnectionIDs", |req, ctx, reply| {
        respond(req, ctx, reply, &[("ConnectionIDs", "0".to_string())])
    });
    let r = renderer.clone();
    builder.rule(ABBREV, "GetCurrentConnectionInfo", move |req, ctx, reply| {
        match req.argument_value("ConnectionID").map(str::trim) {
            Some("0") => {}
            other => {
                return Err(ActionError::ArgumentValueInvalid(format!(
                    "ConnectionID {}",
                    other.unwrap_or("<missing>")
                )));
            }
        }
        let mime = r.mime().unwrap_or_else(|| "*".to_string());
        respond(
            req,
            ctx,
            reply,
            &[
                ("RcsID", "0".to_string()),
                ("AVTransportID", "0".to_string()),
                ("ProtocolInfo", format!("http-get:*:{}:*", mime)),
                ("PeerConnectionManager", String::new()),
                ("PeerConnectionID", "-1".to_string()),
                ("Direction", "Input".to_string()),
                ("Status", "OK".to_string()),
            ],
        )
    })
}

pub(crate) fn full_state(_state: &RendererState) -> Properties {
    vec![
        ("SourceProtocolInfo", String::new()),
        ("SinkProtocolInfo", SINK_PROTOCOL_INFO.to_string()),
        ("CurrentConnectionIDs", "0".to_string()),
    ]
}
