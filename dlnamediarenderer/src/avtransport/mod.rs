//! Service AVTransport:1 : transport de la ressource courante.

use std::time::Instant;

use dlnaupnp::actions::{ActionError, ActionRequest};
use dlnaupnp::devices::ServiceInfo;
use dlnaupnp::http::HttpReply;
use dlnaupnp::soap::{ActionContext, DispatcherBuilder};
use tracing::{debug, info};

use crate::renderer::{MediaRenderer, Properties, check_instance, last_change, respond};
use crate::state::{MediaEvent, RendererState, TransportState, format_position};

pub const ABBREV: &str = "AVT";
pub const SCPD: &str = include_str!("scpd.xml");

/// Compteur "non implémenté" de GetPositionInfo.
const NOT_IMPLEMENTED_COUNT: &str = "2147483647";

pub fn service() -> ServiceInfo {
    ServiceInfo::new("AVTransport", 1, ABBREV).with_scpd(SCPD)
}

pub(crate) fn register(builder: DispatcherBuilder, renderer: &MediaRenderer) -> DispatcherBuilder {
    let r = renderer.clone();
    let builder = builder.rule(ABBREV, "SetAVTransportURI", move |req, ctx, reply| {
        set_av_transport_uri(&r, req, ctx, reply)
    });
    let r = renderer.clone();
    let builder = builder.rule(ABBREV, "GetMediaInfo", move |req, ctx, reply| {
        get_media_info(&r, req, ctx, reply)
    });
    let r = renderer.clone();
    let builder = builder.rule(ABBREV, "GetTransportInfo", move |req, ctx, reply| {
        check_instance(req)?;
        let state = r.state();
        respond(
            req,
            ctx,
            reply,
            &[
                ("CurrentTransportState", state.transport_state.to_string()),
                ("CurrentTransportStatus", "OK".to_string()),
                ("CurrentSpeed", "1".to_string()),
            ],
        )
    });
    let r = renderer.clone();
    let builder = builder.rule(ABBREV, "GetPositionInfo", move |req, ctx, reply| {
        get_position_info(&r, req, ctx, reply)
    });
    let r = renderer.clone();
    let builder = builder.rule(ABBREV, "GetCurrentTransportActions", move |req, ctx, reply| {
        check_instance(req)?;
        let actions = r.state().current_transport_actions();
        respond(req, ctx, reply, &[("Actions", actions.to_string())])
    });
    let r = renderer.clone();
    let builder = builder.rule(ABBREV, "Play", move |req, ctx, reply| {
        play(&r, req, ctx, reply)
    });
    let r = renderer.clone();
    let builder = builder.rule(ABBREV, "Pause", move |req, ctx, reply| {
        pause(&r, req, ctx, reply)
    });
    let r = renderer.clone();
    builder.rule(ABBREV, "Stop", move |req, ctx, reply| stop(&r, req, ctx, reply))
}

/// Variables publiées à l'abonnement.
pub(crate) fn full_state(state: &RendererState, now: Instant) -> Properties {
    vec![
        ("TransportState", state.transport_state.to_string()),
        ("TransportStatus", "OK".to_string()),
        ("PlaybackStorageMedium", "NETWORK".to_string()),
        ("CurrentPlayMode", "NORMAL".to_string()),
        ("AVTransportURI", state.current_uri.clone()),
        ("AVTransportURIMetaData", state.current_uri_metadata.clone()),
        ("CurrentTrackURI", state.current_uri.clone()),
        ("RelativeTimePosition", format_position(state.position(now))),
        (
            "CurrentTransportActions",
            state.current_transport_actions().to_string(),
        ),
    ]
}

fn transport_properties(state: &RendererState) -> Properties {
    vec![
        ("TransportState", state.transport_state.to_string()),
        (
            "CurrentTransportActions",
            state.current_transport_actions().to_string(),
        ),
    ]
}

fn set_av_transport_uri(
    renderer: &MediaRenderer,
    req: &ActionRequest,
    ctx: &mut ActionContext<'_>,
    reply: &mut dyn HttpReply,
) -> Result<(), ActionError> {
    check_instance(req)?;
    let uri = req.argument_value("CurrentURI").unwrap_or_default().trim();
    if uri.is_empty() {
        return Err(ActionError::InvalidArgs("CurrentURI".to_string()));
    }
    let metadata = req.argument_value("CurrentURIMetaData").unwrap_or_default();

    let properties = renderer.update(|state| {
        state.set_uri(uri, metadata);
        let mut properties = vec![
            ("AVTransportURI", state.current_uri.clone()),
            ("AVTransportURIMetaData", state.current_uri_metadata.clone()),
            ("CurrentTrackURI", state.current_uri.clone()),
            ("CurrentTrackMetaData", state.current_uri_metadata.clone()),
            ("NumberOfTracks", "1".to_string()),
        ];
        properties.extend(transport_properties(state));
        properties
    });
    info!("🎵 New media URI: {}", uri);

    ctx.subscriptions.add_change(ABBREV, last_change(properties));
    renderer.emit(MediaEvent::SetUri);
    respond(req, ctx, reply, &[])
}

fn get_media_info(
    renderer: &MediaRenderer,
    req: &ActionRequest,
    ctx: &mut ActionContext<'_>,
    reply: &mut dyn HttpReply,
) -> Result<(), ActionError> {
    check_instance(req)?;
    let state = renderer.state();
    let tracks = if state.has_media() { "1" } else { "0" };
    respond(
        req,
        ctx,
        reply,
        &[
            ("NrTracks", tracks.to_string()),
            ("MediaDuration", String::new()),
            ("CurrentURI", state.current_uri.clone()),
            ("CurrentURIMetaData", state.current_uri_metadata.clone()),
            ("NextURI", String::new()),
            ("NextURIMetaData", String::new()),
            ("PlayMedium", "NETWORK".to_string()),
            ("RecordMedium", "NOT_IMPLEMENTED".to_string()),
            ("WriteStatus", "NOT_IMPLEMENTED".to_string()),
        ],
    )
}

fn get_position_info(
    renderer: &MediaRenderer,
    req: &ActionRequest,
    ctx: &mut ActionContext<'_>,
    reply: &mut dyn HttpReply,
) -> Result<(), ActionError> {
    check_instance(req)?;
    let state = renderer.state();
    let position = format_position(state.position(ctx.now));
    let track = if state.has_media() { "1" } else { "0" };
    respond(
        req,
        ctx,
        reply,
        &[
            ("Track", track.to_string()),
            ("TrackDuration", format_position(Default::default())),
            ("TrackMetaData", state.current_uri_metadata.clone()),
            ("TrackURI", state.current_uri.clone()),
            ("RelTime", position.clone()),
            ("AbsTime", position),
            ("RelCount", NOT_IMPLEMENTED_COUNT.to_string()),
            ("AbsCount", NOT_IMPLEMENTED_COUNT.to_string()),
        ],
    )
}

fn play(
    renderer: &MediaRenderer,
    req: &ActionRequest,
    ctx: &mut ActionContext<'_>,
    reply: &mut dyn HttpReply,
) -> Result<(), ActionError> {
    check_instance(req)?;
    let now = ctx.now;
    let properties = renderer.update(|state| {
        if !state.has_media() {
            return Err(ActionError::TransitionNotAvailable(
                "no media to play".to_string(),
            ));
        }
        state.play(now);
        Ok(transport_properties(state))
    })?;
    info!("▶️ Play {}", renderer.current_uri());

    ctx.subscriptions.add_change(ABBREV, last_change(properties));
    renderer.emit(MediaEvent::Play);
    respond(req, ctx, reply, &[])
}

fn pause(
    renderer: &MediaRenderer,
    req: &ActionRequest,
    ctx: &mut ActionContext<'_>,
    reply: &mut dyn HttpReply,
) -> Result<(), ActionError> {
    check_instance(req)?;
    let now = ctx.now;
    let properties = renderer.update(|state| {
        if state.transport_state != TransportState::Playing {
            return Err(ActionError::TransitionNotAvailable(format!(
                "cannot pause from {}",
                state.transport_state
            )));
        }
        state.pause(now);
        let mut properties = transport_properties(state);
        properties.push(("RelativeTimePosition", format_position(state.position(now))));
        Ok(properties)
    })?;
    info!("⏸️ Pause");

    ctx.subscriptions.add_change(ABBREV, last_change(properties));
    renderer.emit(MediaEvent::Pause);
    respond(req, ctx, reply, &[])
}

fn stop(
    renderer: &MediaRenderer,
    req: &ActionRequest,
    ctx: &mut ActionContext<'_>,
    reply: &mut dyn HttpReply,
) -> Result<(), ActionError> {
    check_instance(req)?;
    let properties = renderer.update(|state| {
        state.stop();
        let mut properties = transport_properties(state);
        properties.push(("RelativeTimePosition", format_position(Default::default())));
        properties
    });
    debug!("Stop");

    ctx.subscriptions.add_change(ABBREV, last_change(properties));
    renderer.emit(MediaEvent::Stop);
    respond(req, ctx, reply, &[])
}
