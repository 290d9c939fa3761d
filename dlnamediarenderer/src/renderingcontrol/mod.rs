//! Service RenderingControl:1 : volume et sourdine du canal Master.

use dlnaupnp::actions::{ActionError, ActionRequest};
use dlnaupnp::devices::ServiceInfo;
use dlnaupnp::soap::DispatcherBuilder;
use tracing::info;

use crate::renderer::{MediaRenderer, Properties, bool_value, check_instance, last_change, respond};
use crate::state::{MAX_VOLUME, MediaEvent, RendererState};

pub const ABBREV: &str = "RCS";
pub const SCPD: &str = include_str!("scpd.xml");

pub fn service() -> ServiceInfo {
    ServiceInfo::new("RenderingControl", 1, ABBREV)
        .with_path("/RC")
        .with_scpd(SCPD)
}

pub(crate) fn register(builder: DispatcherBuilder, renderer: &MediaRenderer) -> DispatcherBuilder {
    let r = renderer.clone();
    let builder = builder.rule(ABBREV, "GetVolume", move |req, ctx, reply| {
        check_control(req)?;
        respond(req, ctx, reply, &[("CurrentVolume", r.volume().to_string())])
    });
    let r = renderer.clone();
    let builder = builder.rule(ABBREV, "SetVolume", move |req, ctx, reply| {
        check_control(req)?;
        let volume = req
            .argument_int("DesiredVolume")
            .ok_or_else(|| ActionError::InvalidArgs("DesiredVolume".to_string()))?;
        let volume = u8::try_from(volume)
            .ok()
            .filter(|v| *v <= MAX_VOLUME)
            .ok_or_else(|| ActionError::ArgumentValueOutOfRange(format!("Volume {}", volume)))?;
        r.update(|state| state.volume = volume);
        info!("🔊 Volume set to {}", volume);

        ctx.subscriptions
            .add_change(ABBREV, last_change(vec![("Volume", volume.to_string())]));
        r.emit(MediaEvent::SetVolume);
        respond(req, ctx, reply, &[])
    });
    let r = renderer.clone();
    let builder = builder.rule(ABBREV, "GetMute", move |req, ctx, reply| {
        check_control(req)?;
        respond(req, ctx, reply, &[("CurrentMute", bool_value(r.is_muted()))])
    });
    let r = renderer.clone();
    builder.rule(ABBREV, "SetMute", move |req, ctx, reply| {
        check_control(req)?;
        let muted = req
            .argument_bool("DesiredMute")
            .ok_or_else(|| ActionError::InvalidArgs("DesiredMute".to_string()))?;
        r.update(|state| state.muted = muted);
        info!("🔇 Mute set to {}", muted);

        ctx.subscriptions
            .add_change(ABBREV, last_change(vec![("Mute", bool_value(muted))]));
        r.emit(MediaEvent::SetMute);
        respond(req, ctx, reply, &[])
    })
}

pub(crate) fn full_state(state: &RendererState) -> Properties {
    vec![
        ("Volume", state.volume.to_string()),
        ("Mute", bool_value(state.muted)),
    ]
}

/// Seul le canal Master existe.
fn check_control(req: &ActionRequest) -> Result<(), ActionError> {
    check_instance(req)?;
    match req.argument_value("Channel") {
        Some(channel) if channel.trim() != "Master" => Err(ActionError::ArgumentValueInvalid(
            format!("Channel {}", channel),
        )),
        _ => Ok(()),
    }
}
