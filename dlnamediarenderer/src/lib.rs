//! # dlnamediarenderer - MediaRenderer UPnP AV
//!
//! Les services AVTransport, RenderingControl et ConnectionManager d'un
//! renderer audio, branchés sur le moteur de `dlnaupnp`.
//!
//! ```ignore
//! let renderer = MediaRenderer::new();
//! let device = media_renderer_device(&identity)?;
//! let engine = DeviceEngine::new(device, renderer.dispatcher()?, udp, sender, config)?
//!     .with_initial_event(renderer.initial_event_hook())
//!     .with_event_source(renderer.event_source());
//! ```
//!
//! La lecture elle-même reste à la charge de l'application, qui suit les
//! [`MediaEvent`] et signale la fin de piste par
//! [`MediaRenderer::playback_completed`].

pub mod avtransport;
pub mod connectionmanager;
pub mod device;
mod renderer;
pub mod renderingcontrol;
pub mod state;

pub use device::{RendererIdentity, media_renderer_device};
pub use renderer::{MediaEventHandler, MediaRenderer};
pub use state::{MediaEvent, RendererState, TransportState};
