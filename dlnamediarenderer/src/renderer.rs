//! Poignée partagée sur l'état du renderer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dlnaupnp::actions::{ActionError, ActionReply, ActionRequest};
use dlnaupnp::devices::ServiceInfo;
use dlnaupnp::engine::{EventSource, InitialEventHook};
use dlnaupnp::events::{ChangeWriter, SubscriptionManager};
use dlnaupnp::http::HttpReply;
use dlnaupnp::soap::{ActionContext, ActionDispatcher, DispatchError, reply_arguments};
use crossbeam_channel::{Receiver, Sender};
use dlnaxml::DynPrinter;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::state::{MediaEvent, RendererState, format_position};
use crate::{avtransport, connectionmanager, renderingcontrol};

/// Observateur applicatif des changements d'état.
pub type MediaEventHandler = Box<dyn Fn(MediaEvent, &RendererState) + Send>;

/// Variables d'un fragment LastChange : `(nom, valeur)`.
pub(crate) type Properties = Vec<(&'static str, String)>;

/// Changement produit hors du moteur, en attente de publication.
struct PendingChange {
    service: &'static str,
    properties: Properties,
}

struct Shared {
    state: Mutex<RendererState>,
    handler: Mutex<Option<MediaEventHandler>>,
    /// Changements postés par l'application, vidés par le moteur à chaque `poll`
    outbox: Sender<PendingChange>,
    inbox: Receiver<PendingChange>,
}

/// MediaRenderer UPnP AV.
///
/// Les clones partagent le même état : le moteur exécute les actions SOAP sur
/// un clone pendant que l'application en garde un autre pour suivre la
/// lecture ([`MediaRenderer::playback_completed`], volume matériel...).
#[derive(Clone)]
pub struct MediaRenderer {
    shared: Arc<Shared>,
}

impl MediaRenderer {
    pub fn new() -> Self {
        let (outbox, inbox) = crossbeam_channel::unbounded();
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(RendererState::new()),
                handler: Mutex::new(None),
                outbox,
                inbox,
            }),
        }
    }

    /// Enregistre l'observateur des [`MediaEvent`]. Il est appelé sans verrou
    /// tenu et peut donc interroger le renderer.
    pub fn set_media_event_handler<F>(&self, handler: F)
    where
        F: Fn(MediaEvent, &RendererState) + Send + 'static,
    {
        *self.shared.handler.lock() = Some(Box::new(handler));
    }

    /// Copie de l'état courant.
    pub fn state(&self) -> RendererState {
        self.shared.state.lock().clone()
    }

    pub fn volume(&self) -> u8 {
        self.shared.state.lock().volume
    }

    pub fn is_muted(&self) -> bool {
        self.shared.state.lock().muted
    }

    pub fn current_uri(&self) -> String {
        self.shared.state.lock().current_uri.clone()
    }

    pub fn mime(&self) -> Option<String> {
        self.shared.state.lock().mime.clone()
    }

    /// Fin de lecture signalée par l'application : retour à STOPPED.
    pub fn playback_completed(&self) {
        info!("⏹️ Playback completed");
        let properties = self.update(|state| {
            state.stop();
            vec![
                ("TransportState", state.transport_state.to_string()),
                ("RelativeTimePosition", format_position(Duration::ZERO)),
                (
                    "CurrentTransportActions",
                    state.current_transport_actions().to_string(),
                ),
            ]
        });
        self.emit(MediaEvent::Stop);
        self.queue(avtransport::ABBREV, properties);
    }

    /// Volume modifié côté application (bouton physique...).
    pub fn set_volume(&self, volume: u8) {
        let volume = volume.min(crate::state::MAX_VOLUME);
        self.update(|state| state.volume = volume);
        self.queue(renderingcontrol::ABBREV, vec![("Volume", volume.to_string())]);
    }

    pub fn set_muted(&self, muted: bool) {
        self.update(|state| state.muted = muted);
        self.queue(renderingcontrol::ABBREV, vec![("Mute", bool_value(muted))]);
    }

    /// Table des actions des trois services.
    pub fn dispatcher(&self) -> Result<ActionDispatcher, DispatchError> {
        let builder = ActionDispatcher::builder();
        let builder = avtransport::register(builder, self);
        let builder = renderingcontrol::register(builder, self);
        let builder = connectionmanager::register(builder, self);
        builder.build()
    }

    /// Publie l'état complet du service au nouvel abonné.
    pub fn initial_event_hook(&self) -> InitialEventHook {
        let renderer = self.clone();
        Box::new(
            move |service: &ServiceInfo, sid: &str, subs: &mut SubscriptionManager| {
                let properties = renderer.full_state(service.abbrev(), Instant::now());
                if properties.is_empty() {
                    warn!("No initial state for service {}", service.abbrev());
                    return;
                }
                debug!("Initial event for {} on {}", sid, service.abbrev());
                subs.add_change_for(sid, last_change(properties));
            },
        )
    }

    /// Source des changements produits hors du moteur.
    pub fn event_source(&self) -> EventSource {
        let renderer = self.clone();
        Box::new(move |subs: &mut SubscriptionManager| {
            for change in renderer.shared.inbox.try_iter() {
                subs.add_change(change.service, last_change(change.properties));
            }
        })
    }

    fn full_state(&self, abbrev: &str, now: Instant) -> Properties {
        let state = self.state();
        match abbrev {
            avtransport::ABBREV => avtransport::full_state(&state, now),
            renderingcontrol::ABBREV => renderingcontrol::full_state(&state),
            connectionmanager::ABBREV => connectionmanager::full_state(&state),
            _ => Vec::new(),
        }
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut RendererState) -> R) -> R {
        f(&mut self.shared.state.lock())
    }

    pub(crate) fn emit(&self, event: MediaEvent) {
        let snapshot = self.state();
        if let Some(handler) = self.shared.handler.lock().as_ref() {
            handler(event, &snapshot);
        }
    }

    fn queue(&self, service: &'static str, properties: Properties) {
        let change = PendingChange {
            service,
            properties,
        };
        // le récepteur vit dans `shared` : l'envoi ne peut pas échouer
        if self.shared.outbox.send(change).is_err() {
            warn!("Change on {} lost", service);
        }
    }
}

impl Default for MediaRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Fragment LastChange `<Name val="..."/>...`, partagé entre abonnés.
pub(crate) fn last_change(properties: Properties) -> ChangeWriter {
    Arc::new(move |xp: &mut DynPrinter<'_>| {
        let mut n = 0;
        for (name, value) in &properties {
            n += xp.state_variable(name, value)?;
        }
        Ok(n)
    })
}

pub(crate) fn bool_value(flag: bool) -> String {
    if flag { "1" } else { "0" }.to_string()
}

/// Refuse toute instance autre que 0.
pub(crate) fn check_instance(request: &ActionRequest) -> Result<(), ActionError> {
    match request.argument_value("InstanceID") {
        None => Ok(()),
        Some(id) if id.trim() == "0" => Ok(()),
        Some(id) => Err(ActionError::ArgumentValueInvalid(format!("InstanceID {}", id))),
    }
}

/// Répond avec les arguments de sortie de l'action.
pub(crate) fn respond(
    request: &ActionRequest,
    ctx: &ActionContext<'_>,
    reply: &mut dyn HttpReply,
    arguments: &[(&str, String)],
) -> Result<(), ActionError> {
    let mut out = ActionReply::new();
    for (name, value) in arguments {
        out.add_argument(*name, value.as_str());
    }
    reply_arguments(reply, &ctx.service.service_type(), request.action(), &out)?;
    Ok(())
}
