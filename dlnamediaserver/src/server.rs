//! Poignée partagée sur le contenu et l'état du serveur.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crossbeam_channel::{Receiver, Sender};
use dlnaupnp::actions::{ActionError, ActionReply, ActionRequest};
use dlnaupnp::devices::ServiceInfo;
use dlnaupnp::engine::{EventSource, InitialEventHook};
use dlnaupnp::events::{ChangeWriter, SubscriptionManager};
use dlnaupnp::http::HttpReply;
use dlnaupnp::soap::{ActionContext, ActionDispatcher, DispatchError, reply_arguments};
use dlnaxml::DynPrinter;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::content::ContentProvider;
use crate::{connectionmanager, contentdirectory};

/// Variables d'un fragment LastChange : `(nom, valeur)`.
pub(crate) type Properties = Vec<(&'static str, String)>;

struct PendingChange {
    service: &'static str,
    properties: Properties,
}

/// Protocoles annoncés par le ConnectionManager.
#[derive(Debug, Clone)]
pub(crate) struct Protocols {
    pub source: String,
    pub sink: String,
}

struct Shared {
    provider: Arc<dyn ContentProvider>,
    base_url: String,
    system_update_id: AtomicU32,
    protocols: Mutex<Protocols>,
    /// Changements postés par l'application, vidés par le moteur à chaque `poll`
    outbox: Sender<PendingChange>,
    inbox: Receiver<PendingChange>,
}

/// MediaServer UPnP AV.
///
/// Les clones partagent le même état : le moteur exécute Browse et Search
/// sur un clone pendant que l'application signale les changements de
/// contenu ([`MediaServer::content_changed`]) sur un autre.
#[derive(Clone)]
pub struct MediaServer {
    shared: Arc<Shared>,
}

impl MediaServer {
    /// `base_url` résout les URI relatives des ressources et pochettes.
    pub fn new(provider: Arc<dyn ContentProvider>, base_url: impl Into<String>) -> Self {
        let (outbox, inbox) = crossbeam_channel::unbounded();
        Self {
            shared: Arc::new(Shared {
                provider,
                base_url: base_url.into(),
                system_update_id: AtomicU32::new(1),
                protocols: Mutex::new(Protocols {
                    source: connectionmanager::SOURCE_PROTOCOL_INFO.to_string(),
                    sink: String::new(),
                }),
                outbox,
                inbox,
            }),
        }
    }

    pub fn provider(&self) -> &dyn ContentProvider {
        self.shared.provider.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.shared.base_url
    }

    pub fn system_update_id(&self) -> u32 {
        self.shared.system_update_id.load(Ordering::Acquire)
    }

    /// Le contenu a changé : incrémente et publie le SystemUpdateID.
    pub fn content_changed(&self) -> u32 {
        let id = self
            .shared
            .system_update_id
            .fetch_add(1, Ordering::AcqRel)
            .wrapping_add(1);
        info!("📚 Content changed, SystemUpdateID={}", id);
        self.queue(contentdirectory::ABBREV, vec![("SystemUpdateID", id.to_string())]);
        id
    }

    /// Remplace les protocoles annoncés et publie le changement.
    pub fn set_protocols(&self, source: impl Into<String>, sink: impl Into<String>) {
        let protocols = Protocols {
            source: source.into(),
            sink: sink.into(),
        };
        let properties = vec![
            ("SourceProtocolInfo", protocols.source.clone()),
            ("SinkProtocolInfo", protocols.sink.clone()),
        ];
        *self.shared.protocols.lock() = protocols;
        self.queue(connectionmanager::ABBREV, properties);
    }

    pub(crate) fn protocols(&self) -> Protocols {
        self.shared.protocols.lock().clone()
    }

    /// Table des actions des deux services.
    pub fn dispatcher(&self) -> Result<ActionDispatcher, DispatchError> {
        let builder = ActionDispatcher::builder();
        let builder = contentdirectory::register(builder, self);
        let builder = connectionmanager::register(builder, self);
        builder.build()
    }

    /// Publie l'état du service au nouvel abonné.
    pub fn initial_event_hook(&self) -> InitialEventHook {
        let server = self.clone();
        Box::new(
            move |service: &ServiceInfo, sid: &str, subs: &mut SubscriptionManager| {
                let properties = match service.abbrev() {
                    contentdirectory::ABBREV => contentdirectory::full_state(&server),
                    connectionmanager::ABBREV => connectionmanager::full_state(&server),
                    other => {
                        warn!("No initial state for service {}", other);
                        return;
                    }
                };
                debug!("Initial event for {} on {}", sid, service.abbrev());
                subs.add_change_for(sid, last_change(properties));
            },
        )
    }

    /// Source des changements produits hors du moteur.
    pub fn event_source(&self) -> EventSource {
        let server = self.clone();
        Box::new(move |subs: &mut SubscriptionManager| {
            for change in server.shared.inbox.try_iter() {
                subs.add_change(change.service, last_change(change.properties));
            }
        })
    }

    fn queue(&self, service: &'static str, properties: Properties) {
        let change = PendingChange {
            service,
            properties,
        };
        if self.shared.outbox.send(change).is_err() {
            warn!("Change on {} lost", service);
        }
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
