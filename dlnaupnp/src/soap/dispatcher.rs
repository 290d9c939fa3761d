//! Routage des actions SOAP vers leurs handlers.

use std::collections::HashMap;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error, warn};

use super::{error_codes, reply_fault};
use crate::actions::{ActionError, ActionRequest};
use crate::devices::ServiceInfo;
use crate::events::SubscriptionManager;
use crate::http::HttpReply;

/// Ressources accessibles à un handler pendant l'exécution d'une action.
pub struct ActionContext<'a> {
    pub service: &'a ServiceInfo,
    pub subscriptions: &'a mut SubscriptionManager,
    pub now: Instant,
}

/// Handler d'action : lit la requête, écrit la réponse SOAP.
pub type ActionHandler = Box<
    dyn FnMut(&ActionRequest, &mut ActionContext<'_>, &mut dyn HttpReply) -> Result<(), ActionError>
        + Send,
>;

/// Règle `(service, action) -> handler`.
pub struct ActionRule {
    pub service: String,
    pub action: String,
    pub handler: ActionHandler,
}

impl ActionRule {
    pub fn new<F>(service: impl Into<String>, action: impl Into<String>, handler: F) -> Self
    where
        F: FnMut(&ActionRequest, &mut ActionContext<'_>, &mut dyn HttpReply) -> Result<(), ActionError>
            + Send
            + 'static,
    {
        Self {
            service: service.into(),
            action: action.into(),
            handler: Box::new(handler),
        }
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    /// Deux règles pour la même clé
    #[error("Duplicate rule for {service}#{action}")]
    DuplicateRule { service: String, action: String },

    #[error("Empty action name")]
    EmptyAction,

    #[error("Unknown action {service}#{action}")]
    UnknownAction { service: String, action: String },

    #[error("Action {action} failed: {source}")]
    Action {
        action: String,
        #[source]
        source: ActionError,
    },
}

/// Construction incrémentale d'une table de règles.
#[derive(Default)]
pub struct DispatcherBuilder {
    rules: Vec<ActionRule>,
}

impl DispatcherBuilder {
    pub fn rule<F>(mut self, service: &str, action: &str, handler: F) -> Self
    where
        F: FnMut(&ActionRequest, &mut ActionContext<'_>, &mut dyn HttpReply) -> Result<(), ActionError>
            + Send
            + 'static,
    {
        self.rules.push(ActionRule::new(service, action, handler));
        self
    }

    pub fn build(self) -> Result<ActionDispatcher, DispatchError> {
        ActionDispatcher::new(self.rules)
    }
}

/// Table de routage des actions, clé exacte `(abréviation du service, action)`.
pub struct ActionDispatcher {
    rules: Vec<ActionRule>,
    index: HashMap<(String, String), usize>,
}

impl ActionDispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    pub fn new(rules: Vec<ActionRule>) -> Result<Self, DispatchError> {
        let mut index = HashMap::with_capacity(rules.len());
        for (i, rule) in rules.iter().enumerate() {
            let key = (rule.service.clone(), rule.action.clone());
            if index.insert(key, i).is_some() {
                return Err(DispatchError::DuplicateRule {
                    service: rule.service.clone(),
                    action: rule.action.clone(),
                });
            }
        }
        Ok(Self { rules, index })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn contains(&self, service: &str, action: &str) -> bool {
        self.index
            .contains_key(&(service.to_string(), action.to_string()))
    }

    /// Actions enregistrées pour un service, dans l'ordre d'enregistrement.
    pub fn actions(&self, service: &str) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|r| r.service == service)
            .map(|r| r.action.as_str())
            .collect()
    }

    /// Exécute le handler de l'action et écrit la réponse.
    ///
    /// Action vide ou inconnue : HTTP 400 avec la faute 401 "Invalid Action".
    /// Échec du handler : HTTP 500 avec le code UPnP de l'erreur.
    pub fn dispatch(
        &mut self,
        request: &ActionRequest,
        ctx: &mut ActionContext<'_>,
        reply: &mut dyn HttpReply,
    ) -> Result<(), DispatchError> {
        if request.action().is_empty() {
            warn!("❌ Empty action for service {}", request.service());
            invalid_action(reply);
            return Err(DispatchError::EmptyAction);
        }

        let key = (request.service().to_string(), request.action().to_string());
        let Some(&i) = self.index.get(&key) else {
            warn!(
                "❌ No handler for {}#{}",
                request.service(),
                request.action()
            );
            invalid_action(reply);
            return Err(DispatchError::UnknownAction {
                service: key.0,
                action: key.1,
            });
        };

        debug!("Dispatching {}#{}", request.service(), request.action());
        let rule = &mut self.rules[i];
        match (rule.handler)(request, ctx, reply) {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("❌ Action {} failed: {}", request.action(), e);
                if let Err(io) = reply_fault(reply, 500, e.upnp_code(), e.upnp_description()) {
                    error!("Failed to write SOAP fault: {}", io);
                }
                Err(DispatchError::Action {
                    action: request.action().to_string(),
                    source: e,
                })
            }
        }
    }
}

fn invalid_action(reply: &mut dyn HttpReply) {
    if let Err(e) = reply_fault(reply, 400, error_codes::INVALID_ACTION, "Invalid Action") {
        error!("Failed to write SOAP fault: {}", e);
    }
}
