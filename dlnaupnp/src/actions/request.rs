//! Requête d'action entrante.

use tracing::info;

/// Action demandée sur un service, avec ses arguments d'entrée.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionRequest {
    /// Abréviation du service ciblé (ex: "AVT")
    service: String,
    action: String,
    arguments: Vec<(String, String)>,
}

impl ActionRequest {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Default::default()
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn set_action(&mut self, action: impl Into<String>) {
        self.action = action.into();
    }

    /// Ajoute ou remplace un argument. Les valeurs vides sont ignorées.
    pub fn add_argument(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            return;
        }
        let name = name.into();
        match self.arguments.iter_mut().find(|(n, _)| *n == name) {
            Some(arg) => arg.1 = value,
            None => self.arguments.push((name, value)),
        }
    }

    pub fn arguments(&self) -> &[(String, String)] {
        &self.arguments
    }

    /// Valeur du premier argument dont le nom se termine par `name`
    /// (comparaison insensible à la casse).
    pub fn argument_value(&self, name: &str) -> Option<&str> {
        let wanted = name.to_ascii_lowercase();
        let found = self
            .arguments
            .iter()
            .find(|(n, _)| n.to_ascii_lowercase().ends_with(&wanted))
            .map(|(_, v)| v.as_str());
        if found.is_none() {
            let names: Vec<&str> = self.arguments.iter().map(|(n, _)| n.as_str()).collect();
            info!("Argument '{}' not found in ({})", name, names.join(" "));
        }
        found
    }

    pub fn argument_int(&self, name: &str) -> Option<i64> {
        self.argument_value(name)?.trim().parse().ok()
    }

    /// Booléen UPnP : `1`, `true` ou `yes`.
    pub fn argument_bool(&self, name: &str) -> Option<bool> {
        match self.argument_value(name)?.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => None,
        }
    }
}
