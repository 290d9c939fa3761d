//! Initialisation du système de logs.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Options d'initialisation du logging
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Niveau minimum (`ERROR` ... `TRACE`), remplacé par `RUST_LOG` s'il est défini
    pub min_level: String,
    /// Activer la sortie console
    pub enable_console: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            min_level: "INFO".to_string(),
            enable_console: true,
        }
    }
}

/// Installe le subscriber global : filtre `EnvFilter` puis couche `fmt`.
///
/// Retourne `false` si un subscriber était déjà installé.
pub fn init_logging(options: &LoggingOptions) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(&options.min_level)));

    let console = options.enable_console.then(|| {
        fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_ansi(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .try_init()
        .is_ok()
}

/// Directive `EnvFilter` pour un niveau de configuration, `info` si inconnu.
fn level_directive(level: &str) -> &'static str {
    match level.trim().to_uppercase().as_str() {
        "ERROR" => "error",
        "WARN" | "WARNING" => "warn",
        "DEBUG" => "debug",
        "TRACE" => "trace",
        "OFF" => "off",
        _ => "info",
    }
}
