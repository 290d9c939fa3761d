//! État d'un MediaRenderer.

use std::fmt;
use std::time::{Duration, Instant};

use dlnaxml::{XmlParser, local_name};
use tracing::debug;

/// Volume initial (0..=100).
pub const DEFAULT_VOLUME: u8 = 50;

/// Volume maximal accepté par SetVolume.
pub const MAX_VOLUME: u8 = 100;

/// Valeurs de la variable `TransportState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    NoMediaPresent,
    Stopped,
    Playing,
    PausedPlayback,
    Transitioning,
}

impl TransportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportState::NoMediaPresent => "NO_MEDIA_PRESENT",
            TransportState::Stopped => "STOPPED",
            TransportState::Playing => "PLAYING",
            TransportState::PausedPlayback => "PAUSED_PLAYBACK",
            TransportState::Transitioning => "TRANSITIONING",
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Événements remontés à l'application qui réalise la lecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    SetUri,
    Play,
    Pause,
    Stop,
    SetVolume,
    SetMute,
}

/// État courant du renderer (instance 0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererState {
    pub transport_state: TransportState,
    pub current_uri: String,
    pub current_uri_metadata: String,
    /// Type MIME tiré du `protocolInfo` des métadonnées DIDL-Lite
    pub mime: Option<String>,
    pub volume: u8,
    pub muted: bool,
    started_at: Option<Instant>,
    elapsed: Duration,
}

impl Default for RendererState {
    fn default() -> Self {
        Self {
            transport_state: TransportState::NoMediaPresent,
            current_uri: String::new(),
            current_uri_metadata: String::new(),
            mime: None,
            volume: DEFAULT_VOLUME,
            muted: false,
            started_at: None,
            elapsed: Duration::ZERO,
        }
    }
}

impl RendererState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.transport_state == TransportState::Playing
    }

    pub fn has_media(&self) -> bool {
        !self.current_uri.is_empty()
    }

    /// Nouvelle ressource : la position repart de zéro.
    pub fn set_uri(&mut self, uri: &str, metadata: &str) {
        self.current_uri = uri.to_string();
        self.current_uri_metadata = metadata.to_string();
        self.mime = mime_from_didl(metadata);
        self.started_at = None;
        self.elapsed = Duration::ZERO;
        if self.transport_state == TransportState::NoMediaPresent {
            self.transport_state = TransportState::Stopped;
        }
    }

    pub fn play(&mut self, now: Instant) {
        if !self.is_playing() {
            self.started_at = Some(now);
        }
        self.transport_state = TransportState::Playing;
    }

    pub fn pause(&mut self, now: Instant) {
        if let Some(start) = self.started_at.take() {
            self.elapsed += now.saturating_duration_since(start);
        }
        self.transport_state = TransportState::PausedPlayback;
    }

    pub fn stop(&mut self) {
        self.started_at = None;
        self.elapsed = Duration::ZERO;
        if self.transport_state != TransportState::NoMediaPresent {
            self.transport_state = TransportState::Stopped;
        }
    }

    /// Position estimée dans la piste.
    pub fn position(&self, now: Instant) -> Duration {
        let running = self
            .started_at
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default();
        self.elapsed + running
    }

    /// Valeur de `CurrentTransportActions`.
    pub fn current_transport_actions(&self) -> &'static str {
        match self.transport_state {
            TransportState::Playing => "Pause,Stop",
            TransportState::NoMediaPresent => "",
            _ => "Play,Stop",
        }
    }
}

/// `HH:MM:SS`, le format des positions UPnP AV.
pub fn format_position(position: Duration) -> String {
    let secs = position.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Extrait le type MIME du `protocolInfo` du premier `<res>` d'un DIDL-Lite
/// (`http-get:*:audio/flac:*` -> `audio/flac`).
pub fn mime_from_didl(didl: &str) -> Option<String> {
    if didl.trim().is_empty() {
        return None;
    }
    let mut parser = XmlParser::new();
    if let Err(e) = parser.write(didl.as_bytes()).and_then(|_| parser.end()) {
        debug!("Unparsable DIDL-Lite metadata: {}", e);
        return None;
    }
    std::iter::from_fn(|| parser.next_event())
        .filter(|event| local_name(&event.name) == "res")
        .find_map(|event| {
            let protocol_info = event.attribute("protocolInfo")?;
            protocol_info
                .split(':')
                .nth(2)
                .filter(|mime| !mime.is_empty() && *mime != "*")
                .map(str::to_string)
        })
}
