//! # dlnamediaserver - MediaServer UPnP AV
//!
//! Les services ContentDirectory et ConnectionManager d'un serveur de
//! contenu, branchés sur le moteur de `dlnaupnp`.
//!
//! ```ignore
//! let mut content = MemoryContentProvider::new("Library");
//! content.add(MediaItem::container("1", "0", "Music"))?;
//! content.add(
//!     MediaItem::new("11", "1", "Song", MediaItemClass::Music)
//!         .with_resource(Resource::new("/media/song.flac").with_mime("audio/flac")),
//! )?;
//!
//! let server = MediaServer::new(Arc::new(content), "http://192.168.1.10:8080");
//! let device = media_server_device(&identity)?;
//! let engine = DeviceEngine::new(device, server.dispatcher()?, udp, sender, config)?
//!     .with_initial_event(server.initial_event_hook())
//!     .with_event_source(server.event_source());
//! ```
//!
//! Le contenu vient d'un [`ContentProvider`] : [`MemoryContentProvider`] pour
//! un arbre construit par l'application, ou toute implémentation propre. Le
//! `Result` DIDL-Lite d'un Browse ou d'un Search est écrit en flux dans la
//! réponse SOAP, objet par objet.

pub mod connectionmanager;
pub mod content;
pub mod contentdirectory;
pub mod device;
pub mod didl;
mod server;

pub use content::{
    ContentPage, ContentProvider, ContentQuery, MediaItem, MediaItemClass,
    MemoryContentProvider, QueryKind, Resource,
};
pub use device::{ServerIdentity, media_server_device};
pub use server::MediaServer;
