//! Objets du ContentDirectory et source de contenu.

mod memory;
mod search;
mod sort;

pub use memory::{ContentError, MemoryContentProvider};
pub use search::{Operator, SearchCriteria};
pub use sort::{SortCriteria, SortKey};

use std::borrow::Cow;
use std::fmt;

use dlnaupnp::actions::ActionError;

/// ObjectID du container racine.
pub const ROOT_ID: &str = "0";

/// `upnp:class` d'un objet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaItemClass {
    Folder,
    Music,
    Radio,
    Video,
    Photo,
    #[default]
    Item,
}

impl MediaItemClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaItemClass::Folder => "object.container",
            MediaItemClass::Music => "object.item.audioItem.musicTrack",
            MediaItemClass::Radio => "object.item.audioItem.audioBroadcast",
            MediaItemClass::Video => "object.item.videoItem.movie",
            MediaItemClass::Photo => "object.item.imageItem.photo",
            MediaItemClass::Item => "object.item",
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, MediaItemClass::Folder)
    }
}

impl fmt::Display for MediaItemClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ressource `<res>` d'un item.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resource {
    /// URL absolue, ou chemin résolu contre l'URL de base du serveur
    pub uri: String,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
    /// Durée au format `H:MM:SS`
    pub duration: Option<String>,
}

impl Resource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    /// `http-get:*:{mime}:*`, ou `http-get:*:*:*` sans type connu.
    pub fn protocol_info(&self) -> String {
        format!("http-get:*:{}:*", self.mime_type.as_deref().unwrap_or("*"))
    }
}

/// Container ou item décrit dans un `Result` DIDL-Lite.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaItem {
    pub id: String,
    pub parent_id: String,
    pub restricted: bool,
    pub title: String,
    pub class: MediaItemClass,
    pub creator: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub date: Option<String>,
    pub track_number: Option<u32>,
    pub album_art_uri: Option<String>,
    pub resource: Option<Resource>,
    /// Nombre d'enfants d'un container
    pub child_count: Option<usize>,
}

impl MediaItem {
    pub fn new(
        id: impl Into<String>,
        parent_id: impl Into<String>,
        title: impl Into<String>,
        class: MediaItemClass,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            restricted: true,
            title: title.into(),
            class,
            ..Default::default()
        }
    }

    pub fn container(
        id: impl Into<String>,
        parent_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self::new(id, parent_id, title, MediaItemClass::Folder)
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_track_number(mut self, track: u32) -> Self {
        self.track_number = Some(track);
        self
    }

    pub fn with_album_art(mut self, uri: impl Into<String>) -> Self {
        self.album_art_uri = Some(uri.into());
        self
    }

    pub fn is_container(&self) -> bool {
        self.class.is_container()
    }

    /// Valeur d'une propriété DIDL-Lite, pour la recherche et le tri.
    pub fn property(&self, name: &str) -> Option<Cow<'_, str>> {
        let value = match name {
            "@id" => Cow::Borrowed(self.id.as_str()),
            "@parentID" => Cow::Borrowed(self.parent_id.as_str()),
            "dc:title" => Cow::Borrowed(self.title.as_str()),
            "upnp:class" => Cow::Borrowed(self.class.as_str()),
            "dc:creator" => Cow::Borrowed(self.creator.as_deref()?),
            "upnp:artist" => Cow::Borrowed(self.artist.as_deref()?),
            "upnp:album" => Cow::Borrowed(self.album.as_deref()?),
            "upnp:genre" => Cow::Borrowed(self.genre.as_deref()?),
            "dc:date" => Cow::Borrowed(self.date.as_deref()?),
            "upnp:albumArtURI" => Cow::Borrowed(self.album_art_uri.as_deref()?),
            "upnp:originalTrackNumber" => Cow::Owned(self.track_number?.to_string()),
            "res" => Cow::Borrowed(self.resource.as_ref()?.uri.as_str()),
            "res@protocolInfo" => Cow::Owned(self.resource.as_ref()?.protocol_info()),
            "res@size" => Cow::Owned(self.resource.as_ref()?.size?.to_string()),
            "res@duration" => Cow::Borrowed(self.resource.as_ref()?.duration.as_deref()?),
            _ => return None,
        };
        Some(value)
    }
}

/// Nature d'une requête ContentDirectory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    /// L'objet lui-même
    BrowseMetadata,
    /// Les enfants directs d'un container
    BrowseDirectChildren,
    /// Les descendants d'un container qui satisfont le critère
    Search(SearchCriteria),
}

impl QueryKind {
    /// Valeur de l'argument `BrowseFlag`.
    pub fn from_browse_flag(flag: &str) -> Option<Self> {
        match flag.trim() {
            "BrowseMetadata" => Some(QueryKind::BrowseMetadata),
            "BrowseDirectChildren" => Some(QueryKind::BrowseDirectChildren),
            _ => None,
        }
    }
}

/// Requête Browse ou Search transmise au [`ContentProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentQuery {
    /// ObjectID d'un Browse, ContainerID d'un Search
    pub object_id: String,
    pub kind: QueryKind,
    pub sort: SortCriteria,
}

/// Réponse d'un [`ContentProvider`] : tous les objets qui correspondent, dans
/// l'ordre demandé. Le serveur en extrait la page `StartingIndex` /
/// `RequestedCount` au fil de l'écriture.
pub struct ContentPage<'a> {
    pub total_matches: usize,
    /// `UpdateID` du container ; le SystemUpdateID à défaut
    pub update_id: Option<u32>,
    pub items: Box<dyn Iterator<Item = Cow<'a, MediaItem>> + 'a>,
}

impl fmt::Debug for ContentPage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentPage")
            .field("total_matches", &self.total_matches)
            .field("update_id", &self.update_id)
            .finish_non_exhaustive()
    }
}

/// Source du contenu publié par le MediaServer.
pub trait ContentProvider: Send + Sync {
    /// Résout une requête. Un objet inconnu donne
    /// [`ActionError::NoSuchObject`], un container attendu qui n'en est pas
    /// un [`ActionError::NoSuchContainer`].
    fn query(&self, query: &ContentQuery) -> Result<ContentPage<'_>, ActionError>;

    /// Propriétés acceptées dans un `SearchCriteria`, séparées par des virgules.
    fn search_capabilities(&self) -> &str {
        search::SEARCH_CAPABILITIES
    }

    /// Propriétés acceptées dans un `SortCriteria`, séparées par des virgules.
    fn sort_capabilities(&self) -> &str {
        sort::SORT_CAPABILITIES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties() {
        let item = MediaItem::new("11", "1", "Song", MediaItemClass::Music)
            .with_track_number(3)
            .with_resource(Resource::new("/a.flac").with_mime("audio/flac"));
        assert_eq!(item.property("dc:title").as_deref(), Some("Song"));
        assert_eq!(
            item.property("upnp:class").as_deref(),
            Some("object.item.audioItem.musicTrack")
        );
        assert_eq!(item.property("upnp:originalTrackNumber").as_deref(), Some("3"));
        assert_eq!(
            item.property("res@protocolInfo").as_deref(),
            Some("http-get:*:audio/flac:*")
        );
        assert!(item.property("upnp:album").is_none());
        assert!(item.property("bogus").is_none());
    }

    #[test]
    fn test_browse_flag() {
        assert_eq!(
            QueryKind::from_browse_flag("BrowseDirectChildren"),
            Some(QueryKind::BrowseDirectChildren)
        );
        assert_eq!(QueryKind::from_browse_flag("Children"), None);
    }
}
