//! Écriture DIDL-Lite des objets du ContentDirectory.

use std::borrow::Borrow;
use std::io::{self, Write};

use dlnaxml::XmlPrinter;

use crate::content::MediaItem;

pub const DIDL_NS: &str = "urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/";
pub const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
pub const UPNP_NS: &str = "urn:schemas-upnp-org:metadata-1-0/upnp/";

/// Argument `Filter` : `*` ou liste de propriétés séparées par des virgules.
///
/// `dc:title`, `upnp:class` et les attributs de l'objet sont toujours écrits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyFilter {
    all: bool,
    properties: Vec<String>,
}

impl PropertyFilter {
    pub fn parse(filter: &str) -> Self {
        let filter = filter.trim();
        if filter.is_empty() || filter == "*" {
            return Self::all();
        }
        Self {
            all: false,
            properties: filter
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn all() -> Self {
        Self {
            all: true,
            properties: Vec::new(),
        }
    }

    pub fn allows(&self, property: &str) -> bool {
        self.all || self.properties.iter().any(|p| p == property)
    }

    /// `res` est écrit si lui ou un de ses attributs est demandé.
    fn allows_resource(&self) -> bool {
        self.all || self.properties.iter().any(|p| p == "res" || p.starts_with("res@"))
    }
}

impl Default for PropertyFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// URL absolue d'une ressource : un chemin est résolu contre `base_url`.
pub fn resolve_uri(base_url: &str, uri: &str) -> String {
    if uri.contains("://") {
        return uri.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        uri.trim_start_matches('/')
    )
}

/// Écrit `<DIDL-Lite>` avec un élément par objet.
pub fn write_didl<W, I>(
    xp: &mut XmlPrinter<W>,
    items: I,
    base_url: &str,
    filter: &PropertyFilter,
) -> io::Result<usize>
where
    W: Write,
    I: IntoIterator,
    I::Item: Borrow<MediaItem>,
{
    xp.node_with(
        "DIDL-Lite",
        &[("xmlns", DIDL_NS), ("xmlns:dc", DC_NS), ("xmlns:upnp", UPNP_NS)],
        |xp| {
            let mut n = 0;
            for item in items {
                n += write_object(xp, item.borrow(), base_url, filter)?;
            }
            Ok(n)
        },
    )
}

/// `<container>` ou `<item>` d'un objet.
pub fn write_object<W: Write>(
    xp: &mut XmlPrinter<W>,
    item: &MediaItem,
    base_url: &str,
    filter: &PropertyFilter,
) -> io::Result<usize> {
    let restricted = if item.restricted { "1" } else { "0" };
    let child_count = item.child_count.map(|c| c.to_string());
    let mut attrs = vec![
        ("id", item.id.as_str()),
        ("parentID", item.parent_id.as_str()),
        ("restricted", restricted),
    ];
    let element = if item.is_container() {
        if let Some(count) = child_count.as_deref() {
            attrs.push(("childCount", count));
        }
        "container"
    } else {
        "item"
    };

    xp.node_with(element, &attrs, |xp| {
        let mut n = xp.node_text("dc:title", &item.title)?;
        n += xp.node_text("upnp:class", item.class.as_str())?;
        let optional = [
            ("dc:creator", item.creator.as_deref()),
            ("upnp:artist", item.artist.as_deref()),
            ("upnp:album", item.album.as_deref()),
            ("upnp:genre", item.genre.as_deref()),
            ("dc:date", item.date.as_deref()),
        ];
        for (name, value) in optional {
            if let Some(value) = value.filter(|_| filter.allows(name)) {
                n += xp.node_text(name, value)?;
            }
        }
        if let Some(track) = item.track_number.filter(|_| filter.allows("upnp:originalTrackNumber")) {
            n += xp.node_text("upnp:originalTrackNumber", &track.to_string())?;
        }
        if let Some(art) = item.album_art_uri.as_deref().filter(|_| filter.allows("upnp:albumArtURI")) {
            n += xp.node_text("upnp:albumArtURI", &resolve_uri(base_url, art))?;
        }
        if let Some(res) = item.resource.as_ref().filter(|_| filter.allows_resource()) {
            let protocol_info = res.protocol_info();
            let size = res.size.map(|s| s.to_string());
            let mut attrs = vec![("protocolInfo", protocol_info.as_str())];
            if let Some(size) = size.as_deref() {
                attrs.push(("size", size));
            }
            if let Some(duration) = res.duration.as_deref() {
                attrs.push(("duration", duration));
            }
            n += xp.node_text_attrs("res", &attrs, &resolve_uri(base_url, &res.uri))?;
        }
        Ok(n)
    })
}
