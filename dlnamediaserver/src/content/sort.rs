//! `SortCriteria` du ContentDirectory : `+dc:title,-dc:date`.

use std::cmp::Ordering;

use dlnaupnp::actions::ActionError;

use super::MediaItem;

pub(crate) const SORT_CAPABILITIES: &str =
    "dc:title,dc:date,dc:creator,upnp:class,upnp:album,upnp:artist,upnp:originalTrackNumber";

/// Clé de tri : propriété et sens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub property: String,
    pub ascending: bool,
}

/// Liste ordonnée de clés ; vide, l'ordre du provider est conservé.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SortCriteria {
    keys: Vec<SortKey>,
}

impl SortCriteria {
    /// Analyse un `SortCriteria`. Une clé sans signe est croissante ; une
    /// propriété absente de `capabilities` est refusée.
    pub fn parse(input: &str, capabilities: &str) -> Result<Self, ActionError> {
        let mut keys = Vec::new();
        for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (ascending, property) = match part.as_bytes()[0] {
                b'+' => (true, &part[1..]),
                b'-' => (false, &part[1..]),
                _ => (true, part),
            };
            let property = property.trim();
            if !capabilities.split(',').any(|cap| cap.trim() == property) {
                return Err(ActionError::InvalidSortCriteria(property.to_string()));
            }
            keys.push(SortKey {
                property: property.to_string(),
                ascending,
            });
        }
        Ok(Self { keys })
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Ordre de deux objets ; une propriété absente passe en premier.
    pub fn compare(&self, a: &MediaItem, b: &MediaItem) -> Ordering {
        for key in &self.keys {
            let ordering = match (a.property(&key.property), b.property(&key.property)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => match (x.parse::<i64>(), y.parse::<i64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => x.to_lowercase().cmp(&y.to_lowercase()),
                },
            };
            let ordering = if key.ascending {
                ordering
            } else {
                ordering.reverse()
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}
