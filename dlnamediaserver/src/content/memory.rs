//! Arbre de contenu en mémoire.

use std::borrow::Cow;
use std::collections::HashMap;

use dlnaupnp::actions::ActionError;
use thiserror::Error;
use tracing::debug;

use super::{ContentPage, ContentProvider, ContentQuery, MediaItem, QueryKind, ROOT_ID};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ContentError {
    #[error("Object {0} already exists")]
    DuplicateId(String),

    #[error("Parent {parent} of {id} is not a known container")]
    UnknownParent { id: String, parent: String },
}

/// Contenu construit par l'application, racine `0` comprise.
///
/// Les objets sont rendus dans leur ordre d'ajout, sauf `SortCriteria`.
#[derive(Debug)]
pub struct MemoryContentProvider {
    objects: Vec<MediaItem>,
    index: HashMap<String, usize>,
    children: HashMap<String, Vec<usize>>,
}

impl MemoryContentProvider {
    /// Crée le contenu avec son container racine.
    pub fn new(root_title: impl Into<String>) -> Self {
        let root = MediaItem::container(ROOT_ID, "-1", root_title);
        Self {
            objects: vec![root],
            index: HashMap::from([(ROOT_ID.to_string(), 0)]),
            children: HashMap::new(),
        }
    }

    /// Ajoute un objet sous un container déjà présent.
    pub fn add(&mut self, item: MediaItem) -> Result<(), ContentError> {
        if self.index.contains_key(&item.id) {
            return Err(ContentError::DuplicateId(item.id));
        }
        let parent_is_container = self
            .get(&item.parent_id)
            .is_some_and(MediaItem::is_container);
        if !parent_is_container {
            return Err(ContentError::UnknownParent {
                id: item.id,
                parent: item.parent_id,
            });
        }
        let pos = self.objects.len();
        self.index.insert(item.id.clone(), pos);
        self.children
            .entry(item.parent_id.clone())
            .or_default()
            .push(pos);
        self.objects.push(item);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&MediaItem> {
        self.index.get(id).map(|&pos| &self.objects[pos])
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn children_of(&self, id: &str) -> &[usize] {
        self.children.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Objet prêt à être rendu : `childCount` renseigné pour un container.
    fn rendered(&self, pos: usize) -> Cow<'_, MediaItem> {
        let item = &self.objects[pos];
        if item.is_container() && item.child_count.is_none() {
            let mut item = item.clone();
            item.child_count = Some(self.children_of(&item.id).len());
            Cow::Owned(item)
        } else {
            Cow::Borrowed(item)
        }
    }

    /// Descendants d'un container, en profondeur d'abord.
    fn descendants(&self, id: &str) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.children_of(id).iter().rev().copied().collect();
        while let Some(pos) = stack.pop() {
            out.push(pos);
            stack.extend(self.children_of(&self.objects[pos].id).iter().rev());
        }
        out
    }

    fn container(&self, id: &str) -> Result<&MediaItem, ActionError> {
        let item = self
            .get(id)
            .ok_or_else(|| ActionError::NoSuchObject(id.to_string()))?;
        if !item.is_container() {
            return Err(ActionError::NoSuchContainer(id.to_string()));
        }
        Ok(item)
    }
}

impl ContentProvider for MemoryContentProvider {
    fn query(&self, query: &ContentQuery) -> Result<ContentPage<'_>, ActionError> {
        let mut matches = match &query.kind {
            QueryKind::BrowseMetadata => {
                let pos = *self
                    .index
                    .get(&query.object_id)
                    .ok_or_else(|| ActionError::NoSuchObject(query.object_id.clone()))?;
                vec![pos]
            }
            QueryKind::BrowseDirectChildren => {
                self.container(&query.object_id)?;
                self.children_of(&query.object_id).to_vec()
            }
            QueryKind::Search(criteria) => {
                self.container(&query.object_id)?;
                self.descendants(&query.object_id)
                    .into_iter()
                    .filter(|&pos| criteria.matches(&self.objects[pos]))
                    .collect()
            }
        };
        if !query.sort.is_empty() {
            matches.sort_by(|&a, &b| query.sort.compare(&self.objects[a], &self.objects[b]));
        }
        debug!("{:?} on {}: {} matches", query.kind, query.object_id, matches.len());

        Ok(ContentPage {
            total_matches: matches.len(),
            update_id: None,
            items: Box::new(matches.into_iter().map(move |pos| self.rendered(pos))),
        })
    }
}
