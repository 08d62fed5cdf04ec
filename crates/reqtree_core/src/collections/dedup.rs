//! Duplicate removal after a create races a realtime delivery.
//!
//! A locally created node gets its backend id from the create response. If a
//! realtime event for the same entity arrived first, the forest already holds
//! a copy carrying that id, and assigning it to the local node leaves two
//! entries with one id. The freshly assigned one is dropped.

use serde::{Deserialize, Serialize};

use super::types::{Collection, RequestNode};
use crate::path::{last_index, navigate_path_mut, parent_path, parse_path, siblings_mut};

/// Which sibling list a duplicate check scans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A root collection or folder; the path addresses the node itself.
    #[default]
    Collection,
    /// A request; the path is `<collection path>/<request index>`.
    Request,
}

/// Remove the entry at `path` if it is one of exactly two entries with
/// backend id `id` in its sibling list.
///
/// Root collections are checked against the whole forest. With zero, one,
/// or three or more matches nothing is removed, so running this again for
/// the same `(id, path)` after a removal is a no-op.
///
/// Returns `true` if an entry was removed.
pub fn remove_duplicate<R: RequestNode>(
    forest: &mut Vec<Collection<R>>,
    id: &str,
    path: &str,
    kind: EntryKind,
) -> bool {
    let Some(fresh) = last_index(path) else {
        return false;
    };
    let parent = parent_path(path);

    match kind {
        EntryKind::Collection => {
            let Some(parent) = parse_path(&parent) else {
                return false;
            };
            match siblings_mut(forest, &parent) {
                Some(folders) => remove_second_copy(folders, fresh, id, |c| c.backend_id.as_deref()),
                None => false,
            }
        }
        EntryKind::Request => {
            if parent.is_empty() {
                return false;
            }
            match navigate_path_mut(forest, &parent) {
                Some(collection) => {
                    remove_second_copy(&mut collection.requests, fresh, id, |r| r.backend_id())
                }
                None => false,
            }
        }
    }
}

fn remove_second_copy<T>(
    list: &mut Vec<T>,
    fresh: usize,
    id: &str,
    id_of: fn(&T) -> Option<&str>,
) -> bool {
    let matches = list.iter().filter(|entry| id_of(entry) == Some(id)).count();
    if matches != 2 {
        return false;
    }
    if list.get(fresh).and_then(id_of) != Some(id) {
        return false;
    }

    list.remove(fresh);
    log::debug!("[Dedup] removed duplicate of {} at position {}", id, fresh);
    true
}
