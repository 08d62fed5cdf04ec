//! Index path utilities for addressing nodes in a collection forest.
//!
//! An index path is a `/`-joined list of sibling positions (`"2/0/1"`): the
//! first selects a root collection, every further one a folder of the node
//! selected so far. Paths are positional, so any insert, remove or move of a
//! sibling renumbers everything after it. Compute a path right before using
//! it; every lookup here returns `None` instead of panicking when a path has
//! gone stale.

use crate::collections::{Collection, RequestNode};
use crate::error::{ReqtreeError, Result};

/// Parse an index path into positions.
///
/// The empty string is the empty path. Returns `None` if any segment is not a
/// non-negative integer.
///
/// # Example
/// ```
/// use reqtree_core::path::parse_path;
///
/// assert_eq!(parse_path("2/0/1"), Some(vec![2, 0, 1]));
/// assert_eq!(parse_path(""), Some(vec![]));
/// assert_eq!(parse_path("2/x"), None);
/// ```
pub fn parse_path(path: &str) -> Option<Vec<usize>> {
    if path.is_empty() {
        return Some(Vec::new());
    }
    path.split('/').map(|segment| segment.parse().ok()).collect()
}

/// Format positions as an index path.
pub fn join_path(indices: &[usize]) -> String {
    indices
        .iter()
        .map(|index| index.to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// The path of child `index` under `parent` (a root position if `parent` is empty).
pub fn child_path(parent: &str, index: usize) -> String {
    if parent.is_empty() {
        index.to_string()
    } else {
        format!("{parent}/{index}")
    }
}

/// Drop the last segment. The parent of a root path is the empty path.
///
/// # Example
/// ```
/// use reqtree_core::path::parent_path;
///
/// assert_eq!(parent_path("2/0/1"), "2/0");
/// assert_eq!(parent_path("2"), "");
/// assert_eq!(parent_path(""), "");
/// ```
pub fn parent_path(path: &str) -> String {
    match path.rfind('/') {
        Some(pos) => path[..pos].to_string(),
        None => String::new(),
    }
}

/// The final segment, or `None` for the empty path.
pub fn last_index(path: &str) -> Option<usize> {
    if path.is_empty() {
        return None;
    }
    path.rsplit('/').next()?.parse().ok()
}

/// Resolve positions to a node. `None` for the empty path or any position
/// past its sibling list.
pub fn navigate<'a, R>(forest: &'a [Collection<R>], indices: &[usize]) -> Option<&'a Collection<R>> {
    let (first, rest) = indices.split_first()?;
    let mut node = forest.get(*first)?;
    for &index in rest {
        node = node.folders.get(index)?;
    }
    Some(node)
}

/// Mutable variant of [`navigate`].
pub fn navigate_mut<'a, R>(
    forest: &'a mut [Collection<R>],
    indices: &[usize],
) -> Option<&'a mut Collection<R>> {
    let (first, rest) = indices.split_first()?;
    let mut node = forest.get_mut(*first)?;
    for &index in rest {
        node = node.folders.get_mut(index)?;
    }
    Some(node)
}

/// Parse `path` and resolve it.
pub fn navigate_path<'a, R>(forest: &'a [Collection<R>], path: &str) -> Option<&'a Collection<R>> {
    navigate(forest, &parse_path(path)?)
}

/// Parse `path` and resolve it mutably.
pub fn navigate_path_mut<'a, R>(
    forest: &'a mut [Collection<R>],
    path: &str,
) -> Option<&'a mut Collection<R>> {
    navigate_mut(forest, &parse_path(path)?)
}

/// The sibling list children of `parent` live in: the forest itself for the
/// empty path, otherwise the parent's `folders`.
pub fn siblings_mut<'a, R>(
    forest: &'a mut Vec<Collection<R>>,
    parent: &[usize],
) -> Option<&'a mut Vec<Collection<R>>> {
    if parent.is_empty() {
        Some(forest)
    } else {
        navigate_mut(forest, parent).map(|node| &mut node.folders)
    }
}

/// Read-only variant of [`siblings_mut`].
pub fn siblings<'a, R>(forest: &'a [Collection<R>], parent: &[usize]) -> Option<&'a [Collection<R>]> {
    if parent.is_empty() {
        Some(forest)
    } else {
        navigate(forest, parent).map(|node| node.folders.as_slice())
    }
}

/// Positions of a moved item and of its new next sibling, after a
/// "remove at source, insert before destination" reorder has been applied.
///
/// # Example
/// ```
/// use reqtree_core::path::reorder_indices;
///
/// assert_eq!(reorder_indices(2, 5).unwrap(), (4, 5));
/// assert_eq!(reorder_indices(5, 2).unwrap(), (2, 3));
/// assert!(reorder_indices(3, 3).is_err());
/// ```
pub fn reorder_indices(old_source: usize, old_destination: usize) -> Result<(usize, usize)> {
    if old_source < old_destination {
        Ok((old_destination - 1, old_destination))
    } else if old_source > old_destination {
        Ok((old_destination, old_destination + 1))
    } else {
        Err(ReqtreeError::InvalidReorder(old_source))
    }
}

/// Whether `path` is `ancestor` or lies below it.
pub fn is_within(path: &[usize], ancestor: &[usize]) -> bool {
    !ancestor.is_empty() && path.starts_with(ancestor)
}

/// Where `path` ends up once the node at `removed` is detached.
///
/// Returns `None` if `path` was the removed node or inside it.
pub fn path_after_removal(path: &[usize], removed: &[usize]) -> Option<Vec<usize>> {
    let Some((&removed_index, removed_parent)) = removed.split_last() else {
        return Some(path.to_vec());
    };

    if is_within(path, removed) {
        return None;
    }

    let mut adjusted = path.to_vec();
    let depth = removed_parent.len();
    if path.len() > depth && path.starts_with(removed_parent) && path[depth] > removed_index {
        adjusted[depth] -= 1;
    }
    Some(adjusted)
}

/// Post-move positions of a moved folder and of the folder it moved into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedPaths {
    /// Where the moved folder now is.
    pub source: Option<String>,
    /// Where the destination now is; `None` for a move to the root.
    pub destination: Option<String>,
}

/// Locate a moved folder after `moveFolder(source, destination)` ran on `forest`.
///
/// A move appends, so the moved node is the last root collection for a root
/// move and the destination's last folder otherwise. The destination itself
/// shifts if the source used to precede it.
pub fn paths_after_moving<R>(
    source: &str,
    destination: Option<&str>,
    forest: &[Collection<R>],
) -> MovedPaths {
    let Some(destination) = destination else {
        return MovedPaths {
            source: forest.len().checked_sub(1).map(|last| last.to_string()),
            destination: None,
        };
    };

    let new_destination = parse_path(source)
        .zip(parse_path(destination))
        .and_then(|(source, destination)| path_after_removal(&destination, &source));

    let Some(new_destination) = new_destination else {
        return MovedPaths {
            source: None,
            destination: None,
        };
    };

    let destination = join_path(&new_destination);
    let source = navigate(forest, &new_destination)
        .and_then(|folder| folder.folders.len().checked_sub(1))
        .map(|last| child_path(&destination, last));

    MovedPaths {
        source,
        destination: Some(destination),
    }
}

// ============================================================================
// Identity lookups
// ============================================================================

fn find_collection<R>(
    nodes: &[Collection<R>],
    prefix: &mut Vec<usize>,
    matches: &dyn Fn(&Collection<R>) -> bool,
) -> Option<Vec<usize>> {
    for (index, node) in nodes.iter().enumerate() {
        prefix.push(index);
        if matches(node) {
            return Some(prefix.clone());
        }
        if let Some(found) = find_collection(&node.folders, prefix, matches) {
            return Some(found);
        }
        prefix.pop();
    }
    None
}

/// Path of the collection or folder whose backend id is `id`.
pub fn find_path_by_backend_id<R>(forest: &[Collection<R>], id: &str) -> Option<String> {
    find_collection(forest, &mut Vec::new(), &|node| node.backend_id.as_deref() == Some(id))
        .map(|indices| join_path(&indices))
}

/// Path of the not-yet-synced node carrying `ref_id`.
pub fn find_unsynced_by_ref_id<R>(forest: &[Collection<R>], ref_id: &str) -> Option<String> {
    find_collection(forest, &mut Vec::new(), &|node| {
        node.backend_id.is_none() && node.ref_id.as_deref() == Some(ref_id)
    })
    .map(|indices| join_path(&indices))
}

/// Parent path and position of the request whose backend id is `id`.
pub fn find_request_by_backend_id<R: RequestNode>(
    forest: &[Collection<R>],
    id: &str,
) -> Option<(String, usize)> {
    let parent = find_collection(forest, &mut Vec::new(), &|node| {
        node.requests.iter().any(|request| request.backend_id() == Some(id))
    })?;

    let request_index = navigate(forest, &parent)?
        .requests
        .iter()
        .position(|request| request.backend_id() == Some(id))?;
    Some((join_path(&parent), request_index))
}
