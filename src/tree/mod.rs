//! Cached remote entry tree
//!
//! The tree is a nested ownership structure rooted at the session's current
//! location. All lookups are path-based and resolved here, in the model,
//! never by walking a presentation layer. Remote paths use Unix syntax.

pub mod entry;
pub mod sort;

pub use entry::{LoadState, RemoteEntry};

/// Join a directory path and a child name
pub fn join_path(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name)
}

/// Parent of a remote path; `None` at the root
pub fn parent_path(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    match path.rsplit_once('/') {
        Some(("", _)) => Some("/".to_string()),
        Some((parent, _)) => Some(parent.to_string()),
        None => None,
    }
}

/// Last component of a remote path
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((_, name)) if !name.is_empty() => name,
        Some(_) => path,
        None if trimmed.is_empty() => path,
        None => trimmed,
    }
}

/// Whether `path` equals `ancestor` or lies inside its subtree
pub fn is_same_or_descendant(ancestor: &str, path: &str) -> bool {
    path == ancestor || path.starts_with(&format!("{}/", ancestor.trim_end_matches('/')))
}

/// Find the entry at `path` in the tree rooted at `root`
pub fn find<'a>(root: &'a RemoteEntry, path: &str) -> Option<&'a RemoteEntry> {
    if root.path == path {
        return Some(root);
    }
    let rel = relative_to(&root.path, path)?;
    let mut node = root;
    for comp in rel.split('/') {
        node = node.children.as_ref()?.iter().find(|c| c.name == comp)?;
    }
    Some(node)
}

/// Find the entry at `path`, mutably
pub fn find_mut<'a>(root: &'a mut RemoteEntry, path: &str) -> Option<&'a mut RemoteEntry> {
    if root.path == path {
        return Some(root);
    }
    let rel = relative_to(&root.path, path)?;
    let mut node = root;
    for comp in rel.split('/') {
        node = node
            .children
            .as_mut()?
            .iter_mut()
            .find(|c| c.name == comp)?;
    }
    Some(node)
}

/// Detach the entry at `path` from its parent, returning it.
/// The root itself cannot be removed.
pub fn remove(root: &mut RemoteEntry, path: &str) -> Option<RemoteEntry> {
    let parent = parent_path(path)?;
    let parent = find_mut(root, &parent)?;
    let children = parent.children.as_mut()?;
    let index = children.iter().position(|c| c.path == path)?;
    Some(children.remove(index))
}

/// Rewrite an entry's path (and name) after a move or rename, keeping every
/// descendant's path consistent with its new location.
pub fn rebase(entry: &mut RemoteEntry, new_path: &str) {
    entry.path = new_path.to_string();
    entry.name = file_name(new_path).to_string();
    if let Some(children) = entry.children.as_mut() {
        for child in children {
            let child_path = join_path(new_path, &child.name);
            rebase(child, &child_path);
        }
    }
}

fn relative_to<'a>(root: &str, path: &'a str) -> Option<&'a str> {
    let rest = path.strip_prefix(root.trim_end_matches('/'))?;
    let rest = rest.strip_prefix('/')?;
    (!rest.is_empty()).then_some(rest)
}
