//! Prefix tree over observed filesystem paths.
//!
//! Lets a directory-removal event be resolved into every previously known
//! file beneath it, since the filesystem itself can no longer be listed
//! once the directory is gone.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};

/// One node per path segment.
#[derive(Debug, Default)]
struct PathNode {
    children: HashMap<OsString, PathNode>,
    /// Set when this node was registered as a file.
    is_file: bool,
    depth: usize,
    path: PathBuf,
}

impl PathNode {
    fn child(path: PathBuf, depth: usize) -> Self {
        Self {
            children: HashMap::new(),
            is_file: false,
            depth,
            path,
        }
    }

    /// Every file-flagged path in this subtree, this node included.
    fn collect_files(&self, out: &mut Vec<PathBuf>) {
        if self.is_file {
            out.push(self.path.clone());
        }
        for child in self.children.values() {
            child.collect_files(out);
        }
    }

    fn count_files(&self) -> usize {
        usize::from(self.is_file) + self.children.values().map(Self::count_files).sum::<usize>()
    }
}

/// Hierarchical index of tracked files.
///
/// Mutated only by filesystem-event handling; nodes are created on first
/// observation and pruned only by [`PathTracker::delete_path`].
#[derive(Debug, Default)]
pub struct PathTracker {
    root: PathNode,
}

/// Split a path into its root prefix and its named segments.
///
/// Trailing separators disappear here since `Path::components` ignores them.
fn split(path: &Path) -> (PathBuf, Vec<&OsStr>) {
    let mut base = PathBuf::new();
    let mut segments = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => base.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir | Component::Normal(_) => segments.push(component.as_os_str()),
        }
    }
    (base, segments)
}

impl PathTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file, creating any missing intermediate nodes.
    ///
    /// Idempotent. A path without any named segment is ignored.
    pub fn add_file(&mut self, path: &Path) {
        let (mut current_path, segments) = split(path);
        if segments.is_empty() {
            return;
        }

        let mut node = &mut self.root;
        for segment in segments {
            current_path.push(segment);
            let depth = node.depth + 1;
            node = node
                .children
                .entry(segment.to_os_string())
                .or_insert_with(|| PathNode::child(current_path.clone(), depth));
        }
        node.is_file = true;
    }

    /// Detach the subtree at `path` and return every tracked file inside it.
    ///
    /// Returns the path itself when it names a tracked file. Unknown paths
    /// (or unknown parents) yield an empty result, which is expected when
    /// delete events overlap. The root is never removed.
    pub fn delete_path(&mut self, path: &Path) -> Vec<PathBuf> {
        let (_, segments) = split(path);
        let Some((last, parents)) = segments.split_last() else {
            return Vec::new();
        };

        let mut node = &mut self.root;
        for segment in parents {
            match node.children.get_mut(*segment) {
                Some(child) => node = child,
                None => return Vec::new(),
            }
        }

        let mut files = Vec::new();
        if let Some(detached) = node.children.remove(*last) {
            detached.collect_files(&mut files);
        }
        files
    }

    /// Whether any node (file or directory) exists for `path`.
    pub fn contains(&self, path: &Path) -> bool {
        self.find(path).is_some()
    }

    /// Whether `path` is registered as a file.
    pub fn is_file(&self, path: &Path) -> bool {
        self.find(path).is_some_and(|node| node.is_file)
    }

    /// Depth of the node for `path`, counted in segments below the root.
    pub fn depth(&self, path: &Path) -> Option<usize> {
        self.find(path).map(|node| node.depth)
    }

    /// Number of tracked files.
    pub fn file_count(&self) -> usize {
        self.root.count_files()
    }

    fn find(&self, path: &Path) -> Option<&PathNode> {
        let (_, segments) = split(path);
        if segments.is_empty() {
            return None;
        }
        let mut node = &self.root;
        for segment in segments {
            node = node.children.get(segment)?;
        }
        Some(node)
    }
}
