//! Host-side collaborators the layout engine consumes.
//!
//! The engine never touches the file system or the content model directly;
//! the host hands in implementations of these traits. In-memory versions
//! are provided for tests and headless use.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;

/// Looks up the content a widget renders.
pub trait ContentResolver {
    type Content;

    fn resolve(&self, container_id: &str, item_id: &str) -> Option<Self::Content>;
}

/// Maps containers (by path) to their current ids and back.
pub trait PathResolver {
    fn id_for(&self, container_path: &str) -> Option<String>;
    fn path_for(&self, container_id: &str) -> Option<String>;
}

/// Text file access.
pub trait FileIo {
    fn read(&self, path: &str) -> io::Result<String>;
    fn write(&mut self, path: &str, text: &str) -> io::Result<()>;
    fn rename(&mut self, from: &str, to: &str) -> io::Result<()>;
}

// ─── In-memory implementations ───────────────────────────────────────────

/// A fixed set of `(container, item)` pairs that resolve.
#[derive(Debug, Default, Clone)]
pub struct ContentSet {
    items: HashSet<(String, String)>,
}

impl ContentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, container_id: &str, item_id: &str) -> Self {
        self.insert(container_id, item_id);
        self
    }

    pub fn insert(&mut self, container_id: &str, item_id: &str) {
        self.items
            .insert((container_id.to_string(), item_id.to_string()));
    }
}

impl ContentResolver for ContentSet {
    type Content = ();

    fn resolve(&self, container_id: &str, item_id: &str) -> Option<()> {
        self.items
            .contains(&(container_id.to_string(), item_id.to_string()))
            .then_some(())
    }
}

/// Bidirectional path ↔ id table.
#[derive(Debug, Default, Clone)]
pub struct PathTable {
    by_path: BTreeMap<String, String>,
}

impl PathTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: &str, id: &str) -> Self {
        self.by_path.insert(path.to_string(), id.to_string());
        self
    }
}

impl PathResolver for PathTable {
    fn id_for(&self, container_path: &str) -> Option<String> {
        self.by_path.get(container_path).cloned()
    }

    fn path_for(&self, container_id: &str) -> Option<String> {
        self.by_path
            .iter()
            .find(|(_, id)| id.as_str() == container_id)
            .map(|(path, _)| path.clone())
    }
}

/// Flat in-memory file system.
#[derive(Debug, Default, Clone)]
pub struct MemoryFs {
    files: HashMap<String, String>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, text: &str) -> Self {
        self.files.insert(path.to_string(), text.to_string());
        self
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}

impl FileIo for MemoryFs {
    fn read(&self, path: &str) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }

    fn write(&mut self, path: &str, text: &str) -> io::Result<()> {
        self.files.insert(path.to_string(), text.to_string());
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> io::Result<()> {
        if self.files.contains_key(to) {
            return Err(io::Error::new(io::ErrorKind::AlreadyExists, to.to_string()));
        }
        let text = self
            .files
            .remove(from)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, from.to_string()))?;
        self.files.insert(to.to_string(), text);
        Ok(())
    }
}
