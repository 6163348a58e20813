//! Registry of authorized payloads
//!
//! The registry only ever grows. A scanning session works from a
//! [`Registry`] snapshot taken once at start; entries added by issuance
//! afterwards are not seen until the next session.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Error, Result};
use crate::token::{TokenFields, TokenId};

const STORE: &str = "registry";

/// Immutable set of authorized payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    payloads: HashSet<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, payload: &str) -> bool {
        self.payloads.contains(payload)
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.payloads.iter().map(String::as_str)
    }

    /// Ids embedded in registered payloads that can be parsed back.
    pub fn known_ids(&self) -> HashSet<TokenId> {
        self.iter()
            .filter_map(TokenFields::parse)
            .filter_map(|fields| fields.id)
            .collect()
    }

    fn insert(&mut self, payload: &str) -> bool {
        self.payloads.insert(payload.to_owned())
    }
}

impl<S: Into<String>> FromIterator<S> for Registry {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            payloads: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Durable home of the registry.
pub trait RegistryStore {
    /// Snapshot the current contents. A store that does not exist yet is empty.
    fn load(&self) -> Result<Registry>;

    /// Record `payload` as authorized. Returns `false` if it already was.
    fn add(&mut self, payload: &str) -> Result<bool>;
}

impl<T: RegistryStore + ?Sized> RegistryStore for &mut T {
    fn load(&self) -> Result<Registry> {
        (**self).load()
    }

    fn add(&mut self, payload: &str) -> Result<bool> {
        (**self).add(payload)
    }
}

/// Newline-delimited UTF-8 file, one payload per line.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_raw(&self) -> Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(Error::storage(STORE, &self.path, e)),
        }
    }
}

/// Trim a payload and require it to be one non-blank line.
fn validate_payload(payload: &str) -> Result<&str> {
    let payload = payload.trim();
    if payload.is_empty() || payload.contains(['\n', '\r']) {
        return Err(Error::invalid_input("payload must be a single non-blank line"));
    }
    Ok(payload)
}

fn parse_lines(content: &str) -> Registry {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

impl RegistryStore for FileRegistry {
    fn load(&self) -> Result<Registry> {
        let registry = parse_lines(&self.read_raw()?);
        debug!("Loaded {} payloads from {}", registry.len(), self.path.display());
        Ok(registry)
    }

    fn add(&mut self, payload: &str) -> Result<bool> {
        let payload = validate_payload(payload)?;

        // Re-read so entries appended by another process are respected.
        let content = self.read_raw()?;
        if parse_lines(&content).contains(payload) {
            return Ok(false);
        }

        let mut line = String::with_capacity(payload.len() + 2);
        if !content.is_empty() && !content.ends_with('\n') {
            line.push('\n');
        }
        line.push_str(payload);
        line.push('\n');

        let write = || -> io::Result<()> {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            file.write_all(line.as_bytes())?;
            file.sync_data()
        };
        write().map_err(|e| Error::storage(STORE, &self.path, e))?;
        Ok(true)
    }
}

/// Registry held in memory, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    registry: Registry,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: Into<String>> FromIterator<S> for MemoryRegistry {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            registry: iter.into_iter().collect(),
        }
    }
}

impl RegistryStore for MemoryRegistry {
    fn load(&self) -> Result<Registry> {
        Ok(self.registry.clone())
    }

    fn add(&mut self, payload: &str) -> Result<bool> {
        let payload = validate_payload(payload)?;
        Ok(self.registry.insert(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRegistry::new(dir.path().join("whitelist.txt"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_empty_file_loads_empty() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let store = FileRegistry::new(file.path());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_add_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whitelist.txt");
        let mut store = FileRegistry::new(&path);

        assert!(store.add("alpha").unwrap());
        assert!(store.add("beta").unwrap());
        assert!(!store.add("alpha").unwrap());

        assert_eq!(fs::read_to_string(&path).unwrap(), "alpha\nbeta\n");
        let registry = store.load().unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("alpha"));
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("whitelist.txt");
        FileRegistry::new(&path).add("gamma").unwrap();
        assert!(FileRegistry::new(&path).load().unwrap().contains("gamma"));
    }

    #[test]
    fn test_blank_lines_and_whitespace_ignored() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), "  one  \n\n\ttwo\n   \n").unwrap();
        let registry = FileRegistry::new(file.path()).load().unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("one"));
        assert!(registry.contains("two"));
    }

    #[test]
    fn test_append_after_missing_trailing_newline() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), "one").unwrap();
        let mut store = FileRegistry::new(file.path());
        store.add("two").unwrap();
        assert_eq!(fs::read_to_string(file.path()).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_multiline_payload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileRegistry::new(dir.path().join("whitelist.txt"));
        assert!(matches!(store.add("a\nb"), Err(Error::InvalidInput { .. })));
    }

    #[test]
    fn test_unreadable_store_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a file.
        let store = FileRegistry::new(dir.path());
        assert!(matches!(store.load(), Err(Error::StorageUnavailable { .. })));
    }

    #[test]
    fn test_known_ids_skip_foreign_payloads() {
        let registry: Registry = [
            "ROLLCALL/1 id=AL12345 issued=2026-01-01T00:00:00Z name=Ada Lovelace",
            "Name: Grace Hopper | ID: GH54321 | Your attendance has been taken successfully.",
            "something else",
        ]
        .into_iter()
        .collect();
        let ids: HashSet<String> = registry.known_ids().iter().map(ToString::to_string).collect();
        assert_eq!(ids, HashSet::from(["AL12345".to_owned(), "GH54321".to_owned()]));
    }

    #[test]
    fn test_memory_registry() {
        let mut store = MemoryRegistry::new();
        assert!(store.add("x").unwrap());
        assert!(!store.add("x").unwrap());
        assert!(store.load().unwrap().contains("x"));
    }

    #[test]
    fn test_stores_validate_alike() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = FileRegistry::new(dir.path().join("whitelist.txt"));
        let mut memory = MemoryRegistry::new();

        for bad in ["", "   ", "a\nb", "a\rb"] {
            assert!(matches!(file.add(bad), Err(Error::InvalidInput { .. })));
            assert!(matches!(memory.add(bad), Err(Error::InvalidInput { .. })));
        }

        assert!(file.add("  x  ").unwrap());
        assert!(memory.add("  x  ").unwrap());
        assert!(!memory.add("x").unwrap());
        assert_eq!(file.load().unwrap(), memory.load().unwrap());
        assert!(memory.load().unwrap().contains("x"));
    }
}
