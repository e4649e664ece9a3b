//! Catalog of sources this context has created or derived.
//!
//! The catalog is the client-side view only; it records what this
//! process asked the engine for, which is what makes `ensure_*` calls
//! idempotent without a round trip.

use std::sync::Arc;

use fxhash::FxHashMap;
use parking_lot::RwLock;

use riptide_core::query::SourceKind;
use riptide_core::schema::TopicDescriptor;

/// Whether a source is backed by a record type or derived from a
/// pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lineage {
    /// Created from a record type's topic descriptor; writable.
    Primary,
    /// Created from a pipeline; the engine owns its content.
    Derived,
}

/// One registered source.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// Source name.
    pub name: String,
    /// Stream or table semantics.
    pub kind: SourceKind,
    /// Primary or derived lineage.
    pub lineage: Lineage,
    /// Topic descriptor; `None` for derived sources, whose schema the
    /// engine infers from the pipeline.
    pub descriptor: Option<Arc<TopicDescriptor>>,
}

/// Thread-safe source registry.
#[derive(Default)]
pub struct Catalog {
    entries: RwLock<FxHashMap<String, CatalogEntry>>,
}

impl Catalog {
    /// Register a source. Returns the existing entry instead if the name
    /// is already taken.
    pub fn register(&self, entry: CatalogEntry) -> CatalogEntry {
        let mut entries = self.entries.write();
        entries
            .entry(entry.name.clone())
            .or_insert(entry)
            .clone()
    }

    /// Look up a source by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<CatalogEntry> {
        self.entries.read().get(name).cloned()
    }

    /// Whether a source with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Remove a source. Returns the entry if it was present.
    pub fn remove(&self, name: &str) -> Option<CatalogEntry> {
        self.entries.write().remove(name)
    }

    /// All registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// All registered sources of one kind, sorted by name.
    #[must_use]
    pub fn sources_of(&self, kind: SourceKind) -> Vec<CatalogEntry> {
        let mut entries: Vec<CatalogEntry> = self
            .entries
            .read()
            .values()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Number of registered sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, kind: SourceKind) -> CatalogEntry {
        CatalogEntry {
            name: name.into(),
            kind,
            lineage: Lineage::Primary,
            descriptor: None,
        }
    }

    #[test]
    fn register_is_first_writer_wins() {
        let catalog = Catalog::default();
        catalog.register(entry("orders", SourceKind::Stream));
        let second = catalog.register(entry("orders", SourceKind::Table));
        // The original stream entry is kept.
        assert_eq!(second.kind, SourceKind::Stream);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn kind_filter_and_ordering() {
        let catalog = Catalog::default();
        catalog.register(entry("b_stream", SourceKind::Stream));
        catalog.register(entry("a_stream", SourceKind::Stream));
        catalog.register(entry("balances", SourceKind::Table));

        let streams = catalog.sources_of(SourceKind::Stream);
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].name, "a_stream");
        assert_eq!(catalog.names(), vec!["a_stream", "b_stream", "balances"]);
    }

    #[test]
    fn remove_unregisters() {
        let catalog = Catalog::default();
        catalog.register(entry("orders", SourceKind::Stream));
        assert!(catalog.remove("orders").is_some());
        assert!(catalog.remove("orders").is_none());
        assert!(catalog.is_empty());
    }
}
