//! Version-keyed history entry store.
//!
//! One [`HistoryEntry`] exists per browser history position: the page
//! snapshot, remembered component state, and captured scroll offsets,
//! keyed by a strictly increasing version id unique to the session. The
//! embedding adapter mirrors `{version}` into the native history state on
//! push/replace and hands the version back on traversal.
//!
//! The store is a bounded LRU: native history-state size limits are an
//! external constraint, so an entry evicted here degrades gracefully: a
//! lookup miss tells the orchestrator to re-fetch the page from the
//! network instead of failing.
//!
//! Persisted snapshots (the side-channel session store) serialize as JSON
//! and pass through a [`HistoryCipher`], identity by default, so the core
//! never hard-depends on a crypto primitive.

use crate::error::{GlideError, Result};
use crate::scroll::ScrollPosition;
use crate::types::Page;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Default number of entries retained in memory.
pub const DEFAULT_CAPACITY: usize = 50;

/// The serialized snapshot associated with one history position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Session-unique, strictly increasing id of this position.
    pub version: u64,
    /// The page shown at this position.
    pub page: Page,
    /// Component-local state remembered across traversals.
    #[serde(default)]
    pub remembered_state: serde_json::Map<String, Value>,
    /// Scroll offsets captured when this position was left.
    #[serde(default)]
    pub scroll_positions: HashMap<String, ScrollPosition>,
}

impl HistoryEntry {
    fn new(version: u64, page: Page) -> Self {
        HistoryEntry {
            version,
            page,
            remembered_state: serde_json::Map::new(),
            scroll_positions: HashMap::new(),
        }
    }
}

/// Capability for sealing persisted history snapshots.
///
/// The identity implementation is [`PlainCipher`]; embedders that need
/// at-rest encryption supply their own.
pub trait HistoryCipher: Send + Sync {
    /// Seal a serialized snapshot before it reaches storage.
    fn seal(&self, plain: &[u8]) -> Result<Vec<u8>>;
    /// Open a sealed snapshot read back from storage.
    fn open(&self, sealed: &[u8]) -> Result<Vec<u8>>;
}

/// Identity cipher: snapshots persist as plain JSON.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainCipher;

impl HistoryCipher for PlainCipher {
    fn seal(&self, plain: &[u8]) -> Result<Vec<u8>> {
        Ok(plain.to_vec())
    }

    fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        Ok(sealed.to_vec())
    }
}

/// Bounded, version-keyed store of history entries.
pub struct HistoryStore {
    capacity: usize,
    next_version: u64,
    current: Option<u64>,
    entries: HashMap<u64, HistoryEntry>,
    /// Recency order, least recently used first.
    order: VecDeque<u64>,
    cipher: Arc<dyn HistoryCipher>,
}

impl HistoryStore {
    /// Create a store retaining at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        HistoryStore {
            capacity: capacity.max(1),
            next_version: 1,
            current: None,
            entries: HashMap::new(),
            order: VecDeque::new(),
            cipher: Arc::new(PlainCipher),
        }
    }

    /// Replace the snapshot cipher.
    #[must_use]
    pub fn with_cipher(mut self, cipher: Arc<dyn HistoryCipher>) -> Self {
        self.cipher = cipher;
        self
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Version id of the current position.
    #[must_use]
    pub fn current_version(&self) -> Option<u64> {
        self.current
    }

    /// The entry at the current position.
    #[must_use]
    pub fn current(&self) -> Option<&HistoryEntry> {
        self.current.and_then(|v| self.entries.get(&v))
    }

    /// Record a new history position for `page` and make it current.
    ///
    /// Returns the new version id, strictly greater than every id issued
    /// before it in this session.
    pub fn push(&mut self, page: Page) -> u64 {
        let version = self.next_version;
        self.next_version += 1;
        self.insert(HistoryEntry::new(version, page));
        self.current = Some(version);
        version
    }

    /// Overwrite the current position with `page`, keeping its version.
    ///
    /// With no current position yet (initial load), behaves like
    /// [`HistoryStore::push`].
    pub fn replace(&mut self, page: Page) -> u64 {
        match self.current {
            Some(version) => {
                if let Some(entry) = self.entries.get_mut(&version) {
                    entry.page = page;
                } else {
                    self.insert(HistoryEntry::new(version, page));
                }
                self.touch(version);
                version
            }
            None => self.push(page),
        }
    }

    /// Look up the entry for `version`, refreshing its recency.
    ///
    /// `None` means the entry was evicted or predates this session; the
    /// caller should fall back to re-fetching the page from the network.
    #[must_use]
    pub fn get(&mut self, version: u64) -> Option<HistoryEntry> {
        if self.entries.contains_key(&version) {
            self.touch(version);
        }
        self.entries.get(&version).cloned()
    }

    /// Move the current pointer to `version` (history traversal).
    ///
    /// Returns `false` when the entry is unknown; the pointer is left
    /// unchanged in that case.
    pub fn set_current(&mut self, version: u64) -> bool {
        if self.entries.contains_key(&version) {
            self.current = Some(version);
            self.touch(version);
            true
        } else {
            false
        }
    }

    /// Mutate the current entry in place.
    pub fn update_current(&mut self, f: impl FnOnce(&mut HistoryEntry)) {
        if let Some(version) = self.current {
            if let Some(entry) = self.entries.get_mut(&version) {
                f(entry);
            }
        }
    }

    /// Remember component-local state under `key` on the current entry.
    pub fn remember(&mut self, key: impl Into<String>, value: Value) {
        self.update_current(|entry| {
            entry.remembered_state.insert(key.into(), value);
        });
    }

    /// Restore component-local state from the current entry.
    #[must_use]
    pub fn restore(&self, key: &str) -> Option<Value> {
        self.current()
            .and_then(|entry| entry.remembered_state.get(key).cloned())
    }

    /// Serialize and seal the entry at `version` for persistence.
    pub fn export_entry(&self, version: u64) -> Result<Vec<u8>> {
        let entry = self
            .entries
            .get(&version)
            .ok_or_else(|| GlideError::Config(format!("no history entry for version {version}")))?;
        let plain = serde_json::to_vec(entry)?;
        self.cipher.seal(&plain)
    }

    /// Open and adopt a persisted entry, making it current.
    ///
    /// Used at boot to restore a snapshot read back from storage. The
    /// version counter advances past the adopted entry so later pushes
    /// stay strictly increasing.
    pub fn import_entry(&mut self, sealed: &[u8]) -> Result<HistoryEntry> {
        let plain = self.cipher.open(sealed)?;
        let entry: HistoryEntry = serde_json::from_slice(&plain)?;
        self.next_version = self.next_version.max(entry.version + 1);
        self.insert(entry.clone());
        self.current = Some(entry.version);
        Ok(entry)
    }

    fn insert(&mut self, entry: HistoryEntry) {
        let version = entry.version;
        self.entries.insert(version, entry);
        self.touch(version);
        self.evict();
    }

    fn touch(&mut self, version: u64) {
        self.order.retain(|v| *v != version);
        self.order.push_back(version);
    }

    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            // Never evict the current entry, whatever its recency.
            let victim = self
                .order
                .iter()
                .copied()
                .find(|v| Some(*v) != self.current);
            match victim {
                Some(v) => {
                    self.order.retain(|x| *x != v);
                    self.entries.remove(&v);
                }
                None => break,
            }
        }
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
