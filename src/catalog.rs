//! Catalog abstraction - the storage collaborator.
//!
//! Storage itself is out of scope; the protocol core only needs lookup,
//! iteration, counting, and a stream of mutation notifications to feed
//! the revision manager. [`MemoryCatalog`] is the concrete
//! implementation used by the server assembly and the test suite; a
//! database-backed catalog slots in behind the same [`Catalog`] trait.

use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};

use tokio::sync::mpsc;

use crate::codec::Value;

/// Media kind of a record, matched by the `type=` query argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Music,
    Video,
    Photo,
}

impl MediaKind {
    /// Wire spelling used in `type=` arguments.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Music => "music",
            MediaKind::Video => "video",
            MediaKind::Photo => "photo",
        }
    }

    /// Parse a `type=` argument value. Unknown kinds yield `None` and
    /// the caller skips the implicit kind filter.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "music" => Some(MediaKind::Music),
            "video" => Some(MediaKind::Video),
            "photo" => Some(MediaKind::Photo),
            _ => None,
        }
    }
}

/// One catalog record: media item with per-variant field values keyed
/// by field id.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Catalog-unique record id.
    pub id: u64,
    /// Media kind, for `type=` filtering.
    pub kind: MediaKind,
    fields: BTreeMap<u16, Value>,
}

impl Record {
    /// Create an empty record.
    pub fn new(id: u64, kind: MediaKind) -> Self {
        Self {
            id,
            kind,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, field_id: u16, value: Value) -> Self {
        self.fields.insert(field_id, value);
        self
    }

    /// Set a field value.
    pub fn set(&mut self, field_id: u16, value: Value) {
        self.fields.insert(field_id, value);
    }

    /// Get a field value.
    pub fn field(&self, field_id: u16) -> Option<&Value> {
        self.fields.get(&field_id)
    }

    /// Iterate fields in ascending field-id order.
    pub fn fields(&self) -> impl Iterator<Item = (u16, &Value)> {
        self.fields.iter().map(|(&id, v)| (id, v))
    }
}

/// A grouping record (playlist or album container).
#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    /// Catalog-unique grouping id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Member record ids, in play order.
    pub member_ids: Vec<u64>,
    /// Whether this is the library-wide base grouping.
    pub base: bool,
}

/// A catalog mutation event, feeding the revision manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Inserted(u64),
    Updated(u64),
    Removed(u64),
}

/// Read capabilities the protocol core needs from storage.
pub trait Catalog: Send + Sync {
    /// Point lookup by record id.
    fn lookup(&self, id: u64) -> Option<Record>;

    /// All record ids, in stable order.
    fn ids(&self) -> Vec<u64>;

    /// Total record count.
    fn count(&self) -> u64;

    /// All grouping records.
    fn playlists(&self) -> Vec<Playlist>;
}

/// In-memory catalog with mutation notifications.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    records: RwLock<BTreeMap<u64, Record>>,
    playlists: RwLock<Vec<Playlist>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Mutation>>>,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record, notifying subscribers.
    pub fn insert(&self, record: Record) {
        let id = record.id;
        let replaced = self
            .records
            .write()
            .expect("catalog lock poisoned")
            .insert(id, record)
            .is_some();

        let event = if replaced {
            Mutation::Updated(id)
        } else {
            Mutation::Inserted(id)
        };
        tracing::debug!(id, ?event, "catalog mutated");
        self.publish(event);
    }

    /// Remove a record, notifying subscribers if it existed.
    pub fn remove(&self, id: u64) -> bool {
        let removed = self
            .records
            .write()
            .expect("catalog lock poisoned")
            .remove(&id)
            .is_some();
        if removed {
            self.publish(Mutation::Removed(id));
        }
        removed
    }

    /// Insert or replace a grouping record. Groupings do not advance
    /// the revision on their own; membership changes arrive as record
    /// mutations.
    pub fn set_playlist(&self, playlist: Playlist) {
        let mut playlists = self.playlists.write().expect("catalog lock poisoned");
        match playlists.iter_mut().find(|p| p.id == playlist.id) {
            Some(existing) => *existing = playlist,
            None => playlists.push(playlist),
        }
    }

    /// Subscribe to mutation notifications.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Mutation> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .push(tx);
        rx
    }

    fn publish(&self, event: Mutation) {
        let mut subs = self.subscribers.lock().expect("subscriber lock poisoned");
        subs.retain(|tx| tx.send(event).is_ok());
    }
}

impl Catalog for MemoryCatalog {
    fn lookup(&self, id: u64) -> Option<Record> {
        self.records
            .read()
            .expect("catalog lock poisoned")
            .get(&id)
            .cloned()
    }

    fn ids(&self) -> Vec<u64> {
        self.records
            .read()
            .expect("catalog lock poisoned")
            .keys()
            .copied()
            .collect()
    }

    fn count(&self) -> u64 {
        self.records.read().expect("catalog lock poisoned").len() as u64
    }

    fn playlists(&self) -> Vec<Playlist> {
        self.playlists
            .read()
            .expect("catalog lock poisoned")
            .clone()
    }
}
