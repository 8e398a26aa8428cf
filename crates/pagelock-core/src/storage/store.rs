//! The record store abstraction.
//!
//! Storage is a shared, eventually-consistent mirror of the in-memory
//! record, not a second source of truth: on conflict the in-memory state
//! wins until the next explicit load. Last-writer-wins is assumed; no
//! atomic read-modify-write.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::StorageError;
use crate::record::TimerRecord;

/// Persistence seam for the countdown's timer record.
pub trait RecordStore {
    /// Load the candidate record, if any.
    ///
    /// # Errors
    /// Returns an error if the store is unreachable or the payload is
    /// malformed; callers degrade to a fresh record.
    fn load(&self) -> Result<Option<TimerRecord>, StorageError>;

    /// Persist the record, replacing any previous one.
    ///
    /// # Errors
    /// Returns an error on write failure; callers keep the in-memory state
    /// authoritative and retry on the next tick.
    fn save(&mut self, record: &TimerRecord) -> Result<(), StorageError>;

    /// Remove the persisted record entirely.
    ///
    /// # Errors
    /// Returns an error on write failure.
    fn clear(&mut self) -> Result<(), StorageError>;
}

/// In-memory store used when persistent storage is unavailable, and in
/// tests. Clones share the same slot, mirroring a shared external store.
///
/// Holds the serialized payload rather than the struct so load/save exercise
/// the same JSON round-trip as the on-disk store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Rc<RefCell<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn load(&self) -> Result<Option<TimerRecord>, StorageError> {
        match self.slot.borrow().as_deref() {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, record: &TimerRecord) -> Result<(), StorageError> {
        let raw = serde_json::to_string(record)?;
        *self.slot.borrow_mut() = Some(raw);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        *self.slot.borrow_mut() = None;
        Ok(())
    }
}
