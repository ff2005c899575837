//! Content-addressed, session-local key/value store used to answer the
//! server's `get_blob_args`/`set_blob_args` requests. Plain `HashMap` is
//! enough here: the address space is opaque bytes chosen by the server, and
//! the store is dropped along with the rest of the session's `State`, the
//! same arena-per-session lifetime `codex-core::Session` relies on to
//! reclaim a turn's memory without an explicit GC pass.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct BlobStore {
    blobs: HashMap<Vec<u8>, Vec<u8>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// O(1) lookup; an absent id yields an empty blob rather than `None`,
    /// matching the wire reply shape (`get_blob_result{blob_data: empty}`).
    pub fn get(&self, id: &[u8]) -> Vec<u8> {
        self.blobs.get(id).cloned().unwrap_or_default()
    }

    pub fn contains(&self, id: &[u8]) -> bool {
        self.blobs.contains_key(id)
    }

    /// Idempotent: setting the same id to the same bytes twice is a no-op on
    /// the second call. Setting the same id to different bytes overwrites.
    pub fn set(&mut self, id: Vec<u8>, data: Vec<u8>) {
        self.blobs.insert(id, data);
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_is_idempotent_and_get_is_stable() {
        let mut store = BlobStore::new();
        store.set(b"id".to_vec(), b"hello".to_vec());
        store.set(b"id".to_vec(), b"hello".to_vec());
        assert_eq!(store.get(b"id"), b"hello");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_id_returns_empty() {
        let store = BlobStore::new();
        assert_eq!(store.get(b"nope"), Vec::<u8>::new());
        assert!(!store.contains(b"nope"));
    }

    #[test]
    fn overwrite_replaces_prior_value() {
        let mut store = BlobStore::new();
        store.set(b"id".to_vec(), b"first".to_vec());
        store.set(b"id".to_vec(), b"second".to_vec());
        assert_eq!(store.get(b"id"), b"second");
    }
}
