//! The canonical-state table: the one piece of shared mutable state under
//! parallel expansion.
//!
//! Every distinct canonical encoding must receive exactly one id, no
//! matter how many workers discover it concurrently — the first writer
//! wins the id and every loser adopts it. The table is confined behind a
//! single insert-or-get primitive; all other builder state stays
//! layer-local.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ctmc::StateId;

/// Synchronized canonical-encoding → state-id table.
#[derive(Debug, Default)]
pub struct StateRegistry {
    ids: DashMap<Box<[u8]>, StateId>,
    next: AtomicUsize,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically fetch the id for an encoding, assigning the next free id
    /// on first sight. Returns `(id, freshly_inserted)`.
    pub fn insert_or_get(&self, encoding: Vec<u8>) -> (StateId, bool) {
        match self.ids.entry(encoding.into_boxed_slice()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => (*entry.get(), false),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let id = self.next.fetch_add(1, Ordering::Relaxed);
                entry.insert(id);
                (id, true)
            }
        }
    }

    /// Look up an encoding without inserting.
    pub fn get(&self, encoding: &[u8]) -> Option<StateId> {
        self.ids.get(encoding).map(|entry| *entry)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_writer_wins_the_id() {
        let registry = StateRegistry::new();
        let (id0, fresh0) = registry.insert_or_get(vec![1, 2, 3]);
        let (id1, fresh1) = registry.insert_or_get(vec![1, 2, 3]);
        assert!(fresh0);
        assert!(!fresh1);
        assert_eq!(id0, id1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_encodings_get_distinct_ids() {
        let registry = StateRegistry::new();
        let (a, _) = registry.insert_or_get(vec![0]);
        let (b, _) = registry.insert_or_get(vec![1]);
        assert_ne!(a, b);
        assert_eq!(registry.get(&[0]), Some(a));
        assert_eq!(registry.get(&[2]), None);
    }

    #[test]
    fn concurrent_insertions_never_duplicate_ids() {
        use std::sync::Arc;
        let registry = Arc::new(StateRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (0..1000)
                        .map(|n: u32| registry.insert_or_get(n.to_le_bytes().to_vec()).0)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let all: Vec<Vec<StateId>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        // every thread observed the same id per encoding
        for ids in &all[1..] {
            assert_eq!(ids, &all[0]);
        }
        assert_eq!(registry.len(), 1000);
    }
}
