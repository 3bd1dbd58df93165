//! Swap-pointer publication of a loaded index to concurrent readers.

use std::sync::Arc;

use parking_lot::RwLock;

use super::{IndexError, IndexResult, VectorIndex};

/// Lifecycle of a [`SharedIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// Nothing published and no rebuild running.
    Absent,
    /// First build in progress; nothing to serve yet.
    Building,
    /// An index is published and current.
    Ready,
    /// A rebuild is running while the previous index keeps serving.
    Stale,
}

#[derive(Default)]
struct Slot {
    current: Option<Arc<VectorIndex>>,
    rebuilding: bool,
}

/// Holder for the index that queries should use right now.
///
/// Readers take an `Arc` to the current index and keep using it for the
/// whole query, so a concurrent publish never produces a mixed view.
#[derive(Default)]
pub struct SharedIndex {
    slot: RwLock<Slot>,
}

impl SharedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start out with an already built or loaded index.
    pub fn with_index(index: VectorIndex) -> Self {
        Self {
            slot: RwLock::new(Slot {
                current: Some(Arc::new(index)),
                rebuilding: false,
            }),
        }
    }

    pub fn state(&self) -> IndexState {
        let slot = self.slot.read();
        match (slot.current.is_some(), slot.rebuilding) {
            (false, false) => IndexState::Absent,
            (false, true) => IndexState::Building,
            (true, false) => IndexState::Ready,
            (true, true) => IndexState::Stale,
        }
    }

    /// The index to query, if one has been published.
    pub fn current(&self) -> Option<Arc<VectorIndex>> {
        self.slot.read().current.clone()
    }

    /// Claim the right to publish the next index.
    ///
    /// Only one rebuild may run at a time. Dropping the returned guard without
    /// publishing abandons the rebuild and leaves the current index in place.
    pub fn begin_rebuild(&self) -> IndexResult<Rebuild<'_>> {
        let mut slot = self.slot.write();
        if slot.rebuilding {
            return Err(IndexError::RebuildInProgress);
        }
        slot.rebuilding = true;
        Ok(Rebuild {
            shared: self,
            finished: false,
        })
    }

    /// Publish `index` immediately, outside of any rebuild.
    pub fn replace(&self, index: VectorIndex) -> IndexResult<Arc<VectorIndex>> {
        Ok(self.begin_rebuild()?.publish(index))
    }
}

/// Guard for an in-progress rebuild of a [`SharedIndex`].
pub struct Rebuild<'a> {
    shared: &'a SharedIndex,
    finished: bool,
}

impl Rebuild<'_> {
    /// Swap in the new index. Existing readers keep their old `Arc`.
    pub fn publish(mut self, index: VectorIndex) -> Arc<VectorIndex> {
        let index = Arc::new(index);
        {
            let mut slot = self.shared.slot.write();
            slot.current = Some(Arc::clone(&index));
            slot.rebuilding = false;
        }
        self.finished = true;
        crate::debug_event!("index", "published", "{} chunks", index.len());
        index
    }
}

impl Drop for Rebuild<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.shared.slot.write().rebuilding = false;
            crate::debug_event!("index", "rebuild abandoned, keeping current index");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Chunk;
    use std::thread;

    fn index_of(values: &[f32]) -> VectorIndex {
        let chunks = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                Chunk::new(format!("chunk {i}"), "a.txt", i as u32, (i, i + 1))
                    .with_embedding(vec![*v, 0.0])
            })
            .collect();
        VectorIndex::build(chunks).unwrap()
    }

    #[test]
    fn test_state_transitions() {
        let shared = SharedIndex::new();
        assert_eq!(shared.state(), IndexState::Absent);
        assert!(shared.current().is_none());

        let rebuild = shared.begin_rebuild().unwrap();
        assert_eq!(shared.state(), IndexState::Building);
        assert!(matches!(
            shared.begin_rebuild(),
            Err(IndexError::RebuildInProgress)
        ));
        rebuild.publish(index_of(&[1.0]));
        assert_eq!(shared.state(), IndexState::Ready);

        let rebuild = shared.begin_rebuild().unwrap();
        assert_eq!(shared.state(), IndexState::Stale);
        assert_eq!(shared.current().unwrap().len(), 1);
        rebuild.publish(index_of(&[1.0, 2.0]));
        assert_eq!(shared.state(), IndexState::Ready);
        assert_eq!(shared.current().unwrap().len(), 2);
    }

    #[test]
    fn test_abandoned_rebuild_keeps_old_index() {
        let shared = SharedIndex::with_index(index_of(&[1.0]));
        {
            let _rebuild = shared.begin_rebuild().unwrap();
            assert_eq!(shared.state(), IndexState::Stale);
        }
        assert_eq!(shared.state(), IndexState::Ready);
        assert_eq!(shared.current().unwrap().len(), 1);
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let shared = SharedIndex::with_index(index_of(&[1.0]));
        let held = shared.current().unwrap();
        shared.replace(index_of(&[1.0, 2.0, 3.0])).unwrap();

        assert_eq!(held.len(), 1);
        assert_eq!(shared.current().unwrap().len(), 3);
    }

    #[test]
    fn test_concurrent_readers_see_whole_indexes() {
        let shared = Arc::new(SharedIndex::with_index(index_of(&[1.0])));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let index = shared.current().unwrap();
                        assert_eq!(index.records().len(), index.len());
                        let hits = index.search(&[0.0, 0.0], index.len()).unwrap();
                        assert_eq!(hits.len(), index.len());
                    }
                })
            })
            .collect();

        for n in 2..20 {
            let values: Vec<f32> = (0..n).map(|v| v as f32).collect();
            shared.replace(index_of(&values)).unwrap();
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(shared.current().unwrap().len(), 19);
    }
}
