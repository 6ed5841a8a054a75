//! Bounded store of recently sent fragment sets.

use std::{
    collections::{HashMap, VecDeque},
    num::NonZeroUsize,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::fragment::{Fragment, FragmentIndex, ObjectId};

/// Fragments of the most recently sent objects, keyed by [`ObjectId`].
///
/// The cache holds at most `capacity` objects regardless of their size.
/// Once full, inserting a new object evicts the oldest inserted one.
/// Inserting an id that is already cached refreshes its fragments but keeps its
/// original position in the eviction order.
#[derive(Debug)]
pub struct RetransmitCache {
    capacity: NonZeroUsize,
    inner: Mutex<CacheInner>,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<ObjectId, Arc<[Fragment]>>,
    order: VecDeque<ObjectId>,
}

impl RetransmitCache {
    /// Create an empty cache bounded to `capacity` objects.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store the fragments of `object_id`, returning the evicted id if the
    /// cache overflowed.
    pub fn insert(&self, object_id: ObjectId, fragments: Arc<[Fragment]>) -> Option<ObjectId> {
        let mut inner = self.lock();
        if inner.entries.insert(object_id.clone(), fragments).is_some() {
            return None;
        }
        inner.order.push_back(object_id);
        if inner.order.len() <= self.capacity.get() {
            return None;
        }
        let evicted = inner.order.pop_front()?;
        inner.entries.remove(&evicted);
        Some(evicted)
    }

    /// Look up a single cached fragment.
    #[must_use]
    pub fn fragment(&self, object_id: &ObjectId, index: FragmentIndex) -> Option<Fragment> {
        self.lock()
            .entries
            .get(object_id)
            .and_then(|fragments| fragments.get(index.as_usize()))
            .cloned()
    }

    /// Report whether `object_id` is cached.
    #[must_use]
    pub fn contains(&self, object_id: &ObjectId) -> bool {
        self.lock().entries.contains_key(object_id)
    }

    /// Number of cached objects.
    #[must_use]
    pub fn len(&self) -> usize { self.lock().entries.len() }

    /// Whether the cache holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Maximum number of cached objects.
    #[must_use]
    pub const fn capacity(&self) -> NonZeroUsize { self.capacity }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use rstest::{fixture, rstest};

    use super::*;
    use crate::fragment::{ChannelId, Fragmenter, OriginTag, TypeTag};

    fn fragments_for(payload: &[u8]) -> (ObjectId, Arc<[Fragment]>) {
        let fragmenter = Fragmenter::new(
            NonZeroUsize::new(4).expect("non-zero"),
            ChannelId::new(1),
            OriginTag::from("test"),
        );
        let id = ObjectId::digest(payload);
        let batch = fragmenter
            .fragment(&TypeTag::from("blob"), &id, payload)
            .expect("fragment");
        (id, batch.into_fragments().into())
    }

    #[fixture]
    fn cache() -> RetransmitCache { RetransmitCache::new(NonZeroUsize::new(2).expect("non-zero")) }

    #[rstest]
    fn oldest_object_is_evicted_first(cache: RetransmitCache) {
        let (first, a) = fragments_for(b"first object");
        let (second, b) = fragments_for(b"second object");
        let (third, c) = fragments_for(b"third object");

        assert_eq!(cache.insert(first.clone(), a), None);
        assert_eq!(cache.insert(second.clone(), b), None);
        assert_eq!(cache.insert(third.clone(), c), Some(first.clone()));

        assert!(!cache.contains(&first));
        assert!(cache.contains(&second));
        assert!(cache.contains(&third));
        assert_eq!(cache.len(), 2);
    }

    #[rstest]
    fn reinserting_keeps_eviction_position(cache: RetransmitCache) {
        let (first, a) = fragments_for(b"first object");
        let (second, b) = fragments_for(b"second object");
        let (third, c) = fragments_for(b"third object");

        cache.insert(first.clone(), Arc::clone(&a));
        cache.insert(second.clone(), b);
        assert_eq!(cache.insert(first.clone(), a), None);
        assert_eq!(cache.insert(third, c), Some(first));
        assert!(cache.contains(&second));
    }

    #[rstest]
    fn fragment_lookup_by_index(cache: RetransmitCache) {
        let (id, fragments) = fragments_for(b"0123456789");
        cache.insert(id.clone(), fragments);

        let fragment = cache
            .fragment(&id, FragmentIndex::new(1))
            .expect("cached fragment");
        assert_eq!(fragment.payload(), b"4567");
        assert!(cache.fragment(&id, FragmentIndex::new(3)).is_none());
        assert!(
            cache
                .fragment(&ObjectId::digest(b"unknown"), FragmentIndex::zero())
                .is_none()
        );
    }
}
