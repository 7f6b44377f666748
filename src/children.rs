use crate::error::{Result, TesiraError};
use crate::lock;
use crate::node::Lifecycle;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Owned, lazily populated children of a node keyed by 1-based device index
///
/// Construction happens under the lock so each index is built exactly once;
/// initialization and disposal run after the lock is released. Gaps are
/// allowed and the collection never compacts.
pub struct ChildCollection<T> {
    children: Mutex<BTreeMap<u32, Arc<T>>>,
}

impl<T: Lifecycle> ChildCollection<T> {
    pub fn new() -> Self {
        Self {
            children: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn get(&self, index: u32) -> Option<Arc<T>> {
        lock(&self.children).get(&index).cloned()
    }

    /// Return the child at `index`, creating and initializing it if absent
    pub fn get_or_create<F>(&self, index: u32, create: F) -> Result<Arc<T>>
    where
        F: FnOnce(u32) -> Arc<T>,
    {
        if index == 0 {
            return Err(TesiraError::IndexOutOfRange(index));
        }

        let (child, created) = {
            let mut children = lock(&self.children);
            match children.get(&index) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let child = create(index);
                    children.insert(index, child.clone());
                    (child, true)
                }
            }
        };

        if created {
            child.initialize();
        }
        Ok(child)
    }

    /// All children ordered by index
    pub fn all_ordered(&self) -> Vec<Arc<T>> {
        lock(&self.children).values().cloned().collect()
    }

    pub fn indices(&self) -> Vec<u32> {
        lock(&self.children).keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.children).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.children).is_empty()
    }

    /// Create any missing children in `1..=count`, leaving existing ones alone
    ///
    /// Returns the children that were created.
    pub fn grow_to<F>(&self, count: u32, mut create: F) -> Vec<Arc<T>>
    where
        F: FnMut(u32) -> Arc<T>,
    {
        let created: Vec<Arc<T>> = {
            let mut children = lock(&self.children);
            (1..=count)
                .filter_map(|index| {
                    if children.contains_key(&index) {
                        return None;
                    }
                    let child = create(index);
                    children.insert(index, child.clone());
                    Some(child)
                })
                .collect()
        };

        for child in &created {
            child.initialize();
        }
        created
    }

    /// Dispose every child, then recreate `1..=count` fresh
    pub fn reset_to<F>(&self, count: u32, create: F) -> Vec<Arc<T>>
    where
        F: FnMut(u32) -> Arc<T>,
    {
        self.dispose_all();
        self.grow_to(count, create)
    }

    /// Dispose every child and then drop it from the collection
    pub fn dispose_all(&self) {
        let doomed = self.all_ordered();
        for child in &doomed {
            child.dispose();
        }
        lock(&self.children)
            .retain(|_, child| !doomed.iter().any(|gone| Arc::ptr_eq(gone, child)));
    }

    pub fn initialize_all(&self) {
        for child in self.all_ordered() {
            child.initialize();
        }
    }

    pub fn suspend_all(&self) {
        for child in self.all_ordered() {
            child.suspend();
        }
    }
}

impl<T: Lifecycle> Default for ChildCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Probe {
        initialized: AtomicUsize,
        disposed: AtomicBool,
    }

    impl Lifecycle for Probe {
        fn initialize(&self) {
            self.initialized.fetch_add(1, Ordering::SeqCst);
        }

        fn suspend(&self) {}

        fn dispose(&self) {
            self.disposed.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn concurrent_get_or_create_builds_once() {
        let collection = ChildCollection::<Probe>::new();
        let constructed = AtomicUsize::new(0);

        let children: Vec<Arc<Probe>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        collection
                            .get_or_create(5, |_| {
                                constructed.fetch_add(1, Ordering::SeqCst);
                                Arc::new(Probe::default())
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(constructed.load(Ordering::SeqCst), 1);
        assert!(children.iter().all(|child| Arc::ptr_eq(child, &children[0])));
        assert_eq!(children[0].initialized.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_index_is_rejected() {
        let collection = ChildCollection::<Probe>::new();
        assert!(matches!(
            collection.get_or_create(0, |_| Arc::new(Probe::default())),
            Err(TesiraError::IndexOutOfRange(0))
        ));
        assert!(collection.is_empty());
    }

    #[test]
    fn grow_keeps_existing_and_allows_gaps() {
        let collection = ChildCollection::<Probe>::new();
        let seven = collection
            .get_or_create(7, |_| Arc::new(Probe::default()))
            .unwrap();
        let created = collection.grow_to(3, |_| Arc::new(Probe::default()));

        assert_eq!(created.len(), 3);
        assert_eq!(collection.indices(), vec![1, 2, 3, 7]);
        assert!(Arc::ptr_eq(&collection.get(7).unwrap(), &seven));
        assert!(collection.grow_to(2, |_| Arc::new(Probe::default())).is_empty());
    }

    #[test]
    fn reset_disposes_before_recreating() {
        let collection = ChildCollection::<Probe>::new();
        collection.grow_to(4, |_| Arc::new(Probe::default()));
        let old = collection.all_ordered();

        collection.reset_to(2, |_| Arc::new(Probe::default()));

        assert!(old.iter().all(|child| child.disposed.load(Ordering::SeqCst)));
        assert_eq!(collection.indices(), vec![1, 2]);
        assert!(!Arc::ptr_eq(&collection.get(1).unwrap(), &old[0]));
    }
}
