use crate::lock;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Observer invoked with the new value after a property changed
pub type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Last-known value of one device attribute
///
/// Updates are deduplicated: observers only run when the stored value actually
/// changes. Floats compare exactly, matching the device's own precision.
/// Observers run on the dispatch path and must not block.
pub struct Property<T> {
    name: &'static str,
    value: Mutex<Option<T>>,
    observers: Mutex<Vec<Observer<T>>>,
}

impl<T: Clone + PartialEq + Send + 'static> Property<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            value: Mutex::new(None),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last value reported by the device, `None` until the first report
    pub fn get(&self) -> Option<T> {
        lock(&self.value).clone()
    }

    /// Register a change observer
    pub fn observe<F>(&self, observer: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        lock(&self.observers).push(Arc::new(observer));
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.observers).len()
    }

    /// Store a new value. Returns `true` and notifies observers if it differs.
    ///
    /// Observers run after the value lock is released, so an observer may
    /// read the stored value back. Two threads updating the same property at
    /// once can notify in a different order than they stored. The connection
    /// reader dispatches one response at a time, which keeps feedback ordered.
    pub(crate) fn update(&self, value: T) -> bool {
        {
            let mut current = lock(&self.value);
            if current.as_ref() == Some(&value) {
                return false;
            }
            *current = Some(value.clone());
        }

        let observers = lock(&self.observers).clone();
        for observer in &observers {
            observer(&value);
        }
        true
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("value", &*lock(&self.value))
            .finish()
    }
}

/// Type-erased handle used to sever a property's observers on dispose
pub(crate) trait Detach: Send + Sync {
    fn detach_observers(&self);
}

impl<T: Send> Detach for Property<T> {
    fn detach_observers(&self) {
        lock(&self.observers).clear();
    }
}
