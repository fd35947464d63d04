use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned by [`Observable::subscribe`]; identifies one registration.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct ObserverId(u64);

struct Registration<T> {
    id: ObserverId,
    observer: Observer<T>,
    once: bool,
}

/// Synchronous, ordered fan-out to subscribed observers.
pub struct Observable<T> {
    observers: Mutex<Vec<Registration<T>>>,
    next_id: AtomicU64,
}

impl<T> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Observable<T> {
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.register(Arc::new(observer), false)
    }

    /// Registers an observer that is dropped after its first notification.
    pub fn subscribe_once<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.register(Arc::new(observer), true)
    }

    /// Removes the registration; unknown ids are ignored.
    pub fn unsubscribe(&self, id: ObserverId) {
        self.lock().retain(|registration| registration.id != id);
    }

    /// Calls every observer registered at the time of the call, in order.
    /// Subscriptions changed from inside an observer take effect on the next call.
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Observer<T>> = {
            let mut observers = self.lock();
            let snapshot = observers
                .iter()
                .map(|registration| registration.observer.clone())
                .collect();
            observers.retain(|registration| !registration.once);
            snapshot
        };

        for observer in snapshot {
            observer(value);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn register(&self, observer: Observer<T>, once: bool) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Registration { id, observer, once });
        id
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Registration<T>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
