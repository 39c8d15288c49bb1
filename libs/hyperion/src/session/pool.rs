use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};
use std::{fmt, mem};

/// State that can be cleared for reuse without dropping its allocations.
pub(crate) trait Recycle {
    fn recycle(&mut self);
}

/// A bounded free list of reusable session states.
pub(crate) struct Pool<T> {
    free: Mutex<Vec<T>>,
    capacity: usize,
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.free.lock().map_or(0, |f| f.len());
        f.debug_struct("Pool")
            .field("free", &len)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<T: Default + Recycle> Pool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Takes a cleared state from the pool or allocates a fresh one.
    pub fn get(&self) -> Pooled<'_, T> {
        let item = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let item = match item {
            Some(item) => {
                log::trace!("Reusing pooled {}.", short_name::<T>());
                item
            },
            None => {
                log::trace!("Pool empty, allocating new {}.", short_name::<T>());
                T::default()
            },
        };

        Pooled { pool: self, item }
    }

    fn put(&self, mut item: T) {
        item.recycle();

        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.capacity {
            free.push(item);
        }
    }
}

fn short_name<T>() -> &'static str {
    let name = std::any::type_name::<T>();
    name.rsplit("::").next().unwrap_or(name)
}

/// A state borrowed from a [`Pool`].
///
/// It is cleared and handed back when dropped, including while unwinding
/// or returning early with an error.
pub(crate) struct Pooled<'a, T: Default + Recycle> {
    pool: &'a Pool<T>,
    item: T,
}

impl<T: Default + Recycle> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.item
    }
}

impl<T: Default + Recycle> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.item
    }
}

impl<T: Default + Recycle> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        self.pool.put(mem::take(&mut self.item));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        hits: Vec<u32>,
    }

    impl Recycle for Counter {
        fn recycle(&mut self) {
            self.hits.clear();
        }
    }

    #[test]
    fn returns_cleared_state() {
        let pool = Pool::<Counter>::new(1);
        {
            let mut a = pool.get();
            a.hits.extend([1, 2, 3]);
        }

        let b = pool.get();
        assert!(b.hits.is_empty(), "state must be cleared");
        assert!(b.hits.capacity() >= 3, "allocation must be reused");
    }

    #[test]
    fn respects_capacity() {
        let pool = Pool::<Counter>::new(1);
        let a = pool.get();
        let b = pool.get();
        drop(a);
        drop(b);

        let free = pool.free.lock().expect("not poisoned").len();
        assert_eq!(free, 1, "only one state may be kept");
    }
}
