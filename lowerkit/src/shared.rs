use parking_lot::RwLock;
use parking_lot::RwLockReadGuard;
use parking_lot::RwLockWriteGuard;
use std::sync::Arc;

/// A convenience type alias for [Arc<RwLock<T>>].
///
/// The IR is a graph with parent pointers in both directions (an op knows its
/// block, a block knows its region, and a region knows its op), so every node
/// is reference counted and guarded by a lock.
///
/// # Example
///
/// ```
/// use lowerkit::shared::Shared;
/// use parking_lot::RwLock;
///
/// let lock: Shared<i32> = Shared::new(RwLock::new(42));
/// assert_eq!(*lock.read(), 42);
/// ```
///
/// Use [SharedExt] for shorter access to the lock.
pub type Shared<T> = Arc<RwLock<T>>;

/// A convenience trait around [RwLock].
///
/// Lowering passes are single threaded. A lock that cannot be acquired
/// immediately means that the same thread already holds a conflicting guard,
/// which would otherwise deadlock. Therefore, these methods crash instead of
/// blocking.
///
/// # Example
///
/// ```
/// use lowerkit::shared::Shared;
/// use lowerkit::shared::SharedExt;
/// use parking_lot::RwLock;
///
/// let lock: Shared<i32> = Shared::new(RwLock::new(42));
/// *lock.wr() += 1;
/// assert_eq!(*lock.rd(), 43);
/// ```
pub trait SharedExt<T: ?Sized> {
    /// Convenience method for reading.
    fn rd(&self) -> RwLockReadGuard<'_, T>;
    /// Convenience method for writing.
    fn wr(&self) -> RwLockWriteGuard<'_, T>;
}

impl<T: ?Sized> SharedExt<T> for Shared<T> {
    fn rd(&self) -> RwLockReadGuard<'_, T> {
        self.try_read()
            .expect("lock is already held for writing by this thread")
    }
    fn wr(&self) -> RwLockWriteGuard<'_, T> {
        self.try_write()
            .expect("lock is already held by this thread")
    }
}

#[test]
fn test_shared() {
    let lock: Shared<i32> = Shared::new(RwLock::new(42));
    assert_eq!(*lock.rd(), 42);
    {
        let _reader = lock.rd();
        // Nested reads are fine in a single thread.
        assert_eq!(*lock.rd(), 42);
    }
    *lock.wr() = 1;
    assert_eq!(*lock.rd(), 1);
}
