use std::sync::{LockResult, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

/// Shared read access to an in-memory store, recovering from poisoning.
pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    store: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    recover(lock.read(), store, op, "rwlock.read")
}

/// Exclusive write access to an in-memory store, recovering from poisoning.
pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    store: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    recover(lock.write(), store, op, "rwlock.write")
}

fn recover<G>(result: LockResult<G>, store: &'static str, op: &'static str, kind: &str) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(
            op,
            store,
            lock_kind = kind,
            result = "poisoned_recovered",
            "Recovered from poisoned store lock; entries may be stale"
        );
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn poisoned_locks_stay_usable() {
        let lock = Arc::new(RwLock::new(1));
        let poisoner = lock.clone();
        let _ = thread::spawn(move || {
            let _guard = poisoner.write().expect("first lock");
            panic!("poison the lock");
        })
        .join();

        assert!(lock.is_poisoned());
        *rw_write(&lock, "test", "write") += 1;
        assert_eq!(*rw_read(&lock, "test", "read"), 2);
    }
}
