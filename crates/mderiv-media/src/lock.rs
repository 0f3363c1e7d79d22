//! Advisory, in-process locks keyed by file path.
//!
//! The registry maps a normalised path to a reference-counted `RwLock`.
//! Generators take a shared lock on the source they read from; anything that
//! is about to mutate the source (delete, move) takes the exclusive lock or
//! calls [`LockManager::cancel`] to abort every in-flight holder.
//!
//! Locks are cooperative: nothing here touches OS-level file locking.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::{MediaError, MediaResult};

type Registry = Arc<Mutex<HashMap<PathBuf, KeyEntry>>>;

struct KeyEntry {
    lock: Arc<RwLock<()>>,
    /// Contexts of every holder and waiter, by handle id
    holders: HashMap<u64, CancelToken>,
}

impl KeyEntry {
    fn new() -> Self {
        Self {
            lock: Arc::new(RwLock::new(())),
            holders: HashMap::new(),
        }
    }
}

/// Registry of advisory locks.
#[derive(Clone, Default)]
pub struct LockManager {
    registry: Registry,
    next_id: Arc<AtomicU64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LockMode {
    Shared,
    Exclusive,
}

impl LockManager {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a shared lock. Concurrent readers of one key never block each other.
    pub async fn read_lock(&self, ctx: &CancelToken, key: impl AsRef<Path>) -> MediaResult<LockHandle> {
        self.acquire(ctx, key.as_ref(), LockMode::Shared).await
    }

    /// Acquire an exclusive lock.
    pub async fn write_lock(&self, ctx: &CancelToken, key: impl AsRef<Path>) -> MediaResult<LockHandle> {
        self.acquire(ctx, key.as_ref(), LockMode::Exclusive).await
    }

    async fn acquire(&self, ctx: &CancelToken, key: &Path, mode: LockMode) -> MediaResult<LockHandle> {
        let key = normalize_key(key);

        if ctx.is_cancelled() {
            return Err(MediaError::lock_failed(key, "context cancelled"));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = ctx.child();
        let lock = {
            let mut registry = lock_registry(&self.registry);
            let entry = registry.entry(key.clone()).or_insert_with(KeyEntry::new);
            entry.holders.insert(id, token.clone());
            Arc::clone(&entry.lock)
        };

        let guard = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            guard = lock.clone().read_owned(), if mode == LockMode::Shared => Some(LockGuard::Shared(guard)),
            guard = lock.clone().write_owned(), if mode == LockMode::Exclusive => Some(LockGuard::Exclusive(guard)),
        };

        let Some(guard) = guard else {
            release_entry(&self.registry, &key, id);
            return Err(MediaError::lock_failed(key, "context cancelled"));
        };

        debug!(key = %key.display(), ?mode, "Lock acquired");

        Ok(LockHandle {
            key,
            id,
            token,
            registry: Arc::clone(&self.registry),
            guard: Mutex::new(Some(guard)),
        })
    }

    /// Cancel the context of every holder and waiter on `key`.
    ///
    /// Returns how many contexts were cancelled. Holders release their locks
    /// as their work unwinds.
    pub fn cancel(&self, key: impl AsRef<Path>) -> usize {
        let key = normalize_key(key.as_ref());
        let registry = lock_registry(&self.registry);
        match registry.get(&key) {
            Some(entry) => {
                for token in entry.holders.values() {
                    token.cancel();
                }
                debug!(key = %key.display(), count = entry.holders.len(), "Cancelled lock holders");
                entry.holders.len()
            }
            None => 0,
        }
    }

    /// Number of live handles (holders and waiters) on `key`.
    pub fn holders(&self, key: impl AsRef<Path>) -> usize {
        let key = normalize_key(key.as_ref());
        lock_registry(&self.registry)
            .get(&key)
            .map_or(0, |entry| entry.holders.len())
    }

    /// Number of keys currently tracked.
    pub fn active_keys(&self) -> usize {
        lock_registry(&self.registry).len()
    }
}

// Guards are never read, only held until the handle releases them.
#[allow(dead_code)]
enum LockGuard {
    Shared(OwnedRwLockReadGuard<()>),
    Exclusive(OwnedRwLockWriteGuard<()>),
}

/// An acquired advisory lock.
///
/// Released by [`LockHandle::cancel`], which is idempotent, or on drop.
pub struct LockHandle {
    key: PathBuf,
    id: u64,
    token: CancelToken,
    registry: Registry,
    guard: Mutex<Option<LockGuard>>,
}

impl LockHandle {
    /// The normalised key this lock is held on.
    pub fn key(&self) -> &Path {
        &self.key
    }

    /// Cancellation context scoped to this lock.
    pub fn context(&self) -> &CancelToken {
        &self.token
    }

    /// Whether the lock was explicitly or implicitly cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_exclusive(&self) -> bool {
        matches!(
            *self.guard.lock().unwrap_or_else(|e| e.into_inner()),
            Some(LockGuard::Exclusive(_))
        )
    }

    /// Release the lock and cancel its context.
    pub fn cancel(&self) {
        let guard = self.guard.lock().unwrap_or_else(|e| e.into_inner()).take();
        if guard.is_none() {
            return;
        }

        self.token.cancel();
        drop(guard);
        release_entry(&self.registry, &self.key, self.id);
        debug!(key = %self.key.display(), "Lock released");
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockHandle")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}

fn lock_registry(registry: &Registry) -> MutexGuard<'_, HashMap<PathBuf, KeyEntry>> {
    registry.lock().unwrap_or_else(|e| e.into_inner())
}

fn release_entry(registry: &Registry, key: &Path, id: u64) {
    let mut registry = lock_registry(registry);
    if let Some(entry) = registry.get_mut(key) {
        entry.holders.remove(&id);
        if entry.holders.is_empty() {
            registry.remove(key);
        }
    }
}

/// Normalise a path lexically so equivalent spellings share one lock.
///
/// Relative paths are resolved against the current directory; `.` is dropped
/// and `..` pops the previous component. Symlinks are not followed.
pub fn normalize_key(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
