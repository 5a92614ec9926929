//! Cooperative cancellation for a pipeline run.
//!
//! A `CancelToken` is a cloneable one-shot flag. Stages poll it between
//! frames. Blocking points are released through hooks: the orchestrator
//! registers each hand-off queue's `abort`, so cancelling wakes any stage
//! parked in `dequeue`.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

type CancelHook = Box<dyn FnOnce() + Send>;

struct CancelInner {
    cancelled: AtomicBool,
    next_id: AtomicU64,
    hooks: Mutex<Vec<(u64, CancelHook)>>,
}

impl CancelInner {
    fn hooks(&self) -> MutexGuard<'_, Vec<(u64, CancelHook)>> {
        self.hooks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancelInner {
                cancelled: AtomicBool::new(false),
                next_id: AtomicU64::new(0),
                hooks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Cancel and run every registered hook once. Later calls are no-ops.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let hooks = std::mem::take(&mut *self.inner.hooks());
        for (_, hook) in hooks {
            hook();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Run `hook` on cancellation. Runs immediately if already cancelled.
    /// The hook stays registered for the token's lifetime.
    pub fn on_cancel<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.add_hook(Box::new(hook));
    }

    /// Like `on_cancel`, but the hook is unregistered when the returned
    /// guard drops.
    #[must_use = "dropping the registration removes the hook"]
    pub fn register<F>(&self, hook: F) -> CancelRegistration
    where
        F: FnOnce() + Send + 'static,
    {
        CancelRegistration {
            inner: Arc::downgrade(&self.inner),
            id: self.add_hook(Box::new(hook)),
        }
    }

    /// Hooks waiting for a cancellation.
    pub fn pending_hooks(&self) -> usize {
        self.inner.hooks().len()
    }

    fn add_hook(&self, hook: CancelHook) -> Option<u64> {
        {
            let mut hooks = self.inner.hooks();
            // Checked under the lock so a concurrent `cancel` either sees this
            // hook or we see the flag.
            if !self.inner.cancelled.load(Ordering::SeqCst) {
                let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                hooks.push((id, hook));
                return Some(id);
            }
        }
        hook();
        None
    }
}

/// Keeps a hook registered on a `CancelToken` until dropped.
pub struct CancelRegistration {
    inner: Weak<CancelInner>,
    id: Option<u64>,
}

impl Drop for CancelRegistration {
    fn drop(&mut self) {
        let (Some(id), Some(inner)) = (self.id, self.inner.upgrade()) else {
            return;
        };
        inner.hooks().retain(|(hook_id, _)| *hook_id != id);
    }
}

impl fmt::Debug for CancelRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelRegistration")
            .field("id", &self.id)
            .finish()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
