//! Re-entrant context ownership lock.
//!
//! A context is current on at most one thread. [`ContextLock`] tracks the owning
//! thread and a recursion depth; contention either blocks (the default) or,
//! with [`LockPolicy::FailFast`], fails immediately so that two threads racing
//! on one context surface as an error instead of a silent stall.

use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};

use crate::error::{ContextError, ContextResult};

/// Contention policy, fixed when the lock is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockPolicy {
    /// Wait until the owning thread releases the context.
    #[default]
    Blocking,
    /// Report contention as [`ContextError::LockContention`].
    FailFast,
}

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    depth: usize,
    waiters: usize,
}

#[derive(Debug, Default)]
pub struct ContextLock {
    policy: LockPolicy,
    state: Mutex<LockState>,
    released: Condvar,
}

impl ContextLock {
    pub fn new(policy: LockPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(LockState::default()),
            released: Condvar::new(),
        }
    }

    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    /// Acquire ownership for the calling thread, re-entrantly.
    pub fn lock(&self) -> ContextResult<()> {
        let me = thread::current().id();
        let mut state = self.state.lock();

        if state.owner == Some(me) {
            state.depth += 1;
            return Ok(());
        }

        if state.owner.is_some() {
            if self.policy == LockPolicy::FailFast {
                return Err(ContextError::LockContention);
            }
            state.waiters += 1;
            while state.owner.is_some() {
                self.released.wait(&mut state);
            }
            state.waiters -= 1;
        }

        state.owner = Some(me);
        state.depth = 1;
        Ok(())
    }

    /// Release one level of ownership.
    pub fn unlock(&self) -> ContextResult<()> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner != Some(me) {
            return Err(ContextError::LockNotOwned);
        }

        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.released.notify_one();
        }
        Ok(())
    }

    /// Whether the calling thread owns the lock.
    pub fn is_held(&self) -> bool {
        self.state.lock().owner == Some(thread::current().id())
    }

    /// Whether any thread owns the lock.
    pub fn is_locked(&self) -> bool {
        self.state.lock().owner.is_some()
    }

    /// Whether other threads are blocked waiting for the lock.
    pub fn has_waiters(&self) -> bool {
        self.state.lock().waiters > 0
    }

    /// Acquire the lock and release it again when the guard drops, unless the
    /// guard is [kept](ContextLockGuard::keep).
    pub fn guard(&self) -> ContextResult<ContextLockGuard<'_>> {
        self.lock()?;
        Ok(ContextLockGuard {
            lock: self,
            armed: true,
        })
    }
}

/// Scope guard over one level of [`ContextLock`] ownership.
pub struct ContextLockGuard<'a> {
    lock: &'a ContextLock,
    armed: bool,
}

impl ContextLockGuard<'_> {
    /// Leave the lock held past the guard's lifetime.
    pub fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for ContextLockGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(err) = self.lock.unlock() {
                log::error!("Context lock guard release failed: {err}");
            }
        }
    }
}
