//! Scoped access to secret keys
//!
//! Secret keys are locked by default. Code that legitimately needs a secret value opens an
//! unlocked scope on the current thread:
//!
//! ```
//! use strata_config::SecretKeys;
//!
//! let _scope = SecretKeys::unlock();
//! assert!(!SecretKeys::is_locked());
//! ```
//!
//! Scopes nest: a `lock()` inside an `unlock()` relocks until it is dropped, after which the
//! outer state applies again. Scopes are tied to the thread that opened them and cannot be
//! sent to another thread.

use std::cell::RefCell;
use std::marker::PhantomData;

thread_local! {
    static SCOPES: RefCell<Vec<bool>> = const { RefCell::new(Vec::new()) };
}

/// Thread-local secret lock state.
pub struct SecretKeys;

impl SecretKeys {
    /// Whether secret keys are locked on this thread.
    pub fn is_locked() -> bool {
        SCOPES.with(|scopes| !scopes.borrow().last().copied().unwrap_or(false))
    }

    /// Unlock secrets until the returned guard is dropped.
    #[must_use = "secrets are locked again as soon as the scope is dropped"]
    pub fn unlock() -> SecretScope {
        SecretScope::push(true)
    }

    /// Lock secrets until the returned guard is dropped.
    #[must_use = "the previous state returns as soon as the scope is dropped"]
    pub fn lock() -> SecretScope {
        SecretScope::push(false)
    }

    /// Run `f` with secrets unlocked.
    pub fn do_unlocked<T>(f: impl FnOnce() -> T) -> T {
        let _scope = Self::unlock();
        f()
    }

    /// Run `f` with secrets locked.
    pub fn do_locked<T>(f: impl FnOnce() -> T) -> T {
        let _scope = Self::lock();
        f()
    }
}

/// Guard for one lock or unlock scope. Restores the previous state on drop.
#[derive(Debug)]
pub struct SecretScope {
    depth: usize,
    _thread_bound: PhantomData<*const ()>,
}

impl SecretScope {
    fn push(unlocked: bool) -> Self {
        let depth = SCOPES.with(|scopes| {
            let mut scopes = scopes.borrow_mut();
            scopes.push(unlocked);
            scopes.len() - 1
        });
        Self {
            depth,
            _thread_bound: PhantomData,
        }
    }
}

impl Drop for SecretScope {
    fn drop(&mut self) {
        SCOPES.with(|scopes| scopes.borrow_mut().truncate(self.depth));
    }
}
