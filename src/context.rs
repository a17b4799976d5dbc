//! Execution contexts — stackable environments of variable bindings.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::ptr;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ContextError;
use crate::map::HamtMap;
use crate::var::VarKey;

/// Shared handle to an opaque context value.
///
/// Values are stored type-erased; [`ContextVar`](crate::ContextVar)
/// recovers the concrete type on read.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// An environment of context-variable bindings.
///
/// A context wraps a persistent [`HamtMap`] of bindings, so copying one is
/// O(1) and entering it never disturbs the maps of other contexts. Each
/// thread keeps a stack of entered contexts; [`ContextVar`](crate::ContextVar)
/// reads and writes go through the top of that stack.
///
/// Cloning the handle aliases the same context; use [`copy`](Self::copy)
/// for an independent context with the same bindings.
///
/// Ownership is plain reference counting: a value that transitively holds
/// its own context keeps both alive. Avoid storing a context inside a
/// value bound in it.
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    state: Mutex<ContextState>,
}

struct ContextState {
    vars: HamtMap<VarKey, AnyValue>,
    prev: Option<Context>,
    entered: bool,
}

// ---------------------------------------------------------------------------
// Per-thread state
// ---------------------------------------------------------------------------

thread_local! {
    static THREAD_STATE: RefCell<ThreadState> = const {
        RefCell::new(ThreadState { current: None, version: 0 })
    };
}

/// The calling thread's context stack top and its change counter.
///
/// The counter bumps on every enter, exit and variable set; together with
/// the thread id it keys the variable fast-path cache.
struct ThreadState {
    current: Option<Context>,
    version: u64,
}

/// Returns the calling thread's current context, if one is installed.
pub(crate) fn current_context() -> Option<Context> {
    THREAD_STATE.with(|ts| ts.borrow().current.clone())
}

/// Returns the current context, installing a fresh implicit one if the
/// thread has none yet.
///
/// The implicit context is current but not `entered`; it is the root the
/// first `exit` of an explicitly entered context falls back to.
pub(crate) fn current_or_implicit() -> Context {
    THREAD_STATE.with(|ts| ts.borrow_mut().current.get_or_insert_with(Context::new).clone())
}

/// Returns the thread's context version.
pub(crate) fn thread_version() -> u64 {
    THREAD_STATE.with(|ts| ts.borrow().version)
}

/// Bumps the thread's context version and returns the new value.
pub(crate) fn bump_thread_version() -> u64 {
    THREAD_STATE.with(|ts| {
        let mut ts = ts.borrow_mut();
        ts.version += 1;
        ts.version
    })
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

impl Context {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::from_vars(HamtMap::new())
    }

    fn from_vars(vars: HamtMap<VarKey, AnyValue>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                state: Mutex::new(ContextState { vars, prev: None, entered: false }),
            }),
        }
    }

    /// Returns a new context with the same bindings.
    ///
    /// O(1): the binding map is shared structurally, not copied.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self::from_vars(self.vars())
    }

    /// Returns a copy of the calling thread's current context.
    #[must_use]
    pub fn copy_current() -> Self {
        current_or_implicit().copy()
    }

    /// Pushes this context onto the calling thread's stack, making it the
    /// current context.
    ///
    /// # Errors
    ///
    /// [`ContextError::AlreadyEntered`] if the context is on a stack
    /// already — contexts are not reentrant.
    pub fn enter(&self) -> Result<(), ContextError> {
        let mut state = self.inner.state.lock();
        if state.entered {
            return Err(ContextError::AlreadyEntered);
        }
        THREAD_STATE.with(|ts| {
            let mut ts = ts.borrow_mut();
            state.prev = ts.current.replace(self.clone());
            state.entered = true;
            ts.version += 1;
        });
        Ok(())
    }

    /// Pops this context off the calling thread's stack, restoring the
    /// context that was current before [`enter`](Self::enter).
    ///
    /// # Errors
    ///
    /// [`ContextError::NotEntered`] if the context is not on a stack;
    /// [`ContextError::NotCurrent`] if it is entered but some other
    /// context is the thread's current one.
    pub fn exit(&self) -> Result<(), ContextError> {
        let mut state = self.inner.state.lock();
        if !state.entered {
            return Err(ContextError::NotEntered);
        }
        THREAD_STATE.with(|ts| {
            let mut ts = ts.borrow_mut();
            let is_current = ts.current.as_ref().is_some_and(|current| current.same(self));
            if !is_current {
                return Err(ContextError::NotCurrent);
            }
            ts.current = state.prev.take();
            state.entered = false;
            ts.version += 1;
            Ok(())
        })
    }

    /// Runs `f` with this context as the current context.
    ///
    /// The context is exited on every path out of `f`, including
    /// unwinding.
    ///
    /// # Errors
    ///
    /// [`ContextError::AlreadyEntered`] if the context is entered.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Result<R, ContextError> {
        self.enter()?;
        let _guard = ExitGuard { ctx: self };
        Ok(f())
    }

    // -----------------------------------------------------------------------
    // Mapping reads
    // -----------------------------------------------------------------------

    /// Returns the number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().vars.len()
    }

    /// Returns `true` if the context holds no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().vars.is_empty()
    }

    /// Returns `true` if `key` is bound in this context.
    #[must_use]
    pub fn contains(&self, key: &VarKey) -> bool {
        self.vars().get(key).is_some()
    }

    /// Returns the value bound to `key` in this context, type-erased.
    ///
    /// Unlike [`ContextVar::get`](crate::ContextVar::get), this reads this
    /// context's bindings, not the current context's, and never falls back
    /// to a default.
    #[must_use]
    pub fn get(&self, key: &VarKey) -> Option<AnyValue> {
        self.vars().get(key).cloned()
    }

    /// Returns the value bound to `key` in this context, or `default` if
    /// the key is unbound here.
    ///
    /// The explicit `default` is the only fallback — the variable's own
    /// default is not consulted.
    #[must_use]
    pub fn get_or(&self, key: &VarKey, default: AnyValue) -> AnyValue {
        self.get(key).unwrap_or(default)
    }

    /// Returns the keys bound in this context.
    #[must_use]
    pub fn keys(&self) -> Vec<VarKey> {
        self.vars().iter().map(|(key, _)| key.clone()).collect()
    }

    /// Returns the values bound in this context.
    #[must_use]
    pub fn values(&self) -> Vec<AnyValue> {
        self.vars().iter().map(|(_, value)| Arc::clone(value)).collect()
    }

    /// Returns the `(key, value)` bindings of this context.
    #[must_use]
    pub fn items(&self) -> Vec<(VarKey, AnyValue)> {
        self.vars()
            .iter()
            .map(|(key, value)| (key.clone(), Arc::clone(value)))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Crate-internal binding access
    // -----------------------------------------------------------------------

    /// Snapshot of the binding map. O(1) by structural sharing.
    pub(crate) fn vars(&self) -> HamtMap<VarKey, AnyValue> {
        self.inner.state.lock().vars.clone()
    }

    /// Binds `key` to `value` by swapping in a new map.
    pub(crate) fn insert_binding(&self, key: VarKey, value: AnyValue) {
        let mut state = self.inner.state.lock();
        state.vars = state.vars.insert(key, value);
    }

    /// Drops the binding for `key`; `false` if it was not bound.
    pub(crate) fn remove_binding(&self, key: &VarKey) -> bool {
        let mut state = self.inner.state.lock();
        if state.vars.get(key).is_none() {
            return false;
        }
        state.vars = state.vars.remove(key);
        true
    }

    /// Identity: `true` iff both handles alias one context.
    pub(crate) fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

struct ExitGuard<'a> {
    ctx: &'a Context,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        let _ = self.ctx.exit();
    }
}

/// `true` iff both handles point at the same stored value.
pub(crate) fn same_value(a: &AnyValue, b: &AnyValue) -> bool {
    ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

// ---------------------------------------------------------------------------
// Trait impls
// ---------------------------------------------------------------------------

impl Clone for Context {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Context")
            .field("len", &state.vars.len())
            .field("entered", &state.entered)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Context {
    /// Two contexts are equal iff they bind the same variables to the
    /// same values (value identity, not value contents).
    fn eq(&self, other: &Self) -> bool {
        if self.same(other) {
            return true;
        }
        let (ours, theirs) = (self.vars(), other.vars());
        if ours.len() != theirs.len() {
            return false;
        }
        ours.iter()
            .all(|(key, value)| theirs.get(key).is_some_and(|found| same_value(value, found)))
    }
}

impl Eq for Context {}
