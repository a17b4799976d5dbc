//! Context variables and restore tokens.

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::context::{self, AnyValue, Context};
use crate::error::ContextError;
use crate::hash::{TrieHash, fold_hash, fold_u64};

/// Monotonic source of per-variable identity bits for hash mixing.
static NEXT_VAR_ID: AtomicU64 = AtomicU64::new(1);

/// Mixes a fresh unique id into the name hash.
///
/// Distinct variables with equal names must land on different trie paths,
/// and sequentially created variables must spread across the root level;
/// −1 stays reserved.
fn generate_hash(name: &str) -> i32 {
    let id = NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed);
    let mixed = fold_hash(name) ^ fold_u64(id);
    if mixed == -1 { -2 } else { mixed }
}

struct VarInner {
    name: String,
    default: Option<AnyValue>,
    hash: i32,
    cache: Mutex<Option<VarCache>>,
}

/// Last successful lookup, keyed by reading thread and context version.
///
/// Valid only while both match: any enter, exit or set on the thread
/// bumps the version and implicitly invalidates the entry. The mutex
/// orders the triple as one unit across threads.
struct VarCache {
    value: AnyValue,
    thread: ThreadId,
    version: u64,
}

// ---------------------------------------------------------------------------
// VarKey
// ---------------------------------------------------------------------------

/// Type-erased handle identifying a context variable in a binding map.
///
/// Keys compare by variable identity — two variables with the same name
/// are different keys — and carry the trie hash precomputed at variable
/// creation.
#[derive(Clone)]
pub struct VarKey {
    inner: Arc<VarInner>,
}

impl VarKey {
    /// The variable's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }
}

impl PartialEq for VarKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for VarKey {}

impl TrieHash for VarKey {
    fn trie_hash(&self) -> i32 {
        self.inner.hash
    }
}

impl fmt::Debug for VarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VarKey").field(&self.name()).finish()
    }
}

// ---------------------------------------------------------------------------
// ContextVar
// ---------------------------------------------------------------------------

/// A typed variable whose value depends on the calling thread's current
/// [`Context`].
///
/// Reads hit a per-variable cache first: the last looked-up value is
/// remembered together with the reading thread and its context version,
/// so repeated `get`s between context changes skip the trie walk.
///
/// Create variables at module or application scope, not per call site —
/// a variable's identity is the handle itself.
pub struct ContextVar<T> {
    key: VarKey,
    _value: PhantomData<fn(T) -> T>,
}

impl<T> Clone for ContextVar<T> {
    fn clone(&self) -> Self {
        Self { key: self.key.clone(), _value: PhantomData }
    }
}

impl<T> PartialEq for ContextVar<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for ContextVar<T> {}

impl<T> fmt::Debug for ContextVar<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextVar")
            .field("name", &self.key.name())
            .field("default", &self.key.inner.default.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> ContextVar<T> {
    /// Creates a variable with no default.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self::build(name, None)
    }

    /// Creates a variable that falls back to `default` when unbound.
    #[must_use]
    pub fn with_default(name: &str, default: T) -> Self {
        Self::build(name, Some(Arc::new(default) as AnyValue))
    }

    fn build(name: &str, default: Option<AnyValue>) -> Self {
        let inner = Arc::new(VarInner {
            name: name.to_owned(),
            default,
            hash: generate_hash(name),
            cache: Mutex::new(None),
        });
        Self { key: VarKey { inner }, _value: PhantomData }
    }

    /// The variable's name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.key.name()
    }

    /// The map key identifying this variable.
    #[must_use]
    pub fn key(&self) -> &VarKey {
        &self.key
    }

    /// Returns the value for this variable in the current context,
    /// falling back to the variable's default.
    ///
    /// # Errors
    ///
    /// [`ContextError::Unbound`] when there is neither a binding nor a
    /// default.
    pub fn get(&self) -> Result<Arc<T>, ContextError> {
        match self.lookup() {
            Some(value) => Ok(downcast(value)),
            None => match &self.key.inner.default {
                Some(default) => Ok(downcast(Arc::clone(default))),
                None => Err(ContextError::Unbound { name: self.name().to_owned() }),
            },
        }
    }

    /// Like [`get`](Self::get), but returns `default` when the variable
    /// is unbound — the explicit default wins over the variable's own.
    pub fn get_or(&self, default: T) -> Arc<T> {
        self.lookup().map_or_else(|| Arc::new(default), downcast)
    }

    /// Binds `value` in the current context.
    ///
    /// Returns a token that [`reset`](Self::reset) accepts exactly once
    /// to restore the pre-set state. Installs an implicit context if the
    /// thread has none.
    #[must_use = "the returned token is the only way to undo this set"]
    pub fn set(&self, value: T) -> Token<T> {
        let ctx = context::current_or_implicit();
        let old = {
            let vars = ctx.vars();
            vars.get(&self.key).cloned()
        };
        let token = Token {
            ctx: ctx.clone(),
            var: self.clone(),
            old,
            used: Cell::new(false),
        };
        self.store(&ctx, Arc::new(value));
        token
    }

    /// Restores the binding recorded by `token`: rebinds the old value,
    /// or unbinds the variable if it was unbound before the set.
    ///
    /// # Errors
    ///
    /// [`ContextError::TokenUsed`] on a second reset with the same token;
    /// [`ContextError::TokenVarMismatch`] /
    /// [`ContextError::TokenContextMismatch`] when the token belongs to a
    /// different variable or context; [`ContextError::Unbound`] when the
    /// binding to delete is already gone.
    pub fn reset(&self, token: &Token<T>) -> Result<(), ContextError> {
        if token.used.get() {
            return Err(ContextError::TokenUsed);
        }
        if token.var.key != self.key {
            return Err(ContextError::TokenVarMismatch);
        }
        let ctx = context::current_or_implicit();
        if !ctx.same(&token.ctx) {
            return Err(ContextError::TokenContextMismatch);
        }

        token.used.set(true);
        match &token.old {
            Some(old) => {
                self.store(&ctx, Arc::clone(old));
                Ok(())
            }
            None => self.unbind(&ctx),
        }
    }

    /// Writes the binding and refreshes the cache under the new version.
    fn store(&self, ctx: &Context, value: AnyValue) {
        ctx.insert_binding(self.key.clone(), Arc::clone(&value));
        let version = context::bump_thread_version();
        *self.key.inner.cache.lock() = Some(VarCache {
            value,
            thread: thread::current().id(),
            version,
        });
    }

    /// Deletes the binding and drops the cache entry.
    fn unbind(&self, ctx: &Context) -> Result<(), ContextError> {
        *self.key.inner.cache.lock() = None;
        if !ctx.remove_binding(&self.key) {
            return Err(ContextError::Unbound { name: self.name().to_owned() });
        }
        context::bump_thread_version();
        Ok(())
    }

    /// Looks the binding up in the current context, consulting the
    /// fast-path cache first. Never touches defaults and never installs
    /// an implicit context.
    fn lookup(&self) -> Option<AnyValue> {
        let thread = thread::current().id();
        let version = context::thread_version();

        {
            let cache = self.key.inner.cache.lock();
            if let Some(cached) = cache.as_ref()
                && cached.thread == thread
                && cached.version == version
            {
                return Some(Arc::clone(&cached.value));
            }
        }

        let ctx = context::current_context()?;
        let value = {
            let vars = ctx.vars();
            vars.get(&self.key).cloned()
        }?;
        *self.key.inner.cache.lock() = Some(VarCache {
            value: Arc::clone(&value),
            thread,
            version,
        });
        Some(value)
    }
}

fn downcast<T: Send + Sync + 'static>(value: AnyValue) -> Arc<T> {
    match value.downcast::<T>() {
        Ok(typed) => typed,
        Err(_) => unreachable!("a binding always holds its variable's value type"),
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// Single-use receipt recording a variable's binding state before a
/// [`set`](ContextVar::set).
///
/// A token restores exactly the state the set observed, exactly once, and
/// only in the context the set ran in.
pub struct Token<T> {
    ctx: Context,
    var: ContextVar<T>,
    old: Option<AnyValue>,
    used: Cell<bool>,
}

impl<T: Send + Sync + 'static> Token<T> {
    /// The variable this token belongs to.
    #[must_use]
    pub fn var(&self) -> &ContextVar<T> {
        &self.var
    }

    /// The value the variable had before the set, or `None` if it was
    /// unbound.
    #[must_use]
    pub fn old_value(&self) -> Option<Arc<T>> {
        self.old.clone().map(downcast)
    }
}

impl<T> fmt::Debug for Token<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("var", &self.var.key.name())
            .field("used", &self.used.get())
            .finish_non_exhaustive()
    }
}
