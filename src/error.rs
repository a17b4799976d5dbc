//! Error type for the context layer.
//!
//! Map operations are total and have no error surface; everything fallible
//! lives in the context/variable protocol.

use thiserror::Error;

/// Protocol and lookup failures of [`Context`](crate::Context) and
/// [`ContextVar`](crate::ContextVar) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ContextError {
    /// `enter` on a context that is already on some thread's stack.
    #[error("cannot enter context: it is already entered")]
    AlreadyEntered,

    /// `exit` on a context that has not been entered.
    #[error("cannot exit context: it has not been entered")]
    NotEntered,

    /// `exit` on an entered context that is not the thread's current one.
    #[error("cannot exit context: the thread's current context is a different one")]
    NotCurrent,

    /// `reset` with a token that has already been spent.
    #[error("token has already been used once")]
    TokenUsed,

    /// `reset` with a token created by a different variable.
    #[error("token was created by a different context variable")]
    TokenVarMismatch,

    /// `reset` with a token created in a different context.
    #[error("token was created in a different context")]
    TokenContextMismatch,

    /// Variable read with no binding and no default to fall back to.
    #[error("context variable {name:?} has no value and no default")]
    Unbound {
        /// Name of the unbound variable.
        name: String,
    },
}
