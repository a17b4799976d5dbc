//! Context stacking, the enter/exit protocol, and mapping reads.
//!
//! The test harness runs every test on its own thread, so each test sees
//! a fresh thread-local context stack.

use std::panic::{self, AssertUnwindSafe};

use crate::{Context, ContextError, ContextVar};

#[test]
fn new_context_is_empty() {
    let ctx = Context::new();
    assert_eq!(ctx.len(), 0);
    assert!(ctx.is_empty());
}

/// A fresh entered context hides outer bindings; exiting restores them.
#[test]
fn enter_exit_scopes_bindings() {
    let var = ContextVar::with_default("x", 0_i32);
    let _outer = var.set(10);

    let ctx = Context::new();
    ctx.enter().expect("fresh context");
    assert_eq!(*var.get().expect("default"), 0);

    let _inner = var.set(20);
    assert_eq!(*var.get().expect("binding"), 20);

    ctx.exit().expect("current context");
    assert_eq!(*var.get().expect("outer binding"), 10);
}

/// Full stacking round trip: set, enter, set, reset, exit.
#[test]
fn stacked_set_reset_exit() {
    let var = ContextVar::with_default("x", 0_i32);
    let _t1 = var.set(10);

    let ctx1 = Context::new();
    ctx1.enter().expect("fresh context");
    assert_eq!(*var.get().expect("default"), 0);

    let t2 = var.set(20);
    assert_eq!(*var.get().expect("binding"), 20);

    var.reset(&t2).expect("valid token");
    assert_eq!(*var.get().expect("default again"), 0);

    ctx1.exit().expect("current context");
    assert_eq!(*var.get().expect("outer binding"), 10);
}

#[test]
fn reenter_fails() {
    let ctx = Context::new();
    ctx.enter().expect("fresh context");
    assert_eq!(ctx.enter(), Err(ContextError::AlreadyEntered));
    ctx.exit().expect("current context");
}

#[test]
fn exit_without_enter_fails() {
    let ctx = Context::new();
    assert_eq!(ctx.exit(), Err(ContextError::NotEntered));
}

/// Exiting out of stack order is rejected and leaves the stack intact.
#[test]
fn exit_out_of_order_fails() {
    let outer = Context::new();
    let inner = Context::new();
    outer.enter().expect("fresh context");
    inner.enter().expect("fresh context");

    assert_eq!(outer.exit(), Err(ContextError::NotCurrent));

    inner.exit().expect("current context");
    outer.exit().expect("current context");
}

#[test]
fn nested_contexts_unwind_in_order() {
    let var = ContextVar::with_default("depth", 0_i32);
    let (a, b) = (Context::new(), Context::new());

    a.enter().expect("fresh context");
    let _ta = var.set(1);
    b.enter().expect("fresh context");
    let _tb = var.set(2);

    assert_eq!(*var.get().expect("inner"), 2);
    b.exit().expect("current context");
    assert_eq!(*var.get().expect("outer"), 1);
    a.exit().expect("current context");
    assert_eq!(*var.get().expect("default"), 0);
}

/// `run` enters around the closure and exits afterwards.
#[test]
fn run_scopes_closure() {
    let var = ContextVar::with_default("x", 0_i32);
    let _outer = var.set(1);

    let ctx = Context::new();
    let result = ctx
        .run(|| {
            let _t = var.set(99);
            *var.get().expect("binding")
        })
        .expect("fresh context");

    assert_eq!(result, 99);
    assert_eq!(*var.get().expect("outer binding"), 1);
}

#[test]
fn run_on_entered_context_fails() {
    let ctx = Context::new();
    ctx.enter().expect("fresh context");
    assert_eq!(ctx.run(|| ()), Err(ContextError::AlreadyEntered));
    ctx.exit().expect("current context");
}

/// A panic inside `run` still exits the context.
#[test]
fn run_exits_on_panic() {
    let var = ContextVar::with_default("x", 0_i32);
    let _outer = var.set(7);

    let ctx = Context::new();
    let caught = panic::catch_unwind(AssertUnwindSafe(|| {
        let _ = ctx.run(|| {
            let _t = var.set(1);
            panic!("boom");
        });
    }));
    assert!(caught.is_err());

    // The stack is restored and the context is re-enterable.
    assert_eq!(*var.get().expect("outer binding"), 7);
    ctx.run(|| ()).expect("context was exited by the unwind");
}

/// `copy` shares bindings but is an independent context.
#[test]
fn copy_is_independent() {
    let var = ContextVar::<i32>::new("x");
    let original = Context::new();
    original.run(|| drop(var.set(5))).expect("fresh context");
    assert_eq!(original.len(), 1);

    let copied = original.copy();
    assert_eq!(copied, original);

    copied.run(|| drop(var.set(6))).expect("fresh context");
    assert_ne!(copied, original);
    assert_eq!(original.get(var.key()).map(|v| *as_i32(&v)), Some(5));
    assert_eq!(copied.get(var.key()).map(|v| *as_i32(&v)), Some(6));
}

fn as_i32(value: &crate::AnyValue) -> std::sync::Arc<i32> {
    value.clone().downcast::<i32>().unwrap_or_else(|_| panic!("not an i32 binding"))
}

#[test]
fn copy_current_captures_bindings() {
    let var = ContextVar::<i32>::new("x");
    let _t = var.set(11);

    let snapshot = Context::copy_current();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.get(var.key()).map(|v| *as_i32(&v)), Some(11));
}

/// Mapping reads see this context's bindings, not the current ones.
#[test]
fn mapping_reads() {
    let x = ContextVar::<i32>::new("x");
    let y = ContextVar::<&'static str>::new("y");

    let ctx = Context::new();
    ctx.run(|| {
        let _tx = x.set(1);
        let _ty = y.set("two");
    })
    .expect("fresh context");

    assert_eq!(ctx.len(), 2);
    assert!(ctx.contains(x.key()));
    assert!(ctx.contains(y.key()));

    let keys = ctx.keys();
    assert_eq!(keys.len(), 2);
    assert!(keys.iter().any(|k| k.name() == "x"));
    assert!(keys.iter().any(|k| k.name() == "y"));

    assert_eq!(ctx.values().len(), 2);
    assert_eq!(ctx.items().len(), 2);

    // `get_or` falls back to the explicit default for unbound keys only.
    let unbound = ContextVar::<i32>::new("z");
    assert_eq!(*as_i32(&ctx.get_or(x.key(), std::sync::Arc::new(0_i32))), 1);
    assert_eq!(*as_i32(&ctx.get_or(unbound.key(), std::sync::Arc::new(9_i32))), 9);

    // Reads of `ctx` ignore the (different) current context.
    let other = Context::new();
    other
        .run(|| {
            assert_eq!(ctx.len(), 2);
            assert!(ctx.contains(x.key()));
        })
        .expect("fresh context");
}

#[test]
fn contexts_compare_by_bindings() {
    let var = ContextVar::<i32>::new("x");

    let a = Context::new();
    let b = Context::new();
    assert_eq!(a, b);

    a.run(|| drop(var.set(1))).expect("fresh context");
    assert_ne!(a, b);

    // A copy shares the same value handles, so it compares equal.
    assert_eq!(a, a.copy());
}
