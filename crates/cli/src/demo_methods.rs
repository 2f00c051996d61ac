//! A handful of built-in action methods (§6.4) for the demo CLI, since the
//! rule file's own method definitions are out of scope here. Anything a
//! manifest action calls that isn't one of these falls through to the
//! default handler, which just logs and succeeds.

use dres_resolver::ResolverEngine;
use dres_store::FactStore;
use dres_vm::{MethodOutcome, StackValue};
use std::rc::Rc;
use tracing::info;

fn display_args(args: &[StackValue]) -> String {
    args.iter()
        .map(|v| match v {
            StackValue::Nil => "nil".to_string(),
            StackValue::Integer(i) => i.to_string(),
            StackValue::Double(d) => d.to_string(),
            StackValue::String(s) => s.clone(),
            StackValue::Global(g) => format!("@{}", g.name()),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Register the demo method set into `engine` (§6.4's `add_method`/
/// `set_default` surface).
pub fn install<S: FactStore>(engine: &mut ResolverEngine<S>) {
    engine
        .add_method(
            "log",
            Rc::new(|_, args| {
                info!(args = %display_args(args), "log");
                MethodOutcome::Success(StackValue::Nil)
            }),
        )
        .expect("built-in method names do not collide with themselves");

    engine
        .add_method(
            "fail",
            Rc::new(|_, args| MethodOutcome::Exception {
                code: -1,
                message: format!("demo failure: {}", display_args(args)),
            }),
        )
        .expect("built-in method names do not collide with themselves");

    engine.set_default_method(Rc::new(|name, args| {
        info!(method = name, args = %display_args(args), "unhandled action method, treated as a no-op");
        MethodOutcome::Success(StackValue::Nil)
    }));
}
