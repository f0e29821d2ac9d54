//! Runtime value universe shared by the evaluator.
//!
//! `object` holds the object kinds and the shared `Handle` they live behind,
//! `compare` the polymorphic equality/ordering predicates, `context` the
//! output-stream abstraction, and `error` the evaluation error type.
pub mod compare;
pub mod context;
pub mod error;
pub mod object;

use std::collections::HashMap;

/// One call frame's bindings: identifier to handle, no lexical chaining.
///
/// A fresh scope is built per method call; instance fields live in a scope
/// owned by the instance itself.
pub type Scope = HashMap<String, object::Handle>;
