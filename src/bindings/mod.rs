//! Lazily resolved, process-wide handles to the managed sink.

mod cache;
mod sink;

pub use cache::{Binding, BindingCache, Handle};
pub use sink::{SinkBindings, SinkOp, CONTEXT_INIT, CONTEXT_TYPE, HELPER_TYPE};
