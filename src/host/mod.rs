//! The capability provider the capture pipeline runs against.
//!
//! [`HostRuntime`] is the seam to the runtime being debugged. [`Introspector`]
//! is the error-checked, buffer-scoped view of it that the rest of the crate
//! uses, and [`InMemoryHost`] is a complete in-process implementation for
//! tests and scenario replay.

mod introspect;
mod memory;
mod runtime;
pub mod scenario;
mod scoped;

pub use introspect::Introspector;
pub use memory::{
    CapturedEntry, CapturedValue, CommittedContext, HostOp, InMemoryHost, MethodSpec, SlotContent,
    StackFrame,
};
pub use runtime::{
    Allocation, BufferId, CallArg, FrameInfo, HostError, HostResult, HostRuntime, LineEntry,
    LocalVariableEntry, MethodKind, MethodNameBuffers, MethodRef, ObjectRef, ThreadRef, TypeRef,
};
pub use scoped::{MethodNames, Scoped};
