use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque reference to a loaded type. Resolved type handles are global and live
/// for the whole process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeRef(pub u64);

/// Opaque method identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodRef(pub u64);

/// The application thread an event was raised on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadRef(pub u64);

/// Opaque reference to a live object (exception, context, string, slot value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef(pub u64);

/// Identifies a buffer the host allocated on our behalf. Every buffer must be
/// handed back through [`HostRuntime::deallocate`] exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);

/// Host-level error code. Codes mirror the native tool interface numbering.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("code {code}")]
pub struct HostError {
    pub code: i32,
}

impl HostError {
    /// Managed-side failure; the reason is left pending on the calling thread.
    pub const PENDING: HostError = HostError { code: -1 };
    pub const INVALID_CLASS: HostError = HostError { code: 21 };
    pub const INVALID_METHODID: HostError = HostError { code: 23 };
    pub const TYPE_MISMATCH: HostError = HostError { code: 34 };
    pub const INVALID_SLOT: HostError = HostError { code: 35 };
    pub const MUST_POSSESS_CAPABILITY: HostError = HostError { code: 99 };
    pub const ABSENT_INFORMATION: HostError = HostError { code: 101 };
    pub const INVALID_OBJECT: HostError = HostError { code: 20 };
    pub const INVALID_THREAD: HostError = HostError { code: 10 };
    pub const OUT_OF_MEMORY: HostError = HostError { code: 110 };
    pub const INTERNAL: HostError = HostError { code: 113 };
}

pub type HostResult<T> = std::result::Result<T, HostError>;

/// A value the host allocated and which must be released after use.
#[derive(Debug)]
pub struct Allocation<T> {
    pub id: BufferId,
    pub value: T,
}

/// Name, descriptor and optional generic signature of a method, each in its
/// own host buffer.
#[derive(Debug)]
pub struct MethodNameBuffers {
    pub name: Allocation<String>,
    pub descriptor: Allocation<String>,
    pub generic: Option<Allocation<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEntry {
    pub start_location: i64,
    pub line_number: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalVariableEntry {
    pub slot: i32,
    pub name: String,
    pub signature: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub method: MethodRef,
    pub location: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Static,
    Instance,
}

/// Argument to a managed call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CallArg {
    Object(ObjectRef),
    Int(i32),
}

/// Capability provider implemented by the host runtime.
///
/// Lookups and reads may fail at any time; a failure never poisons the
/// provider, but managed-side failures (type/method lookup, construction,
/// static calls) leave an error pending on the calling thread which must be
/// drained with [`HostRuntime::take_pending_error`] before the next call.
/// Every operation is scoped to the thread it is given, never to whichever
/// thread happens to be executing.
pub trait HostRuntime: Send + Sync {
    /// Look up a type by internal name (`com/acme/Orders`).
    fn find_type(&self, thread: ThreadRef, name: &str) -> HostResult<TypeRef>;

    fn find_method(
        &self,
        thread: ThreadRef,
        owner: TypeRef,
        name: &str,
        descriptor: &str,
        kind: MethodKind,
    ) -> HostResult<MethodRef>;

    fn declaring_type(&self, method: MethodRef) -> HostResult<TypeRef>;

    /// Type signature in descriptor form (`Lcom/acme/Orders;`).
    fn type_signature(&self, ty: TypeRef) -> HostResult<Allocation<String>>;

    fn method_name(&self, method: MethodRef) -> HostResult<MethodNameBuffers>;

    fn method_modifiers(&self, method: MethodRef) -> HostResult<u32>;

    fn line_table(&self, method: MethodRef) -> HostResult<Allocation<Vec<LineEntry>>>;

    fn source_file_name(&self, ty: TypeRef) -> HostResult<Allocation<String>>;

    /// Up to `max_frames` frames of `thread`, innermost first, starting at `start_depth`.
    fn stack_trace(
        &self,
        thread: ThreadRef,
        start_depth: i32,
        max_frames: usize,
    ) -> HostResult<Vec<FrameInfo>>;

    fn local_variable_table(
        &self,
        method: MethodRef,
    ) -> HostResult<Allocation<Vec<LocalVariableEntry>>>;

    fn local_int(&self, thread: ThreadRef, depth: i32, slot: i32) -> HostResult<i32>;

    fn local_float(&self, thread: ThreadRef, depth: i32, slot: i32) -> HostResult<f32>;

    fn local_double(&self, thread: ThreadRef, depth: i32, slot: i32) -> HostResult<f64>;

    fn local_long(&self, thread: ThreadRef, depth: i32, slot: i32) -> HostResult<i64>;

    /// `Ok(None)` when the slot holds null.
    fn local_object(
        &self,
        thread: ThreadRef,
        depth: i32,
        slot: i32,
    ) -> HostResult<Option<ObjectRef>>;

    fn object_type(&self, thread: ThreadRef, object: ObjectRef) -> HostResult<TypeRef>;

    fn new_object(&self, thread: ThreadRef, ty: TypeRef, ctor: MethodRef) -> HostResult<ObjectRef>;

    fn new_string(&self, thread: ThreadRef, value: &str) -> HostResult<ObjectRef>;

    /// Invoke a static void method. Failures are only observable through
    /// [`HostRuntime::take_pending_error`].
    fn call_static_void(&self, thread: ThreadRef, owner: TypeRef, method: MethodRef, args: &[CallArg]);

    /// Describe and clear the error pending on `thread`, if any.
    fn take_pending_error(&self, thread: ThreadRef) -> Option<String>;

    fn deallocate(&self, id: BufferId);
}
