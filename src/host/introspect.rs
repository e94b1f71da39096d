use crate::{Error, Result};

use super::runtime::*;
use super::scoped::{MethodNames, Scoped};

/// Thread-bound view of the host used by one event invocation.
///
/// Wraps each introspection call so that failures come back as [`Error`]
/// values, host buffers come back as [`Scoped`] guards, and any error left
/// pending by a failed call is drained before the next call is made.
#[derive(Clone, Copy)]
pub struct Introspector<'h> {
    host: &'h dyn HostRuntime,
    thread: ThreadRef,
}

impl<'h> Introspector<'h> {
    pub fn new(host: &'h dyn HostRuntime, thread: ThreadRef) -> Self {
        Self { host, thread }
    }

    pub fn host(&self) -> &'h dyn HostRuntime {
        self.host
    }

    pub fn thread(&self) -> ThreadRef {
        self.thread
    }

    /// Drop any pending host error. Returns its description when there was one.
    pub fn drain_pending(&self) -> Option<String> {
        let pending = self.host.take_pending_error(self.thread);
        if let Some(ref description) = pending {
            tracing::debug!("Cleared pending host error on {:?}: {}", self.thread, description);
        }
        pending
    }

    fn checked<T>(&self, op: &'static str, result: HostResult<T>) -> Result<T> {
        result.map_err(|e| {
            self.drain_pending();
            Error::Introspection { op, source: e }
        })
    }

    pub fn declaring_type(&self, method: MethodRef) -> Result<TypeRef> {
        self.checked("GetMethodDeclaringClass", self.host.declaring_type(method))
    }

    pub fn type_signature(&self, ty: TypeRef) -> Result<Scoped<'h, String>> {
        let allocation = self.checked("GetClassSignature", self.host.type_signature(ty))?;
        Ok(Scoped::new(self.host, allocation))
    }

    pub fn method_names(&self, method: MethodRef) -> Result<MethodNames<'h>> {
        let buffers = self.checked("GetMethodName", self.host.method_name(method))?;
        Ok(MethodNames {
            name: Scoped::new(self.host, buffers.name),
            descriptor: Scoped::new(self.host, buffers.descriptor),
            generic: buffers.generic.map(|g| Scoped::new(self.host, g)),
        })
    }

    pub fn method_modifiers(&self, method: MethodRef) -> Result<u32> {
        self.checked("GetMethodModifiers", self.host.method_modifiers(method))
    }

    pub fn line_table(&self, method: MethodRef) -> Result<Scoped<'h, Vec<LineEntry>>> {
        let allocation = self.checked("GetLineNumberTable", self.host.line_table(method))?;
        Ok(Scoped::new(self.host, allocation))
    }

    pub fn source_file_name(&self, ty: TypeRef) -> Result<Scoped<'h, String>> {
        let allocation = self.checked("GetSourceFileName", self.host.source_file_name(ty))?;
        Ok(Scoped::new(self.host, allocation))
    }

    pub fn stack_trace(&self, max_frames: usize) -> Result<Vec<FrameInfo>> {
        self.checked(
            "GetStackTrace",
            self.host.stack_trace(self.thread, 0, max_frames),
        )
    }

    pub fn local_variable_table(
        &self,
        method: MethodRef,
    ) -> Result<Scoped<'h, Vec<LocalVariableEntry>>> {
        let allocation = self.checked(
            "GetLocalVariableTable",
            self.host.local_variable_table(method),
        )?;
        Ok(Scoped::new(self.host, allocation))
    }

    pub fn object_type(&self, object: ObjectRef) -> Result<TypeRef> {
        self.checked("GetObjectClass", self.host.object_type(self.thread, object))
    }

    pub fn new_object(&self, ty: TypeRef, ctor: MethodRef) -> Result<ObjectRef> {
        self.host
            .new_object(self.thread, ty, ctor)
            .map_err(|source| {
                self.drain_pending();
                Error::Allocation { what: "captured context", source }
            })
    }

    pub fn new_string(&self, value: &str) -> Result<ObjectRef> {
        self.host.new_string(self.thread, value).map_err(|source| {
            self.drain_pending();
            Error::Allocation { what: "string", source }
        })
    }

    /// Call a static void method and surface anything it left pending.
    pub fn call_static_void(
        &self,
        op: &'static str,
        owner: TypeRef,
        method: MethodRef,
        args: &[CallArg],
    ) -> Result<()> {
        self.host.call_static_void(self.thread, owner, method, args);
        match self.host.take_pending_error(self.thread) {
            Some(reason) => Err(Error::SinkCall { op, reason }),
            None => Ok(()),
        }
    }
}
