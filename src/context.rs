//! Building captured contexts through the sink helper.

use crate::bindings::{SinkBindings, SinkOp};
use crate::extract::{ExtractedEntry, SlotValue};
use crate::host::{CallArg, Introspector, ObjectRef};
use crate::Result;

/// A context that is still accepting entries.
///
/// Deliberately neither `Clone` nor `Copy`: [`SinkAdapter::commit`] consumes
/// it, so nothing can reach the context once the sink owns it.
#[derive(Debug)]
pub struct OpenContext {
    object: ObjectRef,
    entries: usize,
    exception_attached: bool,
}

impl OpenContext {
    pub fn object(&self) -> ObjectRef {
        self.object
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn exception_attached(&self) -> bool {
        self.exception_attached
    }
}

/// Summary of a context handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedFrame {
    pub object: ObjectRef,
    pub entries: usize,
    pub exception_attached: bool,
}

/// Sink operation and call argument for a decoded value, or `None` when the
/// value has no sink representation (floating point, long, array).
pub fn route(value: SlotValue, is_argument: bool) -> Option<(SinkOp, CallArg)> {
    match (value, is_argument) {
        (SlotValue::Int32(v), true) => Some((SinkOp::AddArgumentInt, CallArg::Int(v))),
        (SlotValue::Int32(v), false) => Some((SinkOp::AddLocalInt, CallArg::Int(v))),
        (SlotValue::Object(obj), true) => Some((SinkOp::AddArgumentObject, CallArg::Object(obj))),
        (SlotValue::Object(obj), false) => Some((SinkOp::AddLocalObject, CallArg::Object(obj))),
        (SlotValue::Float32(_) | SlotValue::Float64(_) | SlotValue::Int64(_), _) => None,
        (SlotValue::Array, _) => None,
    }
}

pub struct SinkAdapter<'a> {
    introspector: Introspector<'a>,
    bindings: &'a SinkBindings,
}

impl<'a> SinkAdapter<'a> {
    pub fn new(introspector: Introspector<'a>, bindings: &'a SinkBindings) -> Self {
        Self { introspector, bindings }
    }

    pub fn begin_frame(&self) -> Result<OpenContext> {
        let object = self
            .introspector
            .new_object(self.bindings.context_type, self.bindings.context_init)?;
        Ok(OpenContext { object, entries: 0, exception_attached: false })
    }

    pub fn attach_exception(&self, context: &mut OpenContext, exception: ObjectRef) -> Result<()> {
        let args = [CallArg::Object(context.object), CallArg::Object(exception)];
        if self.call(SinkOp::AttachException, &args)? {
            context.exception_attached = true;
        }
        Ok(())
    }

    /// Forward one decoded entry. Returns whether a sink call was made.
    pub fn add_entry(&self, context: &mut OpenContext, entry: &ExtractedEntry<'_>) -> Result<bool> {
        let Some((op, value)) = route(entry.value, entry.is_argument) else {
            tracing::trace!("No sink operation for {} ({:?})", entry.name, entry.value);
            return Ok(false);
        };
        let name = self.introspector.new_string(entry.name)?;
        let signature = self.introspector.new_string(entry.signature)?;
        let args = [
            CallArg::Object(context.object),
            CallArg::Object(name),
            CallArg::Object(signature),
            value,
        ];
        let called = self.call(op, &args)?;
        if called {
            context.entries += 1;
        }
        Ok(called)
    }

    /// Hand the context to the sink.
    pub fn commit(&self, context: OpenContext, source_file: &str, line: i32) -> Result<CommittedFrame> {
        let file = self.introspector.new_string(source_file)?;
        self.call(
            SinkOp::Commit,
            &[CallArg::Object(context.object), CallArg::Object(file), CallArg::Int(line)],
        )?;
        Ok(CommittedFrame {
            object: context.object,
            entries: context.entries,
            exception_attached: context.exception_attached,
        })
    }

    /// Invoke `op` if it resolved. `Ok(false)` when it is still unresolved.
    fn call(&self, op: SinkOp, args: &[CallArg]) -> Result<bool> {
        let Some(method) = self.bindings.op(op) else {
            tracing::debug!("Sink operation {:?} unresolved, skipping", op);
            return Ok(false);
        };
        self.introspector
            .call_static_void(op.method_name(), self.bindings.helper, method, args)?;
        Ok(true)
    }
}
