use crate::host::{HostRuntime, MethodRef, ThreadRef, TypeRef};
use crate::{Error, Result};

use super::cache::{Binding, BindingCache};

/// Static helper the agent's managed side exposes for building contexts.
pub const HELPER_TYPE: &str = "datadog/trace/bootstrap/debugger/CapturedContextHelper";
/// The captured-context record type itself.
pub const CONTEXT_TYPE: &str = "datadog/trace/bootstrap/debugger/CapturedContext";

const ADD_OBJECT_DESCRIPTOR: &str = "(Ldatadog/trace/bootstrap/debugger/CapturedContext;Ljava/lang/String;Ljava/lang/String;Ljava/lang/Object;)V";
const ADD_INT_DESCRIPTOR: &str =
    "(Ldatadog/trace/bootstrap/debugger/CapturedContext;Ljava/lang/String;Ljava/lang/String;I)V";
const COMMIT_DESCRIPTOR: &str =
    "(Ldatadog/trace/bootstrap/debugger/CapturedContext;Ljava/lang/String;I)V";
const ADD_EXCEPTION_DESCRIPTOR: &str =
    "(Ldatadog/trace/bootstrap/debugger/CapturedContext;Ljava/lang/Throwable;)V";

pub const CONTEXT_INIT: Binding = Binding::Constructor {
    owner: CONTEXT_TYPE,
    descriptor: "()V",
};

/// Operations the sink helper exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkOp {
    AddArgumentObject,
    AddArgumentInt,
    AddLocalObject,
    AddLocalInt,
    Commit,
    AttachException,
}

impl SinkOp {
    pub const ALL: [SinkOp; 6] = [
        SinkOp::AddArgumentObject,
        SinkOp::AddArgumentInt,
        SinkOp::AddLocalObject,
        SinkOp::AddLocalInt,
        SinkOp::Commit,
        SinkOp::AttachException,
    ];

    pub fn method_name(self) -> &'static str {
        match self {
            SinkOp::AddArgumentObject | SinkOp::AddArgumentInt => "addArg",
            SinkOp::AddLocalObject | SinkOp::AddLocalInt => "addLocal",
            SinkOp::Commit => "commit",
            SinkOp::AttachException => "addException",
        }
    }

    pub fn descriptor(self) -> &'static str {
        match self {
            SinkOp::AddArgumentObject | SinkOp::AddLocalObject => ADD_OBJECT_DESCRIPTOR,
            SinkOp::AddArgumentInt | SinkOp::AddLocalInt => ADD_INT_DESCRIPTOR,
            SinkOp::Commit => COMMIT_DESCRIPTOR,
            SinkOp::AttachException => ADD_EXCEPTION_DESCRIPTOR,
        }
    }

    pub fn binding(self) -> Binding {
        Binding::StaticMethod {
            owner: HELPER_TYPE,
            name: self.method_name(),
            descriptor: self.descriptor(),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Snapshot of the sink handles available to one event.
///
/// The helper type, the context type, its constructor and `commit` are
/// required; the remaining operations may still be unresolved, in which case
/// the corresponding calls are skipped for this event.
#[derive(Debug, Clone)]
pub struct SinkBindings {
    pub helper: TypeRef,
    pub context_type: TypeRef,
    pub context_init: MethodRef,
    ops: [Option<MethodRef>; 6],
}

impl SinkBindings {
    pub fn resolve(cache: &BindingCache, host: &dyn HostRuntime, thread: ThreadRef) -> Result<Self> {
        let helper = cache
            .resolve(host, thread, Binding::Type(HELPER_TYPE))
            .and_then(|h| h.as_type())
            .ok_or_else(|| Error::UnresolvedBinding(HELPER_TYPE.to_string()))?;

        let mut ops = [None; 6];
        for op in SinkOp::ALL {
            ops[op.index()] = cache
                .resolve(host, thread, op.binding())
                .and_then(|h| h.as_method());
        }

        let context_type = cache
            .resolve(host, thread, Binding::Type(CONTEXT_TYPE))
            .and_then(|h| h.as_type())
            .ok_or_else(|| Error::UnresolvedBinding(CONTEXT_TYPE.to_string()))?;
        let context_init = cache
            .resolve(host, thread, CONTEXT_INIT)
            .and_then(|h| h.as_method())
            .ok_or_else(|| Error::UnresolvedBinding(CONTEXT_INIT.to_string()))?;

        let bindings = Self { helper, context_type, context_init, ops };
        if bindings.op(SinkOp::Commit).is_none() {
            return Err(Error::UnresolvedBinding(SinkOp::Commit.binding().to_string()));
        }
        Ok(bindings)
    }

    pub fn op(&self, op: SinkOp) -> Option<MethodRef> {
        self.ops[op.index()]
    }
}
