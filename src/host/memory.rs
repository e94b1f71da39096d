use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::bindings::{SinkOp, CONTEXT_TYPE, HELPER_TYPE};
use crate::signature::ACC_STATIC;

use super::runtime::*;

const STRING_TYPE: &str = "java/lang/String";

/// Host operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostOp {
    FindType,
    FindMethod,
    DeclaringType,
    TypeSignature,
    MethodName,
    MethodModifiers,
    LineTable,
    SourceFileName,
    StackTrace,
    LocalVariableTable,
    ObjectType,
    NewObject,
    NewString,
}

/// Content of a local slot in a simulated frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotContent {
    Int(i32),
    Float(f32),
    Double(f64),
    Long(i64),
    Object(Option<ObjectRef>),
}

/// Method definition handed to [`InMemoryHost::define_method`].
#[derive(Debug, Clone, Default)]
pub struct MethodSpec {
    pub name: String,
    pub descriptor: String,
    pub generic: Option<String>,
    pub modifiers: u32,
    pub line_table: Option<Vec<LineEntry>>,
    pub locals: Vec<LocalVariableEntry>,
}

impl MethodSpec {
    pub fn new(name: &str, descriptor: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            ..Default::default()
        }
    }

    pub fn modifiers(mut self, modifiers: u32) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn line_table(mut self, entries: &[(i64, i32)]) -> Self {
        self.line_table = Some(
            entries
                .iter()
                .map(|&(start_location, line_number)| LineEntry { start_location, line_number })
                .collect(),
        );
        self
    }

    pub fn local(mut self, slot: i32, name: &str, signature: &str) -> Self {
        self.locals.push(LocalVariableEntry {
            slot,
            name: name.to_string(),
            signature: signature.to_string(),
        });
        self
    }
}

/// One simulated activation record.
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub method: MethodRef,
    pub location: i64,
    pub slots: HashMap<i32, SlotContent>,
}

impl StackFrame {
    pub fn new(method: MethodRef, location: i64) -> Self {
        Self { method, location, slots: HashMap::new() }
    }

    pub fn slot(mut self, slot: i32, content: SlotContent) -> Self {
        self.slots.insert(slot, content);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapturedValue {
    Int(i32),
    Object(ObjectRef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedEntry {
    pub name: String,
    pub signature: String,
    pub value: CapturedValue,
}

/// A context as the sink received it at commit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedContext {
    pub context: ObjectRef,
    pub thread: ThreadRef,
    pub arguments: Vec<CapturedEntry>,
    pub locals: Vec<CapturedEntry>,
    pub exception: Option<ObjectRef>,
    pub exception_attachments: usize,
    pub source_file: String,
    pub line: i32,
}

#[derive(Debug)]
struct TypeDef {
    name: String,
    source_file: Option<String>,
}

#[derive(Debug)]
struct MethodDef {
    owner: TypeRef,
    spec: MethodSpec,
}

#[derive(Debug, Default)]
struct ContextRecord {
    thread: Option<ThreadRef>,
    arguments: Vec<CapturedEntry>,
    locals: Vec<CapturedEntry>,
    exception: Option<ObjectRef>,
    exception_attachments: usize,
    committed: bool,
}

#[derive(Debug)]
enum HeapObject {
    Plain(TypeRef),
    Str(String),
    Context(ContextRecord),
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    types: HashMap<TypeRef, TypeDef>,
    types_by_name: HashMap<String, TypeRef>,
    methods: HashMap<MethodRef, MethodDef>,
    stacks: HashMap<ThreadRef, Vec<StackFrame>>,
    heap: HashMap<ObjectRef, HeapObject>,
    outstanding: HashMap<BufferId, &'static str>,
    double_releases: usize,
    pending: HashMap<ThreadRef, String>,
    calls_with_pending_error: usize,
    post_commit_mutations: usize,
    failing: HashSet<HostOp>,
    raising_sink_methods: HashSet<String>,
    lookups: HashMap<String, usize>,
    sink_calls: Vec<(ThreadRef, &'static str)>,
    committed: Vec<CommittedContext>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn allocate<T>(&mut self, what: &'static str, value: T) -> Allocation<T> {
        let id = BufferId(self.next_id());
        self.outstanding.insert(id, what);
        Allocation { id, value }
    }

    fn fail_if(&self, op: HostOp, error: HostError) -> HostResult<()> {
        if self.failing.contains(&op) {
            Err(error)
        } else {
            Ok(())
        }
    }

    /// Managed-side entry: track misuse, then optionally fail with a pending error.
    fn enter_managed(&mut self, thread: ThreadRef, op: HostOp, reason: &str) -> HostResult<()> {
        if self.pending.contains_key(&thread) {
            self.calls_with_pending_error += 1;
        }
        if self.failing.contains(&op) {
            return Err(self.raise(thread, reason.to_string()));
        }
        Ok(())
    }

    fn raise(&mut self, thread: ThreadRef, reason: String) -> HostError {
        self.pending.insert(thread, reason);
        HostError::PENDING
    }

    fn frame(&self, thread: ThreadRef, depth: i32) -> HostResult<&StackFrame> {
        let stack = self.stacks.get(&thread).ok_or(HostError::INVALID_THREAD)?;
        usize::try_from(depth)
            .ok()
            .and_then(|d| stack.get(d))
            .ok_or(HostError::INVALID_SLOT)
    }

    fn slot(&self, thread: ThreadRef, depth: i32, slot: i32) -> HostResult<SlotContent> {
        self.frame(thread, depth)?
            .slots
            .get(&slot)
            .copied()
            .ok_or(HostError::INVALID_SLOT)
    }

    fn string(&self, object: ObjectRef) -> Option<String> {
        match self.heap.get(&object) {
            Some(HeapObject::Str(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn define_type(&mut self, name: &str, source_file: Option<&str>) -> TypeRef {
        if let Some(ty) = self.types_by_name.get(name) {
            return *ty;
        }
        let ty = TypeRef(self.next_id());
        self.types.insert(
            ty,
            TypeDef {
                name: name.to_string(),
                source_file: source_file.map(str::to_string),
            },
        );
        self.types_by_name.insert(name.to_string(), ty);
        ty
    }

    fn define_method(&mut self, owner: TypeRef, spec: MethodSpec) -> MethodRef {
        let method = MethodRef(self.next_id());
        self.methods.insert(method, MethodDef { owner, spec });
        method
    }

    /// Apply a sink helper call to the context it targets.
    fn dispatch_sink(&mut self, thread: ThreadRef, op: SinkOp, args: &[CallArg]) -> Result<(), String> {
        let context = match args.first() {
            Some(CallArg::Object(ctx)) => *ctx,
            _ => return Err("java.lang.NullPointerException: context".to_string()),
        };
        let text = |state: &State, index: usize| -> Result<String, String> {
            match args.get(index) {
                Some(CallArg::Object(obj)) => state
                    .string(*obj)
                    .ok_or_else(|| "java.lang.ClassCastException: not a String".to_string()),
                _ => Err("java.lang.NullPointerException".to_string()),
            }
        };

        let entry = match op {
            SinkOp::AddArgumentObject
            | SinkOp::AddArgumentInt
            | SinkOp::AddLocalObject
            | SinkOp::AddLocalInt => {
                let value = match args.get(3) {
                    Some(CallArg::Int(v)) => CapturedValue::Int(*v),
                    Some(CallArg::Object(obj)) => CapturedValue::Object(*obj),
                    None => return Err("java.lang.IllegalArgumentException".to_string()),
                };
                Some(CapturedEntry {
                    name: text(self, 1)?,
                    signature: text(self, 2)?,
                    value,
                })
            }
            _ => None,
        };
        let commit = match op {
            SinkOp::Commit => {
                let line = match args.get(2) {
                    Some(CallArg::Int(line)) => *line,
                    _ => return Err("java.lang.IllegalArgumentException".to_string()),
                };
                Some((text(self, 1)?, line))
            }
            _ => None,
        };

        let record = match self.heap.get_mut(&context) {
            Some(HeapObject::Context(record)) => record,
            _ => return Err("java.lang.ClassCastException: not a CapturedContext".to_string()),
        };
        if record.committed {
            self.post_commit_mutations += 1;
            return Ok(());
        }
        record.thread = Some(thread);
        match op {
            SinkOp::AddArgumentObject | SinkOp::AddArgumentInt => {
                record.arguments.extend(entry);
            }
            SinkOp::AddLocalObject | SinkOp::AddLocalInt => {
                record.locals.extend(entry);
            }
            SinkOp::AttachException => {
                record.exception = match args.get(1) {
                    Some(CallArg::Object(exception)) => Some(*exception),
                    _ => None,
                };
                record.exception_attachments += 1;
            }
            SinkOp::Commit => {
                record.committed = true;
                if let Some((source_file, line)) = commit {
                    let committed = CommittedContext {
                        context,
                        thread,
                        arguments: record.arguments.clone(),
                        locals: record.locals.clone(),
                        exception: record.exception,
                        exception_attachments: record.exception_attachments,
                        source_file,
                        line,
                    };
                    self.committed.push(committed);
                }
            }
        }
        Ok(())
    }
}

/// Scriptable in-process host runtime.
///
/// Emulates the capability provider together with the managed sink helper:
/// calls to the helper's static operations are applied to context objects and
/// committed contexts are recorded. Buffer releases, pending-error hygiene and
/// post-commit mutations are tracked so callers can verify the capture
/// pipeline's discipline. Used by the test suites and by `excapture replay`.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    state: Mutex<State>,
}

impl InMemoryHost {
    /// A host with no agent types loaded.
    pub fn new() -> Self {
        let host = Self::default();
        host.define_type(STRING_TYPE, Some("String.java"));
        host
    }

    /// A host with the context type and the sink helper loaded.
    pub fn with_sink() -> Self {
        let host = Self::new();
        let context = host.define_type(CONTEXT_TYPE, Some("CapturedContext.java"));
        host.define_method(context, MethodSpec::new("<init>", "()V"));
        let helper = host.define_type(HELPER_TYPE, Some("CapturedContextHelper.java"));
        for op in SinkOp::ALL {
            host.define_method(
                helper,
                MethodSpec::new(op.method_name(), op.descriptor()).modifiers(ACC_STATIC | 0x0001),
            );
        }
        host
    }

    pub fn define_type(&self, name: &str, source_file: Option<&str>) -> TypeRef {
        self.state.lock().unwrap().define_type(name, source_file)
    }

    pub fn define_method(&self, owner: TypeRef, spec: MethodSpec) -> MethodRef {
        self.state.lock().unwrap().define_method(owner, spec)
    }

    pub fn new_instance(&self, ty: TypeRef) -> ObjectRef {
        let mut state = self.state.lock().unwrap();
        let object = ObjectRef(state.next_id());
        state.heap.insert(object, HeapObject::Plain(ty));
        object
    }

    /// Install the stack of `thread`, innermost frame first.
    pub fn set_stack(&self, thread: ThreadRef, frames: Vec<StackFrame>) {
        self.state.lock().unwrap().stacks.insert(thread, frames);
    }

    pub fn fail(&self, op: HostOp) {
        self.state.lock().unwrap().failing.insert(op);
    }

    pub fn recover(&self, op: HostOp) {
        self.state.lock().unwrap().failing.remove(&op);
    }

    /// Make the helper method with this name raise when called.
    pub fn raise_in_sink(&self, method_name: &str) {
        self.state
            .lock()
            .unwrap()
            .raising_sink_methods
            .insert(method_name.to_string());
    }

    pub fn committed(&self) -> Vec<CommittedContext> {
        self.state.lock().unwrap().committed.clone()
    }

    pub fn committed_on(&self, thread: ThreadRef) -> Vec<CommittedContext> {
        self.committed().into_iter().filter(|c| c.thread == thread).collect()
    }

    /// Helper method names invoked on behalf of `thread`, in call order.
    pub fn sink_calls(&self, thread: ThreadRef) -> Vec<&'static str> {
        self.state
            .lock()
            .unwrap()
            .sink_calls
            .iter()
            .filter(|(t, _)| *t == thread)
            .map(|(_, name)| *name)
            .collect()
    }

    /// Buffers handed out and not yet released, by the operation that produced them.
    pub fn outstanding_buffers(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().outstanding.values().copied().collect()
    }

    pub fn double_releases(&self) -> usize {
        self.state.lock().unwrap().double_releases
    }

    pub fn pending_errors(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    /// Managed calls made while an error was still pending on the same thread.
    pub fn calls_with_pending_error(&self) -> usize {
        self.state.lock().unwrap().calls_with_pending_error
    }

    pub fn post_commit_mutations(&self) -> usize {
        self.state.lock().unwrap().post_commit_mutations
    }

    /// How many times the host was asked to look up `name` (type or method).
    pub fn lookups(&self, name: &str) -> usize {
        self.state.lock().unwrap().lookups.get(name).copied().unwrap_or(0)
    }
}

impl HostRuntime for InMemoryHost {
    fn find_type(&self, thread: ThreadRef, name: &str) -> HostResult<TypeRef> {
        let mut state = self.state.lock().unwrap();
        *state.lookups.entry(name.to_string()).or_default() += 1;
        state.enter_managed(thread, HostOp::FindType, "java.lang.OutOfMemoryError")?;
        match state.types_by_name.get(name) {
            Some(ty) => Ok(*ty),
            None => Err(state.raise(thread, format!("java.lang.NoClassDefFoundError: {}", name))),
        }
    }

    fn find_method(
        &self,
        thread: ThreadRef,
        owner: TypeRef,
        name: &str,
        descriptor: &str,
        kind: MethodKind,
    ) -> HostResult<MethodRef> {
        let mut state = self.state.lock().unwrap();
        *state.lookups.entry(name.to_string()).or_default() += 1;
        state.enter_managed(thread, HostOp::FindMethod, "java.lang.OutOfMemoryError")?;
        let found = state.methods.iter().find_map(|(method, def)| {
            let is_static = def.spec.modifiers & ACC_STATIC != 0;
            let kind_matches = match kind {
                MethodKind::Static => is_static,
                MethodKind::Instance => !is_static,
            };
            (def.owner == owner
                && def.spec.name == name
                && def.spec.descriptor == descriptor
                && kind_matches)
                .then_some(*method)
        });
        match found {
            Some(method) => Ok(method),
            None => Err(state.raise(thread, format!("java.lang.NoSuchMethodError: {}{}", name, descriptor))),
        }
    }

    fn declaring_type(&self, method: MethodRef) -> HostResult<TypeRef> {
        let state = self.state.lock().unwrap();
        state.fail_if(HostOp::DeclaringType, HostError::INVALID_METHODID)?;
        state
            .methods
            .get(&method)
            .map(|def| def.owner)
            .ok_or(HostError::INVALID_METHODID)
    }

    fn type_signature(&self, ty: TypeRef) -> HostResult<Allocation<String>> {
        let mut state = self.state.lock().unwrap();
        state.fail_if(HostOp::TypeSignature, HostError::INVALID_CLASS)?;
        let signature = state
            .types
            .get(&ty)
            .map(|def| format!("L{};", def.name))
            .ok_or(HostError::INVALID_CLASS)?;
        Ok(state.allocate("GetClassSignature", signature))
    }

    fn method_name(&self, method: MethodRef) -> HostResult<MethodNameBuffers> {
        let mut state = self.state.lock().unwrap();
        state.fail_if(HostOp::MethodName, HostError::INVALID_METHODID)?;
        let spec = state
            .methods
            .get(&method)
            .map(|def| def.spec.clone())
            .ok_or(HostError::INVALID_METHODID)?;
        Ok(MethodNameBuffers {
            name: state.allocate("GetMethodName.name", spec.name),
            descriptor: state.allocate("GetMethodName.signature", spec.descriptor),
            generic: spec
                .generic
                .map(|generic| state.allocate("GetMethodName.generic", generic)),
        })
    }

    fn method_modifiers(&self, method: MethodRef) -> HostResult<u32> {
        let state = self.state.lock().unwrap();
        state.fail_if(HostOp::MethodModifiers, HostError::INVALID_METHODID)?;
        state
            .methods
            .get(&method)
            .map(|def| def.spec.modifiers)
            .ok_or(HostError::INVALID_METHODID)
    }

    fn line_table(&self, method: MethodRef) -> HostResult<Allocation<Vec<LineEntry>>> {
        let mut state = self.state.lock().unwrap();
        state.fail_if(HostOp::LineTable, HostError::ABSENT_INFORMATION)?;
        let table = state
            .methods
            .get(&method)
            .ok_or(HostError::INVALID_METHODID)?
            .spec
            .line_table
            .clone()
            .ok_or(HostError::ABSENT_INFORMATION)?;
        Ok(state.allocate("GetLineNumberTable", table))
    }

    fn source_file_name(&self, ty: TypeRef) -> HostResult<Allocation<String>> {
        let mut state = self.state.lock().unwrap();
        state.fail_if(HostOp::SourceFileName, HostError::ABSENT_INFORMATION)?;
        let file = state
            .types
            .get(&ty)
            .ok_or(HostError::INVALID_CLASS)?
            .source_file
            .clone()
            .ok_or(HostError::ABSENT_INFORMATION)?;
        Ok(state.allocate("GetSourceFileName", file))
    }

    fn stack_trace(
        &self,
        thread: ThreadRef,
        start_depth: i32,
        max_frames: usize,
    ) -> HostResult<Vec<FrameInfo>> {
        let state = self.state.lock().unwrap();
        state.fail_if(HostOp::StackTrace, HostError::INVALID_THREAD)?;
        let stack = state.stacks.get(&thread).ok_or(HostError::INVALID_THREAD)?;
        let start = usize::try_from(start_depth).map_err(|_| HostError::INTERNAL)?;
        Ok(stack
            .iter()
            .skip(start)
            .take(max_frames)
            .map(|frame| FrameInfo { method: frame.method, location: frame.location })
            .collect())
    }

    fn local_variable_table(
        &self,
        method: MethodRef,
    ) -> HostResult<Allocation<Vec<LocalVariableEntry>>> {
        let mut state = self.state.lock().unwrap();
        state.fail_if(HostOp::LocalVariableTable, HostError::ABSENT_INFORMATION)?;
        let locals = state
            .methods
            .get(&method)
            .ok_or(HostError::INVALID_METHODID)?
            .spec
            .locals
            .clone();
        Ok(state.allocate("GetLocalVariableTable", locals))
    }

    fn local_int(&self, thread: ThreadRef, depth: i32, slot: i32) -> HostResult<i32> {
        match self.state.lock().unwrap().slot(thread, depth, slot)? {
            SlotContent::Int(v) => Ok(v),
            _ => Err(HostError::TYPE_MISMATCH),
        }
    }

    fn local_float(&self, thread: ThreadRef, depth: i32, slot: i32) -> HostResult<f32> {
        match self.state.lock().unwrap().slot(thread, depth, slot)? {
            SlotContent::Float(v) => Ok(v),
            _ => Err(HostError::TYPE_MISMATCH),
        }
    }

    fn local_double(&self, thread: ThreadRef, depth: i32, slot: i32) -> HostResult<f64> {
        match self.state.lock().unwrap().slot(thread, depth, slot)? {
            SlotContent::Double(v) => Ok(v),
            _ => Err(HostError::TYPE_MISMATCH),
        }
    }

    fn local_long(&self, thread: ThreadRef, depth: i32, slot: i32) -> HostResult<i64> {
        match self.state.lock().unwrap().slot(thread, depth, slot)? {
            SlotContent::Long(v) => Ok(v),
            _ => Err(HostError::TYPE_MISMATCH),
        }
    }

    fn local_object(
        &self,
        thread: ThreadRef,
        depth: i32,
        slot: i32,
    ) -> HostResult<Option<ObjectRef>> {
        match self.state.lock().unwrap().slot(thread, depth, slot)? {
            SlotContent::Object(v) => Ok(v),
            _ => Err(HostError::TYPE_MISMATCH),
        }
    }

    fn object_type(&self, thread: ThreadRef, object: ObjectRef) -> HostResult<TypeRef> {
        let mut state = self.state.lock().unwrap();
        state.enter_managed(thread, HostOp::ObjectType, "java.lang.InternalError")?;
        let ty = match state.heap.get(&object) {
            Some(HeapObject::Plain(ty)) => Some(*ty),
            Some(HeapObject::Str(_)) => state.types_by_name.get(STRING_TYPE).copied(),
            Some(HeapObject::Context(_)) => state.types_by_name.get(CONTEXT_TYPE).copied(),
            None => None,
        };
        ty.ok_or(HostError::INVALID_OBJECT)
    }

    fn new_object(&self, thread: ThreadRef, ty: TypeRef, ctor: MethodRef) -> HostResult<ObjectRef> {
        let mut state = self.state.lock().unwrap();
        state.enter_managed(thread, HostOp::NewObject, "java.lang.OutOfMemoryError")?;
        let valid = state
            .methods
            .get(&ctor)
            .map(|def| def.owner == ty && def.spec.name == "<init>")
            .unwrap_or(false);
        if !valid {
            return Err(state.raise(thread, "java.lang.NoSuchMethodError: <init>".to_string()));
        }
        let object = ObjectRef(state.next_id());
        let content = if state.types_by_name.get(CONTEXT_TYPE) == Some(&ty) {
            HeapObject::Context(ContextRecord::default())
        } else {
            HeapObject::Plain(ty)
        };
        state.heap.insert(object, content);
        Ok(object)
    }

    fn new_string(&self, thread: ThreadRef, value: &str) -> HostResult<ObjectRef> {
        let mut state = self.state.lock().unwrap();
        state.enter_managed(thread, HostOp::NewString, "java.lang.OutOfMemoryError")?;
        let object = ObjectRef(state.next_id());
        state.heap.insert(object, HeapObject::Str(value.to_string()));
        Ok(object)
    }

    fn call_static_void(&self, thread: ThreadRef, owner: TypeRef, method: MethodRef, args: &[CallArg]) {
        let mut state = self.state.lock().unwrap();
        if state.pending.contains_key(&thread) {
            state.calls_with_pending_error += 1;
        }
        let Some(def) = state.methods.get(&method) else {
            state.raise(thread, "java.lang.NoSuchMethodError".to_string());
            return;
        };
        let is_helper = state.types_by_name.get(HELPER_TYPE) == Some(&def.owner) && def.owner == owner;
        let op = SinkOp::ALL
            .into_iter()
            .find(|op| op.method_name() == def.spec.name && op.descriptor() == def.spec.descriptor);
        let (Some(op), true) = (op, is_helper) else {
            return;
        };
        state.sink_calls.push((thread, op.method_name()));
        if state.raising_sink_methods.contains(op.method_name()) {
            state.raise(thread, format!("java.lang.IllegalStateException: {} failed", op.method_name()));
            return;
        }
        if let Err(reason) = state.dispatch_sink(thread, op, args) {
            state.raise(thread, reason);
        }
    }

    fn take_pending_error(&self, thread: ThreadRef) -> Option<String> {
        self.state.lock().unwrap().pending.remove(&thread)
    }

    fn deallocate(&self, id: BufferId) {
        let mut state = self.state.lock().unwrap();
        if state.outstanding.remove(&id).is_none() {
            state.double_releases += 1;
        }
    }
}
