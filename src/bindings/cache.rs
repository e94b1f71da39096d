use std::fmt;

use dashmap::DashMap;

use crate::host::{HostRuntime, MethodKind, MethodRef, ThreadRef, TypeRef};

/// Symbolic reference to a host capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
    Type(&'static str),
    StaticMethod {
        owner: &'static str,
        name: &'static str,
        descriptor: &'static str,
    },
    Constructor {
        owner: &'static str,
        descriptor: &'static str,
    },
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Type(name) => write!(f, "{}", name),
            Binding::StaticMethod { owner, name, descriptor } => {
                write!(f, "{}.{}{}", owner, name, descriptor)
            }
            Binding::Constructor { owner, descriptor } => write!(f, "{}.<init>{}", owner, descriptor),
        }
    }
}

/// Resolved capability handle. Lives for the whole process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Type(TypeRef),
    Method(MethodRef),
}

impl Handle {
    pub fn as_type(self) -> Option<TypeRef> {
        match self {
            Handle::Type(ty) => Some(ty),
            Handle::Method(_) => None,
        }
    }

    pub fn as_method(self) -> Option<MethodRef> {
        match self {
            Handle::Method(method) => Some(method),
            Handle::Type(_) => None,
        }
    }
}

/// Process-wide memo of resolved bindings.
///
/// Write-once per key: the first successful resolution is inserted with an
/// atomic insert-if-absent and never replaced. Failures are not cached, so a
/// later event retries them. Consecutive failures are counted per binding so
/// that a permanently missing operation is reported once, not on every event.
#[derive(Debug, Default)]
pub struct BindingCache {
    handles: DashMap<Binding, Handle>,
    failures: DashMap<Binding, usize>,
}

impl BindingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `binding`, consulting the cache first.
    ///
    /// Returns `None` when the host cannot resolve it; any error that left
    /// pending on `thread` has been cleared by then.
    pub fn resolve(
        &self,
        host: &dyn HostRuntime,
        thread: ThreadRef,
        binding: Binding,
    ) -> Option<Handle> {
        if let Some(handle) = self.get(&binding) {
            return Some(handle);
        }

        let resolved = match binding {
            Binding::Type(name) => host.find_type(thread, name).map(Handle::Type),
            Binding::StaticMethod { owner, name, descriptor } => {
                let owner = self.resolve(host, thread, Binding::Type(owner))?.as_type()?;
                host.find_method(thread, owner, name, descriptor, MethodKind::Static)
                    .map(Handle::Method)
            }
            Binding::Constructor { owner, descriptor } => {
                let owner = self.resolve(host, thread, Binding::Type(owner))?.as_type()?;
                host.find_method(thread, owner, "<init>", descriptor, MethodKind::Instance)
                    .map(Handle::Method)
            }
        };

        match resolved {
            Ok(handle) => {
                self.failures.remove(&binding);
                Some(*self.handles.entry(binding).or_insert(handle))
            }
            Err(e) => {
                if let Some(pending) = host.take_pending_error(thread) {
                    tracing::debug!("Cleared pending error after lookup of {}: {}", binding, pending);
                }
                let attempts = {
                    let mut count = self.failures.entry(binding).or_insert(0);
                    *count += 1;
                    *count
                };
                if attempts == 1 {
                    tracing::warn!("Unable to resolve {} ({}), will retry on later events", binding, e);
                } else {
                    tracing::debug!("{} still unresolved after {} attempts ({})", binding, attempts, e);
                }
                None
            }
        }
    }

    /// Failed lookups of `binding` since it last resolved.
    pub fn failed_attempts(&self, binding: &Binding) -> usize {
        self.failures.get(binding).map(|entry| *entry.value()).unwrap_or(0)
    }

    pub fn get(&self, binding: &Binding) -> Option<Handle> {
        self.handles.get(binding).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
