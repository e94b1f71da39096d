use std::fmt;
use std::ops::Deref;

use super::runtime::{Allocation, BufferId, HostRuntime};

/// Host buffer that is released when the scope ends, on every exit path.
pub struct Scoped<'h, T> {
    host: &'h dyn HostRuntime,
    id: BufferId,
    value: T,
}

impl<'h, T> Scoped<'h, T> {
    pub fn new(host: &'h dyn HostRuntime, allocation: Allocation<T>) -> Self {
        Self {
            host,
            id: allocation.id,
            value: allocation.value,
        }
    }
}

impl<T> Deref for Scoped<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> Drop for Scoped<'_, T> {
    fn drop(&mut self) {
        self.host.deallocate(self.id);
    }
}

impl<T: fmt::Debug> fmt::Debug for Scoped<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scoped")
            .field("id", &self.id)
            .field("value", &self.value)
            .finish()
    }
}

/// The three buffers describing a method, released together or one by one.
#[derive(Debug)]
pub struct MethodNames<'h> {
    pub name: Scoped<'h, String>,
    pub descriptor: Scoped<'h, String>,
    pub generic: Option<Scoped<'h, String>>,
}
