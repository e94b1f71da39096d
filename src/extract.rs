//! Typed extraction of live local state from a frame.

use crate::host::{Introspector, LocalVariableEntry, ObjectRef};
use crate::{Error, Result};

/// Storage class of a local slot, from the first character of its signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// byte, char, short, boolean and int, all read widened to 32 bits
    Int32,
    Float32,
    Float64,
    Int64,
    Object,
    Array,
}

impl SlotKind {
    pub fn from_signature(signature: &str) -> Option<Self> {
        match signature.as_bytes().first()? {
            b'B' | b'C' | b'S' | b'Z' | b'I' => Some(SlotKind::Int32),
            b'F' => Some(SlotKind::Float32),
            b'D' => Some(SlotKind::Float64),
            b'J' => Some(SlotKind::Int64),
            b'L' => Some(SlotKind::Object),
            b'[' => Some(SlotKind::Array),
            _ => None,
        }
    }
}

/// Decoded value of a local slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotValue {
    Int32(i32),
    Float32(f32),
    Float64(f64),
    Int64(i64),
    Object(ObjectRef),
    /// Arrays are recognized but their contents are never read.
    Array,
}

/// One decoded table entry, classified by its position in the table.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedEntry<'t> {
    pub slot: i32,
    pub name: &'t str,
    pub signature: &'t str,
    pub value: SlotValue,
    pub is_argument: bool,
}

/// Reads the locals of the frame at `depth` on the introspector's thread.
pub struct VariableExtractor<'h> {
    introspector: Introspector<'h>,
    depth: i32,
    argument_slots: usize,
}

impl<'h> VariableExtractor<'h> {
    /// `argument_slots` leading table entries are treated as arguments.
    pub fn new(introspector: Introspector<'h>, depth: i32, argument_slots: usize) -> Self {
        Self { introspector, depth, argument_slots }
    }

    /// Decode the current value of one entry.
    ///
    /// `Ok(None)` means there is nothing to capture: a null reference or an
    /// unsupported signature.
    pub fn decode(&self, entry: &LocalVariableEntry) -> Result<Option<SlotValue>> {
        let Some(kind) = SlotKind::from_signature(&entry.signature) else {
            tracing::debug!("Unsupported signature {} for local '{}'", entry.signature, entry.name);
            return Ok(None);
        };

        let host = self.introspector.host();
        let thread = self.introspector.thread();
        let slot = entry.slot;
        let read_error = |source| Error::SlotRead {
            slot,
            name: entry.name.clone(),
            source,
        };

        let value = match kind {
            SlotKind::Int32 => SlotValue::Int32(
                host.local_int(thread, self.depth, slot).map_err(read_error)?,
            ),
            SlotKind::Float32 => SlotValue::Float32(
                host.local_float(thread, self.depth, slot).map_err(read_error)?,
            ),
            SlotKind::Float64 => SlotValue::Float64(
                host.local_double(thread, self.depth, slot).map_err(read_error)?,
            ),
            SlotKind::Int64 => SlotValue::Int64(
                host.local_long(thread, self.depth, slot).map_err(read_error)?,
            ),
            SlotKind::Object => {
                let Some(object) = host
                    .local_object(thread, self.depth, slot)
                    .map_err(read_error)?
                else {
                    tracing::trace!("Local '{}' is null", entry.name);
                    return Ok(None);
                };
                let class = self
                    .introspector
                    .object_type(object)
                    .and_then(|ty| self.introspector.type_signature(ty))?;
                tracing::trace!("Local[{}] {} = instance of {}", slot, entry.name, class.as_str());
                SlotValue::Object(object)
            }
            SlotKind::Array => {
                tracing::trace!("Local[{}] {} is an array, not captured", slot, entry.name);
                SlotValue::Array
            }
        };
        Ok(Some(value))
    }

    /// Decode every entry of `table` in order and hand each captured value to
    /// `emit`. Entries that fail to read are logged and skipped.
    pub fn extract<'t, F>(&self, table: &'t [LocalVariableEntry], mut emit: F) -> usize
    where
        F: FnMut(ExtractedEntry<'t>),
    {
        let mut emitted = 0;
        for (position, entry) in table.iter().enumerate() {
            let value = match self.decode(entry) {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(e) => {
                    self.introspector.drain_pending();
                    tracing::debug!("Skipping local: {}", e);
                    continue;
                }
            };
            tracing::trace!("Local[{}] {} = {:?}", entry.slot, entry.name, value);
            emit(ExtractedEntry {
                slot: entry.slot,
                name: &entry.name,
                signature: &entry.signature,
                value,
                is_argument: position < self.argument_slots,
            });
            emitted += 1;
        }
        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostOp, InMemoryHost, MethodRef, SlotContent, StackFrame, ThreadRef};

    const THREAD: ThreadRef = ThreadRef(7);

    fn entry(slot: i32, name: &str, signature: &str) -> LocalVariableEntry {
        LocalVariableEntry {
            slot,
            name: name.to_string(),
            signature: signature.to_string(),
        }
    }

    fn host_with_frame(slots: Vec<(i32, SlotContent)>) -> InMemoryHost {
        let host = InMemoryHost::new();
        let frame = slots
            .into_iter()
            .fold(StackFrame::new(MethodRef(0), 0), |f, (slot, content)| f.slot(slot, content));
        host.set_stack(THREAD, vec![frame]);
        host
    }

    fn collect<'t>(host: &InMemoryHost, table: &'t [LocalVariableEntry], args: usize) -> Vec<ExtractedEntry<'t>> {
        let extractor = VariableExtractor::new(Introspector::new(host, THREAD), 0, args);
        let mut out = Vec::new();
        extractor.extract(table, |e| out.push(e));
        out
    }

    #[test]
    fn test_slot_kinds() {
        for sig in ["B", "C", "S", "Z", "I"] {
            assert_eq!(SlotKind::from_signature(sig), Some(SlotKind::Int32));
        }
        assert_eq!(SlotKind::from_signature("F"), Some(SlotKind::Float32));
        assert_eq!(SlotKind::from_signature("D"), Some(SlotKind::Float64));
        assert_eq!(SlotKind::from_signature("J"), Some(SlotKind::Int64));
        assert_eq!(SlotKind::from_signature("Ljava/lang/String;"), Some(SlotKind::Object));
        assert_eq!(SlotKind::from_signature("[I"), Some(SlotKind::Array));
        assert_eq!(SlotKind::from_signature("V"), None);
        assert_eq!(SlotKind::from_signature(""), None);
    }

    #[test]
    fn test_decodes_every_primitive() {
        let host = host_with_frame(vec![
            (0, SlotContent::Int(42)),
            (1, SlotContent::Float(1.5)),
            (2, SlotContent::Double(2.25)),
            (4, SlotContent::Long(-9)),
        ]);
        let table = vec![entry(0, "i", "I"), entry(1, "f", "F"), entry(2, "d", "D"), entry(4, "j", "J")];
        let values: Vec<SlotValue> = collect(&host, &table, 0).into_iter().map(|e| e.value).collect();
        assert_eq!(
            values,
            vec![
                SlotValue::Int32(42),
                SlotValue::Float32(1.5),
                SlotValue::Float64(2.25),
                SlotValue::Int64(-9),
            ]
        );
    }

    #[test]
    fn test_boolean_reads_widened() {
        let host = host_with_frame(vec![(0, SlotContent::Int(1))]);
        let table = vec![entry(0, "flag", "Z")];
        let out = collect(&host, &table, 0);
        assert_eq!(out[0].value, SlotValue::Int32(1));
    }

    #[test]
    fn test_null_object_skipped() {
        let host = host_with_frame(vec![(0, SlotContent::Object(None)), (1, SlotContent::Int(3))]);
        let table = vec![entry(0, "name", "Ljava/lang/String;"), entry(1, "n", "I")];
        let out = collect(&host, &table, 0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "n");
    }

    #[test]
    fn test_object_value() {
        let host = host_with_frame(vec![]);
        let ty = host.define_type("com/acme/Order", Some("Order.java"));
        let order = host.new_instance(ty);
        host.set_stack(THREAD, vec![StackFrame::new(MethodRef(0), 0).slot(3, SlotContent::Object(Some(order)))]);
        let table = vec![entry(3, "order", "Lcom/acme/Order;")];
        let out = collect(&host, &table, 0);
        assert_eq!(out[0].value, SlotValue::Object(order));
        assert!(host.outstanding_buffers().is_empty());
    }

    #[test]
    fn test_object_without_class_skipped() {
        let host = host_with_frame(vec![(0, SlotContent::Object(Some(ObjectRef(999))))]);
        let table = vec![entry(0, "ghost", "Ljava/lang/Object;")];
        assert!(collect(&host, &table, 0).is_empty());
        assert_eq!(host.pending_errors(), 0);
    }

    #[test]
    fn test_array_recognized_not_read() {
        // No slot content at all: reading it would fail.
        let host = host_with_frame(vec![]);
        let table = vec![entry(0, "values", "[I")];
        let out = collect(&host, &table, 0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, SlotValue::Array);
    }

    #[test]
    fn test_read_failure_skips_only_that_slot() {
        let host = host_with_frame(vec![(0, SlotContent::Long(5)), (2, SlotContent::Int(8))]);
        let table = vec![
            entry(0, "mismatch", "I"),
            entry(1, "missing", "I"),
            entry(2, "ok", "I"),
        ];
        let out = collect(&host, &table, 0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "ok");
    }

    #[test]
    fn test_positional_classification() {
        let host = host_with_frame(vec![
            (0, SlotContent::Int(1)),
            (1, SlotContent::Int(2)),
            (2, SlotContent::Int(3)),
        ]);
        let table = vec![entry(0, "a", "I"), entry(1, "b", "I"), entry(2, "c", "I")];
        let flags: Vec<bool> = collect(&host, &table, 2).iter().map(|e| e.is_argument).collect();
        assert_eq!(flags, vec![true, true, false]);
    }

    #[test]
    fn test_classification_uses_position_not_slot() {
        // Table order does not follow slot order; position decides.
        let host = host_with_frame(vec![(0, SlotContent::Int(1)), (5, SlotContent::Int(2))]);
        let table = vec![entry(5, "late", "I"), entry(0, "early", "I")];
        let out = collect(&host, &table, 1);
        assert_eq!((out[0].name, out[0].is_argument), ("late", true));
        assert_eq!((out[1].name, out[1].is_argument), ("early", false));
    }

    #[test]
    fn test_object_type_failure_clears_pending() {
        let host = host_with_frame(vec![]);
        let ty = host.define_type("com/acme/Order", None);
        let order = host.new_instance(ty);
        host.set_stack(THREAD, vec![StackFrame::new(MethodRef(0), 0).slot(0, SlotContent::Object(Some(order)))]);
        host.fail(HostOp::ObjectType);
        let table = vec![entry(0, "order", "Lcom/acme/Order;")];
        assert!(collect(&host, &table, 0).is_empty());
        assert_eq!(host.pending_errors(), 0);
    }
}
