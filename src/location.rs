use std::collections::HashMap;

use crate::host::{Introspector, LineEntry, TypeRef};
use crate::Result;

/// Reported when no line information is available.
pub const UNKNOWN_LINE: i32 = -1;

/// Source line for `location`: the line of the last entry whose start offset
/// does not exceed it. Entries are expected in offset order. A location before
/// the first entry still maps to the first entry's line.
pub fn resolve_line(table: Option<&[LineEntry]>, location: i64) -> i32 {
    let Some((first, rest)) = table.and_then(|t| t.split_first()) else {
        return UNKNOWN_LINE;
    };

    let mut line = first.line_number;
    for entry in rest {
        if location < entry.start_location {
            break;
        }
        line = entry.line_number;
    }
    line
}

/// Source file names fetched during one event, keyed by declaring type.
#[derive(Debug, Default)]
pub struct SourceFiles {
    by_type: HashMap<TypeRef, String>,
}

impl SourceFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source file of `ty`, fetched from the host on first use.
    pub fn resolve(&mut self, introspector: &Introspector<'_>, ty: TypeRef) -> Result<&str> {
        if !self.by_type.contains_key(&ty) {
            let name = introspector.source_file_name(ty)?;
            self.by_type.insert(ty, name.to_string());
        }
        Ok(self.by_type[&ty].as_str())
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}
