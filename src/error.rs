use thiserror::Error;

use crate::host::HostError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("UNRESOLVED_BINDING: '{0}' could not be resolved by the host runtime.")]
    UnresolvedBinding(String),

    #[error("INTROSPECTION_FAILED: {op} returned host error {source}")]
    Introspection {
        op: &'static str,
        #[source]
        source: HostError,
    },

    #[error("SLOT_READ_FAILED: slot {slot} ('{name}'): {source}")]
    SlotRead {
        slot: i32,
        name: String,
        #[source]
        source: HostError,
    },

    #[error("ALLOCATION_FAILED: could not construct {what}: {source}")]
    Allocation {
        what: &'static str,
        #[source]
        source: HostError,
    },

    #[error("SINK_CALL_FAILED: {op}: {reason}")]
    SinkCall { op: &'static str, reason: String },

    #[error("INVALID_SCENARIO: {0}")]
    InvalidScenario(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
