pub mod bindings;
pub mod capture;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod filter;
pub mod host;
pub mod location;
pub mod replay;
pub mod signature;

pub use capture::{CaptureOutcome, ExceptionCapture, ExceptionEvent, HostCapabilities};
pub use error::{Error, Result};
