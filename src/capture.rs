//! Exception event handling: filter, resolve, walk frames, commit.

use std::sync::Arc;

use crate::bindings::{BindingCache, SinkBindings};
use crate::config::CaptureSettings;
use crate::context::SinkAdapter;
use crate::extract::VariableExtractor;
use crate::filter::FrameFilter;
use crate::host::{HostRuntime, Introspector, MethodRef, ObjectRef, ThreadRef, TypeRef};
use crate::location::{resolve_line, SourceFiles, UNKNOWN_LINE};
use crate::signature::argument_slot_count;
use crate::{Error, Result};

/// An exception-thrown notification from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionEvent {
    pub thread: ThreadRef,
    pub method: MethodRef,
    pub location: i64,
    pub exception: ObjectRef,
    pub catch_method: Option<MethodRef>,
    pub catch_location: i64,
}

/// Capabilities negotiated by the bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostCapabilities {
    pub line_numbers: bool,
}

/// What happened to one event.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// The throwing type is excluded; nothing was captured.
    Filtered,
    /// Every visited frame was committed.
    Completed { committed: usize },
    /// Processing stopped early. Frames committed before the failure stay committed.
    Abandoned { committed: usize, reason: Error },
}

impl CaptureOutcome {
    pub fn committed(&self) -> usize {
        match self {
            CaptureOutcome::Filtered => 0,
            CaptureOutcome::Completed { committed } | CaptureOutcome::Abandoned { committed, .. } => {
                *committed
            }
        }
    }
}

/// Everything one frame needs that is not already on the event.
struct FrameSite {
    depth: i32,
    method: MethodRef,
    declaring_type: TypeRef,
    location: i64,
}

/// The exception handler installed by the agent. One per process; shared by
/// every thread raising events.
pub struct ExceptionCapture {
    bindings: Arc<BindingCache>,
    filter: FrameFilter,
    frame_depth: usize,
    capabilities: HostCapabilities,
}

impl ExceptionCapture {
    pub fn new(settings: &CaptureSettings, capabilities: HostCapabilities) -> Self {
        Self {
            bindings: Arc::new(BindingCache::new()),
            filter: FrameFilter::new(&settings.excluded_prefixes),
            frame_depth: settings.frame_depth.max(1),
            capabilities,
        }
    }

    pub fn with_bindings(mut self, bindings: Arc<BindingCache>) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn bindings(&self) -> &BindingCache {
        &self.bindings
    }

    /// Handle one exception event. Never fails: problems end the capture for
    /// this event and are logged.
    pub fn on_exception_thrown(&self, host: &dyn HostRuntime, event: &ExceptionEvent) -> CaptureOutcome {
        let mut committed = 0;
        let outcome = match self.capture(host, event, &mut committed) {
            Ok(true) => CaptureOutcome::Completed { committed },
            Ok(false) => CaptureOutcome::Filtered,
            Err(reason) => {
                tracing::warn!(
                    "Exception capture on {:?} stopped after {} frame(s): {}",
                    event.thread, committed, reason
                );
                CaptureOutcome::Abandoned { committed, reason }
            }
        };
        // Nothing we did may leave an error behind for the application.
        Introspector::new(host, event.thread).drain_pending();
        outcome
    }

    /// Returns `Ok(false)` when the event was filtered out.
    fn capture(&self, host: &dyn HostRuntime, event: &ExceptionEvent, committed: &mut usize) -> Result<bool> {
        let introspector = Introspector::new(host, event.thread);

        let declaring_type = introspector.declaring_type(event.method)?;
        {
            let type_name = introspector.type_signature(declaring_type)?;
            if let Some(prefix) = self.filter.excluded_by(&type_name) {
                tracing::trace!("Ignoring exception in {} (excluded by {})", type_name.as_str(), prefix);
                return Ok(false);
            }
            tracing::debug!(
                "Exception in {}: method={:?} location={} catch_method={:?} catch_location={}",
                type_name.as_str(), event.method, event.location, event.catch_method, event.catch_location
            );
        }

        let bindings = SinkBindings::resolve(&self.bindings, host, event.thread)?;
        let frames = introspector.stack_trace(self.frame_depth)?;
        tracing::debug!("Visiting {} frame(s)", frames.len());

        let adapter = SinkAdapter::new(introspector, &bindings);
        let mut source_files = SourceFiles::new();

        for (index, frame) in frames.iter().enumerate() {
            // The innermost frame is the throw point reported by the event.
            let site = if index == 0 {
                FrameSite {
                    depth: 0,
                    method: event.method,
                    declaring_type,
                    location: event.location,
                }
            } else {
                FrameSite {
                    depth: index as i32,
                    method: frame.method,
                    declaring_type: introspector.declaring_type(frame.method)?,
                    location: frame.location,
                }
            };
            let exception = (index == 0).then_some(event.exception);
            self.capture_frame(&introspector, &adapter, &mut source_files, &site, exception)?;
            *committed += 1;
        }

        Ok(true)
    }

    fn capture_frame(
        &self,
        introspector: &Introspector<'_>,
        adapter: &SinkAdapter<'_>,
        source_files: &mut SourceFiles,
        site: &FrameSite,
        exception: Option<ObjectRef>,
    ) -> Result<()> {
        let argument_slots;
        let line;
        {
            let names = introspector.method_names(site.method)?;
            line = if self.capabilities.line_numbers {
                let table = introspector.line_table(site.method)?;
                resolve_line(Some(table.as_slice()), site.location)
            } else {
                UNKNOWN_LINE
            };
            let modifiers = introspector.method_modifiers(site.method)?;
            argument_slots = argument_slot_count(&names.descriptor, modifiers);
            tracing::debug!(
                "Frame {}: {}{} line {} ({} argument slot(s))",
                site.depth, names.name.as_str(), names.descriptor.as_str(), line, argument_slots
            );
        }
        let source_file = source_files.resolve(introspector, site.declaring_type)?;

        let table = introspector.local_variable_table(site.method)?;
        let mut context = adapter.begin_frame()?;

        if let Some(exception) = exception {
            if let Err(e) = adapter.attach_exception(&mut context, exception) {
                tracing::warn!("Could not attach exception: {}", e);
            }
        }

        let extractor = VariableExtractor::new(*introspector, site.depth, argument_slots);
        extractor.extract(&table, |entry| {
            if let Err(e) = adapter.add_entry(&mut context, &entry) {
                tracing::warn!("Could not add {} to context: {}", entry.name, e);
            }
        });

        match adapter.commit(context, source_file, line) {
            Ok(frame) => tracing::debug!(
                "Committed context {:?} ({}:{}, {} entries)",
                frame.object, source_file, line, frame.entries
            ),
            Err(e) => tracing::warn!("Commit of frame {} failed: {}", site.depth, e),
        }
        Ok(())
    }
}
