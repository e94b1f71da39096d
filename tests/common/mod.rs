#![allow(dead_code)]

use excapture::config::CaptureSettings;
use excapture::host::{InMemoryHost, MethodRef, MethodSpec, ObjectRef, SlotContent, StackFrame, ThreadRef};
use excapture::signature::ACC_STATIC;
use excapture::{ExceptionCapture, ExceptionEvent, HostCapabilities};

pub const ACC_PUBLIC: u32 = 0x0001;

/// A host with one application type loaded and the sink available.
pub struct App {
    pub host: InMemoryHost,
    pub exception: ObjectRef,
}

impl App {
    pub fn new(owner: &str, source_file: &str) -> (Self, excapture::host::TypeRef) {
        let host = InMemoryHost::with_sink();
        let owner = host.define_type(owner, Some(source_file));
        let failure = host.define_type("com/acme/ProcessingFailed", Some("ProcessingFailed.java"));
        let exception = host.new_instance(failure);
        (Self { host, exception }, owner)
    }

    pub fn object(&self, type_name: &str) -> ObjectRef {
        let ty = self.host.define_type(type_name, None);
        self.host.new_instance(ty)
    }

    /// Event thrown from the innermost frame installed on `thread`.
    pub fn event(&self, thread: ThreadRef, method: MethodRef, location: i64) -> ExceptionEvent {
        ExceptionEvent {
            thread,
            method,
            location,
            exception: self.exception,
            catch_method: None,
            catch_location: -1,
        }
    }
}

/// `static void process(int count, String label)` with a local `total`.
pub fn process_method(app: &App, owner: excapture::host::TypeRef) -> MethodRef {
    app.host.define_method(
        owner,
        MethodSpec::new("process", "(ILjava/lang/String;)V")
            .modifiers(ACC_STATIC | ACC_PUBLIC)
            .line_table(&[(0, 20), (6, 21), (12, 22)])
            .local(0, "count", "I")
            .local(1, "label", "Ljava/lang/String;")
            .local(2, "total", "I"),
    )
}

pub fn process_frame(method: MethodRef, label: ObjectRef, count: i32) -> StackFrame {
    StackFrame::new(method, 8)
        .slot(0, SlotContent::Int(count))
        .slot(1, SlotContent::Object(Some(label)))
        .slot(2, SlotContent::Int(count * 2))
}

pub fn capture_with_depth(frame_depth: usize) -> ExceptionCapture {
    let settings = CaptureSettings { frame_depth, ..Default::default() };
    ExceptionCapture::new(&settings, HostCapabilities { line_numbers: true })
}
