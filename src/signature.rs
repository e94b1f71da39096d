//! Method descriptor scanning.
//!
//! Only the parameter section of a descriptor matters here: it tells us how
//! many leading entries of a local-variable table are arguments.

/// Modifier bit marking a static method.
pub const ACC_STATIC: u32 = 0x0008;

/// Count the parameters declared by a method descriptor such as
/// `(Ljava/lang/String;I)V`.
///
/// Array dimensions (`[`) are folded into the element that follows them and an
/// object type (`L...;`) counts once. Scanning stops at `)` or at the end of
/// the input, so a truncated descriptor yields the parameters seen so far.
pub fn parameter_count(descriptor: &str) -> usize {
    let bytes = descriptor.as_bytes();
    let mut i = usize::from(bytes.first() == Some(&b'('));
    let mut count = 0;

    while i < bytes.len() && bytes[i] != b')' {
        match bytes[i] {
            b'[' => {
                i += 1;
                continue;
            }
            b'L' => {
                while i < bytes.len() && bytes[i] != b';' {
                    i += 1;
                }
            }
            _ => {}
        }
        count += 1;
        i += 1;
    }

    count
}

pub fn is_instance_method(modifiers: u32) -> bool {
    (modifiers & ACC_STATIC) == 0
}

/// Number of leading local-variable entries that hold arguments, counting the
/// implicit receiver of instance methods.
pub fn argument_slot_count(descriptor: &str, modifiers: u32) -> usize {
    parameter_count(descriptor) + usize::from(is_instance_method(modifiers))
}
