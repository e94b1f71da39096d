/// Type-name prefixes never worth capturing: the runtime's own namespaces,
/// the agent's namespace (capturing it would recurse into our own
/// instrumentation), and loader types known to throw routinely.
pub const EXCLUDED_PREFIXES: &[&str] = &[
    "Ljava/",
    "Ljavax/",
    "Lsun/",
    "Ldatadog/",
    "Lorg/springframework/boot/loader/jar/JarURLConnection;",
    "Lorg/springframework/boot/loader/LaunchedURLClassLoader;",
];

/// Decides from a declaring-type signature whether an exception is captured.
#[derive(Debug, Clone, Default)]
pub struct FrameFilter {
    extra: Vec<String>,
}

impl FrameFilter {
    /// Filter with the fixed exclusions followed by `extra` prefixes.
    pub fn new(extra: &[String]) -> Self {
        Self {
            extra: extra.iter().filter(|p| !p.is_empty()).cloned().collect(),
        }
    }

    /// First prefix excluding `type_name`, if any.
    pub fn excluded_by(&self, type_name: &str) -> Option<&str> {
        EXCLUDED_PREFIXES
            .iter()
            .copied()
            .chain(self.extra.iter().map(String::as_str))
            .find(|prefix| type_name.starts_with(prefix))
    }

    pub fn should_capture(&self, type_name: &str) -> bool {
        self.excluded_by(type_name).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_fixed_prefix_excludes() {
        let filter = FrameFilter::default();
        for prefix in EXCLUDED_PREFIXES {
            assert!(!filter.should_capture(prefix), "{} should be excluded", prefix);
        }
        assert!(!filter.should_capture("Ljava/util/HashMap;"));
        assert!(!filter.should_capture("Ljavax/servlet/http/HttpServlet;"));
        assert!(!filter.should_capture("Lsun/nio/fs/UnixPath;"));
        assert!(!filter.should_capture("Ldatadog/trace/agent/Tracer;"));
    }

    #[test]
    fn test_unrelated_type_is_captured() {
        let filter = FrameFilter::default();
        assert!(filter.should_capture("Lcom/acme/orders/OrderService;"));
        assert!(filter.should_capture("Lorg/springframework/web/servlet/DispatcherServlet;"));
    }

    #[test]
    fn test_prefix_match_is_literal() {
        let filter = FrameFilter::default();
        // "Ljavafx/" does not start with "Ljava/"
        assert!(filter.should_capture("Ljavafx/scene/Node;"));
        assert!(filter.should_capture("Lcom/acme/java/Util;"));
    }

    #[test]
    fn test_named_loader_types() {
        let filter = FrameFilter::default();
        assert!(!filter.should_capture("Lorg/springframework/boot/loader/LaunchedURLClassLoader;"));
        assert!(filter.should_capture("Lorg/springframework/boot/loader/Launcher;"));
    }

    #[test]
    fn test_first_match_wins() {
        let filter = FrameFilter::new(&["Ljava/lang/".to_string()]);
        assert_eq!(filter.excluded_by("Ljava/lang/String;"), Some("Ljava/"));
    }

    #[test]
    fn test_extra_prefixes() {
        let filter = FrameFilter::new(&["Lcom/acme/generated/".to_string(), String::new()]);
        assert!(!filter.should_capture("Lcom/acme/generated/Proxy$1;"));
        assert!(filter.should_capture("Lcom/acme/orders/OrderService;"));
    }
}
