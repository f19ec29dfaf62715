//! Per-entry merge context: which group, package, and precedence layer a
//! contributed file belongs to.
//!
//! A `Context` is created fresh for every extracted entry and consumed by
//! the merger for that single merge call. It is used for two things only:
//! ordering/removal decisions, and duplicate-key error messages (which
//! need the originating file path).

use std::path::{Path, PathBuf};

/// Precedence class of a configuration contribution.
///
/// Duplicate keys are tracked per layer: an `Environment` override of an
/// `Application` key is allowed, while two files at the same layer
/// colliding on the same key is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// An ordinary dependency package.
    Vendor,
    /// A designated dependency allowed to override other vendors
    /// without being promoted to the application layer.
    VendorOverride,
    /// The root project itself.
    Application,
    /// An environment-specific overlay.
    Environment,
}

impl Layer {
    /// Whether this contribution comes from the vendor tier, in either
    /// of its sub-layers. Vendor-removal modifiers apply to both.
    pub fn is_vendor(self) -> bool {
        matches!(self, Layer::Vendor | Layer::VendorOverride)
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Layer::Vendor => "vendor",
            Layer::VendorOverride => "vendor-override",
            Layer::Application => "application",
            Layer::Environment => "environment",
        };
        write!(f, "{}", name)
    }
}

/// Immutable metadata for one extracted entry.
#[derive(Debug, Clone)]
pub struct Context {
    group: String,
    package: String,
    layer: Layer,
    file: PathBuf,
    is_variable: bool,
}

impl Context {
    pub fn new(
        group: impl Into<String>,
        package: impl Into<String>,
        layer: Layer,
        file: impl Into<PathBuf>,
        is_variable: bool,
    ) -> Self {
        Self {
            group: group.into(),
            package: package.into(),
            layer,
            file: file.into(),
            is_variable,
        }
    }

    /// The group this entry contributes to.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// The contributing package name, or the root sentinel.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// The precedence layer of this entry.
    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// The absolute file path, or the `$group` token for variable
    /// entries.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Whether this entry is a `$group` variable reference rather than
    /// a file.
    pub fn is_variable(&self) -> bool {
        self.is_variable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_vendor_classification() {
        assert!(Layer::Vendor.is_vendor());
        assert!(Layer::VendorOverride.is_vendor());
        assert!(!Layer::Application.is_vendor());
        assert!(!Layer::Environment.is_vendor());
    }

    #[test]
    fn test_layer_display() {
        assert_eq!(Layer::Vendor.to_string(), "vendor");
        assert_eq!(Layer::VendorOverride.to_string(), "vendor-override");
        assert_eq!(Layer::Application.to_string(), "application");
        assert_eq!(Layer::Environment.to_string(), "environment");
    }

    #[test]
    fn test_context_accessors() {
        let context = Context::new(
            "web",
            "acme/cache",
            Layer::Vendor,
            "/app/vendor/acme/cache/config/web.json",
            false,
        );
        assert_eq!(context.group(), "web");
        assert_eq!(context.package(), "acme/cache");
        assert_eq!(context.layer(), Layer::Vendor);
        assert!(context
            .file()
            .ends_with("vendor/acme/cache/config/web.json"));
        assert!(!context.is_variable());
    }
}
