//! Engine-wide behavior switches.

use crate::read::DEFAULT_METADATA_PREFIX;

/// Configuration for an [`Engine`](crate::Engine), set once at build time.
///
/// Every switch defaults to the least surprising behavior: plain escaping,
/// nulls written, unknown properties skipped, no type metadata.
///
/// ```rust
/// use jsonbind::EngineOptions;
///
/// let options = EngineOptions::default()
///     .with_skip_null(true)
///     .with_class_metadata(true);
/// assert!(options.skip_null);
/// ```
#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// Write an `@class` metadata member on registered structured types and
    /// honor it on read for polymorphic dispatch.
    pub class_metadata: bool,
    /// Serialize values by their runtime type when it is a registered
    /// subtype of the declared type.
    pub use_runtime_type: bool,
    /// Omit object members whose value is null.
    pub skip_null: bool,
    /// Escape `< > & = '` in strings as `\uXXXX` sequences.
    pub html_safe: bool,
    /// Fail deserialization on a property no field binds to, instead of
    /// skipping it.
    pub fail_on_unknown_properties: bool,
    /// Require exact type-argument matches when checking whether a runtime
    /// type satisfies a declared parameterized type.
    pub strict_generics: bool,
    /// The reserved-property prefix marking metadata members.
    pub metadata_prefix: char,
    /// The active view overlay, applied to every registered type that has a
    /// model under this view name.
    pub active_view: Option<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            class_metadata: false,
            use_runtime_type: false,
            skip_null: false,
            html_safe: false,
            fail_on_unknown_properties: false,
            strict_generics: false,
            metadata_prefix: DEFAULT_METADATA_PREFIX,
            active_view: None,
        }
    }
}

impl EngineOptions {
    /// Enables the `@class` metadata member on structured types.
    #[must_use]
    pub fn with_class_metadata(mut self, enabled: bool) -> Self {
        self.class_metadata = enabled;
        self
    }

    /// Enables runtime-type substitution on serialization.
    #[must_use]
    pub fn with_use_runtime_type(mut self, enabled: bool) -> Self {
        self.use_runtime_type = enabled;
        self
    }

    /// Enables omission of null-valued object members.
    #[must_use]
    pub fn with_skip_null(mut self, enabled: bool) -> Self {
        self.skip_null = enabled;
        self
    }

    /// Enables HTML-safe string escaping.
    #[must_use]
    pub fn with_html_safe(mut self, enabled: bool) -> Self {
        self.html_safe = enabled;
        self
    }

    /// Makes unknown properties a deserialization error.
    #[must_use]
    pub fn with_fail_on_unknown_properties(mut self, enabled: bool) -> Self {
        self.fail_on_unknown_properties = enabled;
        self
    }

    /// Requires exact type-argument matches in runtime-type checks.
    #[must_use]
    pub fn with_strict_generics(mut self, enabled: bool) -> Self {
        self.strict_generics = enabled;
        self
    }

    /// Changes the reserved-property prefix (default `@`).
    #[must_use]
    pub fn with_metadata_prefix(mut self, prefix: char) -> Self {
        self.metadata_prefix = prefix;
        self
    }

    /// Activates a named view overlay.
    #[must_use]
    pub fn with_view(mut self, view: &str) -> Self {
        self.active_view = Some(view.to_string());
        self
    }
}
