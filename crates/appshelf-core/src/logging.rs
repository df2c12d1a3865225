//! Logging facilities for appshelf.
//!
//! appshelf uses the `tracing` crate for instrumentation. The library never
//! installs a subscriber; to see logs, install one in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("appshelf=debug,appshelf_core=info")
//!     .init();
//! ```

/// Span names used throughout appshelf for tracing.
///
/// These constants can be used to filter traces for specific subsystems.
pub mod span_names {
    /// Sink drain span.
    pub const SINK_DRAIN: &str = "appshelf::sink_drain";
    /// Attribute resolution span.
    pub const RESOLVE: &str = "appshelf::resolve";
    /// View recomputation span.
    pub const REFILTER: &str = "appshelf::refilter";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Presentation sink target.
    pub const SINK: &str = "appshelf_core::sink";
    /// Resolver pool target.
    pub const THREADPOOL: &str = "appshelf_core::threadpool";
    /// Signal system target.
    pub const SIGNAL: &str = "appshelf_core::signal";
    /// Load progress target.
    pub const PROGRESS: &str = "appshelf_core::progress";
    /// Performance spans target.
    pub const PERF: &str = "appshelf::perf";
}

/// A guard for performance tracing spans.
///
/// Creates an info-level span under the [`targets::PERF`] target that stays
/// entered until the guard is dropped.
///
/// # Example
///
/// ```
/// use appshelf_core::logging::PerfSpan;
///
/// {
///     let _span = PerfSpan::new("refilter");
///     // work measured by the subscriber
/// }
/// ```
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: targets::PERF, "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}
