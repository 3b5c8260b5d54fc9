//! Logging integration for the decibel-rs framework.
//!
//! Provides helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating per-search spans.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The log filter is read from `settings.log_level`. In debug mode a pretty,
/// human-readable format is used; in production a structured JSON format is
/// used. Calling this twice is harmless; the second call is a no-op.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for one model search.
///
/// All events emitted during preparation and execution of the search carry
/// the searched model's qualified name.
///
/// # Examples
///
/// ```
/// use decibel_rs_core::logging::search_span;
///
/// let span = search_span("blog.Article");
/// let _guard = span.enter();
/// tracing::debug!("preparing search");
/// ```
pub fn search_span(qualified_name: &str) -> tracing::Span {
    tracing::debug_span!("search", model = qualified_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_logging_idempotent() {
        let settings = Settings::default();
        setup_logging(&settings);
        setup_logging(&settings);
    }

    #[test]
    fn test_search_span_enter() {
        let span = search_span("blog.Article");
        let _guard = span.enter();
        tracing::debug!("inside search span");
    }
}
