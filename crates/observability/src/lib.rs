//! Tracing/logging setup shared by every binary.

/// Initialize process-wide tracing using `LOG_FORMAT` (`json` or `pretty`).
///
/// An unrecognized value falls back to JSON and is reported once the
/// subscriber is installed. This is safe to call multiple times; subsequent
/// calls become no-ops.
pub fn init() {
    let raw = std::env::var("LOG_FORMAT").ok();
    let (format, rejected) = resolve_format(raw.as_deref());
    tracing::init(format);

    if let Some(err) = rejected {
        ::tracing::warn!(error = %err, fallback = ?format, "ignoring LOG_FORMAT");
    }
}

/// Pick the log format from the raw `LOG_FORMAT` value, returning the parse
/// error alongside the default when the value is not recognized.
fn resolve_format(raw: Option<&str>) -> (LogFormat, Option<String>) {
    match raw.map(str::parse::<LogFormat>) {
        None => (LogFormat::default(), None),
        Some(Ok(format)) => (format, None),
        Some(Err(err)) => (LogFormat::default(), Some(err)),
    }
}

pub mod tracing;

pub use crate::tracing::LogFormat;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_and_known_formats_resolve_silently() {
        assert_eq!(resolve_format(None), (LogFormat::Json, None));
        assert_eq!(resolve_format(Some("pretty")), (LogFormat::Pretty, None));
    }

    #[test]
    fn typos_fall_back_to_json_with_an_error() {
        let (format, rejected) = resolve_format(Some("prety"));
        assert_eq!(format, LogFormat::Json);
        assert_eq!(rejected.as_deref(), Some("unknown log format 'prety'"));
    }
}
