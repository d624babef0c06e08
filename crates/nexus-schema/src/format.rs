use chrono::DateTime;
use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("static email regex")
});

#[allow(clippy::expect_used)]
static URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://").expect("static uri regex"));

/// Check `value` against a named string format.
///
/// Returns `None` for formats this validator does not know, which are
/// treated as unconstrained.
pub fn check(format: &str, value: &str) -> Option<bool> {
    match format {
        "date-time" => Some(DateTime::parse_from_rfc3339(value).is_ok()),
        "email" => Some(EMAIL.is_match(value)),
        "uri" => Some(URI.is_match(value)),
        _ => None,
    }
}
