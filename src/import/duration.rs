use crate::dates::parse_flexible;

/// Whole days from `start` to `end` as `"<n> days"`, or `"-"` when either
/// side is blank or unrecognised. Each side picks its own layout.
pub fn duration(start: &str, end: &str) -> String {
    match (parse_flexible(start), parse_flexible(end)) {
        (Some(s), Some(e)) => format!("{} days", (e - s).whole_days()),
        _ => "-".to_string(),
    }
}
