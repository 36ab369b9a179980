//! Enterprise connection-string parsing (spec.md §6 "Database connect
//! options", `file` key doubling as "path or driver connection string").
//!
//! Grounded on the teacher's `connection.rs::escape_attribute_value` /
//! `driver_complete_option.rs`: a flat `key=value;key=value;...` string,
//! case-insensitive keys, with `{{` / `}}` as the braced-value escape for
//! values containing a semicolon.

use std::collections::HashMap;

/// Parses a `key=value;key=value;...` connection string into a
/// case-insensitive (lowercased-key) map. Keys and values are trimmed;
/// empty segments are skipped. A value wrapped in `{...}` may contain
/// semicolons, matching the ODBC driver-connection-string escaping
/// convention the teacher's own string builder produces.
pub fn parse_connection_string(s: &str) -> HashMap<String, String> {
    let mut attributes = HashMap::new();
    for segment in split_segments(s) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        if let Some((key, value)) = segment.split_once('=') {
            let key = key.trim().to_ascii_lowercase();
            let value = unbrace(value.trim());
            if !key.is_empty() {
                attributes.insert(key, value.to_owned());
            }
        }
    }
    attributes
}

/// Splits on `;`, except inside a `{...}`-braced value.
fn split_segments(s: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0u32;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => {
                segments.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&s[start..]);
    segments
}

fn unbrace(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('{') && value.ends_with('}') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Escapes `value` for inclusion in a connection string, bracing it in
/// `{...}` if it contains a `;` or either brace character (mirrors the
/// teacher's `escape_attribute_value`).
pub fn escape_attribute_value(value: &str) -> String {
    if value.contains(';') || value.contains('{') || value.contains('}') {
        format!("{{{value}}}")
    } else {
        value.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_pairs() {
        let attrs = parse_connection_string("driver=SQLite3;server=localhost");
        assert_eq!(attrs.get("driver").map(String::as_str), Some("SQLite3"));
        assert_eq!(attrs.get("server").map(String::as_str), Some("localhost"));
    }

    #[test]
    fn keys_are_case_insensitive() {
        let attrs = parse_connection_string("DRIVER=Foo");
        assert_eq!(attrs.get("driver").map(String::as_str), Some("Foo"));
    }

    #[test]
    fn braced_value_may_contain_semicolons() {
        let attrs = parse_connection_string("pwd={a;b};driver=Foo");
        assert_eq!(attrs.get("pwd").map(String::as_str), Some("a;b"));
        assert_eq!(attrs.get("driver").map(String::as_str), Some("Foo"));
    }

    #[test]
    fn escape_round_trips_through_parse() {
        let escaped = escape_attribute_value("a;b");
        let s = format!("x={escaped}");
        let attrs = parse_connection_string(&s);
        assert_eq!(attrs.get("x").map(String::as_str), Some("a;b"));
    }
}
