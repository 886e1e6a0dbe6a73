/// Renders a column name as a header token.
///
/// With `sanitize` set, everything except ASCII letters, digits and `_` is
/// dropped, leading digits and underscores are stripped and the rest is
/// lowercased. The result may be empty and is not checked for uniqueness.
pub fn format_header(name: &str, sanitize: bool) -> String {
    if !sanitize {
        return name.to_string();
    }

    let kept: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    kept.trim_start_matches(|c: char| c.is_ascii_digit() || c == '_')
        .to_ascii_lowercase()
}
