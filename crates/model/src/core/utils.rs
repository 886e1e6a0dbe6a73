use std::fmt::Write;

/// Escape CSV per PostgreSQL COPY CSV rules:
/// - field is wrapped in double quotes
/// - internal `"` becomes `""`
/// - commas, newlines, tabs are safe because quoting protects them
pub fn escape_csv_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');

    for ch in s.chars() {
        if ch == '"' {
            out.push('"'); // double the quote
        }
        out.push(ch);
    }

    out.push('"');
    out
}

/// PostgreSQL `bytea` hex input form (`\x0aff`).
pub fn encode_bytea(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + 2 * bytes.len());
    out.push_str("\\x");
    for b in bytes {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

/// Uppercase, hyphen-separated hex dump (`FF-A0-01`).
pub fn encode_hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().saturating_mul(3));
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push('-');
        }
        let _ = write!(&mut out, "{b:02X}");
    }
    out
}

/// Parses either a hex dump (`FF-A0-01`), a `bytea` literal (`\xffa001`) or
/// plain hex digits.
pub fn decode_hex(input: &str) -> Option<Vec<u8>> {
    let trimmed = input.trim();
    let digits: String = trimmed
        .strip_prefix("\\x")
        .unwrap_or(trimmed)
        .chars()
        .filter(|c| *c != '-')
        .collect();

    if digits.len() % 2 != 0 {
        return None;
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_csv_string_doubles_quotes() {
        assert_eq!(escape_csv_string(r#"say "hi""#), r#""say ""hi""""#);
        assert_eq!(escape_csv_string(""), r#""""#);
    }

    #[test]
    fn test_hex_dump() {
        assert_eq!(encode_hex_dump(&[0xff, 0xa0, 0x01]), "FF-A0-01");
        assert_eq!(encode_hex_dump(&[]), "");
        assert_eq!(encode_bytea(&[0xff, 0x01]), "\\xff01");
    }

    #[test]
    fn test_decode_hex_forms() {
        assert_eq!(decode_hex("FF-A0-01"), Some(vec![0xff, 0xa0, 0x01]));
        assert_eq!(decode_hex("\\xffa001"), Some(vec![0xff, 0xa0, 0x01]));
        assert_eq!(decode_hex("0a0B"), Some(vec![0x0a, 0x0b]));
        assert_eq!(decode_hex("abc"), None);
        assert_eq!(decode_hex("zz"), None);
    }
}
