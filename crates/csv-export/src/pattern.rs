use crate::error::ExportError;
use chrono::{Datelike, NaiveDateTime, Timelike};
use std::fmt::Write;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

const MAX_FRACTION_DIGITS: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Year(usize),
    Month(usize),
    Day(usize),
    Hour24(usize),
    Hour12(usize),
    Minute(usize),
    Second(usize),
    /// Fixed number of fraction digits (`f`).
    Fraction(usize),
    /// Up to this many fraction digits, trailing zeros dropped (`F`).
    TrimmedFraction(usize),
    Meridiem(usize),
    Offset(usize),
    Kind,
}

/// A compiled custom date/time pattern (`yyyy-MM-dd HH:mm:ss`, `dd.MM.yyyy`,
/// `MMM d, yyyy h:mm tt`, ...).
///
/// Patterns follow the .NET custom format tokens with invariant-culture
/// names. Characters that are not tokens are copied literally; `'...'` and
/// `"..."` quote literal text, `\` escapes the next character and `%` marks a
/// single-character token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePattern {
    source: String,
    tokens: Vec<Token>,
}

impl DatePattern {
    pub fn compile(pattern: &str) -> Result<Self, ExportError> {
        let error = |message: &str| ExportError::Pattern {
            pattern: pattern.to_string(),
            message: message.to_string(),
        };

        let chars: Vec<char> = pattern.chars().collect();
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut i = 0;

        while i < chars.len() {
            let ch = chars[i];
            match ch {
                '\'' | '"' => {
                    let close = chars[i + 1..]
                        .iter()
                        .position(|c| *c == ch)
                        .ok_or_else(|| error("unterminated quoted literal"))?;
                    literal.extend(&chars[i + 1..i + 1 + close]);
                    i += close + 2;
                    continue;
                }
                '\\' => {
                    let escaped = chars
                        .get(i + 1)
                        .ok_or_else(|| error("pattern ends with an escape character"))?;
                    literal.push(*escaped);
                    i += 2;
                    continue;
                }
                '%' => {
                    // `%` only changes how a lone token is interpreted, which
                    // is irrelevant for custom patterns.
                    if i + 1 >= chars.len() {
                        return Err(error("pattern ends with '%'"));
                    }
                    i += 1;
                    continue;
                }
                _ => {}
            }

            let run = chars[i..].iter().take_while(|c| **c == ch).count();
            let token = match ch {
                'y' => Token::Year(run),
                'M' => Token::Month(run),
                'd' => Token::Day(run),
                'H' => Token::Hour24(run),
                'h' => Token::Hour12(run),
                'm' => Token::Minute(run),
                's' => Token::Second(run),
                'f' | 'F' if run > MAX_FRACTION_DIGITS => {
                    return Err(error("at most 7 fraction digits are supported"));
                }
                'f' => Token::Fraction(run),
                'F' => Token::TrimmedFraction(run),
                't' => Token::Meridiem(run),
                'z' => Token::Offset(run),
                'K' => Token::Kind,
                _ => {
                    literal.extend(std::iter::repeat_n(ch, run));
                    i += run;
                    continue;
                }
            };

            if !literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut literal)));
            }
            tokens.push(token);
            i += run;
        }

        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        Ok(DatePattern {
            source: pattern.to_string(),
            tokens,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Renders a date/time. `utc` marks values that carry a UTC offset; naive
    /// values render an empty `K` and a zero offset for `z` tokens.
    pub fn format(&self, dt: &NaiveDateTime, utc: bool) -> String {
        let mut out = String::with_capacity(self.source.len() + 8);

        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Year(n) => {
                    let year = dt.year();
                    if *n <= 2 {
                        pad(&mut out, year.rem_euclid(100), *n);
                    } else {
                        pad(&mut out, year, *n);
                    }
                }
                Token::Month(n) => match n {
                    1 | 2 => pad(&mut out, dt.month(), *n),
                    3 => out.push_str(&MONTH_NAMES[dt.month0() as usize][..3]),
                    _ => out.push_str(MONTH_NAMES[dt.month0() as usize]),
                },
                Token::Day(n) => {
                    let weekday = dt.weekday().num_days_from_sunday() as usize;
                    match n {
                        1 | 2 => pad(&mut out, dt.day(), *n),
                        3 => out.push_str(&DAY_NAMES[weekday][..3]),
                        _ => out.push_str(DAY_NAMES[weekday]),
                    }
                }
                Token::Hour24(n) => pad(&mut out, dt.hour(), (*n).min(2)),
                Token::Hour12(n) => pad(&mut out, dt.hour12().1, (*n).min(2)),
                Token::Minute(n) => pad(&mut out, dt.minute(), (*n).min(2)),
                Token::Second(n) => pad(&mut out, dt.second(), (*n).min(2)),
                Token::Fraction(n) => out.push_str(&fraction_digits(dt, *n)),
                Token::TrimmedFraction(n) => {
                    let digits = fraction_digits(dt, *n);
                    let trimmed = digits.trim_end_matches('0');
                    if trimmed.is_empty() {
                        if out.ends_with('.') {
                            out.pop();
                        }
                    } else {
                        out.push_str(trimmed);
                    }
                }
                Token::Meridiem(n) => {
                    let marker = if dt.hour12().0 { "PM" } else { "AM" };
                    out.push_str(if *n == 1 { &marker[..1] } else { marker });
                }
                Token::Offset(n) => match n {
                    1 => out.push_str("+0"),
                    2 => out.push_str("+00"),
                    _ => out.push_str("+00:00"),
                },
                Token::Kind => {
                    if utc {
                        out.push('Z');
                    }
                }
            }
        }

        out
    }
}

fn pad(out: &mut String, value: impl Into<i64>, width: usize) {
    let value = value.into();
    if value < 0 {
        let _ = write!(out, "-{:0width$}", -value, width = width);
    } else {
        let _ = write!(out, "{:0width$}", value, width = width);
    }
}

fn fraction_digits(dt: &NaiveDateTime, digits: usize) -> String {
    // Leap seconds are reported as nanosecond values past one second.
    let nanos = dt.nanosecond() % 1_000_000_000;
    let mut text = format!("{nanos:09}");
    text.truncate(digits);
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 12, 31)
            .unwrap()
            .and_hms_milli_opt(11, 22, 33, 450)
            .unwrap()
    }

    fn render(pattern: &str) -> String {
        DatePattern::compile(pattern).unwrap().format(&sample(), false)
    }

    #[test]
    fn test_default_patterns() {
        assert_eq!(render("yyyy-MM-dd"), "2018-12-31");
        assert_eq!(render("yyyy-MM-dd HH:mm:ss"), "2018-12-31 11:22:33");
        assert_eq!(render("MM-dd-yyyy HH:mm:ss"), "12-31-2018 11:22:33");
    }

    #[test]
    fn test_underscore_and_other_characters_are_literal() {
        assert_eq!(render("dd-MM_yyyy"), "31-12_2018");
        assert_eq!(render("dd-MM_yyyy HH:mm:ss"), "31-12_2018 11:22:33");
    }

    #[test]
    fn test_names_and_twelve_hour_clock() {
        assert_eq!(render("dddd, MMMM d, yy"), "Monday, December 31, 18");
        assert_eq!(render("ddd MMM"), "Mon Dec");
        assert_eq!(render("h:mm tt"), "11:22 AM");
        assert_eq!(render("%h t"), "11 A");
    }

    #[test]
    fn test_fractions() {
        assert_eq!(render("ss.fff"), "33.450");
        assert_eq!(render("ss.FFF"), "33.45");
        let whole = NaiveDate::from_ymd_opt(2018, 12, 31)
            .unwrap()
            .and_hms_opt(11, 22, 33)
            .unwrap();
        let pattern = DatePattern::compile("HH:mm:ss.FFF").unwrap();
        assert_eq!(pattern.format(&whole, false), "11:22:33");
    }

    #[test]
    fn test_quoted_and_escaped_literals() {
        assert_eq!(render("'Year' yyyy"), "Year 2018");
        assert_eq!(render("\"d\"d"), "d31");
        assert_eq!(render("\\y\\e\\a\\r yyyy"), "year 2018");
    }

    #[test]
    fn test_offset_and_kind() {
        let pattern = DatePattern::compile("yyyy-MM-ddTHH:mm:ssK").unwrap();
        assert_eq!(pattern.format(&sample(), true), "2018-12-31T11:22:33Z");
        assert_eq!(pattern.format(&sample(), false), "2018-12-31T11:22:33");
        assert_eq!(render("zzz"), "+00:00");
    }

    #[test]
    fn test_invalid_patterns() {
        for bad in ["'open", "yyyy\\", "%", "ffffffff"] {
            assert!(
                matches!(DatePattern::compile(bad), Err(ExportError::Pattern { .. })),
                "{bad}"
            );
        }
    }
}
