//! Binary-format readers for types tokio-postgres has no `FromSql` for.
//! Each returns the value's PostgreSQL text form.

use std::{
    error::Error,
    fmt::Write as _,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
};

pub type BoxError = Box<dyn Error + Sync + Send>;

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_HOUR: i64 = 3_600 * MICROS_PER_SECOND;

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

const PGSQL_AF_INET: u8 = 2;
const PGSQL_AF_INET6: u8 = 3;

const RANGE_EMPTY: u8 = 0x01;
const RANGE_LB_INC: u8 = 0x02;
const RANGE_UB_INC: u8 = 0x04;
const RANGE_LB_INF: u8 = 0x08;
const RANGE_UB_INF: u8 = 0x10;

pub struct WireReader<'a> {
    buf: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        WireReader { buf }
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], BoxError> {
        if self.buf.len() < n {
            return Err(format!("binary value too short: need {n} more bytes").into());
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub fn u8(&mut self) -> Result<u8, BoxError> {
        Ok(self.take(1)?[0])
    }

    pub fn i16(&mut self) -> Result<i16, BoxError> {
        Ok(i16::from_be_bytes(self.take(2)?.try_into()?))
    }

    pub fn u16(&mut self) -> Result<u16, BoxError> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into()?))
    }

    pub fn i32(&mut self) -> Result<i32, BoxError> {
        Ok(i32::from_be_bytes(self.take(4)?.try_into()?))
    }

    pub fn i64(&mut self) -> Result<i64, BoxError> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into()?))
    }

    /// A length-prefixed field; `None` for SQL NULL (length -1).
    pub fn field(&mut self) -> Result<Option<&'a [u8]>, BoxError> {
        match self.i32()? {
            -1 => Ok(None),
            len if len < 0 => Err(format!("invalid field length {len}").into()),
            len => Ok(Some(self.take(len as usize)?)),
        }
    }

    pub fn finish(&self) -> Result<(), BoxError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(format!("{} trailing bytes in binary value", self.buf.len()).into())
        }
    }
}

/// Exact decimal text of a `numeric`, including `NaN` and the infinities.
pub fn numeric_text(raw: &[u8]) -> Result<String, BoxError> {
    let mut r = WireReader::new(raw);
    let ndigits = r.i16()?;
    let weight = r.i16()? as i32;
    let sign = r.u16()?;
    let dscale = r.u16()? as usize;

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        NUMERIC_POS | NUMERIC_NEG => {}
        other => return Err(format!("invalid numeric sign 0x{other:04X}").into()),
    }

    let digits = (0..ndigits.max(0))
        .map(|_| r.i16())
        .collect::<Result<Vec<_>, _>>()?;
    r.finish()?;

    // Base-10000 digit `i` has exponent `weight - i`.
    let digit = |i: i32| -> i16 {
        usize::try_from(i)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut text = String::new();
    if sign == NUMERIC_NEG {
        text.push('-');
    }
    if weight < 0 {
        text.push('0');
    } else {
        for i in 0..=weight {
            if i == 0 {
                let _ = write!(text, "{}", digit(i));
            } else {
                let _ = write!(text, "{:04}", digit(i));
            }
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut i = weight + 1;
        while fraction.len() < dscale {
            let _ = write!(fraction, "{:04}", digit(i));
            i += 1;
        }
        fraction.truncate(dscale);
        text.push('.');
        text.push_str(&fraction);
    }

    Ok(text)
}

/// `money` as a count of cents.
pub fn money_cents(raw: &[u8]) -> Result<i64, BoxError> {
    let mut r = WireReader::new(raw);
    let cents = r.i64()?;
    r.finish()?;
    Ok(cents)
}

/// `interval` in the default `postgres` style: `1 year 2 mons 3 days 04:05:06`.
pub fn interval_text(raw: &[u8]) -> Result<String, BoxError> {
    let mut r = WireReader::new(raw);
    let micros = r.i64()?;
    let days = r.i32()?;
    let months = r.i32()?;
    r.finish()?;

    let mut parts = Vec::new();
    let (years, months) = (months / 12, months % 12);
    for (amount, unit) in [(years, "year"), (months, "mon"), (days, "day")] {
        if amount != 0 {
            let plural = if amount == 1 { "" } else { "s" };
            parts.push(format!("{amount} {unit}{plural}"));
        }
    }

    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        parts.push(format!("{sign}{}", clock_text(micros.unsigned_abs())));
    }

    Ok(parts.join(" "))
}

/// `timetz` as `HH:MM:SS[.ffffff]+HH[:MM[:SS]]`.
pub fn timetz_text(raw: &[u8]) -> Result<String, BoxError> {
    let mut r = WireReader::new(raw);
    let micros = r.i64()?;
    // Seconds west of UTC, so UTC+2 arrives as -7200.
    let west = r.i32()?;
    r.finish()?;

    if micros < 0 {
        return Err(format!("invalid time of day {micros}").into());
    }

    let east = -i64::from(west);
    let sign = if east < 0 { '-' } else { '+' };
    let east = east.unsigned_abs();
    let (hours, minutes, seconds) = (east / 3600, east / 60 % 60, east % 60);

    let mut text = clock_text(micros.unsigned_abs());
    let _ = write!(text, "{sign}{hours:02}");
    if minutes != 0 || seconds != 0 {
        let _ = write!(text, ":{minutes:02}");
    }
    if seconds != 0 {
        let _ = write!(text, ":{seconds:02}");
    }
    Ok(text)
}

/// `inet` and `cidr`. `inet` omits a full-length netmask; `cidr` always shows it.
pub fn inet_text(raw: &[u8]) -> Result<String, BoxError> {
    let mut r = WireReader::new(raw);
    let family = r.u8()?;
    let bits = r.u8()?;
    let is_cidr = r.u8()? != 0;
    let len = r.u8()? as usize;
    let addr = r.take(len)?;
    r.finish()?;

    let (addr, max_bits) = match (family, len) {
        (PGSQL_AF_INET, 4) => {
            let octets: [u8; 4] = addr.try_into()?;
            (IpAddr::V4(Ipv4Addr::from(octets)), 32)
        }
        (PGSQL_AF_INET6, 16) => {
            let octets: [u8; 16] = addr.try_into()?;
            (IpAddr::V6(Ipv6Addr::from(octets)), 128)
        }
        _ => return Err(format!("invalid inet family {family} with {len} address bytes").into()),
    };

    if is_cidr || bits != max_bits {
        Ok(format!("{addr}/{bits}"))
    } else {
        Ok(addr.to_string())
    }
}

/// A one or more dimensional array literal such as `{1,NULL,3}` or
/// `{{a,b},{c,d}}`. Elements are rendered with `element`; non-default
/// lower bounds are written as a `[2:3]=` prefix.
pub fn array_text<F>(raw: &[u8], mut element: F) -> Result<String, BoxError>
where
    F: FnMut(&[u8]) -> Result<String, BoxError>,
{
    let mut r = WireReader::new(raw);
    let ndim = r.i32()?;
    let _has_nulls = r.i32()?;
    let _element_oid = r.i32()?;

    if ndim == 0 {
        r.finish()?;
        return Ok("{}".to_string());
    }
    if !(1..=6).contains(&ndim) {
        return Err(format!("invalid array dimension count {ndim}").into());
    }

    let mut dims = Vec::with_capacity(ndim as usize);
    for _ in 0..ndim {
        let len = r.i32()?;
        let lower = r.i32()?;
        if len < 0 {
            return Err(format!("invalid array dimension length {len}").into());
        }
        dims.push((len as usize, lower));
    }

    let total = dims.iter().map(|(len, _)| *len).product::<usize>();
    let mut elements = Vec::new();
    for _ in 0..total {
        elements.push(match r.field()? {
            Some(bytes) => Some(element(bytes)?),
            None => None,
        });
    }
    r.finish()?;

    let mut text = String::new();
    if dims.iter().any(|(_, lower)| *lower != 1) {
        for (len, lower) in &dims {
            let _ = write!(text, "[{}:{}]", lower, *lower as i64 + *len as i64 - 1);
        }
        text.push('=');
    }

    let mut elements = elements.into_iter();
    write_dimension(&mut text, &dims, &mut elements);
    Ok(text)
}

fn write_dimension(
    out: &mut String,
    dims: &[(usize, i32)],
    elements: &mut impl Iterator<Item = Option<String>>,
) {
    let Some(((len, _), inner)) = dims.split_first() else {
        return;
    };

    out.push('{');
    for i in 0..*len {
        if i > 0 {
            out.push(',');
        }
        if inner.is_empty() {
            match elements.next().flatten() {
                Some(item) => out.push_str(&quote_element(&item, "{},\"\\")),
                None => out.push_str("NULL"),
            }
        } else {
            write_dimension(out, inner, elements);
        }
    }
    out.push('}');
}

/// A range literal such as `[1,10)`, `(,5]` or `empty`.
pub fn range_text<F>(raw: &[u8], mut bound: F) -> Result<String, BoxError>
where
    F: FnMut(&[u8]) -> Result<String, BoxError>,
{
    let mut r = WireReader::new(raw);
    let flags = r.u8()?;
    if flags & RANGE_EMPTY != 0 {
        r.finish()?;
        return Ok("empty".to_string());
    }

    let mut read_bound = |infinite: bool| -> Result<String, BoxError> {
        if infinite {
            return Ok(String::new());
        }
        match r.field()? {
            Some(bytes) => Ok(quote_element(&bound(bytes)?, "()[],\"\\")),
            None => Ok(String::new()),
        }
    };
    let lower = read_bound(flags & RANGE_LB_INF != 0)?;
    let upper = read_bound(flags & RANGE_UB_INF != 0)?;
    r.finish()?;

    let open = if flags & RANGE_LB_INC != 0 { '[' } else { '(' };
    let close = if flags & RANGE_UB_INC != 0 { ']' } else { ')' };
    Ok(format!("{open}{lower},{upper}{close}"))
}

/// Double-quotes `item` when it is empty, spells NULL, or holds whitespace or
/// one of `special`.
fn quote_element(item: &str, special: &str) -> String {
    let needs_quotes = item.is_empty()
        || item.eq_ignore_ascii_case("null")
        || item
            .chars()
            .any(|c| c.is_whitespace() || special.contains(c));
    if !needs_quotes {
        return item.to_string();
    }

    let mut out = String::with_capacity(item.len() + 2);
    out.push('"');
    for c in item.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// `HH:MM:SS` with up to six trimmed fractional digits. Hours may exceed 23.
fn clock_text(micros: u64) -> String {
    let hours = micros / MICROS_PER_HOUR as u64;
    let minutes = micros / (60 * MICROS_PER_SECOND as u64) % 60;
    let seconds = micros / MICROS_PER_SECOND as u64 % 60;
    let fraction = micros % MICROS_PER_SECOND as u64;

    let mut text = format!("{hours:02}:{minutes:02}:{seconds:02}");
    if fraction != 0 {
        let digits = format!("{fraction:06}");
        text.push('.');
        text.push_str(digits.trim_end_matches('0'));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(ndigits: i16, weight: i16, sign: u16, dscale: u16, digits: &[i16]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&ndigits.to_be_bytes());
        raw.extend_from_slice(&weight.to_be_bytes());
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&dscale.to_be_bytes());
        for d in digits {
            raw.extend_from_slice(&d.to_be_bytes());
        }
        raw
    }

    fn interval(micros: i64, days: i32, months: i32) -> Vec<u8> {
        let mut raw = micros.to_be_bytes().to_vec();
        raw.extend_from_slice(&days.to_be_bytes());
        raw.extend_from_slice(&months.to_be_bytes());
        raw
    }

    fn int4_array(dims: &[(i32, i32)], items: &[Option<i32>]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(dims.len() as i32).to_be_bytes());
        raw.extend_from_slice(&(items.iter().any(Option::is_none) as i32).to_be_bytes());
        raw.extend_from_slice(&23i32.to_be_bytes());
        for (len, lower) in dims {
            raw.extend_from_slice(&len.to_be_bytes());
            raw.extend_from_slice(&lower.to_be_bytes());
        }
        for item in items {
            match item {
                Some(v) => {
                    raw.extend_from_slice(&4i32.to_be_bytes());
                    raw.extend_from_slice(&v.to_be_bytes());
                }
                None => raw.extend_from_slice(&(-1i32).to_be_bytes()),
            }
        }
        raw
    }

    fn int4_text(bytes: &[u8]) -> Result<String, BoxError> {
        Ok(i32::from_be_bytes(bytes.try_into()?).to_string())
    }

    #[test]
    fn test_numeric_text() {
        // 1523.25
        assert_eq!(numeric_text(&numeric(2, 0, NUMERIC_POS, 2, &[1523, 2500])).unwrap(), "1523.25");
        // -0.0001
        assert_eq!(numeric_text(&numeric(1, -1, NUMERIC_NEG, 4, &[1])).unwrap(), "-0.0001");
        // 0.000
        assert_eq!(numeric_text(&numeric(0, 0, NUMERIC_POS, 3, &[])).unwrap(), "0.000");
        // 120000 (trailing zero groups are not sent)
        assert_eq!(numeric_text(&numeric(1, 1, NUMERIC_POS, 0, &[12])).unwrap(), "120000");
        // 0.00000001
        assert_eq!(numeric_text(&numeric(1, -2, NUMERIC_POS, 8, &[1])).unwrap(), "0.00000001");
    }

    #[test]
    fn test_numeric_beyond_decimal_range() {
        // 1e40
        let text = numeric_text(&numeric(1, 10, NUMERIC_POS, 0, &[1])).unwrap();
        assert_eq!(text, format!("1{}", "0".repeat(40)));

        assert_eq!(numeric_text(&numeric(0, 0, NUMERIC_NAN, 0, &[])).unwrap(), "NaN");
        assert_eq!(numeric_text(&numeric(0, 0, NUMERIC_PINF, 0, &[])).unwrap(), "Infinity");
        assert_eq!(numeric_text(&numeric(0, 0, NUMERIC_NINF, 0, &[])).unwrap(), "-Infinity");
        assert!(numeric_text(&numeric(0, 0, 0x1234, 0, &[])).is_err());
        assert!(numeric_text(&numeric(2, 0, NUMERIC_POS, 0, &[1])).is_err());
    }

    #[test]
    fn test_interval_text() {
        assert_eq!(interval_text(&interval(0, 1, 0)).unwrap(), "1 day");
        assert_eq!(interval_text(&interval(0, 0, 0)).unwrap(), "00:00:00");
        assert_eq!(
            interval_text(&interval(4 * 3_600_000_000 + 5 * 60_000_000 + 6_000_000, 3, 14)).unwrap(),
            "1 year 2 mons 3 days 04:05:06"
        );
        assert_eq!(interval_text(&interval(-1_500_000, -2, 0)).unwrap(), "-2 days -00:00:01.5");
        assert_eq!(interval_text(&interval(90 * 3_600_000_000, 0, 0)).unwrap(), "90:00:00");
        assert_eq!(interval_text(&interval(0, 0, -13)).unwrap(), "-1 years -1 mons");
        assert!(interval_text(&interval(0, 1, 0)[..12]).is_err());
    }

    #[test]
    fn test_timetz_text() {
        let mut raw = (13 * 3_600_000_000i64 + 250_000).to_be_bytes().to_vec();
        raw.extend_from_slice(&(-7200i32).to_be_bytes());
        assert_eq!(timetz_text(&raw).unwrap(), "13:00:00.25+02");

        let mut raw = 0i64.to_be_bytes().to_vec();
        raw.extend_from_slice(&(5 * 3600 + 30 * 60i32).to_be_bytes());
        assert_eq!(timetz_text(&raw).unwrap(), "00:00:00-05:30");
    }

    #[test]
    fn test_inet_and_cidr_text() {
        assert_eq!(inet_text(&[2, 32, 0, 4, 10, 0, 0, 1]).unwrap(), "10.0.0.1");
        assert_eq!(inet_text(&[2, 24, 0, 4, 192, 168, 1, 7]).unwrap(), "192.168.1.7/24");
        assert_eq!(inet_text(&[2, 32, 1, 4, 10, 0, 0, 1]).unwrap(), "10.0.0.1/32");

        let mut v6 = vec![3, 64, 1, 16];
        v6.extend_from_slice(&[0x20, 0x01, 0x0d, 0xb8]);
        v6.extend_from_slice(&[0; 12]);
        assert_eq!(inet_text(&v6).unwrap(), "2001:db8::/64");

        assert!(inet_text(&[2, 32, 0, 16, 10, 0, 0, 1]).is_err());
    }

    #[test]
    fn test_array_text() {
        let raw = int4_array(&[(3, 1)], &[Some(1), None, Some(3)]);
        assert_eq!(array_text(&raw, int4_text).unwrap(), "{1,NULL,3}");

        let raw = int4_array(&[(2, 1), (2, 1)], &[Some(1), Some(2), Some(3), Some(4)]);
        assert_eq!(array_text(&raw, int4_text).unwrap(), "{{1,2},{3,4}}");

        let raw = int4_array(&[(2, 0)], &[Some(7), Some(8)]);
        assert_eq!(array_text(&raw, int4_text).unwrap(), "[0:1]={7,8}");

        let raw = int4_array(&[], &[]);
        assert_eq!(array_text(&raw, int4_text).unwrap(), "{}");
    }

    #[test]
    fn test_array_elements_are_quoted_when_needed() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&1i32.to_be_bytes());
        raw.extend_from_slice(&0i32.to_be_bytes());
        raw.extend_from_slice(&25i32.to_be_bytes());
        raw.extend_from_slice(&4i32.to_be_bytes());
        raw.extend_from_slice(&1i32.to_be_bytes());
        for item in ["plain", "a,b", "", "say \"hi\""] {
            raw.extend_from_slice(&(item.len() as i32).to_be_bytes());
            raw.extend_from_slice(item.as_bytes());
        }

        let text = array_text(&raw, |b| Ok(std::str::from_utf8(b)?.to_string())).unwrap();
        assert_eq!(text, r#"{plain,"a,b","","say \"hi\""}"#);
    }

    #[test]
    fn test_range_text() {
        let mut raw = vec![RANGE_LB_INC];
        for bound in [1i32, 10] {
            raw.extend_from_slice(&4i32.to_be_bytes());
            raw.extend_from_slice(&bound.to_be_bytes());
        }
        assert_eq!(range_text(&raw, int4_text).unwrap(), "[1,10)");

        let mut raw = vec![RANGE_LB_INF | RANGE_UB_INC];
        raw.extend_from_slice(&4i32.to_be_bytes());
        raw.extend_from_slice(&5i32.to_be_bytes());
        assert_eq!(range_text(&raw, int4_text).unwrap(), "(,5]");

        assert_eq!(range_text(&[RANGE_EMPTY], int4_text).unwrap(), "empty");
    }

    #[test]
    fn test_money_cents() {
        assert_eq!(money_cents(&(-12345i64).to_be_bytes()).unwrap(), -12345);
        assert!(money_cents(&[0, 1]).is_err());
    }
}
