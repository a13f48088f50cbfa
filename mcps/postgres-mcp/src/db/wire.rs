//! Readers for PostgreSQL's binary value encodings
//!
//! sqlx requests binary results. Columns are only typed at runtime, so the
//! cells are parsed here straight from their wire bytes. That covers values
//! no fixed Rust type can hold, such as `NaN` or 1e40 numerics and infinite
//! dates.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::types::PgInterval;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

const PGSQL_AF_INET: u8 = 2;
const PGSQL_AF_INET6: u8 = 3;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("Value truncated: needed {wanted} more bytes, {left} left")]
    Truncated { wanted: usize, left: usize },

    #[error("Unexpected {len}-byte value for {type_name}")]
    Width { type_name: &'static str, len: usize },

    #[error("Invalid {type_name} value: {reason}")]
    Invalid {
        type_name: &'static str,
        reason: String,
    },
}

fn invalid(type_name: &'static str, reason: impl Into<String>) -> WireError {
    WireError::Invalid {
        type_name,
        reason: reason.into(),
    }
}

/// Big-endian cursor over one value's bytes
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.buf.len() < n {
            return Err(WireError::Truncated {
                wanted: n,
                left: self.buf.len(),
            });
        }
        let (head, rest) = self.buf.split_at(n);
        self.buf = rest;
        Ok(head)
    }

    fn fixed<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.fixed::<1>()?[0])
    }

    fn i16(&mut self) -> Result<i16, WireError> {
        Ok(i16::from_be_bytes(self.fixed()?))
    }

    fn u16(&mut self) -> Result<u16, WireError> {
        Ok(u16::from_be_bytes(self.fixed()?))
    }

    fn i32(&mut self) -> Result<i32, WireError> {
        Ok(i32::from_be_bytes(self.fixed()?))
    }

    fn u32(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_be_bytes(self.fixed()?))
    }

    fn i64(&mut self) -> Result<i64, WireError> {
        Ok(i64::from_be_bytes(self.fixed()?))
    }
}

pub fn bool(buf: &[u8]) -> Result<bool, WireError> {
    match buf {
        [b] => Ok(*b != 0),
        _ => Err(WireError::Width {
            type_name: "bool",
            len: buf.len(),
        }),
    }
}

/// `int2`, `int4` or `int8`, told apart by width
pub fn int(buf: &[u8]) -> Result<i64, WireError> {
    let mut r = Reader::new(buf);
    match buf.len() {
        2 => Ok(r.i16()?.into()),
        4 => Ok(r.i32()?.into()),
        8 => r.i64(),
        len => Err(WireError::Width {
            type_name: "integer",
            len,
        }),
    }
}

/// `oid` and the other unsigned 4-byte identifiers
pub fn oid(buf: &[u8]) -> Result<u32, WireError> {
    match buf.len() {
        4 => Reader::new(buf).u32(),
        len => Err(WireError::Width {
            type_name: "oid",
            len,
        }),
    }
}

/// `float4` or `float8`, told apart by width
pub fn float(buf: &[u8]) -> Result<f64, WireError> {
    let mut r = Reader::new(buf);
    match buf.len() {
        4 => Ok(f32::from_bits(r.u32()?).into()),
        8 => Ok(f64::from_bits(u64::from_be_bytes(r.fixed()?))),
        len => Err(WireError::Width {
            type_name: "float",
            len,
        }),
    }
}

/// Render a `numeric` exactly, including `NaN` and the infinities
pub fn numeric(buf: &[u8]) -> Result<String, WireError> {
    let mut r = Reader::new(buf);
    let ndigits = r.i16()?;
    let weight = i32::from(r.i16()?);
    let sign = r.u16()?;
    let dscale = r.u16()?;

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        NUMERIC_POS | NUMERIC_NEG => {}
        other => return Err(invalid("numeric", format!("sign 0x{:04x}", other))),
    }

    // Base-10000 digits; the first one is worth 10000^weight.
    let digits = (0..ndigits.max(0))
        .map(|_| r.i16())
        .collect::<Result<Vec<_>, _>>()?;
    let digit = |i: i32| {
        usize::try_from(i)
            .ok()
            .and_then(|i| digits.get(i))
            .copied()
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&digit(0).to_string());
        for i in 1..=weight {
            out.push_str(&format!("{:04}", digit(i)));
        }
    }

    if dscale > 0 {
        let mut fraction = String::new();
        for k in 1..=(i32::from(dscale) + 3) / 4 {
            fraction.push_str(&format!("{:04}", digit(weight + k)));
        }
        fraction.truncate(usize::from(dscale));
        out.push('.');
        out.push_str(&fraction);
    }

    Ok(out)
}

/// The JSON text of a `jsonb` value
pub fn jsonb(buf: &[u8]) -> Result<&[u8], WireError> {
    match buf.split_first() {
        Some((1, text)) => Ok(text),
        Some((version, _)) => Err(invalid("jsonb", format!("format version {}", version))),
        None => Err(WireError::Truncated { wanted: 1, left: 0 }),
    }
}

fn epoch() -> Result<NaiveDateTime, WireError> {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| invalid("timestamp", "epoch out of range"))
}

/// `date` as `YYYY-MM-DD`, or `infinity`/`-infinity`
pub fn date(buf: &[u8]) -> Result<String, WireError> {
    let days = Reader::new(buf).i32()?;
    match days {
        i32::MAX => Ok("infinity".to_string()),
        i32::MIN => Ok("-infinity".to_string()),
        days => epoch()?
            .date()
            .checked_add_signed(Duration::days(days.into()))
            .map(|d| d.to_string())
            .ok_or_else(|| invalid("date", "out of range")),
    }
}

enum Timestamp {
    Finite(NaiveDateTime),
    Infinite(&'static str),
}

/// Microseconds from the 2000-01-01 epoch
fn timestamp_value(buf: &[u8]) -> Result<Timestamp, WireError> {
    let micros = Reader::new(buf).i64()?;
    match micros {
        i64::MAX => Ok(Timestamp::Infinite("infinity")),
        i64::MIN => Ok(Timestamp::Infinite("-infinity")),
        micros => epoch()?
            .checked_add_signed(Duration::microseconds(micros))
            .map(Timestamp::Finite)
            .ok_or_else(|| invalid("timestamp", "out of range")),
    }
}

/// `timestamp` as ISO-8601 without an offset
pub fn timestamp(buf: &[u8]) -> Result<String, WireError> {
    Ok(match timestamp_value(buf)? {
        Timestamp::Finite(ts) => ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        Timestamp::Infinite(text) => text.to_string(),
    })
}

/// `timestamptz` as RFC 3339 in UTC
pub fn timestamptz(buf: &[u8]) -> Result<String, WireError> {
    Ok(match timestamp_value(buf)? {
        Timestamp::Finite(ts) => DateTime::<Utc>::from_naive_utc_and_offset(ts, Utc).to_rfc3339(),
        Timestamp::Infinite(text) => text.to_string(),
    })
}

/// `HH:MM:SS` plus trimmed fractional seconds; hours may pass 24
fn clock(micros: u64) -> String {
    let secs = micros / 1_000_000;
    let fraction = micros % 1_000_000;
    let mut out = format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60);
    if fraction != 0 {
        out.push('.');
        out.push_str(format!("{:06}", fraction).trim_end_matches('0'));
    }
    out
}

fn time_micros(r: &mut Reader<'_>) -> Result<u64, WireError> {
    let micros = r.i64()?;
    u64::try_from(micros).map_err(|_| invalid("time", format!("{} microseconds", micros)))
}

/// `time`, printed the way psql shows it
pub fn time(buf: &[u8]) -> Result<String, WireError> {
    Ok(clock(time_micros(&mut Reader::new(buf))?))
}

/// `timetz` as time plus UTC offset, e.g. `12:00:00+05:30`
pub fn timetz(buf: &[u8]) -> Result<String, WireError> {
    let mut r = Reader::new(buf);
    let time = clock(time_micros(&mut r)?);
    // Stored as seconds west of UTC.
    let east = -i64::from(r.i32()?);
    let abs = east.unsigned_abs();
    let mut offset = format!("{}{:02}", if east < 0 { '-' } else { '+' }, abs / 3600);
    if abs % 3600 != 0 {
        offset.push_str(&format!(":{:02}", abs / 60 % 60));
    }
    if abs % 60 != 0 {
        offset.push_str(&format!(":{:02}", abs % 60));
    }
    Ok(time + &offset)
}

pub fn interval(buf: &[u8]) -> Result<PgInterval, WireError> {
    let mut r = Reader::new(buf);
    let microseconds = r.i64()?;
    let days = r.i32()?;
    let months = r.i32()?;
    Ok(PgInterval {
        months,
        days,
        microseconds,
    })
}

/// Postgres-style interval text, e.g. `1 year 2 mons 3 days 04:05:06`
pub fn format_interval(interval: &PgInterval) -> String {
    let mut parts = Vec::new();
    let mut negative_before = false;

    let fields = [
        (interval.months / 12, "year"),
        (interval.months % 12, "mon"),
        (interval.days, "day"),
    ];
    for (value, unit) in fields {
        if value == 0 {
            continue;
        }
        let sign = if negative_before && value > 0 { "+" } else { "" };
        let plural = if value == 1 { "" } else { "s" };
        parts.push(format!("{}{} {}{}", sign, value, unit, plural));
        negative_before |= value < 0;
    }

    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 {
            "-"
        } else if negative_before {
            "+"
        } else {
            ""
        };
        parts.push(format!("{}{}", sign, clock(interval.microseconds.unsigned_abs())));
    }

    parts.join(" ")
}

/// `inet`/`cidr`; the prefix is shown for networks and non-host masks
pub fn inet(buf: &[u8]) -> Result<String, WireError> {
    let mut r = Reader::new(buf);
    let family = r.u8()?;
    let bits = r.u8()?;
    let is_cidr = r.u8()? != 0;
    let len = usize::from(r.u8()?);
    let addr = r.take(len)?;

    let (ip, max_bits) = match (family, addr.len()) {
        (PGSQL_AF_INET, 4) => (IpAddr::V4(Ipv4Addr::new(addr[0], addr[1], addr[2], addr[3])), 32),
        (PGSQL_AF_INET6, 16) => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(addr);
            (IpAddr::V6(Ipv6Addr::from(octets)), 128)
        }
        _ => return Err(invalid("inet", format!("family {} with {} bytes", family, len))),
    };

    if is_cidr || bits != max_bits {
        Ok(format!("{}/{}", ip, bits))
    } else {
        Ok(ip.to_string())
    }
}

/// A decoded array header with its still-encoded elements in row-major order
#[derive(Debug, PartialEq)]
pub struct WireArray<'a> {
    pub dims: Vec<usize>,
    pub elements: Vec<Option<&'a [u8]>>,
}

pub fn array(buf: &[u8]) -> Result<WireArray<'_>, WireError> {
    let mut r = Reader::new(buf);
    let ndim = r.i32()?;
    let _has_nulls = r.i32()?;
    let _element_oid = r.u32()?;

    let mut dims = Vec::new();
    for _ in 0..ndim {
        let len = r.i32()?;
        let _lower_bound = r.i32()?;
        dims.push(usize::try_from(len).map_err(|_| invalid("array", format!("dimension {}", len)))?);
    }

    let count = if dims.is_empty() { 0 } else { dims.iter().product() };
    let mut elements = Vec::new();
    for _ in 0..count {
        let len = r.i32()?;
        // -1 marks NULL
        let element = match usize::try_from(len) {
            Ok(len) => Some(r.take(len)?),
            Err(_) => None,
        };
        elements.push(element);
    }

    Ok(WireArray { dims, elements })
}
