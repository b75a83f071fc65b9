// src/dbf/value.rs

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use std::fmt::Write as _;

use super::header::{FieldDescriptor, FieldType};
use super::memo::{MemoBlock, MemoFile};
use super::DbfError;
use crate::encoding::{Codec, DecodeMode};

/// Offset between the Julian day number used by FoxPro and chrono's day 1 (0001-01-01).
const JULIAN_TO_CE: i64 = 1_721_425;

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    /// An integer too wide for `i64`, kept as its normalized digits.
    Decimal(String),
    Float(f64),
    /// Fixed-point money in ten-thousandths.
    Currency(i64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Logical(bool),
    Bytes(Vec<u8>),
}

impl Value {
    /// Text rendering used for the all-TEXT target columns.
    ///
    /// Null renders as "". Floats keep a trailing `.0` and use `1e+16` style
    /// exponents; date-times carry `.ffffff` only when there is a sub-second
    /// part. Raw bytes (binary memos, null flags) render as lowercase hex
    /// with no prefix.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Text(s) | Value::Decimal(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => float_text(*f),
            Value::Currency(units) => currency_text(*units),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) if dt.nanosecond() == 0 => {
                dt.format("%Y-%m-%d %H:%M:%S").to_string()
            }
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            Value::Logical(true) => "True".into(),
            Value::Logical(false) => "False".into(),
            Value::Bytes(b) => b.iter().fold(String::with_capacity(b.len() * 2), |mut s, x| {
                let _ = write!(s, "{:02x}", x);
                s
            }),
        }
    }
}

fn float_text(f: f64) -> String {
    if f.is_nan() {
        return "nan".into();
    }
    // `{:?}` already switches to exponent form outside 1e-4..1e16
    let debug = format!("{:?}", f);
    match debug.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => debug,
    }
}

fn currency_text(units: i64) -> String {
    let sign = if units < 0 { "-" } else { "" };
    let abs = units.unsigned_abs();
    let whole = abs / 10_000;
    let frac = abs % 10_000;
    if frac == 0 {
        return format!("{}{}", sign, whole);
    }
    let frac = format!("{:04}", frac);
    format!("{}{}.{}", sign, whole, frac.trim_end_matches('0'))
}

/// Everything a field parser needs besides the raw bytes.
pub struct FieldContext<'a> {
    pub codec: &'a Codec,
    pub mode: DecodeMode,
    pub memo: Option<&'a MemoFile>,
}

pub fn parse_value(
    field: &FieldDescriptor,
    raw: &[u8],
    ctx: &FieldContext<'_>,
) -> Result<Value, DbfError> {
    match field.kind {
        FieldType::Character => {
            let trimmed = trim_end(raw, &[b' ', 0]);
            Ok(Value::Text(ctx.codec.decode(trimmed, ctx.mode)?.into_owned()))
        }
        FieldType::Numeric | FieldType::Float => parse_numeric(field, raw),
        FieldType::Date => parse_date(field, raw),
        FieldType::Logical => match raw.first().copied().unwrap_or(b' ') {
            b'T' | b't' | b'Y' | b'y' => Ok(Value::Logical(true)),
            b'F' | b'f' | b'N' | b'n' => Ok(Value::Logical(false)),
            b'?' | b' ' | 0 => Ok(Value::Null),
            _ => Err(invalid(field, "logical", raw)),
        },
        FieldType::Integer | FieldType::AutoIncrement => {
            let bytes: [u8; 4] = fixed(field, raw)?;
            Ok(Value::Integer(i64::from(i32::from_le_bytes(bytes))))
        }
        FieldType::Currency => {
            let bytes: [u8; 8] = fixed(field, raw)?;
            Ok(Value::Currency(i64::from_le_bytes(bytes)))
        }
        FieldType::Double => {
            let bytes: [u8; 8] = fixed(field, raw)?;
            Ok(Value::Float(f64::from_le_bytes(bytes)))
        }
        FieldType::Binary if field.length == 8 => {
            let bytes: [u8; 8] = fixed(field, raw)?;
            Ok(Value::Float(f64::from_le_bytes(bytes)))
        }
        FieldType::DateTime => {
            let bytes: [u8; 8] = fixed(field, raw)?;
            let day = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            let msec = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
            julian_datetime(field, day, msec, raw)
        }
        FieldType::Timestamp => {
            let bytes: [u8; 8] = fixed(field, raw)?;
            let day = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            let msec = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
            julian_datetime(field, day, msec, raw)
        }
        FieldType::Memo | FieldType::General | FieldType::Picture | FieldType::Binary => {
            parse_memo(field, raw, ctx)
        }
        FieldType::NullFlags => Ok(Value::Bytes(raw.to_vec())),
        FieldType::Unknown(kind) => Err(DbfError::UnknownFieldType {
            field: field.name.clone(),
            kind,
        }),
    }
}

fn parse_numeric(field: &FieldDescriptor, raw: &[u8]) -> Result<Value, DbfError> {
    // some writers pad with '*' or NUL instead of spaces
    let text = String::from_utf8_lossy(raw);
    let cleaned = text
        .trim_matches(|c: char| c.is_ascii_whitespace() || c == '\0')
        .trim_matches('*');
    if cleaned.trim().is_empty() {
        return Ok(Value::Null);
    }
    if let Ok(i) = cleaned.parse::<i64>() {
        return Ok(Value::Integer(i));
    }
    if let Some(digits) = wide_integer(cleaned) {
        return Ok(Value::Decimal(digits));
    }
    cleaned
        .replace(',', ".")
        .parse::<f64>()
        .map(Value::Float)
        .map_err(|_| invalid(field, "numeric", raw))
}

/// `[+-]digits` normalized to no `+` and no leading zeros.
fn wide_integer(text: &str) -> Option<String> {
    let (negative, digits) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match digits.trim_start_matches('0') {
        "" => Some("0".into()),
        d if negative => Some(format!("-{}", d)),
        d => Some(d.to_string()),
    }
}

fn parse_date(field: &FieldDescriptor, raw: &[u8]) -> Result<Value, DbfError> {
    let text = String::from_utf8_lossy(raw);
    let digits = |range: std::ops::Range<usize>| -> Option<u32> {
        text.get(range)?.trim().parse().ok()
    };
    let date = match (digits(0..4), digits(4..6), digits(6..8)) {
        (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y as i32, m, d),
        _ => None,
    };
    match date {
        Some(d) => Ok(Value::Date(d)),
        None if raw.iter().all(|&b| matches!(b, b' ' | b'0' | 0)) => Ok(Value::Null),
        None => Err(invalid(field, "date", raw)),
    }
}

fn julian_datetime(
    field: &FieldDescriptor,
    day: u32,
    msec: u32,
    raw: &[u8],
) -> Result<Value, DbfError> {
    if day == 0 {
        return Ok(Value::Null);
    }
    let days_ce = i32::try_from(i64::from(day) - JULIAN_TO_CE)
        .map_err(|_| invalid(field, "datetime", raw))?;
    let date = NaiveDate::from_num_days_from_ce_opt(days_ce)
        .ok_or_else(|| invalid(field, "datetime", raw))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| invalid(field, "datetime", raw))?;
    Ok(Value::DateTime(
        midnight + Duration::milliseconds(i64::from(msec)),
    ))
}

fn parse_memo(
    field: &FieldDescriptor,
    raw: &[u8],
    ctx: &FieldContext<'_>,
) -> Result<Value, DbfError> {
    let index: u64 = if raw.len() == 4 {
        u64::from(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    } else {
        let text = String::from_utf8_lossy(raw);
        let trimmed = text.trim_matches(|c: char| c == ' ' || c == '\0');
        if trimmed.is_empty() {
            0
        } else {
            trimmed
                .parse()
                .map_err(|_| invalid(field, "memo pointer", raw))?
        }
    };

    let Some(memo) = ctx.memo else {
        // tables with memo fields are refused at open without a memo file
        return Ok(Value::Null);
    };
    match memo.block(index)? {
        None => Ok(Value::Null),
        Some(MemoBlock::Text(body)) if field.kind == FieldType::Memo => {
            Ok(Value::Text(ctx.codec.decode(body, ctx.mode)?.into_owned()))
        }
        Some(MemoBlock::Text(body)) | Some(MemoBlock::Binary(body)) => {
            Ok(Value::Bytes(body.to_vec()))
        }
    }
}

fn fixed<const N: usize>(field: &FieldDescriptor, raw: &[u8]) -> Result<[u8; N], DbfError> {
    raw.get(..N)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| invalid(field, "binary", raw))
}

fn trim_end<'a>(raw: &'a [u8], pad: &[u8]) -> &'a [u8] {
    let end = raw
        .iter()
        .rposition(|b| !pad.contains(b))
        .map_or(0, |i| i + 1);
    &raw[..end]
}

fn invalid(field: &FieldDescriptor, kind: &'static str, raw: &[u8]) -> DbfError {
    DbfError::InvalidValue {
        field: field.name.clone(),
        kind,
        raw: String::from_utf8_lossy(raw).into_owned(),
    }
}
