//! # Runtime Value Representation
//!
//! [`Value`] is the runtime scalar flowing through scans, expressions, and
//! sinks. Each variant corresponds to one `TypeTag` family and has a fixed
//! binary slot image (see `types::sql_type` for widths).
//!
//! ## Small-string slots
//!
//! `Char`/`Varchar`/`Text` slots are 16 bytes with a discriminated layout:
//!
//! ```text
//! inline (len <= 15):        pooled (len > 15):
//! +----+---------------+     +------+-------------+--------+----------+
//! | len| payload[0..15]|     | 0xFF | len u32 LE  | pad[3] | ptr u64  |
//! +----+---------------+     +------+-------------+--------+----------+
//!  byte 0                     byte 0  bytes 1..5    5..8     8..16
//! ```
//!
//! Pooled payloads live in the owning table's text pool and stay valid until
//! the table is dropped; a pooled [`TextBuf`] therefore carries a raw pointer
//! and must not outlive its table.
//!
//! ## Null semantics
//!
//! `Value::Null` poisons arithmetic and comparisons; the logical connectives
//! follow SQL ternary logic (implemented in the expression layer). `hash` and
//! `equals` are only defined over non-null operands.
//!
//! ## Temporal encoding
//!
//! Dates and timestamps are signed millisecond offsets from 2000-01-01
//! 00:00:00. The parser accepts `YY-MM-DD` (and four-digit years) plus an
//! optional `HH:MM:SS.ffff` time part with a fractional field of up to four
//! digits (tenths of a millisecond).

use crate::error::RuntimeError;
use crate::storage::text_pool::TextPool;
use crate::types::{SqlType, TypeTag};
use std::cmp::Ordering;
use std::fmt;

/// Days between 1970-01-01 and the engine epoch 2000-01-01.
const EPOCH_DAYS_FROM_UNIX: i64 = 10_957;
const MS_PER_DAY: i64 = 86_400_000;

const INLINE_STRING_MAX: usize = 15;
const STRING_SLOT_SIZE: usize = 16;
const POOLED_MARKER: u8 = 0xFF;

/// Owned-or-borrowed string payload behind `Value::Str`.
#[derive(Debug, Clone)]
pub enum TextBuf {
    Inline { len: u8, bytes: [u8; INLINE_STRING_MAX] },
    /// Borrowed from a table's text pool; valid until the table is dropped.
    Pooled { ptr: *const u8, len: u32 },
    Owned(Box<str>),
}

impl TextBuf {
    pub fn from_str(s: &str) -> Self {
        if s.len() <= INLINE_STRING_MAX {
            let mut bytes = [0u8; INLINE_STRING_MAX];
            bytes[..s.len()].copy_from_slice(s.as_bytes());
            TextBuf::Inline {
                len: s.len() as u8,
                bytes,
            }
        } else {
            TextBuf::Owned(s.into())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TextBuf::Inline { len, bytes } => {
                // Interned and cast payloads are always valid UTF-8.
                std::str::from_utf8(&bytes[..*len as usize]).unwrap_or("")
            }
            TextBuf::Pooled { ptr, len } => unsafe {
                // Safety: the pointer was produced by TextPool::intern and the
                // pool outlives every value materialised from it within a
                // statement.
                let slice = std::slice::from_raw_parts(*ptr, *len as usize);
                std::str::from_utf8_unchecked(slice)
            },
            TextBuf::Owned(s) => s,
        }
    }

    /// Detaches the payload from any pool so it can outlive the table.
    pub fn into_owned(self) -> TextBuf {
        match self {
            TextBuf::Pooled { .. } => TextBuf::Owned(self.as_str().into()),
            other => other,
        }
    }
}

impl PartialEq for TextBuf {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// Runtime SQL scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i32),
    LongInteger(i64),
    Numeric { value: i64, scale: u8 },
    Date(i64),
    Timestamp(i64),
    Str(TextBuf),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn str(s: &str) -> Value {
        Value::Str(TextBuf::from_str(s))
    }

    /// The zero value of a type, used for unlisted insert columns.
    pub fn zero(ty: SqlType) -> Value {
        match ty.tag {
            TypeTag::Unknown => Value::Null,
            TypeTag::Bool => Value::Bool(false),
            TypeTag::Integer => Value::Integer(0),
            TypeTag::LongInteger => Value::LongInteger(0),
            TypeTag::Numeric { scale, .. } => Value::Numeric { value: 0, scale },
            TypeTag::Date => Value::Date(0),
            TypeTag::Timestamp => Value::Timestamp(0),
            TypeTag::Char { .. } | TypeTag::Varchar { .. } | TypeTag::Text => Value::str(""),
        }
    }

    /// Detaches pool-borrowed payloads so the value owns its data.
    pub fn into_owned(self) -> Value {
        match self {
            Value::Str(buf) => Value::Str(buf.into_owned()),
            other => other,
        }
    }

    // ------------------------------------------------------------------
    // Casting

    /// Parses a textual literal into a value of the given type.
    pub fn cast_from_string(text: &str, ty: SqlType) -> Result<Value, RuntimeError> {
        let invalid = || RuntimeError::InvalidCast {
            value: text.to_string(),
            target: ty.type_name(),
        };
        let v = match ty.tag {
            TypeTag::Unknown => return Err(invalid()),
            TypeTag::Bool => match text.to_ascii_lowercase().as_str() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => return Err(invalid()),
            },
            TypeTag::Integer => Value::Integer(text.trim().parse().map_err(|_| invalid())?),
            TypeTag::LongInteger => {
                Value::LongInteger(text.trim().parse().map_err(|_| invalid())?)
            }
            TypeTag::Numeric { length, scale } => {
                let raw = parse_scaled_decimal(text.trim(), scale).ok_or_else(invalid)?;
                if raw.unsigned_abs() > max_for_precision(length) {
                    return Err(RuntimeError::Overflow("numeric cast"));
                }
                Value::Numeric { value: raw, scale }
            }
            TypeTag::Date => {
                let (days, rest) = parse_date_part(text.trim()).ok_or_else(invalid)?;
                if !rest.is_empty() {
                    return Err(invalid());
                }
                Value::Date((days - EPOCH_DAYS_FROM_UNIX) * MS_PER_DAY)
            }
            TypeTag::Timestamp => {
                let (days, rest) = parse_date_part(text.trim()).ok_or_else(invalid)?;
                let time_ms = if rest.is_empty() {
                    0
                } else {
                    parse_time_part(rest.trim_start()).ok_or_else(invalid)?
                };
                Value::Timestamp((days - EPOCH_DAYS_FROM_UNIX) * MS_PER_DAY + time_ms)
            }
            TypeTag::Char { length } | TypeTag::Varchar { length } => {
                let mut s = text.to_string();
                if s.chars().count() > length as usize {
                    s = s.chars().take(length as usize).collect();
                }
                Value::Str(TextBuf::from_str(&s))
            }
            TypeTag::Text => Value::Str(TextBuf::from_str(text)),
        };
        Ok(v)
    }

    // ------------------------------------------------------------------
    // Binary slot images

    /// Writes the fixed-width slot image of this value.
    ///
    /// `dst` must be exactly `ty.slot_size()` bytes; long strings are
    /// interned into `pool` and referenced by pointer.
    pub fn store(&self, dst: &mut [u8], pool: &TextPool) {
        match self {
            Value::Null => dst.fill(0),
            Value::Bool(b) => dst[0] = *b as u8,
            Value::Integer(v) => dst.copy_from_slice(&v.to_le_bytes()),
            Value::LongInteger(v) | Value::Date(v) | Value::Timestamp(v) => {
                dst.copy_from_slice(&v.to_le_bytes())
            }
            Value::Numeric { value, .. } => dst.copy_from_slice(&value.to_le_bytes()),
            Value::Str(buf) => {
                let s = buf.as_str();
                dst.fill(0);
                if s.len() <= INLINE_STRING_MAX {
                    dst[0] = s.len() as u8;
                    dst[1..1 + s.len()].copy_from_slice(s.as_bytes());
                } else {
                    let interned = pool.intern(s);
                    dst[0] = POOLED_MARKER;
                    dst[1..5].copy_from_slice(&(s.len() as u32).to_le_bytes());
                    dst[8..16].copy_from_slice(&(interned.as_ptr() as u64).to_le_bytes());
                }
            }
        }
    }

    /// Reads a value back from a slot image.
    pub fn load(src: &[u8], ty: SqlType) -> Value {
        match ty.tag {
            TypeTag::Unknown => Value::Null,
            TypeTag::Bool => Value::Bool(src[0] != 0),
            TypeTag::Integer => Value::Integer(i32::from_le_bytes(src[..4].try_into().unwrap())),
            TypeTag::LongInteger => {
                Value::LongInteger(i64::from_le_bytes(src[..8].try_into().unwrap()))
            }
            TypeTag::Numeric { scale, .. } => Value::Numeric {
                value: i64::from_le_bytes(src[..8].try_into().unwrap()),
                scale,
            },
            TypeTag::Date => Value::Date(i64::from_le_bytes(src[..8].try_into().unwrap())),
            TypeTag::Timestamp => {
                Value::Timestamp(i64::from_le_bytes(src[..8].try_into().unwrap()))
            }
            TypeTag::Char { .. } | TypeTag::Varchar { .. } | TypeTag::Text => {
                if src[0] == POOLED_MARKER {
                    let len = u32::from_le_bytes(src[1..5].try_into().unwrap());
                    let ptr = u64::from_le_bytes(src[8..16].try_into().unwrap()) as *const u8;
                    Value::Str(TextBuf::Pooled { ptr, len })
                } else {
                    let len = src[0] as usize;
                    let mut bytes = [0u8; INLINE_STRING_MAX];
                    bytes[..len].copy_from_slice(&src[1..1 + len]);
                    Value::Str(TextBuf::Inline {
                        len: len as u8,
                        bytes,
                    })
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Hashing and comparison

    /// 64-bit content hash; both operands of a join key hash identically
    /// regardless of integer width or trailing numeric zeros.
    pub fn hash(&self) -> u64 {
        match self {
            Value::Null => 0,
            Value::Bool(b) => mix64(*b as u64 + 1),
            Value::Integer(v) => mix64(*v as i64 as u64),
            Value::LongInteger(v) | Value::Date(v) | Value::Timestamp(v) => mix64(*v as u64),
            Value::Numeric { value, scale } => {
                let (v, _) = normalize_numeric(*value, *scale);
                mix64(v as u64)
            }
            Value::Str(buf) => hash_bytes(buf.as_str().as_bytes()),
        }
    }

    /// Equality over non-null operands; `Text` compares by materialised
    /// content, never by representation.
    pub fn equals(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    /// Three-way comparison; `None` when either side is null or the types
    /// are incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Null, _) | (_, Null) => None,
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (Integer(a), Integer(b)) => Some(a.cmp(b)),
            (LongInteger(a), LongInteger(b)) => Some(a.cmp(b)),
            (Integer(a), LongInteger(b)) => Some((*a as i64).cmp(b)),
            (LongInteger(a), Integer(b)) => Some(a.cmp(&(*b as i64))),
            (Numeric { value: a, scale: sa }, Numeric { value: b, scale: sb }) => {
                let (a, b) = align_scales(*a, *sa, *b, *sb);
                Some(a.cmp(&b))
            }
            (Numeric { value, scale }, Integer(b)) => {
                Some((*value as i128).cmp(&(*b as i128 * pow10(*scale))))
            }
            (Integer(a), Numeric { value, scale }) => {
                Some((*a as i128 * pow10(*scale)).cmp(&(*value as i128)))
            }
            (Numeric { value, scale }, LongInteger(b)) => {
                Some((*value as i128).cmp(&(*b as i128 * pow10(*scale))))
            }
            (LongInteger(a), Numeric { value, scale }) => {
                Some((*a as i128 * pow10(*scale)).cmp(&(*value as i128)))
            }
            (Date(a), Date(b)) => Some(a.cmp(b)),
            (Timestamp(a), Timestamp(b)) => Some(a.cmp(b)),
            (Str(a), Str(b)) => Some(a.as_str().as_bytes().cmp(b.as_str().as_bytes())),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Arithmetic

    pub fn add(&self, other: &Value) -> Result<Value, RuntimeError> {
        self.binary_arith(other, "addition", |a, b| a.checked_add(b), |a, b| a + b)
    }

    pub fn subtract(&self, other: &Value) -> Result<Value, RuntimeError> {
        self.binary_arith(other, "subtraction", |a, b| a.checked_sub(b), |a, b| a - b)
    }

    /// Multiplication adds numeric scales and saturates to 18 digits.
    pub fn multiply(&self, other: &Value) -> Result<Value, RuntimeError> {
        if self.is_plain_int() && other.is_plain_int() {
            let (a, b) = (self.as_i64(), other.as_i64());
            let v = a.checked_mul(b).ok_or(RuntimeError::Overflow("multiplication"))?;
            return self.int_result(other, v, "multiplication");
        }
        match (self.numeric_normal(), other.numeric_normal()) {
            (Some((a, sa)), Some((b, sb))) => {
                let wide = a as i128 * b as i128;
                Ok(Value::Numeric {
                    value: saturate_to_precision(wide, 18),
                    scale: sa.saturating_add(sb).min(18),
                })
            }
            _ => self.non_numeric_operands(other),
        }
    }

    /// Division keeps the dividend's scale and raises on zero divisors.
    pub fn divide(&self, other: &Value) -> Result<Value, RuntimeError> {
        if self.is_plain_int() && other.is_plain_int() {
            let (a, b) = (self.as_i64(), other.as_i64());
            if b == 0 {
                return Err(RuntimeError::DivisionByZero("division"));
            }
            return self.int_result(other, a / b, "division");
        }
        match (self.numeric_normal(), other.numeric_normal()) {
            (Some((a, sa)), Some((b, sb))) => {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero("division"));
                }
                let wide = a as i128 * pow10(sb) / b as i128;
                Ok(Value::Numeric {
                    value: saturate_to_precision(wide, 18),
                    scale: sa,
                })
            }
            _ => self.non_numeric_operands(other),
        }
    }

    fn binary_arith(
        &self,
        other: &Value,
        op: &'static str,
        int_op: fn(i64, i64) -> Option<i64>,
        wide_op: fn(i128, i128) -> i128,
    ) -> Result<Value, RuntimeError> {
        if self.is_plain_int() && other.is_plain_int() {
            let v = int_op(self.as_i64(), other.as_i64()).ok_or(RuntimeError::Overflow(op))?;
            return self.int_result(other, v, op);
        }
        match (self.numeric_normal(), other.numeric_normal()) {
            (Some((a, sa)), Some((b, sb))) => {
                // Sum and difference preserve the wider scale.
                let (aa, bb) = align_scales(a, sa, b, sb);
                let wide = wide_op(aa, bb);
                Ok(Value::Numeric {
                    value: saturate_to_precision(wide, 18),
                    scale: sa.max(sb),
                })
            }
            _ => self.non_numeric_operands(other),
        }
    }

    fn is_plain_int(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::LongInteger(_))
    }

    fn as_i64(&self) -> i64 {
        match self {
            Value::Integer(v) => *v as i64,
            Value::LongInteger(v) => *v,
            _ => 0,
        }
    }

    /// Integer result width: two `Integer` operands stay `Integer`.
    fn int_result(&self, other: &Value, v: i64, op: &'static str) -> Result<Value, RuntimeError> {
        match (self, other) {
            (Value::Integer(_), Value::Integer(_)) => i32::try_from(v)
                .map(Value::Integer)
                .map_err(|_| RuntimeError::Overflow(op)),
            _ => Ok(Value::LongInteger(v)),
        }
    }

    fn non_numeric_operands(&self, other: &Value) -> Result<Value, RuntimeError> {
        if self.is_null() || other.is_null() {
            Ok(Value::Null)
        } else {
            Err(RuntimeError::InvalidCast {
                value: format!("{self}"),
                target: "numeric operand".into(),
            })
        }
    }

    /// (raw value, scale) for the numeric family; integers have scale 0.
    fn numeric_normal(&self) -> Option<(i64, u8)> {
        match self {
            Value::Integer(v) => Some((*v as i64, 0)),
            Value::LongInteger(v) => Some((*v, 0)),
            Value::Numeric { value, scale } => Some((*value, *scale)),
            _ => None,
        }
    }

    /// Reinterprets this value as a target type, used by `Cast` expressions.
    pub fn cast_to(&self, ty: SqlType) -> Result<Value, RuntimeError> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        match (self, ty.tag) {
            (Value::Integer(v), TypeTag::LongInteger) => Ok(Value::LongInteger(*v as i64)),
            (Value::Integer(v), TypeTag::Numeric { scale, .. }) => Ok(Value::Numeric {
                value: (*v as i64).saturating_mul(pow10(scale) as i64),
                scale,
            }),
            (Value::LongInteger(v), TypeTag::Numeric { scale, .. }) => Ok(Value::Numeric {
                value: v.saturating_mul(pow10(scale) as i64),
                scale,
            }),
            (Value::LongInteger(v), TypeTag::Integer) => i32::try_from(*v)
                .map(Value::Integer)
                .map_err(|_| RuntimeError::Overflow("cast")),
            (Value::Numeric { value, scale }, TypeTag::Numeric { scale: target, .. }) => {
                let a = *value as i128;
                let rescaled = if target >= *scale {
                    a * pow10(target - *scale)
                } else {
                    a / pow10(*scale - target)
                };
                Ok(Value::Numeric {
                    value: saturate_to_precision(rescaled, 18),
                    scale: target,
                })
            }
            (Value::Str(buf), _) => Value::cast_from_string(buf.as_str(), ty),
            (Value::Bool(_), TypeTag::Bool)
            | (Value::Integer(_), TypeTag::Integer)
            | (Value::LongInteger(_), TypeTag::LongInteger)
            | (Value::Date(_), TypeTag::Date)
            | (Value::Timestamp(_), TypeTag::Timestamp) => Ok(self.clone()),
            _ => Err(RuntimeError::InvalidCast {
                value: format!("{self}"),
                target: ty.type_name(),
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::LongInteger(v) => write!(f, "{v}"),
            Value::Numeric { value, scale } => {
                if *scale == 0 {
                    write!(f, "{value}")
                } else {
                    let p = pow10(*scale) as i64;
                    let sign = if *value < 0 { "-" } else { "" };
                    let abs = value.unsigned_abs() as i64;
                    write!(f, "{sign}{}.{:0width$}", abs / p, abs % p, width = *scale as usize)
                }
            }
            Value::Date(ms) => {
                let days = ms.div_euclid(MS_PER_DAY) + EPOCH_DAYS_FROM_UNIX;
                let (y, m, d) = civil_from_days(days);
                write!(f, "{:02}-{m:02}-{d:02}", y.rem_euclid(100))
            }
            Value::Timestamp(ms) => {
                let days = ms.div_euclid(MS_PER_DAY) + EPOCH_DAYS_FROM_UNIX;
                let (y, m, d) = civil_from_days(days);
                let within = ms.rem_euclid(MS_PER_DAY);
                let (h, rest) = (within / 3_600_000, within % 3_600_000);
                let (min, rest) = (rest / 60_000, rest % 60_000);
                let (s, milli) = (rest / 1000, rest % 1000);
                write!(
                    f,
                    "{:02}-{m:02}-{d:02} {h:02}:{min:02}:{s:02}.{:04}",
                    y.rem_euclid(100),
                    milli * 10
                )
            }
            Value::Str(buf) => f.write_str(buf.as_str()),
        }
    }
}

/// One materialised row: values in table column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlTuple {
    pub values: Vec<Value>,
}

impl SqlTuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn into_owned(self) -> SqlTuple {
        SqlTuple {
            values: self.values.into_iter().map(Value::into_owned).collect(),
        }
    }
}

// ----------------------------------------------------------------------
// Helpers

fn pow10(scale: u8) -> i128 {
    10i128.pow(scale as u32)
}

fn max_for_precision(length: u8) -> u64 {
    10u64.saturating_pow(length.min(18) as u32).saturating_sub(1)
}

fn align_scales(a: i64, sa: u8, b: i64, sb: u8) -> (i128, i128) {
    let target = sa.max(sb);
    (
        a as i128 * pow10(target - sa),
        b as i128 * pow10(target - sb),
    )
}

fn normalize_numeric(mut value: i64, mut scale: u8) -> (i64, u8) {
    while scale > 0 && value % 10 == 0 {
        value /= 10;
        scale -= 1;
    }
    (value, scale)
}

fn saturate_to_precision(wide: i128, length: u8) -> i64 {
    let max = max_for_precision(length) as i128;
    wide.clamp(-max, max) as i64
}

fn parse_scaled_decimal(text: &str, scale: u8) -> Option<i64> {
    let (neg, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if digits.is_empty() {
        return None;
    }
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
        || (int_part.is_empty() && frac_part.is_empty())
    {
        return None;
    }
    let mut value: i128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse::<i128>().ok()?
    };
    for i in 0..scale as usize {
        let digit = frac_part.as_bytes().get(i).map_or(0, |b| (b - b'0') as i128);
        value = value * 10 + digit;
    }
    if neg {
        value = -value;
    }
    i64::try_from(value).ok()
}

/// Parses `YY-MM-DD` or `YYYY-MM-DD`; returns (days since 1970, rest).
fn parse_date_part(text: &str) -> Option<(i64, &str)> {
    let date_end = text
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
        .map_or(text.len(), |(i, _)| i);
    let (date_str, rest) = text.split_at(date_end);
    let mut parts = date_str.split('-');
    let year_str = parts.next()?;
    let year: i64 = year_str.parse().ok()?;
    let year = if year_str.len() <= 2 { 2000 + year } else { year };
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    Some((days_from_civil(year, month, day), rest))
}

/// Parses `HH:MM:SS[.ffff]` into milliseconds within the day.
fn parse_time_part(text: &str) -> Option<i64> {
    let (clock, frac) = match text.split_once('.') {
        Some((c, f)) => (c, Some(f)),
        None => (text, None),
    };
    let mut parts = clock.split(':');
    let h: i64 = parts.next()?.parse().ok()?;
    let m: i64 = parts.next()?.parse().ok()?;
    let s: i64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || h > 23 || m > 59 || s > 59 {
        return None;
    }
    let mut ms = (h * 3600 + m * 60 + s) * 1000;
    if let Some(frac) = frac {
        if frac.is_empty() || frac.len() > 4 || !frac.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        // A four-digit fraction is tenths of a millisecond.
        let raw: i64 = frac.parse().ok()?;
        let scaled = raw * 10i64.pow(4 - frac.len() as u32);
        ms += scaled / 10;
    }
    Some(ms)
}

/// Civil-date conversion (proleptic Gregorian), days since 1970-01-01.
fn days_from_civil(y: i64, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64;
    let mp = ((m + 9) % 12) as i64;
    let doy = (153 * mp + 2) / 5 + d as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn mix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    mix64(h)
}

/// Combines two key hashes; commutative so build and probe sides agree
/// regardless of evaluation order.
pub fn hash_combine(a: u64, b: u64) -> u64 {
    mix64(a.wrapping_add(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cast_integer_round_trip() {
        let v = Value::cast_from_string("42", SqlType::integer(false)).unwrap();
        assert_eq!(v, Value::Integer(42));
        assert!(Value::cast_from_string("fortytwo", SqlType::integer(false)).is_err());
    }

    #[test]
    fn cast_numeric_scales_fraction() {
        let ty = SqlType::numeric(10, 2, false);
        assert_eq!(
            Value::cast_from_string("12.5", ty).unwrap(),
            Value::Numeric { value: 1250, scale: 2 }
        );
        assert_eq!(
            Value::cast_from_string("-3", ty).unwrap(),
            Value::Numeric { value: -300, scale: 2 }
        );
        assert_eq!(
            Value::cast_from_string("1.999", ty).unwrap(),
            Value::Numeric { value: 199, scale: 2 }
        );
    }

    #[test]
    fn cast_date_and_timestamp() {
        let d = Value::cast_from_string("00-01-01", SqlType::date(false)).unwrap();
        assert_eq!(d, Value::Date(0));
        let d = Value::cast_from_string("00-01-02", SqlType::date(false)).unwrap();
        assert_eq!(d, Value::Date(MS_PER_DAY));
        let t =
            Value::cast_from_string("00-01-01 00:00:01.0000", SqlType::timestamp(false)).unwrap();
        assert_eq!(t, Value::Timestamp(1000));
        let t =
            Value::cast_from_string("20-07-09 13:56:24.0600", SqlType::timestamp(false)).unwrap();
        assert_eq!(format!("{t}"), "20-07-09 13:56:24.0600");
    }

    #[test]
    fn store_load_round_trip_scalars() {
        let pool = TextPool::new();
        for (value, ty) in [
            (Value::Bool(true), SqlType::bool_ty(false)),
            (Value::Integer(-7), SqlType::integer(false)),
            (Value::LongInteger(1 << 40), SqlType::long_integer(false)),
            (
                Value::Numeric { value: 12345, scale: 2 },
                SqlType::numeric(10, 2, false),
            ),
            (Value::Date(86_400_000), SqlType::date(false)),
            (Value::Timestamp(1234), SqlType::timestamp(false)),
        ] {
            let mut slot = vec![0u8; ty.slot_size()];
            value.store(&mut slot, &pool);
            assert_eq!(Value::load(&slot, ty), value);
        }
    }

    #[test]
    fn store_load_round_trip_strings() {
        let pool = TextPool::new();
        let ty = SqlType::text(false);

        let short = Value::str("short");
        let mut slot = vec![0u8; ty.slot_size()];
        short.store(&mut slot, &pool);
        assert_eq!(Value::load(&slot, ty), short);

        let long = Value::str("a string that is definitely longer than fifteen bytes");
        let mut slot = vec![0u8; ty.slot_size()];
        long.store(&mut slot, &pool);
        let loaded = Value::load(&slot, ty);
        assert!(loaded.equals(&long));
    }

    #[test]
    fn text_compares_by_content_not_representation() {
        let inline = Value::str("same text here!");
        let owned = Value::Str(TextBuf::Owned("same text here!".into()));
        assert!(inline.equals(&owned));
        assert_eq!(inline.hash(), owned.hash());
    }

    #[test]
    fn null_poisons_comparison() {
        assert_eq!(Value::Null.compare(&Value::Integer(1)), None);
        assert_eq!(Value::Integer(1).compare(&Value::Null), None);
    }

    #[test]
    fn numeric_addition_preserves_scale() {
        let a = Value::Numeric { value: 150, scale: 2 }; // 1.50
        let b = Value::Numeric { value: 5, scale: 1 }; // 0.5
        assert_eq!(a.add(&b).unwrap(), Value::Numeric { value: 200, scale: 2 });
    }

    #[test]
    fn numeric_multiplication_adds_scales() {
        let a = Value::Numeric { value: 15, scale: 1 }; // 1.5
        let b = Value::Numeric { value: 20, scale: 1 }; // 2.0
        assert_eq!(
            a.multiply(&b).unwrap(),
            Value::Numeric { value: 300, scale: 2 }
        );
    }

    #[test]
    fn division_by_zero_raises() {
        let err = Value::Integer(1).divide(&Value::Integer(0)).unwrap_err();
        assert_eq!(err, RuntimeError::DivisionByZero("division"));
    }

    #[test]
    fn integer_overflow_detected() {
        let err = Value::Integer(i32::MAX)
            .add(&Value::Integer(1))
            .unwrap_err();
        assert_eq!(err, RuntimeError::Overflow("addition"));
    }

    #[test]
    fn cross_width_integers_hash_equal() {
        assert_eq!(Value::Integer(7).hash(), Value::LongInteger(7).hash());
        assert!(Value::Integer(7).equals(&Value::LongInteger(7)));
    }

    #[test]
    fn numeric_display_pads_fraction() {
        assert_eq!(
            format!("{}", Value::Numeric { value: 1205, scale: 2 }),
            "12.05"
        );
        assert_eq!(
            format!("{}", Value::Numeric { value: -5, scale: 2 }),
            "-0.05"
        );
    }
}
