//! Service string codec
//!
//! Attribute and row values travel as strings. This module maps them to typed values for the
//! declared data type and back. Parsing never fails: unparseable input yields the type's default.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, TimeZone, Timelike};
use std::fmt;

const DATE_FORMAT: &str = "%d-%m-%Y %H:%M:%S";
const NIL_GUID: &str = "00000000-0000-0000-0000-000000000000";
const TICKS_PER_SECOND: i64 = 10_000_000;

/// Storage class of a declared data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Byte,
    SByte,
    Decimal,
    Double,
    Single,
    Boolean,
    Date,
    DateTime,
    DateTimeOffset,
    Time,
    Guid,
    Enum,
    Image,
    Text,
}

/// A declared data type such as `NullableInt32` or `YesNo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataType {
    pub kind: ValueKind,
    pub nullable: bool,
}

impl DataType {
    /// Resolve a server type name; unknown names are plain text.
    pub fn parse(type_name: &str) -> Self {
        let upper = type_name.to_ascii_uppercase();
        let (nullable, base) = match upper.strip_prefix("NULLABLE") {
            Some(rest) => (true, rest),
            None => (false, upper.as_str()),
        };

        let kind = match base {
            "INT16" => ValueKind::Int16,
            "UINT16" => ValueKind::UInt16,
            "INT32" => ValueKind::Int32,
            "UINT32" => ValueKind::UInt32,
            "INT64" => ValueKind::Int64,
            "UINT64" => ValueKind::UInt64,
            "BYTE" => ValueKind::Byte,
            "SBYTE" => ValueKind::SByte,
            "DECIMAL" => ValueKind::Decimal,
            "DOUBLE" => ValueKind::Double,
            "SINGLE" => ValueKind::Single,
            "BOOLEAN" => ValueKind::Boolean,
            "YESNO" if !nullable => ValueKind::Boolean,
            "DATE" => ValueKind::Date,
            "DATETIME" => ValueKind::DateTime,
            "DATETIMEOFFSET" => ValueKind::DateTimeOffset,
            "TIME" => ValueKind::Time,
            "GUID" => ValueKind::Guid,
            "ENUM" | "FLAGSENUM" if !nullable => ValueKind::Enum,
            "IMAGE" if !nullable => ValueKind::Image,
            _ => {
                return DataType {
                    kind: ValueKind::Text,
                    nullable: false,
                }
            }
        };

        DataType { kind, nullable }
    }

    /// Reference-typed values default to null instead of a zero value.
    fn is_reference(&self) -> bool {
        matches!(
            self.kind,
            ValueKind::Text | ValueKind::Enum | ValueKind::Image
        )
    }
}

/// Typed attribute or column value.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceValue {
    Null,
    Text(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Date(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    /// Duration in 100ns ticks
    Time(i64),
}

impl ServiceValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ServiceValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ServiceValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ServiceValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ServiceValue::Int(value) => Some(*value),
            ServiceValue::UInt(value) => i64::try_from(*value).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", to_service_string(self).unwrap_or_default())
    }
}

impl From<&str> for ServiceValue {
    fn from(value: &str) -> Self {
        ServiceValue::Text(value.to_string())
    }
}

impl From<String> for ServiceValue {
    fn from(value: String) -> Self {
        ServiceValue::Text(value)
    }
}

impl From<i64> for ServiceValue {
    fn from(value: i64) -> Self {
        ServiceValue::Int(value)
    }
}

impl From<bool> for ServiceValue {
    fn from(value: bool) -> Self {
        ServiceValue::Bool(value)
    }
}

impl From<f64> for ServiceValue {
    fn from(value: f64) -> Self {
        ServiceValue::Float(value)
    }
}

impl<T: Into<ServiceValue>> From<Option<T>> for ServiceValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ServiceValue::Null)
    }
}

/// Default value for a data type, used for missing and unparseable input.
pub fn default_value(data_type: DataType) -> ServiceValue {
    if data_type.nullable || data_type.is_reference() {
        return ServiceValue::Null;
    }

    match data_type.kind {
        ValueKind::UInt16 | ValueKind::UInt32 | ValueKind::UInt64 | ValueKind::Byte => {
            ServiceValue::UInt(0)
        }
        ValueKind::Int16 | ValueKind::Int32 | ValueKind::Int64 | ValueKind::SByte => {
            ServiceValue::Int(0)
        }
        ValueKind::Decimal | ValueKind::Double | ValueKind::Single => ServiceValue::Float(0.0),
        ValueKind::Boolean => ServiceValue::Bool(false),
        ValueKind::Date => ServiceValue::Date(Local::now().date_naive().and_hms_opt(0, 0, 0).unwrap_or_default()),
        ValueKind::DateTime => ServiceValue::Date(Local::now().naive_local()),
        ValueKind::DateTimeOffset => ServiceValue::DateTimeOffset(Local::now().fixed_offset()),
        ValueKind::Time => ServiceValue::Time(0),
        ValueKind::Guid => ServiceValue::Text(NIL_GUID.to_string()),
        ValueKind::Enum | ValueKind::Image | ValueKind::Text => ServiceValue::Null,
    }
}

/// Convert a service string to a typed value for `type_name`.
pub fn from_service_string(value: Option<&str>, type_name: &str) -> ServiceValue {
    let data_type = DataType::parse(type_name);

    if data_type.kind == ValueKind::Text {
        return value.map(ServiceValue::from).unwrap_or(ServiceValue::Null);
    }

    let raw = match value {
        None => return default_value(data_type),
        Some("") if data_type.nullable => return default_value(data_type),
        Some(raw) => raw,
    };

    parse_typed(raw, data_type.kind).unwrap_or_else(|| default_value(data_type))
}

fn parse_typed(raw: &str, kind: ValueKind) -> Option<ServiceValue> {
    let trimmed = raw.trim();
    match kind {
        ValueKind::Int16 => trimmed.parse::<i16>().ok().map(|v| ServiceValue::Int(v.into())),
        ValueKind::Int32 => trimmed.parse::<i32>().ok().map(|v| ServiceValue::Int(v.into())),
        ValueKind::Int64 => trimmed.parse::<i64>().ok().map(ServiceValue::Int),
        ValueKind::SByte => trimmed.parse::<i8>().ok().map(|v| ServiceValue::Int(v.into())),
        ValueKind::UInt16 => trimmed.parse::<u16>().ok().map(|v| ServiceValue::UInt(v.into())),
        ValueKind::UInt32 => trimmed.parse::<u32>().ok().map(|v| ServiceValue::UInt(v.into())),
        ValueKind::UInt64 => trimmed.parse::<u64>().ok().map(ServiceValue::UInt),
        ValueKind::Byte => trimmed.parse::<u8>().ok().map(|v| ServiceValue::UInt(v.into())),
        ValueKind::Decimal | ValueKind::Double | ValueKind::Single => {
            trimmed.parse::<f64>().ok().map(ServiceValue::Float)
        }
        ValueKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" => Some(ServiceValue::Bool(true)),
            "false" => Some(ServiceValue::Bool(false)),
            _ => None,
        },
        ValueKind::Date | ValueKind::DateTime => parse_date(trimmed).map(ServiceValue::Date),
        ValueKind::DateTimeOffset => parse_date_offset(trimmed).map(ServiceValue::DateTimeOffset),
        ValueKind::Time => parse_time(trimmed).map(ServiceValue::Time),
        ValueKind::Guid => is_guid(trimmed).then(|| ServiceValue::Text(trimmed.to_ascii_lowercase())),
        ValueKind::Enum | ValueKind::Image | ValueKind::Text => Some(ServiceValue::Text(raw.to_string())),
    }
}

/// Convert a typed value back to its service string. `Null` has no string form.
pub fn to_service_string(value: &ServiceValue) -> Option<String> {
    match value {
        ServiceValue::Null => None,
        ServiceValue::Text(text) => Some(text.clone()),
        ServiceValue::Int(v) => Some(v.to_string()),
        ServiceValue::UInt(v) => Some(v.to_string()),
        ServiceValue::Float(v) => Some(v.to_string()),
        ServiceValue::Bool(true) => Some("True".to_string()),
        ServiceValue::Bool(false) => Some("False".to_string()),
        ServiceValue::Date(date) => Some(format_date(date)),
        ServiceValue::DateTimeOffset(date) => Some(format_date_offset(date)),
        ServiceValue::Time(ticks) => Some(format_time(*ticks)),
    }
}

/// `dd-MM-yyyy HH:mm:ss` followed by up to seven fraction digits, trailing zeros trimmed.
pub fn format_date(date: &NaiveDateTime) -> String {
    let mut text = date.format(DATE_FORMAT).to_string();
    let ticks = date.nanosecond() / 100;
    if ticks > 0 {
        let fraction = format!("{:07}", ticks);
        text.push('.');
        text.push_str(fraction.trim_end_matches('0'));
    }
    text
}

/// [`format_date`] plus ` +hh:mm`.
pub fn format_date_offset(date: &DateTime<FixedOffset>) -> String {
    let seconds = date.offset().fix().local_minus_utc();
    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.abs() / 60;
    format!(
        "{} {}{:02}:{:02}",
        format_date(&date.naive_local()),
        sign,
        minutes / 60,
        minutes % 60
    )
}

fn parse_date(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%d-%m-%Y %H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%d-%m-%Y")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn parse_date_offset(text: &str) -> Option<DateTime<FixedOffset>> {
    let (date, zone) = text.rsplit_once(' ')?;
    let naive = parse_date(date)?;
    let offset = parse_offset(zone)?;
    offset.from_local_datetime(&naive).single()
}

fn parse_offset(zone: &str) -> Option<FixedOffset> {
    if zone == "Z" {
        return FixedOffset::east_opt(0);
    }
    let sign = match zone.chars().next()? {
        '+' => 1,
        '-' => -1,
        _ => return None,
    };
    let (hours, minutes) = zone[1..].split_once(':')?;
    let seconds = hours.parse::<i32>().ok()? * 3600 + minutes.parse::<i32>().ok()? * 60;
    FixedOffset::east_opt(sign * seconds)
}

/// General time span format: `[-]d:hh:mm:ss.fffffff`.
fn format_time(ticks: i64) -> String {
    let sign = if ticks < 0 { "-" } else { "" };
    let ticks = ticks.unsigned_abs();
    let per_second = TICKS_PER_SECOND as u64;
    let total_seconds = ticks / per_second;
    let fraction = ticks % per_second;
    let days = total_seconds / 86_400;
    let hours = (total_seconds / 3600) % 24;
    let minutes = (total_seconds / 60) % 60;
    let seconds = total_seconds % 60;
    format!(
        "{}{}:{:02}:{:02}:{:02}.{:07}",
        sign, days, hours, minutes, seconds, fraction
    )
}

fn parse_time(text: &str) -> Option<i64> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let parts: Vec<&str> = body.split(':').collect();
    let (days, hours, minutes, seconds) = match parts.as_slice() {
        [d, h, m, s] => (d.parse::<i64>().ok()?, *h, *m, *s),
        [h, m, s] => (0, *h, *m, *s),
        _ => return None,
    };
    let hours = hours.parse::<i64>().ok()?;
    let minutes = minutes.parse::<i64>().ok()?;
    let (whole, fraction) = match seconds.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (seconds, ""),
    };
    let whole = whole.parse::<i64>().ok()?;
    if hours > 23 || minutes > 59 || whole > 59 || fraction.len() > 7 {
        return None;
    }
    let fraction_ticks = if fraction.is_empty() {
        0
    } else {
        format!("{:0<7}", fraction).parse::<i64>().ok()?
    };

    let ticks = (((days * 24 + hours) * 60 + minutes) * 60 + whole) * TICKS_PER_SECOND
        + fraction_ticks;
    Some(if negative { -ticks } else { ticks })
}

pub fn is_guid(text: &str) -> bool {
    let groups: Vec<&str> = text.split('-').collect();
    let lengths = [8, 4, 4, 4, 12];
    groups.len() == lengths.len()
        && groups
            .iter()
            .zip(lengths)
            .all(|(group, len)| group.len() == len && group.chars().all(|c| c.is_ascii_hexdigit()))
}
