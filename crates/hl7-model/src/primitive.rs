//! Scalar leaf values

use crate::node::InstanceId;
use crate::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};
use hl7_schema::{DatatypeDef, PrimitiveKind};
use std::sync::Arc;

/// A single scalar value typed by a primitive datatype.
///
/// Text is stored as it appears on the wire (unescaped). An empty string is
/// the same as no value.
#[derive(Debug)]
pub struct Primitive {
    id: InstanceId,
    datatype: Arc<DatatypeDef>,
    kind: PrimitiveKind,
    value: Option<String>,
}

impl Primitive {
    /// Create an empty primitive; fails if the datatype is a composite
    pub fn new(datatype: Arc<DatatypeDef>) -> Result<Self> {
        match datatype.primitive_kind() {
            Some(kind) => Ok(Self::with_kind(datatype, kind)),
            None => Err(Error::DatatypeMismatch {
                expected: "a primitive datatype".to_string(),
                found: datatype.name().to_string(),
            }),
        }
    }

    pub(crate) fn with_kind(datatype: Arc<DatatypeDef>, kind: PrimitiveKind) -> Self {
        Self {
            id: InstanceId::next(),
            datatype,
            kind,
            value: None,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn datatype(&self) -> &Arc<DatatypeDef> {
        &self.datatype
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn set(&mut self, value: impl Into<String>) {
        let value = value.into();
        self.value = (!value.is_empty()).then_some(value);
    }

    pub fn clear(&mut self) {
        self.value = None;
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Read the value as a date in `YYYY[MM[DD]]` form
    pub fn as_date(&self) -> Result<Option<NaiveDate>> {
        self.value
            .as_deref()
            .map(|text| parse_date(text).map_err(|message| self.conversion_error(message)))
            .transpose()
    }

    /// Read the value as a time in `HH[MM[SS[.S...]]]` form; any offset is ignored
    pub fn as_time(&self) -> Result<Option<NaiveTime>> {
        self.value
            .as_deref()
            .map(|text| {
                let (local, _) = split_offset(text, 0).map_err(|m| self.conversion_error(m))?;
                parse_time(local).map_err(|message| self.conversion_error(message))
            })
            .transpose()
    }

    /// Read the value as `YYYY[MM[DD[HH[MM[SS[.S...]]]]]][+/-ZZZZ]`.
    ///
    /// Values without an offset are read as UTC.
    pub fn as_datetime(&self) -> Result<Option<DateTime<FixedOffset>>> {
        self.value
            .as_deref()
            .map(|text| parse_datetime(text).map_err(|message| self.conversion_error(message)))
            .transpose()
    }

    pub fn as_decimal(&self) -> Result<Option<f64>> {
        self.value
            .as_deref()
            .map(|text| {
                text.trim()
                    .parse::<f64>()
                    .map_err(|e| self.conversion_error(format!("'{}' is not a number: {}", text, e)))
            })
            .transpose()
    }

    pub fn as_integer(&self) -> Result<Option<i64>> {
        self.value
            .as_deref()
            .map(|text| {
                text.trim().parse::<i64>().map_err(|e| {
                    self.conversion_error(format!("'{}' is not an integer: {}", text, e))
                })
            })
            .transpose()
    }

    pub fn set_date(&mut self, date: NaiveDate) {
        self.set(date.format("%Y%m%d").to_string());
    }

    pub fn set_datetime(&mut self, datetime: &DateTime<FixedOffset>) {
        self.set(datetime.format("%Y%m%d%H%M%S%z").to_string());
    }

    fn conversion_error(&self, message: impl Into<String>) -> Error {
        Error::conversion(self.datatype.name(), message)
    }
}

impl PartialEq for Primitive {
    fn eq(&self, other: &Self) -> bool {
        self.datatype.name() == other.datatype.name() && self.value == other.value
    }
}

fn digits(text: &str, what: &str) -> std::result::Result<u32, String> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid {} '{}'", what, text));
    }
    text.parse::<u32>()
        .map_err(|e| format!("invalid {} '{}': {}", what, text, e))
}

fn parse_date(text: &str) -> std::result::Result<NaiveDate, String> {
    let text = text.trim();
    if !text.is_ascii() || !matches!(text.len(), 4 | 6 | 8) {
        return Err(format!("'{}' is not a YYYY[MM[DD]] date", text));
    }
    let year = digits(&text[..4], "year")? as i32;
    let month = if text.len() >= 6 { digits(&text[4..6], "month")? } else { 1 };
    let day = if text.len() == 8 { digits(&text[6..8], "day")? } else { 1 };
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| format!("'{}' is not a valid date", text))
}

fn parse_time(text: &str) -> std::result::Result<NaiveTime, String> {
    let (clock, fraction) = match text.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (text, None),
    };
    if !clock.is_ascii() || !matches!(clock.len(), 2 | 4 | 6) {
        return Err(format!("'{}' is not a HH[MM[SS]] time", text));
    }
    if fraction.is_some() && clock.len() != 6 {
        return Err(format!("fractional seconds without seconds in '{}'", text));
    }

    let hour = digits(&clock[..2], "hour")?;
    let minute = if clock.len() >= 4 { digits(&clock[2..4], "minute")? } else { 0 };
    let second = if clock.len() == 6 { digits(&clock[4..6], "second")? } else { 0 };
    let nanos = match fraction {
        Some(fraction) if fraction.len() <= 9 => {
            let value = digits(fraction, "fraction")?;
            value * 10u32.pow(9 - fraction.len() as u32)
        }
        Some(fraction) => return Err(format!("fraction '{}' is too precise", fraction)),
        None => 0,
    };

    NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)
        .ok_or_else(|| format!("'{}' is not a valid time", text))
}

/// Split a trailing `+ZZZZ`/`-ZZZZ` offset, searching from `from`
fn split_offset(text: &str, from: usize) -> std::result::Result<(&str, Option<FixedOffset>), String> {
    let Some(position) = text
        .get(from..)
        .and_then(|rest| rest.find(['+', '-']))
        .map(|p| p + from)
    else {
        return Ok((text, None));
    };

    let (local, zone) = text.split_at(position);
    if zone.len() != 5 || !zone.is_ascii() {
        return Err(format!("offset '{}' is not +/-ZZZZ", zone));
    }
    let hours = digits(&zone[1..3], "offset hours")? as i32;
    let minutes = digits(&zone[3..5], "offset minutes")? as i32;
    let mut seconds = hours * 3600 + minutes * 60;
    if zone.starts_with('-') {
        seconds = -seconds;
    }
    let offset =
        FixedOffset::east_opt(seconds).ok_or_else(|| format!("offset '{}' is out of range", zone))?;
    Ok((local, Some(offset)))
}

fn parse_datetime(text: &str) -> std::result::Result<DateTime<FixedOffset>, String> {
    let text = text.trim();
    if !text.is_ascii() {
        return Err(format!("'{}' is not a date/time", text));
    }
    // The date part is at least four digits, so an offset sign can only follow it
    let (local, offset) = split_offset(text, 4)?;
    let date_len = local.len().min(8);
    let date = parse_date(&local[..date_len])?;
    let time = if local.len() > date_len {
        parse_time(&local[date_len..])?
    } else {
        NaiveTime::MIN
    };

    let offset = offset.unwrap_or_else(|| Utc.fix());
    NaiveDateTime::new(date, time)
        .and_local_timezone(offset)
        .single()
        .ok_or_else(|| format!("'{}' is not a valid date/time", text))
}
