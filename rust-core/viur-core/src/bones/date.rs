//! Date, time and date+time bone.
//!
//! Client input is read leniently: Unix timestamps, `now[+-N]`, and date
//! strings whose separator picks the format (`-` ISO, `/` US, `.`
//! European). Values are kept as naive wall-clock times; localized bones
//! hold the requester's local time in memory and UTC in storage.

use super::ValueCodec;
use crate::context::RequestContext;
use crate::db::DbValue;
use crate::error::{Error, Result};
use crate::localize::{guess_time_zone, to_local, to_utc};
use crate::render::BoneParams;
use crate::types::{Scalar, TimeOfDay};
use crate::validation::INVALID_VALUE;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Utc};
use chrono_tz::Tz;
use tracing::debug;

/// Smallest accepted Unix timestamp
pub const MIN_TIMESTAMP: i64 = -(1 << 30);

/// Largest accepted Unix timestamp
pub const MAX_TIMESTAMP: i64 = (1 << 31) - 2;

/// Display format of date+time values
pub const DATETIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Display format of date-only values
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// Display format of time-only values
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Date, time or date+time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateBone {
    date: bool,
    time: bool,
    localize: bool,
    creation_magic: bool,
    update_magic: bool,
}

impl Default for DateBone {
    fn default() -> Self {
        Self::with_parts(true, true)
    }
}

impl DateBone {
    /// Date and time
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Date only
    #[must_use]
    pub const fn date_only() -> Self {
        Self::with_parts(true, false)
    }

    /// Time of day only
    #[must_use]
    pub const fn time_only() -> Self {
        Self::with_parts(false, true)
    }

    /// Explicit parts; at least one must be set for the bone to build
    #[must_use]
    pub const fn with_parts(date: bool, time: bool) -> Self {
        Self {
            date,
            time,
            localize: false,
            creation_magic: false,
            update_magic: false,
        }
    }

    /// Convert between UTC and the requester's timezone
    ///
    /// Only valid for date+time bones.
    #[must_use]
    pub const fn localized(mut self) -> Self {
        self.localize = true;
        self
    }

    /// Set to the current time when an entity is created
    #[must_use]
    pub const fn creation_magic(mut self) -> Self {
        self.creation_magic = true;
        self
    }

    /// Set to the current time whenever an entity is saved
    #[must_use]
    pub const fn update_magic(mut self) -> Self {
        self.update_magic = true;
        self
    }

    /// Whether a date part is held
    #[must_use]
    pub const fn has_date(&self) -> bool {
        self.date
    }

    /// Whether a time part is held
    #[must_use]
    pub const fn has_time(&self) -> bool {
        self.time
    }

    /// Whether values are localized
    #[must_use]
    pub const fn is_localized(&self) -> bool {
        self.localize
    }

    const fn is_time_only(&self) -> bool {
        !self.date && self.time
    }

    pub(super) fn validate(&self) -> Result<()> {
        if !(self.date || self.time) {
            return Err(Error::configuration(
                "date",
                "Attempt to create an empty datebone! Set date or time to True!",
            ));
        }
        if self.localize && !(self.date && self.time) {
            return Err(Error::configuration(
                "date",
                "Localization is only possible with date and time!",
            ));
        }
        Ok(())
    }

    fn zone(&self, ctx: &RequestContext) -> Tz {
        if self.localize && self.date && self.time {
            guess_time_zone(ctx)
        } else {
            Tz::UTC
        }
    }

    /// Wrap a UTC instant as this bone's in-memory value
    fn from_utc(&self, utc: NaiveDateTime, ctx: &RequestContext) -> Scalar {
        let local = to_local(utc, self.zone(ctx));
        if self.is_time_only() {
            Scalar::Time(TimeOfDay::from(local.time()))
        } else {
            Scalar::DateTime(local)
        }
    }

    fn parse_timestamp(&self, value: &str, ctx: &RequestContext) -> Option<Scalar> {
        let seconds = value.parse::<f64>().ok()?;
        if !(MIN_TIMESTAMP..=MAX_TIMESTAMP).contains(&float_to_i64(seconds)) {
            return None;
        }
        let utc = DateTime::from_timestamp_micros(float_to_i64((seconds * 1e6).round()))?.naive_utc();
        Some(self.from_utc(utc, ctx))
    }

    fn parse_now(&self, offset: &str, ctx: &RequestContext) -> Scalar {
        let now = ctx.now_utc();
        let offset = offset.trim();
        let shifted = if offset.is_empty() {
            now
        } else {
            offset
                .parse::<i64>()
                .ok()
                .and_then(TimeDelta::try_seconds)
                .and_then(|delta| now.checked_add_signed(delta))
                .unwrap_or_else(|| {
                    debug!(offset, "Ignoring malformed offset");
                    now
                })
        };
        self.from_utc(shifted, ctx)
    }
}

/// One optional `-` and one optional `.` around digits
fn is_numeric(value: &str) -> bool {
    let digits = value.replacen('-', "", 1).replacen('.', "", 1);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn parse_time_of_day(value: &str) -> Option<TimeOfDay> {
    let parts: Vec<u32> = value
        .split(':')
        .map(|part| part.trim().parse::<u32>().ok())
        .collect::<Option<_>>()?;
    match parts.as_slice() {
        [seconds] => TimeOfDay::from_seconds(*seconds),
        [hour, minute] => TimeOfDay::new(*hour, *minute, 0),
        [hour, minute, second] => TimeOfDay::new(*hour, *minute, *second),
        _ => None,
    }
}

/// Years are written with exactly four digits, like `strptime`'s `%Y`
const YEAR_DIGITS: usize = 4;

fn parse_date_string(value: &str) -> Option<NaiveDateTime> {
    let (separator, year_first, date_format, with_seconds, with_minutes) = if value.contains('-') {
        ('-', true, "%Y-%m-%d", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M")
    } else if value.contains('/') {
        ('/', false, "%m/%d/%Y", "%m/%d/%Y %H:%M:%S", "%m/%d/%Y %H:%M")
    } else {
        ('.', false, "%d.%m.%Y", "%d.%m.%Y %H:%M:%S", "%d.%m.%Y %H:%M")
    };
    let date_part = value.split(' ').next().unwrap_or_default();
    let mut fields = date_part.split(separator);
    let year = if year_first { fields.next() } else { fields.last() }?;
    if year.len() != YEAR_DIGITS || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let parsed = if value.contains(' ') {
        NaiveDateTime::parse_from_str(value, with_seconds)
            .or_else(|_| NaiveDateTime::parse_from_str(value, with_minutes))
            .ok()
    } else {
        NaiveDate::parse_from_str(value, date_format)
            .ok()
            .map(|date| date.and_time(NaiveTime::MIN))
    };
    parsed.filter(|dt| dt.year() >= 1)
}

fn strip_now(value: &str) -> Option<&str> {
    value
        .get(..3)
        .filter(|prefix| prefix.eq_ignore_ascii_case("now"))
        .map(|_| &value[3..])
}

/// Whole part of `value`, saturating at the `i64` bounds
#[allow(clippy::cast_possible_truncation)]
fn float_to_i64(value: f64) -> i64 {
    value as i64
}

fn truncate_to_seconds(value: NaiveDateTime) -> NaiveDateTime {
    value.with_nanosecond(0).unwrap_or(value)
}

fn epoch() -> NaiveDate {
    DateTime::<Utc>::UNIX_EPOCH.date_naive()
}

impl ValueCodec for DateBone {
    fn type_name(&self) -> &'static str {
        "date"
    }

    fn parse(&self, raw: &str, ctx: &RequestContext) -> std::result::Result<Scalar, String> {
        let value = raw.trim();
        let parsed = if self.is_time_only() {
            parse_time_of_day(value).map(Scalar::Time)
        } else if is_numeric(value) {
            self.parse_timestamp(value, ctx)
        } else if let Some(offset) = strip_now(value) {
            Some(self.parse_now(offset, ctx))
        } else {
            parse_date_string(value).map(Scalar::DateTime)
        };
        parsed.ok_or_else(|| INVALID_VALUE.to_string())
    }

    fn to_storage(&self, value: &Scalar, _indexed: bool, ctx: &RequestContext) -> DbValue {
        let local = match value {
            Scalar::DateTime(dt) => truncate_to_seconds(*dt),
            Scalar::Time(time) => epoch().and_time(time.to_naive_time()),
            Scalar::Str(_) | Scalar::Bool(_) => return DbValue::Null,
        };
        DbValue::DateTime(to_utc(local, self.zone(ctx)).and_utc())
    }

    fn from_storage(&self, stored: &DbValue, ctx: &RequestContext) -> Option<Scalar> {
        match stored {
            DbValue::DateTime(dt) => Some(self.from_utc(truncate_to_seconds(dt.naive_utc()), ctx)),
            DbValue::Int(minutes) if !self.date => {
                let minutes = u32::try_from(*minutes).ok()?;
                TimeOfDay::new(minutes / 60, minutes % 60, 0).map(Scalar::Time)
            }
            DbValue::Float(minutes) if !self.date => {
                let minutes = u32::try_from(float_to_i64(*minutes)).ok()?;
                TimeOfDay::new(minutes / 60, minutes % 60, 0).map(Scalar::Time)
            }
            DbValue::Int(seconds) => {
                let utc = DateTime::from_timestamp(*seconds, 0)?.naive_utc();
                Some(self.from_utc(utc, ctx))
            }
            DbValue::Float(seconds) => {
                let utc = DateTime::from_timestamp(float_to_i64(*seconds), 0)?.naive_utc();
                Some(self.from_utc(utc, ctx))
            }
            DbValue::Null | DbValue::Bool(_) | DbValue::Text(_) | DbValue::List(_) | DbValue::Map(_) => None,
        }
    }

    fn render(&self, value: &Scalar) -> serde_json::Value {
        let text = match value {
            Scalar::Time(time) => time.to_string(),
            Scalar::DateTime(dt) => {
                let format = match (self.date, self.time) {
                    (true, true) => DATETIME_FORMAT,
                    (true, false) => DATE_FORMAT,
                    _ => TIME_FORMAT,
                };
                dt.format(format).to_string()
            }
            Scalar::Str(_) | Scalar::Bool(_) => return serde_json::Value::Null,
        };
        serde_json::Value::String(text)
    }

    fn params(&self) -> BoneParams {
        BoneParams::Date {
            date: self.date,
            time: self.time,
            localize: self.localize,
            creation_magic: self.creation_magic,
            update_magic: self.update_magic,
        }
    }

    fn magic_value(&self, is_add: bool, ctx: &RequestContext) -> Option<Scalar> {
        ((self.creation_magic && is_add) || self.update_magic)
            .then(|| self.from_utc(truncate_to_seconds(ctx.now_utc()), ctx))
    }

    fn has_magic(&self) -> bool {
        self.creation_magic || self.update_magic
    }
}
