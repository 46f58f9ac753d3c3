//! # Value Types
//!
//! In-memory representations of bone values.
//!
//! - [`Scalar`] is one canonical value as produced by a bone's codec.
//! - [`BoneValue`] lays scalars out according to the bone's multiplicity
//!   (single or repeated) and localization (plain or per-language).
//! - [`ValueCache`] maps bone names to their current [`BoneValue`] for one
//!   entity or request.

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Seconds in one day
pub const SECONDS_PER_DAY: u32 = 86_400;

/// Wall-clock time of day as entered by a client
///
/// Fields are kept as entered: a bare seconds count like `90` is stored as
/// `second = 90` and only folded into minutes when converted with
/// [`TimeOfDay::to_naive_time`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TimeOfDay {
    /// Hour (0-23)
    pub hour: u32,
    /// Minute (0-59)
    pub minute: u32,
    /// Second; 0-59 unless built from a bare seconds count
    pub second: u32,
}

impl TimeOfDay {
    /// Build a time from clock fields, rejecting out-of-range parts
    #[must_use]
    pub const fn new(hour: u32, minute: u32, second: u32) -> Option<Self> {
        if hour < 24 && minute < 60 && second < 60 {
            Some(Self {
                hour,
                minute,
                second,
            })
        } else {
            None
        }
    }

    /// Build a time from a seconds-of-day count without normalizing it
    #[must_use]
    pub const fn from_seconds(seconds: u32) -> Option<Self> {
        if seconds < SECONDS_PER_DAY {
            Some(Self {
                hour: 0,
                minute: 0,
                second: seconds,
            })
        } else {
            None
        }
    }

    /// Total seconds since midnight
    #[must_use]
    pub const fn seconds_of_day(&self) -> u32 {
        self.hour * 3600 + self.minute * 60 + self.second
    }

    /// Normalized chrono time
    #[must_use]
    pub fn to_naive_time(&self) -> NaiveTime {
        NaiveTime::from_num_seconds_from_midnight_opt(self.seconds_of_day() % SECONDS_PER_DAY, 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl From<NaiveTime> for TimeOfDay {
    fn from(time: NaiveTime) -> Self {
        Self {
            hour: time.hour(),
            minute: time.minute(),
            second: time.second(),
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

/// One canonical bone value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scalar {
    /// Text (string and email bones)
    Str(String),
    /// Flag (boolean bones)
    Bool(bool),
    /// Timezone-naive date and time (date bones); date-only values sit at midnight
    DateTime(NaiveDateTime),
    /// Time of day (time-only date bones)
    Time(TimeOfDay),
}

impl Scalar {
    /// Get as text if `Str` variant
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get as bool if `Bool` variant
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as datetime if `DateTime` variant
    #[must_use]
    pub const fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Get as time of day if `Time` variant
    #[must_use]
    pub const fn as_time(&self) -> Option<TimeOfDay> {
        match self {
            Self::Time(t) => Some(*t),
            _ => None,
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDateTime> for Scalar {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<TimeOfDay> for Scalar {
    fn from(value: TimeOfDay) -> Self {
        Self::Time(value)
    }
}

/// A bone's value laid out by multiplicity and localization
///
/// Localized layouts key their entries by language in sorted order. The
/// configured order lives on the bone ([`crate::bones::Bone::languages`]),
/// which storage and rendering iterate instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoneValue {
    /// Single, unlocalized; `None` means "no value"
    Single(Option<Scalar>),
    /// Repeated, unlocalized
    Multiple(Vec<Scalar>),
    /// Single, one entry per configured language
    Languages(BTreeMap<String, Option<Scalar>>),
    /// Repeated, one sequence per configured language
    MultipleLanguages(BTreeMap<String, Vec<Scalar>>),
}

impl BoneValue {
    /// The scalar of a single, unlocalized value
    #[must_use]
    pub const fn as_single(&self) -> Option<&Scalar> {
        match self {
            Self::Single(Some(value)) => Some(value),
            _ => None,
        }
    }

    /// The scalars of a repeated, unlocalized value
    #[must_use]
    pub fn as_multiple(&self) -> Option<&[Scalar]> {
        match self {
            Self::Multiple(values) => Some(values),
            _ => None,
        }
    }

    /// The scalar stored for `lang` on a single, localized value
    #[must_use]
    pub fn language(&self, lang: &str) -> Option<&Scalar> {
        match self {
            Self::Languages(map) => map.get(lang).and_then(Option::as_ref),
            _ => None,
        }
    }

    /// The scalars stored for `lang` on a repeated, localized value
    #[must_use]
    pub fn language_values(&self, lang: &str) -> Option<&[Scalar]> {
        match self {
            Self::MultipleLanguages(map) => map.get(lang).map(Vec::as_slice),
            _ => None,
        }
    }

    /// Language keys present on a localized value, empty otherwise
    ///
    /// Keys come back sorted, not in the bone's configured order.
    #[must_use]
    pub fn language_keys(&self) -> Vec<&str> {
        match self {
            Self::Languages(map) => map.keys().map(String::as_str).collect(),
            Self::MultipleLanguages(map) => map.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Iterate over every scalar regardless of layout
    pub fn scalars(&self) -> Box<dyn Iterator<Item = &Scalar> + '_> {
        match self {
            Self::Single(value) => Box::new(value.iter()),
            Self::Multiple(values) => Box::new(values.iter()),
            Self::Languages(map) => Box::new(map.values().flatten()),
            Self::MultipleLanguages(map) => Box::new(map.values().flatten()),
        }
    }
}

/// Current in-memory values of one entity, keyed by bone name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueCache {
    values: BTreeMap<String, BoneValue>,
}

impl ValueCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value of a bone
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BoneValue> {
        self.values.get(name)
    }

    /// Mutable access to the value of a bone
    pub fn get_mut(&mut self, name: &str) -> Option<&mut BoneValue> {
        self.values.get_mut(name)
    }

    /// Replace the value of a bone
    pub fn set(&mut self, name: impl Into<String>, value: BoneValue) {
        self.values.insert(name.into(), value);
    }

    /// Remove the value of a bone
    pub fn remove(&mut self, name: &str) -> Option<BoneValue> {
        self.values.remove(name)
    }

    /// Check whether a bone has a value
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Iterate over `(name, value)` pairs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoneValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of bones with a value
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_time_of_day_ranges() {
        assert!(TimeOfDay::new(23, 59, 59).is_some());
        assert!(TimeOfDay::new(24, 0, 0).is_none());
        assert!(TimeOfDay::new(12, 60, 0).is_none());
        assert!(TimeOfDay::from_seconds(86_399).is_some());
        assert!(TimeOfDay::from_seconds(86_400).is_none());
    }

    #[test]
    fn test_time_of_day_keeps_raw_seconds() {
        let t = TimeOfDay::from_seconds(90).unwrap();
        assert_eq!(t.second, 90);
        assert_eq!(t.minute, 0);
        assert_eq!(t.seconds_of_day(), 90);
        assert_eq!(t.to_naive_time(), NaiveTime::from_hms_opt(0, 1, 30).unwrap());
    }

    #[test]
    fn test_time_of_day_display() {
        assert_eq!(TimeOfDay::new(7, 5, 3).unwrap().to_string(), "07:05:03");
    }

    #[test]
    fn test_scalar_accessors() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(Scalar::from(dt).as_datetime(), Some(dt));
        assert_eq!(Scalar::from("x").as_str(), Some("x"));
        assert_eq!(Scalar::from(true).as_bool(), Some(true));
        assert_eq!(Scalar::from("x").as_bool(), None);
    }

    #[test]
    fn test_bone_value_language_access() {
        let mut map = BTreeMap::new();
        map.insert("de".to_string(), Some(Scalar::from("Hallo")));
        map.insert("en".to_string(), None);
        let value = BoneValue::Languages(map);

        assert_eq!(value.language("de"), Some(&Scalar::from("Hallo")));
        assert_eq!(value.language("en"), None);
        assert_eq!(value.language_keys(), vec!["de", "en"]);
        assert_eq!(value.scalars().count(), 1);
    }

    #[test]
    fn test_value_cache() {
        let mut cache = ValueCache::new();
        assert!(cache.is_empty());
        cache.set("name", BoneValue::Single(Some(Scalar::from("foo"))));
        assert!(cache.contains("name"));
        assert_eq!(
            cache.get("name").and_then(BoneValue::as_single),
            Some(&Scalar::from("foo"))
        );
        assert_eq!(cache.len(), 1);
        assert!(cache.remove("name").is_some());
        assert!(cache.is_empty());
    }
}
