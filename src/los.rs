// Day-of-week and length-of-stay pattern helpers
use crate::values::parse_boolean;
use chrono::Weekday;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

pub const DAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

// Attribute names used by StatusApplicationControl for the same seven days
pub const OTA_DAY_ATTRIBUTES: [&str; 7] = ["Mon", "Tue", "Weds", "Thur", "Fri", "Sat", "Sun"];

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

// Seven open/closed flags, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DayPattern([bool; 7]);

impl Default for DayPattern {
    fn default() -> Self {
        Self::ALL_OPEN
    }
}

impl DayPattern {
    pub const ALL_OPEN: DayPattern = DayPattern([true; 7]);

    pub fn new(days: [bool; 7]) -> Self {
        Self(days)
    }

    // Reads the first seven characters; a short pattern is padded with closed days.
    pub fn from_binary(binary: &str) -> Self {
        let mut days = [false; 7];
        for (slot, c) in days.iter_mut().zip(binary.chars()) {
            *slot = c == '1';
        }
        Self(days)
    }

    pub fn from_flags(flags: &[bool]) -> Self {
        let mut days = [false; 7];
        for (slot, flag) in days.iter_mut().zip(flags) {
            *slot = *flag;
        }
        Self(days)
    }

    pub fn from_available_days<S: AsRef<str>>(names: &[S]) -> Self {
        let mut days = [false; 7];
        for name in names {
            if let Some(index) = day_index(name.as_ref()) {
                days[index] = true;
            }
        }
        Self(days)
    }

    // Accepts "1000111", "TFFFTTT", "YNNNYYY" or seven separated counts
    // such as "1, 0, 0, 0, 2, 1, 1".
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if raw.chars().all(|c| c == '0' || c == '1') {
            return Some(Self::from_binary(raw));
        }
        if raw.chars().all(|c| matches!(c, 'T' | 'F' | 't' | 'f')) {
            let flags: Vec<bool> = raw.chars().map(|c| c.eq_ignore_ascii_case(&'T')).collect();
            return Some(Self::from_flags(&flags));
        }
        if raw.chars().all(|c| matches!(c, 'Y' | 'N' | 'y' | 'n')) {
            let flags: Vec<bool> = raw.chars().map(|c| c.eq_ignore_ascii_case(&'Y')).collect();
            return Some(Self::from_flags(&flags));
        }

        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || c.is_whitespace() || *c == ',')
            .collect();
        let counts: Vec<i64> = cleaned
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(str::parse::<i64>)
            .collect::<Result<_, _>>()
            .ok()?;
        if counts.len() < 7 {
            return None;
        }
        let flags: Vec<bool> = counts.iter().take(7).map(|n| *n > 0).collect();
        Some(Self::from_flags(&flags))
    }

    // Strings, boolean or integer lists, and day-name maps.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Array(items) => {
                let flags: Option<Vec<bool>> = items
                    .iter()
                    .take(7)
                    .map(|item| match item {
                        Value::Bool(b) => Some(*b),
                        Value::Number(n) => n.as_i64().map(|n| n > 0),
                        _ => None,
                    })
                    .collect();
                flags.map(|flags| Self::from_flags(&flags))
            }
            Value::Object(map) => {
                let mut days = [false; 7];
                for (name, flag) in map {
                    if let Some(index) = day_index(name) {
                        days[index] = parse_boolean(flag).unwrap_or(false);
                    }
                }
                Some(Self(days))
            }
            _ => None,
        }
    }

    pub fn is_open(&self, day: Weekday) -> bool {
        self.0[day.num_days_from_monday() as usize]
    }

    pub fn flags(&self) -> [bool; 7] {
        self.0
    }

    pub fn days(&self) -> impl Iterator<Item = (Weekday, bool)> + '_ {
        WEEK.iter().copied().zip(self.0.iter().copied())
    }

    pub fn to_binary(&self) -> String {
        self.0.iter().map(|open| if *open { '1' } else { '0' }).collect()
    }

    pub fn to_day_map(&self) -> Vec<(&'static str, bool)> {
        DAY_NAMES.iter().copied().zip(self.0.iter().copied()).collect()
    }

    pub fn available_days(&self) -> Vec<&'static str> {
        self.to_day_map()
            .into_iter()
            .filter(|(_, open)| *open)
            .map(|(name, _)| name)
            .collect()
    }

    pub fn unavailable_days(&self) -> Vec<&'static str> {
        self.to_day_map()
            .into_iter()
            .filter(|(_, open)| !*open)
            .map(|(name, _)| name)
            .collect()
    }
}

impl fmt::Display for DayPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_binary())
    }
}

impl FromStr for DayPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unrecognised day pattern '{}'", s))
    }
}

// Unrecognised vendor patterns open every day instead of failing the record.
impl<'de> Deserialize<'de> for DayPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value).unwrap_or_else(|| {
            warn!(pattern = %value, "Unrecognised day pattern, opening all days");
            Self::ALL_OPEN
        }))
    }
}

// Index into DAY_NAMES; accepts the OTA spellings and full names too.
pub fn day_index(name: &str) -> Option<usize> {
    let lower = name.trim().to_lowercase();
    let index = match lower.as_str() {
        "mon" | "monday" => 0,
        "tue" | "tues" | "tuesday" => 1,
        "wed" | "weds" | "wednesday" => 2,
        "thu" | "thur" | "thurs" | "thursday" => 3,
        "fri" | "friday" => 4,
        "sat" | "saturday" => 5,
        "sun" | "sunday" => 6,
        _ => return None,
    };
    Some(index)
}

// The FullPatternLOS value of a LengthOfStay. Binary strings pass through
// untouched (they may be longer than a week) and other day-pattern spellings
// are normalised to binary. A pattern that cannot be read becomes "1111111".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LosPattern(String);

impl LosPattern {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn all_open() -> Self {
        Self(DayPattern::ALL_OPEN.to_binary())
    }

    // None only when no pattern was sent (null or blank).
    pub fn from_value(value: &Value) -> Option<Self> {
        let pattern = match value {
            Value::Null => return None,
            Value::String(s) if s.trim().is_empty() => return None,
            Value::String(s) => Self::from_text(s.trim()),
            Value::Number(n) => Self::from_text(&n.to_string()),
            Value::Array(_) | Value::Object(_) => {
                DayPattern::from_value(value).map(|pattern| Self(pattern.to_binary()))
            }
            Value::Bool(_) => None,
        };
        Some(pattern.unwrap_or_else(|| {
            warn!(pattern = %value, "Unrecognised LOS pattern, opening all days");
            Self::all_open()
        }))
    }

    fn from_text(text: &str) -> Option<Self> {
        if text.chars().all(|c| c == '0' || c == '1') {
            return Some(Self(text.to_string()));
        }
        DayPattern::parse(text).map(|pattern| Self(pattern.to_binary()))
    }
}

impl fmt::Display for LosPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for LosPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for LosPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        // blank stays empty and is dropped when the document is built
        Ok(Self::from_value(&value).unwrap_or_else(|| Self(String::new())))
    }
}
