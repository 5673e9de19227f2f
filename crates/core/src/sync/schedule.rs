//! Times of day and timezone conversion for sync schedules.
//!
//! Schedules are stored as UTC `HH:MM`. The user's timezone is only used to
//! convert on the way in and back out for display.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result, ValidationError};

const MINUTES_PER_DAY: i32 = 24 * 60;

/// A wall-clock time with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    minutes: u16,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then(|| Self {
            minutes: (hour * 60 + minute) as u16,
        })
    }

    pub fn hour(&self) -> u32 {
        u32::from(self.minutes / 60)
    }

    pub fn minute(&self) -> u32 {
        u32::from(self.minutes % 60)
    }

    fn from_minutes(minutes: i32) -> Self {
        Self {
            minutes: minutes.rem_euclid(MINUTES_PER_DAY) as u16,
        }
    }

    /// Shifts by `offset_minutes`, wrapping around midnight.
    fn shifted(&self, offset_minutes: i32) -> Self {
        Self::from_minutes(i32::from(self.minutes) + offset_minutes)
    }

    pub fn as_naive(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour(), self.minute(), 0).unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::from(ValidationError::InvalidTime(s.to_string()));
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if m.len() != 2 || h.is_empty() || h.len() > 2 {
            return Err(invalid());
        }
        let hour: u32 = h.parse().map_err(|_| invalid())?;
        let minute: u32 = m.parse().map_err(|_| invalid())?;
        TimeOfDay::new(hour, minute).ok_or_else(invalid)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// A fixed UTC offset or an IANA zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleTimezone {
    /// Offset east of UTC in minutes.
    Fixed(i32),
    Named(Tz),
}

impl ScheduleTimezone {
    /// Accepts `UTC`, `UTC-5`, `UTC+05:30`, `GMT+1`, `-05:00`, `+0530` and
    /// IANA names such as `America/New_York`.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let invalid = || Error::from(ValidationError::InvalidTimezone(input.to_string()));
        if trimmed.is_empty() {
            return Err(invalid());
        }
        let upper = trimmed.to_ascii_uppercase();
        if matches!(upper.as_str(), "UTC" | "GMT" | "Z") {
            return Ok(ScheduleTimezone::Fixed(0));
        }
        let offset_part = upper
            .strip_prefix("UTC")
            .or_else(|| upper.strip_prefix("GMT"))
            .unwrap_or(&upper);
        if offset_part.starts_with('+') || offset_part.starts_with('-') {
            return parse_offset(offset_part).map(ScheduleTimezone::Fixed).ok_or_else(invalid);
        }
        trimmed.parse::<Tz>().map(ScheduleTimezone::Named).map_err(|_| invalid())
    }

    /// Offset east of UTC in minutes on `date`. Named zones use the offset in
    /// effect at noon UTC that day.
    pub fn offset_minutes(&self, date: NaiveDate) -> i32 {
        match self {
            ScheduleTimezone::Fixed(minutes) => *minutes,
            ScheduleTimezone::Named(tz) => {
                let noon = date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN));
                tz.offset_from_utc_datetime(&noon).fix().local_minus_utc() / 60
            }
        }
    }

    pub fn to_utc(&self, local: TimeOfDay, date: NaiveDate) -> TimeOfDay {
        local.shifted(-self.offset_minutes(date))
    }

    pub fn to_local(&self, utc: TimeOfDay, date: NaiveDate) -> TimeOfDay {
        utc.shifted(self.offset_minutes(date))
    }
}

fn parse_offset(s: &str) -> Option<i32> {
    let (sign, rest) = match s.split_at(1) {
        ("+", rest) => (1, rest),
        ("-", rest) => (-1, rest),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes >= 60 {
        return None;
    }
    Some(sign * (hours * 60 + minutes))
}

/// The first scheduled instant strictly after `after`.
pub fn next_fire_after(times: &[TimeOfDay], after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let today = after.date_naive();
    [today, today + Duration::days(1)]
        .into_iter()
        .flat_map(|date| times.iter().map(move |t| date.and_time(t.as_naive()).and_utc()))
        .filter(|candidate| *candidate > after)
        .min()
}
