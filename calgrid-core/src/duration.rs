//! Normalized calendar durations.
//!
//! A [`Duration`] always has exactly four fields. Weeks fold into days and
//! hours, minutes and seconds fold into milliseconds, so two durations are
//! equal only when they describe the same calendar arithmetic.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{CalGridError, CalGridResult};

pub(crate) const MS_PER_SECOND: i64 = 1000;
pub(crate) const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
pub(crate) const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
pub(crate) const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// A calendar duration in normalized form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "DurationInput")]
pub struct Duration {
    pub years: i32,
    pub months: i32,
    pub days: i32,
    pub milliseconds: i64,
}

/// Units used for whole-unit comparisons and label granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeUnit::Year => "year",
            TimeUnit::Month => "month",
            TimeUnit::Week => "week",
            TimeUnit::Day => "day",
            TimeUnit::Hour => "hour",
            TimeUnit::Minute => "minute",
            TimeUnit::Second => "second",
            TimeUnit::Millisecond => "millisecond",
        };
        write!(f, "{}", name)
    }
}

/// Object form of a duration, as found in config files and event payloads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DurationParts {
    #[serde(alias = "year")]
    pub years: i32,
    #[serde(alias = "month")]
    pub months: i32,
    #[serde(alias = "week")]
    pub weeks: i32,
    #[serde(alias = "day")]
    pub days: i32,
    #[serde(alias = "hour")]
    pub hours: i64,
    #[serde(alias = "minute")]
    pub minutes: i64,
    #[serde(alias = "second")]
    pub seconds: i64,
    #[serde(alias = "millisecond", alias = "ms")]
    pub milliseconds: i64,
}

/// Every accepted serialized form of a duration.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationInput {
    Millis(i64),
    Text(String),
    Parts(DurationParts),
}

impl TryFrom<DurationInput> for Duration {
    type Error = CalGridError;

    fn try_from(input: DurationInput) -> CalGridResult<Self> {
        match input {
            DurationInput::Millis(ms) => Ok(Duration::from_ms(ms)),
            DurationInput::Text(s) => Duration::parse(&s),
            DurationInput::Parts(parts) => Duration::from_parts(&parts),
        }
    }
}

impl Duration {
    pub const fn zero() -> Self {
        Duration {
            years: 0,
            months: 0,
            days: 0,
            milliseconds: 0,
        }
    }

    pub const fn from_ms(milliseconds: i64) -> Self {
        Duration {
            years: 0,
            months: 0,
            days: 0,
            milliseconds,
        }
    }

    pub const fn from_days(days: i32) -> Self {
        Duration {
            years: 0,
            months: 0,
            days,
            milliseconds: 0,
        }
    }

    pub const fn from_weeks(weeks: i32) -> Self {
        Self::from_days(weeks.saturating_mul(7))
    }

    pub const fn from_months(months: i32) -> Self {
        Duration {
            years: 0,
            months,
            days: 0,
            milliseconds: 0,
        }
    }

    pub const fn from_years(years: i32) -> Self {
        Duration {
            years,
            months: 0,
            days: 0,
            milliseconds: 0,
        }
    }

    pub const fn from_hours(hours: i64) -> Self {
        Self::from_ms(hours.saturating_mul(MS_PER_HOUR))
    }

    pub const fn from_minutes(minutes: i64) -> Self {
        Self::from_ms(minutes.saturating_mul(MS_PER_MINUTE))
    }

    /// Fold an object-form duration. Fails when a field overflows.
    pub fn from_parts(parts: &DurationParts) -> CalGridResult<Self> {
        let days = parts
            .weeks
            .checked_mul(7)
            .and_then(|week_days| week_days.checked_add(parts.days));
        let milliseconds = sum_ms(&[
            (parts.hours, MS_PER_HOUR),
            (parts.minutes, MS_PER_MINUTE),
            (parts.seconds, MS_PER_SECOND),
            (parts.milliseconds, 1),
        ]);

        match (days, milliseconds) {
            (Some(days), Some(milliseconds)) => Ok(Duration {
                years: parts.years,
                months: parts.months,
                days,
                milliseconds,
            }),
            _ => Err(CalGridError::InvalidDuration(format!("{:?} is out of range", parts))),
        }
    }

    /// Parse a duration string.
    ///
    /// Accepts `[-][D.]HH:MM[:SS[.mmm]]`, ISO-8601 (`PT1H30M`, `P2W`) and
    /// humantime (`90m`, `1h 30m`) forms, tried in that order.
    pub fn parse(input: &str) -> CalGridResult<Self> {
        let s = input.trim();
        if s.is_empty() {
            return Err(CalGridError::InvalidDuration("empty duration".into()));
        }

        if let Some(clock) = parse_clock(s) {
            return clock.ok_or_else(|| CalGridError::InvalidDuration(format!("'{}' is too large", input)));
        }

        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let parsed = if body.starts_with('P') {
            parse_iso(body)?
        } else {
            let std_dur = humantime::parse_duration(body)
                .map_err(|e| CalGridError::InvalidDuration(format!("'{}': {}", input, e)))?;
            let ms = i64::try_from(std_dur.as_millis())
                .map_err(|_| CalGridError::InvalidDuration(format!("'{}' is too large", input)))?;
            Duration::from_ms(ms)
        };

        Ok(if negative { -parsed } else { parsed })
    }

    pub fn is_zero(&self) -> bool {
        *self == Duration::zero()
    }

    /// True when every field is zero or positive.
    pub fn is_non_negative(&self) -> bool {
        self.years >= 0 && self.months >= 0 && self.days >= 0 && self.milliseconds >= 0
    }

    /// Milliseconds assuming 365-day years and 30-day months.
    /// Saturates at the `i64` range.
    pub fn as_rough_ms(&self) -> i64 {
        [
            i64::from(self.years).saturating_mul(365 * MS_PER_DAY),
            i64::from(self.months).saturating_mul(30 * MS_PER_DAY),
            i64::from(self.days).saturating_mul(MS_PER_DAY),
            self.milliseconds,
        ]
        .into_iter()
        .fold(0i64, i64::saturating_add)
    }

    pub fn as_rough_days(&self) -> f64 {
        f64::from(self.years) * 365.0
            + f64::from(self.months) * 30.0
            + f64::from(self.days)
            + self.milliseconds as f64 / MS_PER_DAY as f64
    }

    pub fn as_rough_months(&self) -> f64 {
        f64::from(self.years) * 12.0
            + f64::from(self.months)
            + f64::from(self.days) / 30.0
            + self.milliseconds as f64 / (30.0 * MS_PER_DAY as f64)
    }

    pub fn as_rough_years(&self) -> f64 {
        f64::from(self.years)
            + f64::from(self.months) / 12.0
            + f64::from(self.days) / 365.0
            + self.milliseconds as f64 / (365.0 * MS_PER_DAY as f64)
    }

    /// The largest unit this duration is an exact whole multiple of.
    ///
    /// The finest non-zero field decides: `{days: 14}` is two weeks, while
    /// `{days: 1, milliseconds: 1800000}` is thirty minutes.
    pub fn greatest_denominator(&self) -> (TimeUnit, i64) {
        let ms = self.milliseconds;
        if ms != 0 {
            if ms % MS_PER_SECOND != 0 {
                return (TimeUnit::Millisecond, self.as_rough_ms());
            }
            if ms % MS_PER_MINUTE != 0 {
                return (TimeUnit::Second, self.as_rough_ms() / MS_PER_SECOND);
            }
            if ms % MS_PER_HOUR != 0 {
                return (TimeUnit::Minute, self.as_rough_ms() / MS_PER_MINUTE);
            }
            return (TimeUnit::Hour, self.as_rough_ms() / MS_PER_HOUR);
        }
        if self.days != 0 {
            let days = self.as_rough_ms() / MS_PER_DAY;
            if days % 7 != 0 {
                return (TimeUnit::Day, days);
            }
            return (TimeUnit::Week, days / 7);
        }
        if self.months != 0 {
            let months = i64::from(self.years) * 12 + i64::from(self.months);
            if months % 12 != 0 {
                return (TimeUnit::Month, months);
            }
            return (TimeUnit::Year, months / 12);
        }
        if self.years != 0 {
            return (TimeUnit::Year, i64::from(self.years));
        }
        (TimeUnit::Millisecond, 0)
    }

    /// How many whole `denominator`s fit in `self`, if the division is exact
    /// in every unit and agrees across units.
    pub fn whole_divide(&self, denominator: &Duration) -> Option<i64> {
        let pairs = [
            (i64::from(self.years), i64::from(denominator.years)),
            (i64::from(self.months), i64::from(denominator.months)),
            (i64::from(self.days), i64::from(denominator.days)),
            (self.milliseconds, denominator.milliseconds),
        ];

        let mut result = None;
        for (num, denom) in pairs {
            if num != 0 {
                if denom == 0 || num % denom != 0 {
                    return None;
                }
                let local = num / denom;
                if result.is_some_and(|r| r != local) {
                    return None;
                }
                result = Some(local);
            } else if denom != 0 {
                return None;
            }
        }
        result
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration {
            years: self.years.saturating_add(rhs.years),
            months: self.months.saturating_add(rhs.months),
            days: self.days.saturating_add(rhs.days),
            milliseconds: self.milliseconds.saturating_add(rhs.milliseconds),
        }
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, rhs: Duration) -> Duration {
        self + -rhs
    }
}

impl Neg for Duration {
    type Output = Duration;

    fn neg(self) -> Duration {
        Duration {
            years: self.years.saturating_neg(),
            months: self.months.saturating_neg(),
            days: self.days.saturating_neg(),
            milliseconds: self.milliseconds.saturating_neg(),
        }
    }
}

impl Mul<i32> for Duration {
    type Output = Duration;

    fn mul(self, n: i32) -> Duration {
        Duration {
            years: self.years.saturating_mul(n),
            months: self.months.saturating_mul(n),
            days: self.days.saturating_mul(n),
            milliseconds: self.milliseconds.saturating_mul(i64::from(n)),
        }
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (unit, value) = self.greatest_denominator();
        write!(f, "{} {}", value, unit)?;
        if value != 1 {
            write!(f, "s")?;
        }
        Ok(())
    }
}

/// `(value, unit ms)` pairs summed, or None on overflow.
fn sum_ms(parts: &[(i64, i64)]) -> Option<i64> {
    parts.iter().try_fold(0i64, |total, (value, unit)| {
        value.checked_mul(*unit).and_then(|ms| total.checked_add(ms))
    })
}

/// `[-][D.]HH:MM[:SS[.mmm]]`
///
/// None when `s` isn't clock-shaped; `Some(None)` when it is but overflows.
fn parse_clock(s: &str) -> Option<Option<Duration>> {
    let (sign, body) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s),
    };

    let mut clock_parts = body.split(':');
    let head = clock_parts.next()?;
    let minutes_str = clock_parts.next()?;
    let seconds_str = clock_parts.next();
    if clock_parts.next().is_some() {
        return None;
    }

    let (days, hours) = match head.split_once('.') {
        Some((d, h)) => (parse_digits(d, None)?, parse_digits(h, None)?),
        None => (0, parse_digits(head, None)?),
    };
    let minutes = parse_digits(minutes_str, Some(2))?;

    let (seconds, millis) = match seconds_str {
        Some(sec) => match sec.split_once('.') {
            Some((whole, frac)) => (parse_digits(whole, Some(2))?, parse_digits(frac, Some(3))?),
            None => (parse_digits(sec, Some(2))?, 0),
        },
        None => (0, 0),
    };

    let days = i32::try_from(days).ok();
    let milliseconds = sum_ms(&[
        (hours, MS_PER_HOUR),
        (minutes, MS_PER_MINUTE),
        (seconds, MS_PER_SECOND),
        (millis, 1),
    ]);
    Some(days.zip(milliseconds).map(|(days, milliseconds)| Duration {
        years: 0,
        months: 0,
        days: sign * days,
        milliseconds: i64::from(sign) * milliseconds,
    }))
}

fn parse_digits(s: &str, exact_len: Option<usize>) -> Option<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if exact_len.is_some_and(|len| s.len() != len) {
        return None;
    }
    s.parse().ok()
}

fn parse_iso(s: &str) -> CalGridResult<Duration> {
    let parsed = iso8601::duration(s)
        .map_err(|e| CalGridError::InvalidDuration(format!("'{}': {}", s, e)))?;

    let duration = match parsed {
        iso8601::Duration::Weeks(w) => {
            let days = to_i32(w)?
                .checked_mul(7)
                .ok_or_else(|| CalGridError::InvalidDuration(format!("'{}' is out of range", s)))?;
            Duration::from_days(days)
        }
        iso8601::Duration::YMDHMS {
            year,
            month,
            day,
            hour,
            minute,
            second,
            millisecond,
        } => Duration {
            years: to_i32(year)?,
            months: to_i32(month)?,
            days: to_i32(day)?,
            milliseconds: i64::from(hour) * MS_PER_HOUR
                + i64::from(minute) * MS_PER_MINUTE
                + i64::from(second) * MS_PER_SECOND
                + i64::from(millisecond),
        },
    };
    Ok(duration)
}

fn to_i32(n: u32) -> CalGridResult<i32> {
    i32::try_from(n).map_err(|_| CalGridError::InvalidDuration(format!("{} is out of range", n)))
}
