//! Timezone-neutral date markers and the environment that projects them.
//!
//! A [`Marker`] is a wall-clock reading in a neutral calendar. All slicing and
//! layout arithmetic happens on markers; [`DateEnv`] converts raw input into
//! markers and converts markers back into real instants for display.

use std::str::FromStr;

use chrono::{
    DateTime, Datelike, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta,
    TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::duration::{Duration, MS_PER_DAY, MS_PER_HOUR, MS_PER_MINUTE, MS_PER_SECOND, TimeUnit};
use crate::error::{CalGridError, CalGridResult};

/// A point in time in the neutral calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Marker(NaiveDateTime);

impl Marker {
    pub fn new(datetime: NaiveDateTime) -> Self {
        Marker(datetime)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(|d| Marker(d.and_time(NaiveTime::MIN)))
    }

    pub fn from_ymd_hms(year: i32, month: u32, day: u32, h: u32, m: u32, s: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(h, m, s))
            .map(Marker)
    }

    pub fn naive(&self) -> NaiveDateTime {
        self.0
    }

    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }

    /// Calendar addition: years and months first (clamping the day of month),
    /// then days, then milliseconds. Saturates at the representable range.
    pub fn add(&self, duration: &Duration) -> Marker {
        let total_months = i64::from(duration.years) * 12 + i64::from(duration.months);
        let shifted = add_months(self.0, total_months);
        let delta = TimeDelta::try_days(i64::from(duration.days))
            .zip(TimeDelta::try_milliseconds(duration.milliseconds))
            .and_then(|(days, ms)| days.checked_add(&ms));

        let saturate = if duration.days < 0 || duration.milliseconds < 0 {
            NaiveDateTime::MIN
        } else {
            NaiveDateTime::MAX
        };

        match (shifted, delta) {
            (Some(dt), Some(delta)) => Marker(dt.checked_add_signed(delta).unwrap_or(saturate)),
            _ => Marker(saturate),
        }
    }

    pub fn subtract(&self, duration: &Duration) -> Marker {
        self.add(&-*duration)
    }

    pub fn add_days(&self, days: i64) -> Marker {
        let days = i32::try_from(days).unwrap_or(if days < 0 { i32::MIN } else { i32::MAX });
        self.add(&Duration::from_days(days))
    }

    pub fn add_ms(&self, ms: i64) -> Marker {
        self.add(&Duration::from_ms(ms))
    }

    pub fn start_of_day(&self) -> Marker {
        Marker(self.0.date().and_time(NaiveTime::MIN))
    }

    /// Start of the week containing this marker. `first_day` is 0 for Sunday.
    pub fn start_of_week(&self, first_day: u8) -> Marker {
        let back = (i64::from(self.weekday()) - i64::from(first_day % 7) + 7) % 7;
        self.start_of_day().add_days(-back)
    }

    pub fn start_of_month(&self) -> Marker {
        let first = self.0.date().with_day(1).unwrap_or(self.0.date());
        Marker(first.and_time(NaiveTime::MIN))
    }

    pub fn start_of_year(&self) -> Marker {
        let first = NaiveDate::from_ymd_opt(self.0.year(), 1, 1).unwrap_or(self.0.date());
        Marker(first.and_time(NaiveTime::MIN))
    }

    /// Day of week, 0 = Sunday … 6 = Saturday.
    pub fn weekday(&self) -> u8 {
        self.0.weekday().num_days_from_sunday() as u8
    }

    pub fn time_of_day(&self) -> Duration {
        Duration::from_ms(self.time_of_day_ms())
    }

    fn time_of_day_ms(&self) -> i64 {
        i64::from(self.0.num_seconds_from_midnight()) * MS_PER_SECOND
            + i64::from(self.0.nanosecond() / 1_000_000)
    }

    /// Signed milliseconds from `self` to `other`.
    pub fn diff_ms(&self, other: &Marker) -> i64 {
        (other.0 - self.0).num_milliseconds()
    }

    pub fn diff_days(&self, other: &Marker) -> f64 {
        self.diff_ms(other) as f64 / MS_PER_DAY as f64
    }

    pub fn diff_whole_days(&self, other: &Marker) -> Option<i64> {
        if self.time_of_day_ms() != other.time_of_day_ms() {
            return None;
        }
        Some((other.0.date() - self.0.date()).num_days())
    }

    pub fn diff_whole_weeks(&self, other: &Marker) -> Option<i64> {
        self.diff_whole_days(other)
            .filter(|days| days % 7 == 0)
            .map(|days| days / 7)
    }

    pub fn diff_whole_months(&self, other: &Marker) -> Option<i64> {
        if self.time_of_day_ms() != other.time_of_day_ms() || self.0.day() != other.0.day() {
            return None;
        }
        Some(
            i64::from(other.0.year() - self.0.year()) * 12 + i64::from(other.0.month())
                - i64::from(self.0.month()),
        )
    }

    pub fn diff_whole_years(&self, other: &Marker) -> Option<i64> {
        if self.time_of_day_ms() != other.time_of_day_ms()
            || self.0.day() != other.0.day()
            || self.0.month() != other.0.month()
        {
            return None;
        }
        Some(i64::from(other.0.year() - self.0.year()))
    }
}

/// The greatest unit in which `m0 → m1` is an exact whole number.
pub fn diff_whole_units(m0: &Marker, m1: &Marker) -> Option<(TimeUnit, i64)> {
    if let Some(n) = m0.diff_whole_years(m1) {
        return Some((TimeUnit::Year, n));
    }
    if let Some(n) = m0.diff_whole_months(m1) {
        return Some((TimeUnit::Month, n));
    }
    if let Some(n) = m0.diff_whole_weeks(m1) {
        return Some((TimeUnit::Week, n));
    }
    if let Some(n) = m0.diff_whole_days(m1) {
        return Some((TimeUnit::Day, n));
    }

    let ms = m0.diff_ms(m1);
    let units = [
        (TimeUnit::Hour, MS_PER_HOUR),
        (TimeUnit::Minute, MS_PER_MINUTE),
        (TimeUnit::Second, MS_PER_SECOND),
        (TimeUnit::Millisecond, 1),
    ];
    units
        .into_iter()
        .find(|(_, size)| ms % size == 0)
        .map(|(unit, size)| (unit, ms / size))
}

fn add_months(dt: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
    if months >= 0 {
        dt.checked_add_months(Months::new(magnitude))
    } else {
        dt.checked_sub_months(Months::new(magnitude))
    }
}

/// Raw date input: an ISO-like string or epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateInput {
    Millis(i64),
    Text(String),
}

impl From<&str> for DateInput {
    fn from(s: &str) -> Self {
        DateInput::Text(s.to_string())
    }
}

/// A parsed marker plus what the raw input did and didn't say.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerMeta {
    pub marker: Marker,
    /// The input was a bare date (`2024-03-01`).
    pub is_time_unspecified: bool,
    /// Offset written in the input, kept only when the display zone could not
    /// be resolved.
    pub forced_offset_minutes: Option<i32>,
}

/// How markers map to real instants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeZoneSetting {
    Utc,
    Named(Tz),
    /// A zone name with no known rules. Markers keep the written wall clock.
    Unresolved(String),
}

impl TimeZoneSetting {
    pub fn resolve(name: &str) -> Self {
        if name.eq_ignore_ascii_case("utc") || name.eq_ignore_ascii_case("z") {
            return TimeZoneSetting::Utc;
        }
        match Tz::from_str(name) {
            Ok(tz) => TimeZoneSetting::Named(tz),
            Err(_) => {
                tracing::debug!(time_zone = name, "unknown time zone; keeping wall clock");
                TimeZoneSetting::Unresolved(name.to_string())
            }
        }
    }
}

/// Conversion environment between raw dates, markers and display instants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateEnv {
    pub time_zone: TimeZoneSetting,
    /// First day of the week, 0 = Sunday.
    pub first_day: u8,
}

impl Default for DateEnv {
    fn default() -> Self {
        DateEnv::utc()
    }
}

impl DateEnv {
    pub fn utc() -> Self {
        DateEnv {
            time_zone: TimeZoneSetting::Utc,
            first_day: 0,
        }
    }

    /// Build an env for a zone name. Unknown names fall back to
    /// [`TimeZoneSetting::Unresolved`].
    pub fn new(time_zone: &str, first_day: u8) -> Self {
        DateEnv {
            time_zone: TimeZoneSetting::resolve(time_zone),
            first_day: first_day % 7,
        }
    }

    /// Like [`DateEnv::new`] but rejects unknown zone names.
    pub fn strict(time_zone: &str, first_day: u8) -> CalGridResult<Self> {
        let env = Self::new(time_zone, first_day);
        if let TimeZoneSetting::Unresolved(name) = &env.time_zone {
            return Err(CalGridError::InvalidTimeZone(name.clone()));
        }
        Ok(env)
    }

    pub fn create_marker(&self, input: &DateInput) -> Option<Marker> {
        self.create_marker_meta(input).map(|meta| meta.marker)
    }

    pub fn create_marker_meta(&self, input: &DateInput) -> Option<MarkerMeta> {
        match input {
            DateInput::Millis(ms) => {
                let instant = DateTime::<Utc>::from_timestamp_millis(*ms)?;
                Some(MarkerMeta {
                    marker: self.from_instant(instant),
                    is_time_unspecified: false,
                    forced_offset_minutes: None,
                })
            }
            DateInput::Text(s) => self.parse_text(s.trim()),
        }
    }

    fn parse_text(&self, s: &str) -> Option<MarkerMeta> {
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(MarkerMeta {
                marker: Marker(date.and_time(NaiveTime::MIN)),
                is_time_unspecified: true,
                forced_offset_minutes: None,
            });
        }

        let (wall, offset) = split_offset(s)?;
        let naive = parse_wall_clock(wall)?;

        let Some(offset) = offset else {
            return Some(MarkerMeta {
                marker: Marker(naive),
                is_time_unspecified: false,
                forced_offset_minutes: None,
            });
        };

        let meta = match &self.time_zone {
            TimeZoneSetting::Unresolved(_) => MarkerMeta {
                marker: Marker(naive),
                is_time_unspecified: false,
                forced_offset_minutes: Some(offset.local_minus_utc() / 60),
            },
            _ => {
                let instant = offset.from_local_datetime(&naive).single()?.with_timezone(&Utc);
                MarkerMeta {
                    marker: self.from_instant(instant),
                    is_time_unspecified: false,
                    forced_offset_minutes: None,
                }
            }
        };
        Some(meta)
    }

    /// The marker for a real instant, e.g. "now".
    pub fn from_instant(&self, instant: DateTime<Utc>) -> Marker {
        match &self.time_zone {
            TimeZoneSetting::Named(tz) => Marker(instant.with_timezone(tz).naive_local()),
            TimeZoneSetting::Utc | TimeZoneSetting::Unresolved(_) => Marker(instant.naive_utc()),
        }
    }

    pub fn now(&self) -> Marker {
        self.from_instant(Utc::now())
    }

    /// Project a marker onto a real instant.
    pub fn to_instant(&self, marker: &Marker, forced_offset_minutes: Option<i32>) -> DateTime<Utc> {
        match &self.time_zone {
            TimeZoneSetting::Utc => marker.0.and_utc(),
            TimeZoneSetting::Named(tz) => {
                // Wall-clock times inside a DST gap resolve to the hour after.
                tz.from_local_datetime(&marker.0)
                    .earliest()
                    .or_else(|| {
                        let later = marker.0.checked_add_signed(TimeDelta::hours(1))?;
                        tz.from_local_datetime(&later).earliest()
                    })
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|| marker.0.and_utc())
            }
            TimeZoneSetting::Unresolved(_) => {
                let offset = forced_offset_minutes.unwrap_or(0);
                marker
                    .0
                    .checked_sub_signed(TimeDelta::minutes(i64::from(offset)))
                    .unwrap_or(marker.0)
                    .and_utc()
            }
        }
    }

    pub fn format_iso(&self, marker: &Marker, forced_offset_minutes: Option<i32>) -> String {
        match &self.time_zone {
            TimeZoneSetting::Utc => marker.0.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            TimeZoneSetting::Named(tz) => self
                .to_instant(marker, None)
                .with_timezone(tz)
                .format("%Y-%m-%dT%H:%M:%S%:z")
                .to_string(),
            TimeZoneSetting::Unresolved(_) => {
                match forced_offset_minutes.and_then(|m| FixedOffset::east_opt(m * 60)) {
                    Some(offset) => self
                        .to_instant(marker, forced_offset_minutes)
                        .with_timezone(&offset)
                        .format("%Y-%m-%dT%H:%M:%S%:z")
                        .to_string(),
                    None => marker.0.format("%Y-%m-%dT%H:%M:%S").to_string(),
                }
            }
        }
    }
}

/// Split a trailing `Z` / `±HH:MM` / `±HHMM` / `±HH` offset off a datetime string.
fn split_offset(s: &str) -> Option<(&str, Option<FixedOffset>)> {
    if let Some(wall) = s.strip_suffix('Z').or_else(|| s.strip_suffix('z')) {
        return Some((wall, FixedOffset::east_opt(0)));
    }

    // The date part itself contains '-', so only look past it.
    let time_start = s.find(['T', 't', ' '])?;
    let time_part = &s[time_start..];
    let Some(sign_pos) = time_part.rfind(['+', '-']) else {
        return Some((s, None));
    };

    let (wall, offset_str) = s.split_at(time_start + sign_pos);
    let sign = if offset_str.starts_with('-') { -1 } else { 1 };
    let digits: String = offset_str[1..].chars().filter(|c| *c != ':').collect();
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))?;
    Some((wall, Some(offset)))
}

fn parse_wall_clock(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 6] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> Marker {
        DateEnv::utc().create_marker(&DateInput::from(s)).unwrap()
    }

    #[test]
    fn test_parses_bare_dates_as_time_unspecified() {
        let meta = DateEnv::utc()
            .create_marker_meta(&DateInput::from("2024-03-01"))
            .unwrap();
        assert!(meta.is_time_unspecified);
        assert_eq!(meta.marker, Marker::from_ymd(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_offsets_fold_into_utc_markers() {
        assert_eq!(
            m("2024-03-01T10:00:00+02:00"),
            Marker::from_ymd_hms(2024, 3, 1, 8, 0, 0).unwrap()
        );
        assert_eq!(m("2024-03-01T10:00Z"), Marker::from_ymd_hms(2024, 3, 1, 10, 0, 0).unwrap());
        assert_eq!(m("2024-03-01 10:30"), Marker::from_ymd_hms(2024, 3, 1, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_named_zone_markers_are_local_wall_clock() {
        let env = DateEnv::new("Europe/Berlin", 1);
        let marker = env
            .create_marker(&DateInput::from("2024-01-15T12:00:00Z"))
            .unwrap();
        assert_eq!(marker, Marker::from_ymd_hms(2024, 1, 15, 13, 0, 0).unwrap());
        assert_eq!(
            env.to_instant(&marker, None),
            Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
        );
        assert_eq!(env.format_iso(&marker, None), "2024-01-15T13:00:00+01:00");
    }

    #[test]
    fn test_unresolved_zone_keeps_forced_offset() {
        let env = DateEnv::new("Mars/Olympus_Mons", 0);
        assert!(matches!(env.time_zone, TimeZoneSetting::Unresolved(_)));

        let meta = env
            .create_marker_meta(&DateInput::from("2024-01-15T09:00:00-05:00"))
            .unwrap();
        assert_eq!(meta.marker, Marker::from_ymd_hms(2024, 1, 15, 9, 0, 0).unwrap());
        assert_eq!(meta.forced_offset_minutes, Some(-300));
        assert_eq!(
            env.format_iso(&meta.marker, meta.forced_offset_minutes),
            "2024-01-15T09:00:00-05:00"
        );
        assert!(DateEnv::strict("Mars/Olympus_Mons", 0).is_err());
    }

    #[test]
    fn test_rejects_unparseable_input() {
        let env = DateEnv::utc();
        assert!(env.create_marker(&DateInput::from("next tuesday")).is_none());
        assert!(env.create_marker(&DateInput::from("2024-13-01")).is_none());
    }

    #[test]
    fn test_rejects_non_digit_offsets() {
        let env = DateEnv::utc();
        assert!(env.create_marker(&DateInput::from("2024-03-01T10:00+1\u{e9}1")).is_none());
        assert!(env.create_marker(&DateInput::from("2024-03-01T10:00+\u{e9}\u{e9}")).is_none());
        assert!(env.create_marker(&DateInput::from("2024-03-01T10:00+1x30")).is_none());
    }

    #[test]
    fn test_addition_saturates_instead_of_panicking() {
        let start = Marker::from_ymd(2024, 3, 1).unwrap();
        assert_eq!(start.add_ms(i64::MIN), Marker::new(NaiveDateTime::MIN));
        assert_eq!(start.add_ms(i64::MAX), Marker::new(NaiveDateTime::MAX));
        assert_eq!(start.add_days(i64::MIN), Marker::new(NaiveDateTime::MIN));
    }

    #[test]
    fn test_calendar_addition_clamps_month_end() {
        let jan31 = Marker::from_ymd(2024, 1, 31).unwrap();
        assert_eq!(
            jan31.add(&Duration::from_months(1)),
            Marker::from_ymd(2024, 2, 29).unwrap()
        );
        assert_eq!(
            jan31.add(&Duration::from_hours(25)),
            Marker::from_ymd_hms(2024, 2, 1, 1, 0, 0).unwrap()
        );
        assert_eq!(jan31.subtract(&Duration::from_days(31)), Marker::from_ymd(2023, 12, 31).unwrap());
    }

    #[test]
    fn test_week_and_day_boundaries() {
        // 2024-03-06 is a Wednesday.
        let wed = Marker::from_ymd_hms(2024, 3, 6, 15, 30, 0).unwrap();
        assert_eq!(wed.weekday(), 3);
        assert_eq!(wed.start_of_day(), Marker::from_ymd(2024, 3, 6).unwrap());
        assert_eq!(wed.start_of_week(0), Marker::from_ymd(2024, 3, 3).unwrap());
        assert_eq!(wed.start_of_week(1), Marker::from_ymd(2024, 3, 4).unwrap());
        assert_eq!(wed.time_of_day(), Duration::from_minutes(15 * 60 + 30));
    }

    #[test]
    fn test_whole_unit_diffs() {
        let a = m("2024-01-10T09:00");
        assert_eq!(diff_whole_units(&a, &m("2025-01-10T09:00")), Some((TimeUnit::Year, 1)));
        assert_eq!(diff_whole_units(&a, &m("2024-03-10T09:00")), Some((TimeUnit::Month, 2)));
        assert_eq!(diff_whole_units(&a, &m("2024-01-24T09:00")), Some((TimeUnit::Week, 2)));
        assert_eq!(diff_whole_units(&a, &m("2024-01-13T09:00")), Some((TimeUnit::Day, 3)));
        assert_eq!(diff_whole_units(&a, &m("2024-01-10T12:00")), Some((TimeUnit::Hour, 3)));
        assert_eq!(diff_whole_units(&a, &m("2024-01-10T09:45")), Some((TimeUnit::Minute, 45)));
        assert_eq!(a.diff_whole_months(&m("2024-02-11T09:00")), None);
    }
}
