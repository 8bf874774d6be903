//! Time-of-day handling for schedules.
//!
//! Schedules carry their service window as "HH:mm" or "HH:mm:ss"
//! strings, interpreted in the schedule's own timezone. This module
//! provides the validated `TimeOfDay` type and the conversion from a
//! (date, local window, timezone) triple to absolute UTC instants,
//! handling windows that cross midnight.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::fmt;

/// Error returned when parsing an invalid time-of-day string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time of day: {reason}")]
pub struct InvalidTimeOfDay {
    reason: &'static str,
}

impl InvalidTimeOfDay {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// A validated wall-clock time of day.
///
/// Parsed from the wire formats "HH:mm" and "HH:mm:ss" with each
/// component range-checked. The value is timezone-agnostic; it only
/// gains meaning when combined with a date and a timezone via
/// [`zoned_window`].
///
/// # Examples
///
/// ```
/// use fleet_server::domain::TimeOfDay;
///
/// let t = TimeOfDay::parse("07:30").unwrap();
/// assert_eq!(t.to_string(), "07:30");
///
/// let t = TimeOfDay::parse("07:30:15").unwrap();
/// assert_eq!(t.to_string(), "07:30:15");
///
/// assert!(TimeOfDay::parse("24:00").is_err());
/// assert!(TimeOfDay::parse("0730").is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    /// Parse a time from "HH:mm" or "HH:mm:ss" format.
    pub fn parse(s: &str) -> Result<Self, InvalidTimeOfDay> {
        let bytes = s.as_bytes();

        if bytes.len() != 5 && bytes.len() != 8 {
            return Err(InvalidTimeOfDay::new("expected HH:mm or HH:mm:ss"));
        }

        if bytes[2] != b':' {
            return Err(InvalidTimeOfDay::new("expected colon at position 2"));
        }

        let hour = parse_two_digits(&bytes[0..2])
            .ok_or_else(|| InvalidTimeOfDay::new("invalid hour digits"))?;
        if hour > 23 {
            return Err(InvalidTimeOfDay::new("hour must be 0-23"));
        }

        let minute = parse_two_digits(&bytes[3..5])
            .ok_or_else(|| InvalidTimeOfDay::new("invalid minute digits"))?;
        if minute > 59 {
            return Err(InvalidTimeOfDay::new("minute must be 0-59"));
        }

        let second = if bytes.len() == 8 {
            if bytes[5] != b':' {
                return Err(InvalidTimeOfDay::new("expected colon at position 5"));
            }
            let second = parse_two_digits(&bytes[6..8])
                .ok_or_else(|| InvalidTimeOfDay::new("invalid second digits"))?;
            if second > 59 {
                return Err(InvalidTimeOfDay::new("second must be 0-59"));
            }
            second
        } else {
            0
        };

        let time = NaiveTime::from_hms_opt(hour, minute, second)
            .ok_or_else(|| InvalidTimeOfDay::new("invalid time"))?;

        Ok(Self(time))
    }

    /// Construct from an already-validated `NaiveTime`.
    pub fn from_naive(time: NaiveTime) -> Self {
        Self(time)
    }

    /// The underlying wall-clock time.
    pub fn time(&self) -> NaiveTime {
        self.0
    }

    /// Returns the hour (0-23).
    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    /// Returns the minute (0-59).
    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    /// Returns the second (0-59).
    pub fn second(&self) -> u32 {
        self.0.second()
    }
}

impl fmt::Debug for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeOfDay({self})")
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.second() == 0 {
            write!(f, "{:02}:{:02}", self.hour(), self.minute())
        } else {
            write!(
                f,
                "{:02}:{:02}:{:02}",
                self.hour(),
                self.minute(),
                self.second()
            )
        }
    }
}

/// Parse two ASCII digit bytes into a u32.
fn parse_two_digits(bytes: &[u8]) -> Option<u32> {
    if bytes.len() != 2 {
        return None;
    }
    let d1 = (bytes[0] as char).to_digit(10)?;
    let d2 = (bytes[1] as char).to_digit(10)?;
    Some(d1 * 10 + d2)
}

/// Error returned when a local time cannot be mapped to UTC.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot map local time to UTC on {date}: {reason}")]
pub struct ZonedWindowError {
    date: NaiveDate,
    reason: &'static str,
}

/// Maximum hours to slide forward out of a DST gap before giving up.
const MAX_GAP_SLIDE_HOURS: u32 = 3;

/// Combine a service date with a local time window and convert to UTC.
///
/// The window is interpreted in `tz` on `date`. If `end` is not after
/// `start` the window crosses midnight, so the end lands on the
/// following calendar day. Ambiguous local times (DST fall-back)
/// resolve to the earliest valid instant; nonexistent local times
/// (spring-forward gap) slide forward in one-hour steps.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use chrono_tz::Tz;
/// use fleet_server::domain::{TimeOfDay, zoned_window};
///
/// let tz: Tz = "Asia/Ho_Chi_Minh".parse().unwrap();
/// let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
/// let start = TimeOfDay::parse("07:00").unwrap();
/// let end = TimeOfDay::parse("08:00").unwrap();
///
/// let (start_utc, end_utc) = zoned_window(date, start, end, tz).unwrap();
/// assert_eq!(start_utc.to_rfc3339(), "2024-03-04T00:00:00+00:00");
/// assert_eq!(end_utc.to_rfc3339(), "2024-03-04T01:00:00+00:00");
/// ```
pub fn zoned_window(
    date: NaiveDate,
    start: TimeOfDay,
    end: TimeOfDay,
    tz: Tz,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ZonedWindowError> {
    let end_date = if end.time() <= start.time() {
        date.succ_opt().ok_or(ZonedWindowError {
            date,
            reason: "date overflow crossing midnight",
        })?
    } else {
        date
    };

    let start_utc = resolve_local(date, start.time(), tz)?;
    let end_utc = resolve_local(end_date, end.time(), tz)?;

    Ok((start_utc, end_utc))
}

/// Map a local wall-clock datetime to UTC in the given timezone.
fn resolve_local(
    date: NaiveDate,
    time: NaiveTime,
    tz: Tz,
) -> Result<DateTime<Utc>, ZonedWindowError> {
    let mut naive = date.and_time(time);

    // Slide forward out of a spring-forward gap; bounded because no
    // real timezone has a gap anywhere near MAX_GAP_SLIDE_HOURS.
    for _ in 0..=MAX_GAP_SLIDE_HOURS {
        if let Some(local) = tz.from_local_datetime(&naive).earliest() {
            return Ok(local.with_timezone(&Utc));
        }
        naive = naive.checked_add_signed(chrono::Duration::hours(1)).ok_or(
            ZonedWindowError {
                date,
                reason: "datetime overflow",
            },
        )?;
    }

    Err(ZonedWindowError {
        date,
        reason: "local time does not exist in timezone",
    })
}
