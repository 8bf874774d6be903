//! Recurrence rule parsing and evaluation.
//!
//! Schedules carry a minimal recurrence rule on the wire:
//! `FREQ=<DAILY|WEEKLY>[;BYDAY=<comma-separated day tokens>]`. The rule
//! is parsed once into a tagged variant and evaluated as a plain date
//! predicate; evaluation never re-parses the string.

use chrono::{Datelike, NaiveDate, Weekday};
use std::fmt;

/// Error returned when parsing an invalid recurrence rule string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid recurrence rule: {reason}")]
pub struct InvalidRecurrenceRule {
    reason: &'static str,
}

impl InvalidRecurrenceRule {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// A parsed recurrence rule.
///
/// `Daily` matches every date. `Weekly` with an empty day filter also
/// matches every date: the frequency alone does not restrict weekdays
/// unless a `BYDAY` filter is supplied. Changing that would change the
/// generated calendar of every weekly schedule without a filter, so it
/// is load-bearing behavior, not a bug.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use fleet_server::domain::RecurrenceRule;
///
/// let rule = RecurrenceRule::parse("FREQ=WEEKLY;BYDAY=MO,WE,FR").unwrap();
/// let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
/// let tuesday = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
/// assert!(rule.matches(monday));
/// assert!(!rule.matches(tuesday));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceRule {
    /// Matches every calendar date.
    Daily,
    /// Matches dates whose weekday is in the filter; an empty filter
    /// matches every date. The filter is deduplicated and sorted
    /// Monday-first, so equal day sets compare equal and `Display` is
    /// canonical regardless of input order.
    Weekly(Vec<Weekday>),
}

impl RecurrenceRule {
    /// Parse a rule string.
    ///
    /// An empty or whitespace-only string is treated as `FREQ=DAILY`.
    pub fn parse(s: &str) -> Result<Self, InvalidRecurrenceRule> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(RecurrenceRule::Daily);
        }

        let mut freq: Option<&str> = None;
        let mut byday: Option<&str> = None;

        for part in s.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| InvalidRecurrenceRule::new("expected KEY=VALUE parts"))?;
            match key.trim() {
                "FREQ" => freq = Some(value.trim()),
                "BYDAY" => byday = Some(value.trim()),
                _ => return Err(InvalidRecurrenceRule::new("unknown rule component")),
            }
        }

        let freq = freq.ok_or_else(|| InvalidRecurrenceRule::new("missing FREQ"))?;

        match freq {
            "DAILY" => {
                if byday.is_some() {
                    return Err(InvalidRecurrenceRule::new("BYDAY is not valid with DAILY"));
                }
                Ok(RecurrenceRule::Daily)
            }
            "WEEKLY" => {
                let days = match byday {
                    None => Vec::new(),
                    Some(list) => parse_byday(list)?,
                };
                Ok(RecurrenceRule::Weekly(days))
            }
            _ => Err(InvalidRecurrenceRule::new("FREQ must be DAILY or WEEKLY")),
        }
    }

    /// Does this rule produce an occurrence on the given date?
    pub fn matches(&self, date: NaiveDate) -> bool {
        match self {
            RecurrenceRule::Daily => true,
            RecurrenceRule::Weekly(days) => days.is_empty() || days.contains(&date.weekday()),
        }
    }
}

/// Parse a comma-separated BYDAY list into a canonical weekday list,
/// deduplicated and sorted Monday-first.
fn parse_byday(list: &str) -> Result<Vec<Weekday>, InvalidRecurrenceRule> {
    let mut days = Vec::new();
    for token in list.split(',') {
        let day = match token.trim() {
            "MO" => Weekday::Mon,
            "TU" => Weekday::Tue,
            "WE" => Weekday::Wed,
            "TH" => Weekday::Thu,
            "FR" => Weekday::Fri,
            "SA" => Weekday::Sat,
            "SU" => Weekday::Sun,
            "" => return Err(InvalidRecurrenceRule::new("empty BYDAY token")),
            _ => return Err(InvalidRecurrenceRule::new("unknown BYDAY token")),
        };
        days.push(day);
    }
    if days.is_empty() {
        return Err(InvalidRecurrenceRule::new("BYDAY must list at least one day"));
    }
    days.sort_by_key(|d| d.num_days_from_monday());
    days.dedup();
    Ok(days)
}

fn day_token(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

impl fmt::Display for RecurrenceRule {
    /// Renders the canonical wire form of the rule.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrenceRule::Daily => write!(f, "FREQ=DAILY"),
            RecurrenceRule::Weekly(days) if days.is_empty() => write!(f, "FREQ=WEEKLY"),
            RecurrenceRule::Weekly(days) => {
                write!(f, "FREQ=WEEKLY;BYDAY=")?;
                for (i, day) in days.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", day_token(*day))?;
                }
                Ok(())
            }
        }
    }
}
