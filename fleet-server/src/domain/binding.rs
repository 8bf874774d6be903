//! Route-to-schedule bindings.

use chrono::{DateTime, NaiveDate, Utc};

use super::{BindingId, RouteId, ScheduleId};

/// A prioritized association between a route and a schedule.
///
/// Several bindings may cover the same route with overlapping date
/// windows; for any single calendar date exactly one binding is
/// authoritative, chosen by highest priority (ties break to the most
/// recently created binding).
#[derive(Debug, Clone)]
pub struct RouteBinding {
    pub id: BindingId,
    pub route_id: RouteId,
    pub schedule_id: ScheduleId,
    pub effective_from: NaiveDate,
    /// Last covered date, inclusive. `None` means open-ended.
    pub effective_to: Option<NaiveDate>,
    pub priority: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl RouteBinding {
    /// Does this binding's effective window cover the given date?
    ///
    /// Both bounds are inclusive.
    pub fn covers(&self, date: NaiveDate) -> bool {
        if date < self.effective_from {
            return false;
        }
        match self.effective_to {
            Some(to) => date <= to,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn binding(from: NaiveDate, to: Option<NaiveDate>) -> RouteBinding {
        RouteBinding {
            id: BindingId(1),
            route_id: RouteId(1),
            schedule_id: ScheduleId(1),
            effective_from: from,
            effective_to: to,
            priority: 0,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn covers_inclusive_bounds() {
        let b = binding(date(2024, 3, 1), Some(date(2024, 3, 31)));

        assert!(!b.covers(date(2024, 2, 29)));
        assert!(b.covers(date(2024, 3, 1)));
        assert!(b.covers(date(2024, 3, 15)));
        assert!(b.covers(date(2024, 3, 31)));
        assert!(!b.covers(date(2024, 4, 1)));
    }

    #[test]
    fn covers_open_ended() {
        let b = binding(date(2024, 3, 1), None);

        assert!(!b.covers(date(2024, 2, 29)));
        assert!(b.covers(date(2030, 1, 1)));
    }
}
