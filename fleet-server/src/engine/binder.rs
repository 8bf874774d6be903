//! Binding resolution: which schedule binding owns a route on a date.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::domain::{RouteBinding, RouteId};

/// Pre-indexed binding lookup for a generation run.
///
/// Built once from the bindings in play, grouped per route and sorted
/// by descending priority (ties break to the most recently created
/// binding, then the highest id). Resolving a whole window of dates
/// then never re-scans or re-sorts the binding set: the winner for a
/// date is the first covering entry in the route's sorted list.
#[derive(Debug)]
pub struct BindingResolver {
    by_route: HashMap<RouteId, Vec<RouteBinding>>,
}

impl BindingResolver {
    /// Index a set of bindings.
    ///
    /// Inactive bindings are dropped here so `winning` only ever sees
    /// candidates.
    pub fn new(bindings: Vec<RouteBinding>) -> Self {
        let mut by_route: HashMap<RouteId, Vec<RouteBinding>> = HashMap::new();
        for binding in bindings {
            if !binding.active {
                continue;
            }
            by_route.entry(binding.route_id).or_default().push(binding);
        }
        for group in by_route.values_mut() {
            group.sort_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(b.created_at.cmp(&a.created_at))
                    .then(b.id.cmp(&a.id))
            });
        }
        Self { by_route }
    }

    /// Route ids that have at least one candidate binding, in stable
    /// (ascending) order.
    pub fn route_ids(&self) -> Vec<RouteId> {
        let mut ids: Vec<RouteId> = self.by_route.keys().copied().collect();
        ids.sort();
        ids
    }

    /// The authoritative binding for a route on a date, if any.
    pub fn winning(&self, route_id: RouteId, date: NaiveDate) -> Option<&RouteBinding> {
        self.by_route
            .get(&route_id)?
            .iter()
            .find(|b| b.covers(date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BindingId, ScheduleId};
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn binding(id: i64, route: i64, priority: i32) -> RouteBinding {
        RouteBinding {
            id: BindingId(id),
            route_id: RouteId(route),
            schedule_id: ScheduleId(1),
            effective_from: date(2024, 3, 1),
            effective_to: Some(date(2024, 3, 31)),
            priority,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn highest_priority_wins() {
        let resolver = BindingResolver::new(vec![binding(1, 1, 1), binding(2, 1, 2)]);

        let winner = resolver.winning(RouteId(1), date(2024, 3, 15)).unwrap();
        assert_eq!(winner.id, BindingId(2));
        assert_eq!(winner.priority, 2);
    }

    #[test]
    fn equal_priority_breaks_to_most_recent() {
        let older = RouteBinding {
            created_at: Utc::now() - chrono::Duration::hours(1),
            ..binding(1, 1, 5)
        };
        let newer = RouteBinding {
            created_at: Utc::now(),
            ..binding(2, 1, 5)
        };

        let resolver = BindingResolver::new(vec![older, newer]);
        assert_eq!(
            resolver.winning(RouteId(1), date(2024, 3, 15)).unwrap().id,
            BindingId(2)
        );
    }

    #[test]
    fn only_covering_bindings_are_candidates() {
        let mut high_but_expired = binding(1, 1, 10);
        high_but_expired.effective_to = Some(date(2024, 3, 10));
        let low_but_covering = binding(2, 1, 1);

        let resolver = BindingResolver::new(vec![high_but_expired, low_but_covering]);

        // Inside both windows the high priority wins.
        assert_eq!(
            resolver.winning(RouteId(1), date(2024, 3, 5)).unwrap().id,
            BindingId(1)
        );
        // After the high-priority window lapses, the other takes over.
        assert_eq!(
            resolver.winning(RouteId(1), date(2024, 3, 20)).unwrap().id,
            BindingId(2)
        );
        // Outside every window there is no winner.
        assert!(resolver.winning(RouteId(1), date(2024, 4, 5)).is_none());
    }

    #[test]
    fn inactive_bindings_are_ignored() {
        let mut b = binding(1, 1, 10);
        b.active = false;

        let resolver = BindingResolver::new(vec![b, binding(2, 1, 1)]);
        assert_eq!(
            resolver.winning(RouteId(1), date(2024, 3, 15)).unwrap().id,
            BindingId(2)
        );
    }

    #[test]
    fn routes_are_independent() {
        let resolver = BindingResolver::new(vec![binding(1, 1, 1), binding(2, 2, 1)]);

        assert_eq!(resolver.route_ids(), vec![RouteId(1), RouteId(2)]);
        assert_eq!(
            resolver.winning(RouteId(2), date(2024, 3, 15)).unwrap().id,
            BindingId(2)
        );
        assert!(resolver.winning(RouteId(3), date(2024, 3, 15)).is_none());
    }
}
