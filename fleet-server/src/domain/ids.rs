//! Typed identifiers.
//!
//! Every entity gets its own id newtype so a route id can never be
//! passed where a schedule id is expected. Ids are assigned by the
//! backing store.

use std::fmt;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(v: i64) -> Self {
                $name(v)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

id_type!(
    /// Identifier of a recurring schedule template.
    ScheduleId
);
id_type!(
    /// Identifier of a transport route.
    RouteId
);
id_type!(
    /// Identifier of a route-to-schedule binding.
    BindingId
);
id_type!(
    /// Identifier of a generated trip.
    TripId
);
id_type!(
    /// Identifier of a pickup point on a route.
    PickupPointId
);
id_type!(
    /// Identifier of a student riding a trip.
    StudentId
);
