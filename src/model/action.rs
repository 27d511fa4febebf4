use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{depot::DepotId, order::OrderId, position::Position};

/// The per-variant payload of an `Action`. Kept as a tagged union rather
/// than a class hierarchy (§9): the executor pattern-matches on `kind`,
/// actions are immutable once emitted, and re-timing a plan produces a new
/// sequence rather than mutating the old one in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionKind {
    Drive {
        path: Vec<Position>,
        /// Earliest arrival time at each node of `path`, one per element.
        arrival_times: Vec<NaiveDateTime>,
        fuel_delta_gal: f64,
    },
    Refuel {
        depot: DepotId,
    },
    Reload {
        depot: DepotId,
        amount_m3: f64,
    },
    Serve {
        order: OrderId,
        amount_m3: i32,
    },
    Maintenance,
    Wait,
}

/// One step of a `VehiclePlan`, carrying its absolute start/end time and the
/// position the vehicle occupies once the action completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub destination: Position,
}

impl Action {
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }

    pub fn is_drive(&self) -> bool {
        matches!(self.kind, ActionKind::Drive { .. })
    }
}
