use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{action::Action, action::ActionKind, vehicle::VehicleId};

/// An executable action timeline for one vehicle (§3). Plans reference the
/// vehicle by id only; the Environment holds the canonical `Vehicle` (§9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehiclePlan {
    pub vehicle_id: VehicleId,
    pub start_time: NaiveDateTime,
    pub actions: Vec<Action>,
}

impl VehiclePlan {
    pub fn new(vehicle_id: VehicleId, start_time: NaiveDateTime) -> Self {
        Self {
            vehicle_id,
            start_time,
            actions: vec![],
        }
    }

    pub fn end_time(&self) -> NaiveDateTime {
        self.actions.last().map(|a| a.end).unwrap_or(self.start_time)
    }

    pub fn total_distance_km(&self) -> f64 {
        self.actions
            .iter()
            .filter_map(|a| match &a.kind {
                ActionKind::Drive { path, .. } => {
                    Some(path.windows(2).count() as f64)
                }
                _ => None,
            })
            .sum()
    }

    pub fn total_lpg_delivered_m3(&self) -> i32 {
        self.actions
            .iter()
            .filter_map(|a| match &a.kind {
                ActionKind::Serve { amount_m3, .. } => Some(*amount_m3),
                _ => None,
            })
            .sum()
    }

    pub fn total_fuel_used_gal(&self) -> f64 {
        self.actions
            .iter()
            .filter_map(|a| match &a.kind {
                ActionKind::Drive { fuel_delta_gal, .. } => Some(*fuel_delta_gal),
                _ => None,
            })
            .sum()
    }

    pub fn serve_actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter().filter(|a| matches!(a.kind, ActionKind::Serve { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{depot::DepotId, order::OrderId, position::Position};
    use chrono::NaiveDate;

    fn t(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn totals_aggregate_across_actions() {
        let mut plan = VehiclePlan::new(VehicleId::from("TA01"), t(8, 0));
        plan.actions.push(Action {
            kind: ActionKind::Drive {
                path: vec![Position::new(0, 0), Position::new(1, 0), Position::new(2, 0)],
                arrival_times: vec![t(8, 0), t(8, 1), t(8, 2)],
                fuel_delta_gal: 0.2,
            },
            start: t(8, 0),
            end: t(8, 2),
            destination: Position::new(2, 0),
        });
        plan.actions.push(Action {
            kind: ActionKind::Serve {
                order: OrderId::from("1"),
                amount_m3: 5,
            },
            start: t(8, 2),
            end: t(8, 17),
            destination: Position::new(2, 0),
        });
        assert_eq!(plan.total_distance_km(), 2.0);
        assert_eq!(plan.total_lpg_delivered_m3(), 5);
        assert!((plan.total_fuel_used_gal() - 0.2).abs() < 1e-9);
        assert_eq!(plan.end_time(), t(8, 17));
        let _ = DepotId::from("MAIN");
    }
}
