use serde::{Deserialize, Serialize};

use crate::define_map;

use super::{instruction::DeliveryInstruction, order::OrderId, vehicle::VehicleId, MapType};

define_map!(VehicleId, Vec<DeliveryInstruction>, SolutionMap);

/// A mapping vehicle -> ordered delivery instructions (§3). The invariant
/// that every pending order is either represented (possibly split) or
/// recorded with an explicit penalty lives with the evaluator (§4.4); C7's
/// repair pass (§4.6 step 7) finds what's missing by scanning
/// `env.pending_orders()` against `total_assigned_m3`, not from a field on
/// this type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Solution {
    pub assignments: SolutionMap,
}

impl Solution {
    pub fn empty() -> Self {
        Self {
            assignments: MapType::new().into(),
        }
    }

    pub fn instructions_for(&self, vehicle_id: &VehicleId) -> &[DeliveryInstruction] {
        self.assignments
            .get(vehicle_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn total_assigned_m3(&self, order_id: &OrderId) -> i32 {
        self.assignments
            .values()
            .flat_map(|instrs| instrs.iter())
            .filter(|i| &i.order_id == order_id)
            .map(|i| i.amount_m3)
            .sum()
    }

    pub fn vehicle_load(&self, vehicle_id: &VehicleId) -> i32 {
        self.instructions_for(vehicle_id).iter().map(|i| i.amount_m3).sum()
    }

    pub fn vehicle_ids(&self) -> Vec<VehicleId> {
        self.assignments.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MapType;

    #[test]
    fn empty_solution_has_no_assignments() {
        let sol = Solution::empty();
        assert!(sol.instructions_for(&VehicleId::from("TA01")).is_empty());
        assert_eq!(sol.total_assigned_m3(&OrderId::from("1")), 0);
    }

    #[test]
    fn total_assigned_sums_across_vehicles() {
        let mut map: MapType<VehicleId, Vec<DeliveryInstruction>> = MapType::new();
        map.insert(
            VehicleId::from("TA01"),
            vec![DeliveryInstruction::new(OrderId::from("1"), 5)],
        );
        map.insert(
            VehicleId::from("TB01"),
            vec![DeliveryInstruction::new(OrderId::from("1"), 3)],
        );
        let sol = Solution { assignments: map.into() };
        assert_eq!(sol.total_assigned_m3(&OrderId::from("1")), 8);
    }
}
