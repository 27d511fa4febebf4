use rand::Rng;

use crate::{
    environment::Environment,
    model::{
        instruction::DeliveryInstruction,
        order::Order,
        solution::Solution,
        vehicle::{Vehicle, VehicleId},
        Map, MapType,
    },
};

/// Smallest instruction amount the greedy seed is willing to attach to a
/// single vehicle before moving on to the next one (§4.5).
const MIN_SPLIT_M3: f64 = 1.0;

fn vehicle_capacity_m3(vehicle: &Vehicle) -> f64 {
    vehicle.vehicle_type.lpg_capacity_m3()
}

/// Vehicles ordered by proximity to `customer`, stable tie-break on id.
fn vehicles_by_proximity<'a>(vehicles: &[&'a Vehicle], customer: crate::model::position::Position) -> Vec<&'a Vehicle> {
    let mut ordered: Vec<&Vehicle> = vehicles.to_vec();
    ordered.sort_by(|a, b| {
        a.position
            .manhattan_distance(&customer)
            .cmp(&b.position.manhattan_distance(&customer))
            .then_with(|| a.id.cmp(&b.id))
    });
    ordered
}

/// Greedy-with-randomization seed solution (§4.5): nearest-first vehicle
/// assignment per order, each instruction amount sampled uniformly within
/// the admissible split range, until the order is covered or vehicles run
/// out.
pub fn build_initial_solution(env: &Environment, rng: &mut impl Rng) -> Solution {
    let available = env.available_vehicles();
    let mut loads: MapType<VehicleId, f64> = MapType::new();
    for v in &available {
        loads.insert(v.id.clone(), 0.0);
    }

    let mut instructions: MapType<VehicleId, Vec<DeliveryInstruction>> = MapType::new();
    for v in &available {
        instructions.insert(v.id.clone(), vec![]);
    }

    if available.is_empty() {
        return Solution::empty();
    }

    let mut pending: Vec<&Order> = env.pending_orders();
    pending.sort_by_key(|o| o.due_time);

    for order in pending {
        let mut remaining = order.remaining_m3 as f64;
        if remaining <= 0.0 {
            continue;
        }

        for vehicle in vehicles_by_proximity(&available, order.customer_position) {
            if remaining <= 0.0 {
                break;
            }
            let capacity = vehicle_capacity_m3(vehicle);
            let already_loaded = loads.gets(&vehicle.id);
            let headroom = (capacity - already_loaded).max(0.0);
            if headroom < MIN_SPLIT_M3 {
                continue;
            }

            let upper = headroom.min(remaining);
            if upper < MIN_SPLIT_M3 {
                continue;
            }
            let amount = if (upper - MIN_SPLIT_M3).abs() < f64::EPSILON {
                MIN_SPLIT_M3
            } else {
                rng.random_range(MIN_SPLIT_M3..=upper)
            };
            let amount_m3 = amount.round() as i32;
            if amount_m3 <= 0 {
                continue;
            }

            instructions
                .gets_mut(&vehicle.id)
                .push(DeliveryInstruction::new(order.id.clone(), amount_m3));
            *loads.gets_mut(&vehicle.id) += amount_m3 as f64;
            remaining -= amount_m3 as f64;
        }
    }

    Solution {
        assignments: instructions.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        order::{Order, OrderId},
        position::{GridBounds, Position},
        vehicle::{Vehicle, VehicleId, VehicleType},
    };
    use chrono::NaiveDate;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn base_time() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(8, 0, 0).unwrap()
    }

    #[test]
    fn no_vehicles_yields_empty_solution() {
        let mut env = Environment::new(base_time(), GridBounds::default());
        env.add_order(Order::new(OrderId::from("1"), Position::new(5, 5), base_time(), 10, 10));
        let mut rng = SmallRng::seed_from_u64(1);
        let solution = build_initial_solution(&env, &mut rng);
        assert!(solution.vehicle_ids().is_empty());
    }

    #[test]
    fn no_orders_yields_well_typed_empty_lists() {
        let mut env = Environment::new(base_time(), GridBounds::default());
        let v = Vehicle::new_full(VehicleId::from("TA01"), VehicleType::Ta, Position::new(0, 0));
        env.vehicles.insert(v.id.clone(), v);
        let mut rng = SmallRng::seed_from_u64(1);
        let solution = build_initial_solution(&env, &mut rng);
        assert_eq!(solution.instructions_for(&VehicleId::from("TA01")).len(), 0);
    }

    #[test]
    fn every_pending_order_receives_some_assignment_when_capacity_allows() {
        let mut env = Environment::new(base_time(), GridBounds::default());
        let v = Vehicle::new_full(VehicleId::from("TA01"), VehicleType::Ta, Position::new(0, 0));
        env.vehicles.insert(v.id.clone(), v);
        env.add_order(Order::new(OrderId::from("1"), Position::new(5, 5), base_time(), 10, 5));

        let mut rng = SmallRng::seed_from_u64(42);
        let solution = build_initial_solution(&env, &mut rng);
        assert_eq!(solution.total_assigned_m3(&OrderId::from("1")), 5);
    }

    #[test]
    fn nearer_vehicle_is_preferred_when_either_could_serve_alone() {
        let mut env = Environment::new(base_time(), GridBounds::default());
        let near = Vehicle::new_full(VehicleId::from("TA01"), VehicleType::Ta, Position::new(4, 4));
        let far = Vehicle::new_full(VehicleId::from("TA02"), VehicleType::Ta, Position::new(40, 40));
        env.vehicles.insert(near.id.clone(), near);
        env.vehicles.insert(far.id.clone(), far);
        env.add_order(Order::new(OrderId::from("1"), Position::new(5, 5), base_time(), 10, 2));

        let mut rng = SmallRng::seed_from_u64(7);
        let solution = build_initial_solution(&env, &mut rng);
        assert!(!solution.instructions_for(&VehicleId::from("TA01")).is_empty());
    }
}
