use chrono::{Duration, NaiveDateTime};

use crate::{
    environment::Environment,
    error::{PathErrorWrapper, PlanError},
    model::{
        action::{Action, ActionKind},
        depot::{Depot, DepotId},
        instruction::DeliveryInstruction,
        plan::VehiclePlan,
        position::Position,
        vehicle::Vehicle,
        Map,
    },
    pathfinding::find_path,
};

/// Configurable action durations (§4.3).
#[derive(Debug, Clone, Copy)]
pub struct PlanBuilderConfig {
    pub transfer_minutes: i64,
    pub serve_minutes: i64,
    pub maintenance_minutes: i64,
    pub fuel_epsilon_gal: f64,
}

impl Default for PlanBuilderConfig {
    fn default() -> Self {
        Self {
            transfer_minutes: 10,
            serve_minutes: 15,
            maintenance_minutes: 15,
            fuel_epsilon_gal: 1e-6,
        }
    }
}

fn drive_minutes(distance_km: f64) -> i64 {
    (distance_km / 50.0 * 60.0).ceil() as i64
}

/// Mutable state threaded through instruction-by-instruction plan
/// construction: the vehicle's snapshot position/lpg/fuel and the running
/// clock, separate from the plan's accumulated actions.
struct Cursor {
    position: Position,
    lpg_m3: f64,
    fuel_gal: f64,
    time: NaiveDateTime,
}

fn nearest_depot<'a>(
    env: &'a Environment,
    from: Position,
    predicate: impl Fn(&Depot) -> bool,
) -> Option<&'a Depot> {
    env.depots
        .values()
        .filter(|d| predicate(d))
        .min_by_key(|d| from.manhattan_distance(&d.position))
}

struct Builder<'a> {
    env: &'a Environment,
    config: PlanBuilderConfig,
    vehicle_type: crate::model::vehicle::VehicleType,
}

impl<'a> Builder<'a> {
    fn drive_to(&self, cursor: &mut Cursor, destination: Position, actions: &mut Vec<Action>) -> Result<(), PlanError> {
        if cursor.position == destination {
            return Ok(());
        }
        let path = find_path(self.env, cursor.position, destination, cursor.time)
            .map_err(|e| PlanError::Unreachable(PathErrorWrapper(e)))?;
        let fuel_delta = -self.vehicle_type.fuel_for_leg(path.distance_km, cursor.lpg_m3);
        let end_time = cursor.time + Duration::minutes(drive_minutes(path.distance_km));
        actions.push(Action {
            kind: ActionKind::Drive {
                path: path.positions,
                arrival_times: path.arrival_times,
                fuel_delta_gal: fuel_delta,
            },
            start: cursor.time,
            end: end_time,
            destination,
        });
        cursor.fuel_gal = (cursor.fuel_gal + fuel_delta).max(0.0);
        cursor.position = destination;
        cursor.time = end_time;
        Ok(())
    }

    fn ensure_reachable(&self, cursor: &mut Cursor, destination: Position, actions: &mut Vec<Action>) -> Result<(), PlanError> {
        let path = find_path(self.env, cursor.position, destination, cursor.time)
            .map_err(|e| PlanError::Unreachable(PathErrorWrapper(e)))?;
        let fuel_needed = self.vehicle_type.fuel_for_leg(path.distance_km, cursor.lpg_m3);
        if fuel_needed > cursor.fuel_gal - self.config.fuel_epsilon_gal {
            let depot = nearest_depot(self.env, cursor.position, |d| d.can_refuel)
                .ok_or(PlanError::NoFuelCapableDepot(cursor.position))?;
            let depot_id = depot.id.clone();
            let depot_pos = depot.position;
            self.drive_to(cursor, depot_pos, actions)?;
            self.refuel(cursor, &depot_id, actions);
        }
        Ok(())
    }

    fn refuel(&self, cursor: &mut Cursor, depot: &DepotId, actions: &mut Vec<Action>) {
        let end_time = cursor.time + Duration::minutes(self.config.transfer_minutes);
        actions.push(Action {
            kind: ActionKind::Refuel { depot: depot.clone() },
            start: cursor.time,
            end: end_time,
            destination: cursor.position,
        });
        cursor.fuel_gal = self.vehicle_type.fuel_tank_capacity_gal();
        cursor.time = end_time;
    }

    fn reload(&self, needed_m3: f64, cursor: &mut Cursor, actions: &mut Vec<Action>) -> Result<(), PlanError> {
        // auxiliaries preferred when sufficient, main plant as fallback (§4.3 step 1)
        let depot = nearest_depot(self.env, cursor.position, |d| !d.is_main && d.can_supply(needed_m3))
            .or_else(|| self.env.main_depot())
            .ok_or(PlanError::NoLpgCapableDepot)?;
        let depot_id = depot.id.clone();
        let depot_pos = depot.position;

        self.ensure_reachable(cursor, depot_pos, actions)?;
        self.drive_to(cursor, depot_pos, actions)?;

        let end_time = cursor.time + Duration::minutes(self.config.transfer_minutes);
        let capacity = self.vehicle_type.lpg_capacity_m3();
        let delta = (capacity - cursor.lpg_m3).max(0.0);
        actions.push(Action {
            kind: ActionKind::Reload {
                depot: depot_id,
                amount_m3: delta,
            },
            start: cursor.time,
            end: end_time,
            destination: cursor.position,
        });
        cursor.lpg_m3 = capacity;
        cursor.time = end_time;
        Ok(())
    }
}

/// Builds a VehiclePlan realizing `instructions` in order, starting from
/// `vehicle`'s current snapshot at `start_time` (§4.3). Returns `None`
/// (infeasible) if any leg's reachability cannot be repaired by a single
/// refuel hop.
pub fn build_plan(
    env: &Environment,
    vehicle: &Vehicle,
    instructions: &[DeliveryInstruction],
    start_time: NaiveDateTime,
    config: PlanBuilderConfig,
) -> Option<VehiclePlan> {
    let builder = Builder {
        env,
        config,
        vehicle_type: vehicle.vehicle_type,
    };
    let mut cursor = Cursor {
        position: vehicle.position,
        lpg_m3: vehicle.current_lpg_m3,
        fuel_gal: vehicle.current_fuel_gal,
        time: start_time,
    };
    let mut actions = vec![];

    for instruction in instructions {
        let order = env.orders.get(&instruction.order_id)?;
        let amount = instruction.amount_m3 as f64;

        if cursor.lpg_m3 < amount {
            builder.reload(amount, &mut cursor, &mut actions).ok()?;
        }

        builder.ensure_reachable(&mut cursor, order.customer_position, &mut actions).ok()?;
        builder.drive_to(&mut cursor, order.customer_position, &mut actions).ok()?;

        let end_time = cursor.time + Duration::minutes(config.serve_minutes);
        actions.push(Action {
            kind: ActionKind::Serve {
                order: instruction.order_id.clone(),
                amount_m3: instruction.amount_m3,
            },
            start: cursor.time,
            end: end_time,
            destination: cursor.position,
        });
        cursor.lpg_m3 = (cursor.lpg_m3 - amount).max(0.0);
        cursor.time = end_time;
    }

    let main = env.main_depot()?;
    let main_pos = main.position;
    builder.ensure_reachable(&mut cursor, main_pos, &mut actions).ok()?;
    builder.drive_to(&mut cursor, main_pos, &mut actions).ok()?;

    let maintenance_end = cursor.time + Duration::minutes(config.maintenance_minutes);
    actions.push(Action {
        kind: ActionKind::Maintenance,
        start: cursor.time,
        end: maintenance_end,
        destination: cursor.position,
    });

    Some(VehiclePlan {
        vehicle_id: vehicle.id.clone(),
        start_time,
        actions,
    })
}
