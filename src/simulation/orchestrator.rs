use std::sync::{atomic::AtomicBool, Arc};

use chrono::{Duration, NaiveDateTime};
use rand::{rngs::SmallRng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    assignment::build_initial_solution,
    environment::Environment,
    evaluation::EvaluatorConfig,
    model::{
        action::{Action, ActionKind},
        plan::VehiclePlan,
        position::Position,
        solution::Solution,
        vehicle::{VehicleId, VehicleStatus},
        Map, MapType,
    },
    optimizer::{run_tabu_search, TabuSearchConfig},
    planning::{build_plan, PlanBuilderConfig},
};

use super::{
    event_queue::EventQueue,
    sim_event::{SimEvent, SimEventPayload},
};

/// Real-world milliseconds between ticks, clamped per §6.2.
pub const MIN_TICK_SPEED_MS: u64 = 50;
pub const MAX_TICK_SPEED_MS: u64 = 10_000;

/// Tracks a vehicle's progress through its currently-installed plan.
#[derive(Debug, Clone)]
struct VehicleExecution {
    plan: VehiclePlan,
    next_action_index: usize,
    action_start_fuel_gal: f64,
}

/// What `begin_tick` found after draining due events (§4.7 steps 1-2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    NeedsReplan,
    Ended,
}

/// The remaining positions of an in-flight DRIVE action, plus its window.
#[derive(Debug, Clone, Serialize)]
pub struct RemainingDrive {
    pub path: Vec<Position>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationStatus {
    pub running: bool,
    pub now: NaiveDateTime,
    pub tick_speed_ms: u64,
    pub ticks_elapsed: u64,
    pub vehicle_count: usize,
    pub pending_order_count: usize,
}

/// Owns the whole mutable world: the Environment, the pending event queue,
/// and each vehicle's in-flight plan execution state (§4.7, §5). Meant to
/// live behind a single `tokio::sync::Mutex` shared between the tick loop
/// and the control API.
pub struct SimulationHandle {
    environment: Environment,
    events: EventQueue<SimEvent>,
    active_plans: MapType<VehicleId, VehicleExecution>,
    delta: Duration,
    end_time: Option<NaiveDateTime>,
    running: bool,
    tick_speed_ms: u64,
    ticks_elapsed: u64,
    rng: SmallRng,
    evaluator_config: EvaluatorConfig,
    optimizer_config: TabuSearchConfig,
    initial_environment: Environment,
    initial_events: EventQueue<SimEvent>,
}

impl SimulationHandle {
    pub fn new(environment: Environment, events: EventQueue<SimEvent>, end_time: Option<NaiveDateTime>) -> Self {
        Self {
            initial_environment: environment.clone(),
            initial_events: events.clone(),
            environment,
            events,
            active_plans: MapType::new(),
            delta: Duration::minutes(1),
            end_time,
            running: false,
            tick_speed_ms: 200,
            ticks_elapsed: 0,
            rng: SmallRng::seed_from_u64(0),
            evaluator_config: EvaluatorConfig::default(),
            optimizer_config: TabuSearchConfig::default(),
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.environment
    }

    pub fn enqueue(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    pub fn status(&self) -> SimulationStatus {
        SimulationStatus {
            running: self.running,
            now: self.environment.now,
            tick_speed_ms: self.tick_speed_ms,
            ticks_elapsed: self.ticks_elapsed,
            vehicle_count: self.environment.vehicles.len(),
            pending_order_count: self.environment.pending_orders().len(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn reset(&mut self) {
        self.environment = self.initial_environment.clone();
        self.events = self.initial_events.clone();
        self.active_plans.clear();
        self.ticks_elapsed = 0;
        self.running = false;
    }

    /// Clamps to [50, 10000] ms (§6.2); returns an error message for the API
    /// to surface as a 400 when out of range.
    pub fn set_speed(&mut self, ms: u64) -> Result<(), String> {
        if !(MIN_TICK_SPEED_MS..=MAX_TICK_SPEED_MS).contains(&ms) {
            return Err(format!(
                "speed must be between {MIN_TICK_SPEED_MS} and {MAX_TICK_SPEED_MS} ms, got {ms}"
            ));
        }
        self.tick_speed_ms = ms;
        Ok(())
    }

    pub fn tick_speed_ms(&self) -> u64 {
        self.tick_speed_ms
    }

    pub fn is_past_end(&self) -> bool {
        self.end_time.is_some_and(|end| self.environment.now >= end)
    }

    /// The remaining path of `vehicle_id`'s current DRIVE action, if it is
    /// driving right now, with that action's start/end times (§6.2's
    /// `/environment` snapshot). `None` for any other status, including
    /// between actions.
    pub fn remaining_drive_path(&self, vehicle_id: &VehicleId) -> Option<RemainingDrive> {
        let execution = self.active_plans.get(vehicle_id)?;
        let action = execution.plan.actions.get(execution.next_action_index)?;
        let ActionKind::Drive { path, .. } = &action.kind else {
            return None;
        };
        if path.len() < 2 {
            return None;
        }
        let total = (action.end - action.start).num_seconds().max(1) as f64;
        let elapsed = (self.environment.now - action.start).num_seconds().max(0) as f64;
        let fraction = (elapsed / total).clamp(0.0, 1.0);
        let index = (((path.len() - 1) as f64 * fraction).round() as usize).min(path.len() - 1);
        Some(RemainingDrive {
            path: path[index..].to_vec(),
            start: action.start,
            end: action.end,
        })
    }

    /// §4.7 steps 1-2: drains and applies every due event except REPLAN and
    /// SIMULATION_END, which the caller (the async tick loop) must act on
    /// itself - a replan needs to run on a blocking thread, and ending the
    /// simulation is a caller-visible transition, not an Environment edit.
    pub fn begin_tick(&mut self) -> TickOutcome {
        let due = self.events.drain_due(self.environment.now);
        let mut needs_replan = false;
        let mut ended = false;

        for event in due {
            debug!(kind = ?event.kind, entity = %event.entity_id, time = %event.time, "applying due event");
            match event.payload {
                SimEventPayload::OrderArrival(order) => {
                    self.environment.add_order(order);
                    needs_replan = true;
                }
                SimEventPayload::BlockageStart(_) => {
                    needs_replan = true;
                }
                SimEventPayload::BlockageEnd(id) => {
                    self.environment.remove_blockage(&id);
                    needs_replan = true;
                }
                SimEventPayload::MaintenanceStart(task) => {
                    self.force_vehicle_to_maintenance(&task.vehicle_id);
                    needs_replan = true;
                }
                SimEventPayload::MaintenanceEnd(task) => {
                    self.release_from_maintenance(&task.vehicle_id);
                    // Recurs bimonthly (§3): chain the next occurrence's
                    // own start/end pair onto the queue rather than
                    // scheduling a fixed number of repeats up front.
                    let next = task.next_occurrence();
                    let (next_start, next_end) = next.window();
                    self.events.push(SimEvent::new(next_start, next.vehicle_id.to_string(), SimEventPayload::MaintenanceStart(next.clone())));
                    self.events.push(SimEvent::new(next_end, next.vehicle_id.to_string(), SimEventPayload::MaintenanceEnd(next.clone())));
                    self.environment.add_maintenance(next);
                    needs_replan = true;
                }
                SimEventPayload::IncidentTrigger(incident) => {
                    let vehicle_id = incident.vehicle_id.clone();
                    self.environment.add_incident(incident);
                    self.active_plans.remove(&vehicle_id);
                    needs_replan = true;
                }
                SimEventPayload::IncidentResolve(vehicle_id) => {
                    self.environment.resolve_incident(&vehicle_id);
                    needs_replan = true;
                }
                SimEventPayload::Replan => {
                    needs_replan = true;
                }
                SimEventPayload::SimulationEnd => {
                    ended = true;
                }
            }
        }

        if ended {
            TickOutcome::Ended
        } else if needs_replan {
            TickOutcome::NeedsReplan
        } else {
            TickOutcome::Continue
        }
    }

    /// Applies an API-reported breakdown immediately (vehicle goes
    /// UNAVAILABLE and its in-flight plan is discarded right away, so a
    /// concurrent `/environment` poll sees it without waiting for a tick),
    /// then enqueues a REPLAN so the orchestrator picks up the freed
    /// instructions on its next tick (§6.2, §8 scenario 6).
    pub fn trigger_breakdown(&mut self, incident: crate::model::incident::Incident) {
        let vehicle_id = incident.vehicle_id.clone();
        self.environment.add_incident(incident);
        self.active_plans.remove(&vehicle_id);
        let now = self.environment.now;
        self.events.push(SimEvent::new(now, vehicle_id.to_string(), SimEventPayload::Replan));
    }

    /// Applies an API-reported repair immediately, then enqueues a REPLAN so
    /// the now-available vehicle is considered on the next tick.
    pub fn trigger_repair(&mut self, vehicle_id: &VehicleId) {
        self.environment.resolve_incident(vehicle_id);
        let now = self.environment.now;
        self.events.push(SimEvent::new(now, vehicle_id.to_string(), SimEventPayload::Replan));
    }

    fn force_vehicle_to_maintenance(&mut self, vehicle_id: &VehicleId) {
        self.active_plans.remove(vehicle_id);
        let main_position = self.environment.main_depot().map(|d| d.position);
        if let Some(vehicle) = self.environment.vehicles.get_mut(vehicle_id) {
            vehicle.status = VehicleStatus::Maintenance;
            if let Some(position) = main_position {
                vehicle.position = position;
            }
        }
    }

    fn release_from_maintenance(&mut self, vehicle_id: &VehicleId) {
        let now = self.environment.now;
        let held = self.environment.is_incident_held(vehicle_id, now);
        if let Some(vehicle) = self.environment.vehicles.get_mut(vehicle_id) {
            if !held {
                vehicle.status = VehicleStatus::Available;
            }
        }
    }

    /// §4.7 step 3: build a seed and run the optimizer against a snapshot,
    /// install the resulting plans. Call this from the async tick loop
    /// after `begin_tick` returns `NeedsReplan`, ideally from inside
    /// `tokio::task::spawn_blocking` since this is the CPU-bound half.
    pub fn replan(&mut self, cancel: &AtomicBool) {
        let snapshot = self.environment.clone();
        let seed = build_initial_solution(&snapshot, &mut self.rng);
        let solution = run_tabu_search(
            &snapshot,
            seed,
            &self.optimizer_config,
            &self.evaluator_config,
            &mut self.rng,
            cancel,
        );
        self.install_solution(&solution);
    }

    /// Attaches a freshly-computed Solution's plans to vehicles, replacing
    /// whatever remaining unexecuted actions they had (§4.7 step 3).
    pub fn install_solution(&mut self, solution: &Solution) {
        let vehicle_ids: Vec<VehicleId> = self.environment.vehicles.keys().cloned().collect();
        for vehicle_id in vehicle_ids {
            let instructions = solution.instructions_for(&vehicle_id);
            if instructions.is_empty() {
                self.active_plans.remove(&vehicle_id);
                continue;
            }
            let Some(vehicle) = self.environment.vehicles.get(&vehicle_id) else {
                continue;
            };
            match build_plan(&self.environment, vehicle, instructions, self.environment.now, PlanBuilderConfig::default()) {
                Some(plan) if !plan.actions.is_empty() => {
                    let action_start_fuel_gal = vehicle.current_fuel_gal;
                    self.active_plans.insert(
                        vehicle_id,
                        VehicleExecution {
                            plan,
                            next_action_index: 0,
                            action_start_fuel_gal,
                        },
                    );
                }
                _ => {
                    warn!(vehicle = %vehicle_id, "replan produced an infeasible plan, leaving vehicle idle");
                    self.active_plans.remove(&vehicle_id);
                }
            }
        }
    }

    /// §4.7 steps 4-5: execute plan progress up to `now`, then advance the
    /// clock by one tick. Call after `install_solution` when a replan just
    /// ran, or directly after `begin_tick` returned `Continue`.
    pub fn finish_tick(&mut self) {
        self.execute_actions();
        self.advance_clock();
        self.ticks_elapsed += 1;
    }

    fn execute_actions(&mut self) {
        let now = self.environment.now;
        let vehicle_ids: Vec<VehicleId> = self.active_plans.keys().cloned().collect();

        for vehicle_id in vehicle_ids {
            loop {
                let Some(execution) = self.active_plans.get(&vehicle_id) else {
                    break;
                };
                let Some(action) = execution.plan.actions.get(execution.next_action_index).cloned() else {
                    self.active_plans.remove(&vehicle_id);
                    if let Some(vehicle) = self.environment.vehicles.get_mut(&vehicle_id) {
                        vehicle.status = VehicleStatus::Available;
                    }
                    break;
                };

                if now >= action.end {
                    self.apply_action_completion(&vehicle_id, &action);
                    let execution = self.active_plans.get_mut(&vehicle_id).expect("just looked it up");
                    execution.next_action_index += 1;
                    let fuel_now = self.environment.vehicles.get(&vehicle_id).map(|v| v.current_fuel_gal).unwrap_or(0.0);
                    if let Some(execution) = self.active_plans.get_mut(&vehicle_id) {
                        execution.action_start_fuel_gal = fuel_now;
                    }
                    if let Some(next_action) = self
                        .active_plans
                        .get(&vehicle_id)
                        .and_then(|e| e.plan.actions.get(e.next_action_index).cloned())
                    {
                        self.set_status_for(&vehicle_id, &next_action);
                    }
                    continue;
                }

                if let ActionKind::Drive { path, fuel_delta_gal, .. } = &action.kind {
                    self.apply_drive_progress(&vehicle_id, &action, path, *fuel_delta_gal, now);
                }
                break;
            }
        }
    }

    fn set_status_for(&mut self, vehicle_id: &VehicleId, action: &Action) {
        let Some(vehicle) = self.environment.vehicles.get_mut(vehicle_id) else {
            return;
        };
        vehicle.status = match &action.kind {
            ActionKind::Drive { .. } => VehicleStatus::Driving,
            ActionKind::Refuel { .. } => VehicleStatus::Refueling,
            ActionKind::Reload { .. } => VehicleStatus::Reloading,
            ActionKind::Serve { .. } => VehicleStatus::Serving,
            ActionKind::Maintenance => VehicleStatus::Maintenance,
            ActionKind::Wait => vehicle.status,
        };
    }

    fn apply_drive_progress(&mut self, vehicle_id: &VehicleId, action: &Action, path: &[Position], fuel_delta_gal: f64, now: NaiveDateTime) {
        let total = (action.end - action.start).num_seconds().max(1) as f64;
        let elapsed = (now - action.start).num_seconds().max(0) as f64;
        let fraction = (elapsed / total).clamp(0.0, 1.0);

        let Some(execution) = self.active_plans.get(vehicle_id) else { return };
        let start_fuel = execution.action_start_fuel_gal;

        if let Some(vehicle) = self.environment.vehicles.get_mut(vehicle_id) {
            if vehicle.status != VehicleStatus::Driving {
                vehicle.status = VehicleStatus::Driving;
            }
            if path.len() >= 2 {
                let index = ((path.len() - 1) as f64 * fraction).round() as usize;
                vehicle.position = path[index.min(path.len() - 1)];
            }
            vehicle.current_fuel_gal = (start_fuel + fuel_delta_gal * fraction).max(0.0);
        }
    }

    fn apply_action_completion(&mut self, vehicle_id: &VehicleId, action: &Action) {
        match &action.kind {
            ActionKind::Drive { path, fuel_delta_gal, .. } => {
                if let Some(vehicle) = self.environment.vehicles.get_mut(vehicle_id) {
                    if let Some(last) = path.last() {
                        vehicle.position = *last;
                    }
                    vehicle.current_fuel_gal = (vehicle.current_fuel_gal + *fuel_delta_gal).max(0.0);
                }
            }
            ActionKind::Refuel { .. } => {
                if let Some(vehicle) = self.environment.vehicles.get_mut(vehicle_id) {
                    vehicle.current_fuel_gal = vehicle.vehicle_type.fuel_tank_capacity_gal();
                }
            }
            ActionKind::Reload { depot, amount_m3 } => {
                if let Some(depot) = self.environment.depots.get_mut(depot) {
                    depot.withdraw(*amount_m3);
                }
                if let Some(vehicle) = self.environment.vehicles.get_mut(vehicle_id) {
                    let capacity = vehicle.vehicle_type.lpg_capacity_m3();
                    vehicle.current_lpg_m3 = (vehicle.current_lpg_m3 + *amount_m3).min(capacity);
                }
            }
            ActionKind::Serve { order, amount_m3 } => {
                if let Some(order) = self.environment.orders.get_mut(order) {
                    order.apply_delivery(*amount_m3);
                }
                if let Some(vehicle) = self.environment.vehicles.get_mut(vehicle_id) {
                    vehicle.current_lpg_m3 = (vehicle.current_lpg_m3 - *amount_m3 as f64).max(0.0);
                }
            }
            ActionKind::Maintenance => {
                if let Some(vehicle) = self.environment.vehicles.get_mut(vehicle_id) {
                    vehicle.status = VehicleStatus::Available;
                }
            }
            ActionKind::Wait => {}
        }
    }

    fn advance_clock(&mut self) {
        let before = self.environment.now;
        self.environment.advance_clock(self.delta);
        let after = self.environment.now;
        self.environment.expire_blockages(after);

        if after.date() != before.date() {
            info!(date = %after.date(), "midnight crossed, refilling auxiliary depots");
            self.environment.refill_aux_depots();
        }
    }
}

/// Runs the tick loop until ended or past `end_time` (§4.7 step 5, §5). A
/// single `tokio::sync::Mutex` guards the whole handle; the optimizer runs
/// on `tokio::task::spawn_blocking` and the loop does not advance the clock
/// until its result is installed.
pub async fn run_loop(handle: Arc<tokio::sync::Mutex<SimulationHandle>>, cancel: Arc<AtomicBool>) {
    let mut period_ms = { handle.lock().await.tick_speed_ms() };
    let mut interval = tokio::time::interval(std::time::Duration::from_millis(period_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let current_period = { handle.lock().await.tick_speed_ms() };
        if current_period != period_ms {
            period_ms = current_period;
            interval = tokio::time::interval(std::time::Duration::from_millis(period_ms));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            continue;
        }

        let running_and_not_ended = {
            let guard = handle.lock().await;
            guard.is_running() && !guard.is_past_end()
        };
        if !running_and_not_ended {
            continue;
        }

        let outcome = { handle.lock().await.begin_tick() };
        match outcome {
            TickOutcome::Ended => {
                let mut guard = handle.lock().await;
                guard.pause();
            }
            TickOutcome::NeedsReplan => {
                let replan_handle = handle.clone();
                let replan_cancel = cancel.clone();
                // Runs off the async executor; `finish_tick` below does not
                // start until this returns, so the clock never advances
                // while an optimization is in flight (§5).
                tokio::task::spawn_blocking(move || blocking_replan(replan_handle, replan_cancel))
                    .await
                    .ok();
                let mut guard = handle.lock().await;
                guard.finish_tick();
            }
            TickOutcome::Continue => {
                let mut guard = handle.lock().await;
                guard.finish_tick();
            }
        }
    }
}

/// Blocking-thread body for a replan: takes the async mutex synchronously
/// via `blocking_lock`, since we're already off the async executor here.
fn blocking_replan(handle: Arc<tokio::sync::Mutex<SimulationHandle>>, cancel: Arc<AtomicBool>) {
    let mut guard = handle.blocking_lock();
    guard.replan(&cancel);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        depot::{Depot, DepotId},
        order::{Order, OrderId},
        position::GridBounds,
        vehicle::{Vehicle, VehicleType},
    };
    use chrono::NaiveDate;

    fn base_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(8, 0, 0).unwrap()
    }

    fn sample_handle() -> SimulationHandle {
        let mut env = Environment::new(base_time(), GridBounds::default());
        env.depots.insert(DepotId::from("MAIN"), Depot::main_plant(DepotId::from("MAIN"), Position::new(12, 8)));
        let vehicle = Vehicle::new_full(VehicleId::new(VehicleType::Ta, 1), VehicleType::Ta, Position::new(12, 8));
        env.vehicles.insert(vehicle.id.clone(), vehicle);
        env.add_order(Order::new(OrderId::from("1"), Position::new(20, 8), base_time(), 10, 10));
        SimulationHandle::new(env, EventQueue::new(), None)
    }

    #[test]
    fn begin_tick_signals_replan_when_an_order_arrives() {
        let mut handle = sample_handle();
        handle.enqueue(SimEvent::new(
            base_time(),
            "1",
            SimEventPayload::OrderArrival(Order::new(OrderId::from("2"), Position::new(1, 1), base_time(), 10, 5)),
        ));
        assert_eq!(handle.begin_tick(), TickOutcome::NeedsReplan);
        assert!(handle.environment().find_order(&OrderId::from("2")).is_some());
    }

    #[test]
    fn replan_then_execute_moves_a_vehicle_along_its_plan() {
        let mut handle = sample_handle();
        let cancel = AtomicBool::new(false);
        handle.replan(&cancel);
        assert!(!handle.active_plans.is_empty());

        for _ in 0..20 {
            handle.finish_tick();
        }
        let vehicle = handle.environment().find_vehicle(&VehicleId::new(VehicleType::Ta, 1)).unwrap();
        assert!(vehicle.position != Position::new(12, 8) || vehicle.status == VehicleStatus::Available);
    }

    #[test]
    fn remaining_drive_path_is_none_until_the_vehicle_is_driving() {
        let mut handle = sample_handle();
        assert!(handle.remaining_drive_path(&VehicleId::new(VehicleType::Ta, 1)).is_none());
        let cancel = AtomicBool::new(false);
        handle.replan(&cancel);
        assert!(handle.remaining_drive_path(&VehicleId::new(VehicleType::Ta, 1)).is_some());
    }

    #[test]
    fn set_speed_rejects_out_of_range_values() {
        let mut handle = sample_handle();
        assert!(handle.set_speed(10).is_err());
        assert!(handle.set_speed(500).is_ok());
        assert_eq!(handle.tick_speed_ms(), 500);
    }

    #[test]
    fn reset_restores_the_initial_environment() {
        let mut handle = sample_handle();
        let cancel = AtomicBool::new(false);
        handle.replan(&cancel);
        handle.finish_tick();
        handle.reset();
        assert_eq!(handle.environment().now, base_time());
        assert!(handle.active_plans.is_empty());
    }
}
