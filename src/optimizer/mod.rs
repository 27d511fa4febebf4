use std::collections::VecDeque;

use rand::{seq::IndexedRandom, Rng};

use crate::{
    environment::Environment,
    evaluation::{evaluate, EvaluatorConfig},
    model::{
        instruction::DeliveryInstruction,
        order::OrderId,
        solution::Solution,
        vehicle::VehicleId,
        MapType,
    },
};

/// Tunables for the tabu search (§4.6).
#[derive(Debug, Clone, Copy)]
pub struct TabuSearchConfig {
    pub max_iterations: usize,
    pub neighbors_per_iteration: usize,
    pub tabu_capacity: usize,
    pub initial_temperature: f64,
    pub temperature_decay: f64,
    pub improvement_ratio_threshold: f64,
    pub cluster_radius_km: i32,
}

impl Default for TabuSearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3000,
            neighbors_per_iteration: 100,
            tabu_capacity: 25,
            initial_temperature: 100.0,
            temperature_decay: 0.995,
            improvement_ratio_threshold: 0.001,
            cluster_radius_km: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum MoveKind {
    Transfer,
    Swap,
    Reorder,
}

/// Move identity for tabu comparison (§4.6): two moves are equal iff all
/// five fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MoveKey {
    kind: MoveKind,
    source_vehicle: VehicleId,
    source_index: usize,
    target_vehicle: VehicleId,
    target_index: usize,
}

fn solution_map(solution: &Solution) -> MapType<VehicleId, Vec<DeliveryInstruction>> {
    solution.assignments.clone().into()
}

/// Applies one random move to `current`, returning the neighbor solution,
/// the move's own key, and the key of its inverse (the one that gets
/// tabu-listed, §4.6 step 4).
fn generate_neighbor(
    current: &Solution,
    vehicle_ids: &[VehicleId],
    rng: &mut impl Rng,
) -> Option<(Solution, MoveKey, MoveKey)> {
    let mut map = solution_map(current);
    for id in vehicle_ids {
        map.entry(id.clone()).or_default();
    }
    let occupied: Vec<VehicleId> = map
        .iter()
        .filter(|(_, instrs)| !instrs.is_empty())
        .map(|(id, _)| id.clone())
        .collect();
    if occupied.is_empty() || vehicle_ids.is_empty() {
        return None;
    }

    let len_of = |map: &MapType<VehicleId, Vec<DeliveryInstruction>>, id: &VehicleId| {
        map.get(id).map(|v| v.len()).unwrap_or(0)
    };
    let can_reorder = occupied.iter().any(|id| len_of(&map, id) >= 2);
    let can_swap = occupied.len() >= 2 || occupied.iter().any(|id| len_of(&map, id) >= 2);
    let can_transfer = vehicle_ids.len() >= 2 && !occupied.is_empty();

    let mut families = vec![];
    if can_transfer {
        families.push(MoveKind::Transfer);
    }
    if can_swap {
        families.push(MoveKind::Swap);
    }
    if can_reorder {
        families.push(MoveKind::Reorder);
    }
    let kind = *families.choose(rng)?;

    match kind {
        MoveKind::Transfer => {
            let source = occupied.choose(rng)?.clone();
            let source_len = len_of(&map, &source);
            let source_index = rng.random_range(0..source_len);
            let target = vehicle_ids.choose(rng)?.clone();

            let instruction = map.get_mut(&source).expect("source present").remove(source_index);
            let target_list = map.entry(target.clone()).or_default();
            target_list.push(instruction);
            let target_index = target_list.len() - 1;

            let forward = MoveKey {
                kind,
                source_vehicle: source.clone(),
                source_index,
                target_vehicle: target.clone(),
                target_index,
            };
            let inverse = MoveKey {
                kind,
                source_vehicle: target,
                source_index: target_index,
                target_vehicle: source,
                target_index: source_index,
            };
            Some((Solution { assignments: map.into() }, forward, inverse))
        }
        MoveKind::Swap => {
            let source = occupied.choose(rng)?.clone();
            let source_len = len_of(&map, &source);
            let source_index = rng.random_range(0..source_len);

            let mut target_candidates: Vec<VehicleId> = occupied
                .iter()
                .filter(|id| **id != source || source_len >= 2)
                .cloned()
                .collect();
            if target_candidates.is_empty() {
                target_candidates.push(source.clone());
            }
            let target = target_candidates.choose(rng)?.clone();
            let target_len = len_of(&map, &target);
            let target_index = if target == source {
                let mut idx = rng.random_range(0..target_len);
                if target_len >= 2 {
                    while idx == source_index {
                        idx = rng.random_range(0..target_len);
                    }
                }
                idx
            } else {
                rng.random_range(0..target_len)
            };

            if source == target {
                map.get_mut(&source).expect("source present").swap(source_index, target_index);
            } else {
                let item_a = map.get(&source).expect("source present")[source_index].clone();
                let item_b = map.get(&target).expect("target present")[target_index].clone();
                map.get_mut(&source).expect("source present")[source_index] = item_b;
                map.get_mut(&target).expect("target present")[target_index] = item_a;
            }

            let key = MoveKey {
                kind,
                source_vehicle: source,
                source_index,
                target_vehicle: target,
                target_index,
            };
            // a swap is its own inverse: applying it twice is the identity.
            Some((Solution { assignments: map.into() }, key.clone(), key))
        }
        MoveKind::Reorder => {
            let candidates: Vec<&VehicleId> = occupied.iter().filter(|id| len_of(&map, id) >= 2).collect();
            let vehicle = (*candidates.choose(rng)?).clone();
            let len = len_of(&map, &vehicle);
            let from = rng.random_range(0..len);
            let mut to = rng.random_range(0..len);
            while to == from {
                to = rng.random_range(0..len);
            }

            let list = map.get_mut(&vehicle).expect("vehicle present");
            let item = list.remove(from);
            let insert_at = to.min(list.len());
            list.insert(insert_at, item);

            let forward = MoveKey {
                kind,
                source_vehicle: vehicle.clone(),
                source_index: from,
                target_vehicle: vehicle.clone(),
                target_index: insert_at,
            };
            let inverse = MoveKey {
                kind,
                source_vehicle: vehicle.clone(),
                source_index: insert_at,
                target_vehicle: vehicle,
                target_index: from,
            };
            Some((Solution { assignments: map.into() }, forward, inverse))
        }
    }
}

fn flatten(solution: &Solution) -> Vec<DeliveryInstruction> {
    solution_map(solution).into_values().flatten().collect()
}

/// Diversification (a): round-robin redistribution of every instruction
/// across the known vehicles (§4.6 step 6).
fn round_robin_redistribute(solution: &Solution, vehicle_ids: &[VehicleId]) -> Solution {
    let instructions = flatten(solution);
    let mut map: MapType<VehicleId, Vec<DeliveryInstruction>> =
        vehicle_ids.iter().map(|id| (id.clone(), vec![])).collect();
    if vehicle_ids.is_empty() {
        return solution.clone();
    }
    for (i, instruction) in instructions.into_iter().enumerate() {
        let vehicle = &vehicle_ids[i % vehicle_ids.len()];
        map.entry(vehicle.clone()).or_default().push(instruction);
    }
    Solution { assignments: map.into() }
}

/// Diversification (b): cluster instructions by spatial proximity of their
/// order's customer position (radius in km) and shuffle whole clusters
/// across vehicles (§4.6 step 6).
fn cluster_shuffle_redistribute(
    env: &Environment,
    solution: &Solution,
    vehicle_ids: &[VehicleId],
    radius_km: i32,
    rng: &mut impl Rng,
) -> Solution {
    if vehicle_ids.is_empty() || radius_km <= 0 {
        return solution.clone();
    }
    let instructions = flatten(solution);
    let mut clusters: MapType<(i32, i32), Vec<DeliveryInstruction>> = MapType::new();
    for instruction in instructions {
        let key = match env.find_order(&instruction.order_id) {
            Some(order) => (order.customer_position.x / radius_km, order.customer_position.y / radius_km),
            None => (0, 0),
        };
        clusters.entry(key).or_default().push(instruction);
    }

    let mut map: MapType<VehicleId, Vec<DeliveryInstruction>> =
        vehicle_ids.iter().map(|id| (id.clone(), vec![])).collect();
    for (_, cluster) in clusters {
        if let Some(vehicle) = vehicle_ids.choose(rng) {
            map.entry(vehicle.clone()).or_default().extend(cluster);
        }
    }
    Solution { assignments: map.into() }
}

/// Appends a single instruction, on the least-loaded vehicle, for every
/// pending order the solution doesn't already cover (§4.6 step 7).
fn ensure_all_delivered(env: &Environment, solution: &Solution, vehicle_ids: &[VehicleId]) -> Solution {
    if vehicle_ids.is_empty() {
        return solution.clone();
    }
    let mut map = solution_map(solution);
    for id in vehicle_ids {
        map.entry(id.clone()).or_default();
    }

    let missing: Vec<(OrderId, i32)> = env
        .pending_orders()
        .into_iter()
        .filter_map(|order| {
            let assigned = solution.total_assigned_m3(&order.id);
            if assigned <= 0 {
                Some((order.id.clone(), order.remaining_m3))
            } else {
                None
            }
        })
        .collect();

    for (order_id, amount_m3) in missing {
        let least_loaded = vehicle_ids
            .iter()
            .min_by_key(|id| map.get(id).map(|v| v.iter().map(|i| i.amount_m3).sum::<i32>()).unwrap_or(0))
            .expect("vehicle_ids is non-empty")
            .clone();
        map.entry(least_loaded).or_default().push(DeliveryInstruction::new(order_id, amount_m3));
    }

    Solution { assignments: map.into() }
}

/// Runs the tabu search / simulated-annealing hybrid of §4.6 starting from
/// `initial`, returning the best solution found within the iteration
/// budget after the final ensure-all-delivered repair pass. `cancel` lets
/// the control API abort an in-flight run (§5); a cancelled run still
/// returns a valid, possibly seed-quality, solution rather than nothing.
pub fn run_tabu_search(
    env: &Environment,
    initial: Solution,
    config: &TabuSearchConfig,
    evaluator_config: &EvaluatorConfig,
    rng: &mut impl Rng,
    cancel: &std::sync::atomic::AtomicBool,
) -> Solution {
    let vehicle_ids: Vec<VehicleId> = env.vehicles.keys().cloned().collect();

    let mut current = initial;
    let mut current_score = evaluate(env, &current, evaluator_config);
    let mut best = current.clone();
    let mut best_score = current_score;

    let mut tabu: VecDeque<MoveKey> = VecDeque::new();
    let mut temperature = config.initial_temperature;
    let checkpoint_interval = (config.max_iterations / 2).max(1);
    let mut score_at_last_checkpoint = best_score;

    for iteration in 1..=config.max_iterations {
        if cancel.load(std::sync::atomic::Ordering::Relaxed) {
            break;
        }
        let mut chosen: Option<(Solution, f64, MoveKey)> = None;

        for _ in 0..config.neighbors_per_iteration {
            let Some((neighbor, forward_key, inverse_key)) = generate_neighbor(&current, &vehicle_ids, rng) else {
                continue;
            };
            let neighbor_score = evaluate(env, &neighbor, evaluator_config);

            let aspirated = neighbor_score > best_score;
            if tabu.contains(&forward_key) && !aspirated {
                continue;
            }

            let is_better = chosen.as_ref().map(|(_, s, _)| neighbor_score > *s).unwrap_or(true);
            if is_better {
                chosen = Some((neighbor, neighbor_score, inverse_key));
            }
        }

        let Some((neighbor, neighbor_score, inverse_key)) = chosen else {
            temperature *= config.temperature_decay;
            continue;
        };

        let accept = neighbor_score >= current_score
            || rng.random::<f64>() < ((neighbor_score - current_score) / temperature.max(1e-9)).exp();

        if accept {
            current = neighbor;
            current_score = neighbor_score;
            tabu.push_back(inverse_key);
            if tabu.len() > config.tabu_capacity {
                tabu.pop_front();
            }
        }

        if current_score > best_score {
            best = current.clone();
            best_score = current_score;
        }

        temperature *= config.temperature_decay;

        if iteration % checkpoint_interval == 0 {
            let denom = score_at_last_checkpoint.abs().max(1e-9);
            let improvement_ratio = (best_score - score_at_last_checkpoint) / denom;
            if improvement_ratio < config.improvement_ratio_threshold {
                current = if (iteration / checkpoint_interval) % 2 == 0 {
                    round_robin_redistribute(&current, &vehicle_ids)
                } else {
                    cluster_shuffle_redistribute(env, &current, &vehicle_ids, config.cluster_radius_km, rng)
                };
                current_score = evaluate(env, &current, evaluator_config);
                temperature = config.initial_temperature / 2.0;
            }
            score_at_last_checkpoint = best_score;
        }
    }

    ensure_all_delivered(env, &best, &vehicle_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        depot::{Depot, DepotId},
        order::Order,
        position::{GridBounds, Position},
        vehicle::{Vehicle, VehicleType},
    };
    use chrono::NaiveDate;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn base_time() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(8, 0, 0).unwrap()
    }

    fn sample_env() -> Environment {
        let mut env = Environment::new(base_time(), GridBounds::default());
        env.depots.insert(DepotId::from("MAIN"), Depot::main_plant(DepotId::from("MAIN"), Position::new(0, 0)));
        for i in 1..=2u32 {
            let vehicle = Vehicle::new_full(VehicleId::new(VehicleType::Ta, i), VehicleType::Ta, Position::new(0, 0));
            env.vehicles.insert(vehicle.id.clone(), vehicle);
        }
        env.add_order(Order::new(OrderId::from("1"), Position::new(5, 5), base_time(), 10, 8));
        env.add_order(Order::new(OrderId::from("2"), Position::new(8, 2), base_time(), 10, 6));
        env
    }

    #[test]
    fn ensure_all_delivered_covers_orders_left_unassigned() {
        let env = sample_env();
        let vehicle_ids: Vec<VehicleId> = env.vehicles.keys().cloned().collect();
        let repaired = ensure_all_delivered(&env, &Solution::empty(), &vehicle_ids);
        assert_eq!(repaired.total_assigned_m3(&OrderId::from("1")), 8);
        assert_eq!(repaired.total_assigned_m3(&OrderId::from("2")), 6);
    }

    #[test]
    fn tabu_search_never_loses_orders_that_the_seed_already_covered() {
        let env = sample_env();
        let mut rng = SmallRng::seed_from_u64(11);
        let seed = crate::assignment::build_initial_solution(&env, &mut rng);
        let seed_total: i32 = ["1", "2"].iter().map(|id| seed.total_assigned_m3(&OrderId::from(*id))).sum();

        let config = TabuSearchConfig {
            max_iterations: 20,
            neighbors_per_iteration: 10,
            ..TabuSearchConfig::default()
        };
        let cancel = std::sync::atomic::AtomicBool::new(false);
        let result = run_tabu_search(&env, seed, &config, &EvaluatorConfig::default(), &mut rng, &cancel);
        let result_total: i32 = ["1", "2"].iter().map(|id| result.total_assigned_m3(&OrderId::from(*id))).sum();

        assert!(result_total >= seed_total);
    }

    #[test]
    fn a_pre_cancelled_run_still_returns_a_fully_repaired_solution() {
        let env = sample_env();
        let mut rng = SmallRng::seed_from_u64(5);
        let seed = crate::assignment::build_initial_solution(&env, &mut rng);
        let cancel = std::sync::atomic::AtomicBool::new(true);

        let result = run_tabu_search(&env, seed, &TabuSearchConfig::default(), &EvaluatorConfig::default(), &mut rng, &cancel);
        assert_eq!(result.total_assigned_m3(&OrderId::from("1")), 8);
        assert_eq!(result.total_assigned_m3(&OrderId::from("2")), 6);
    }

    #[test]
    fn round_robin_redistribute_preserves_total_instruction_count() {
        let env = sample_env();
        let vehicle_ids: Vec<VehicleId> = env.vehicles.keys().cloned().collect();
        let mut rng = SmallRng::seed_from_u64(3);
        let seed = crate::assignment::build_initial_solution(&env, &mut rng);
        let before: usize = vehicle_ids.iter().map(|id| seed.instructions_for(id).len()).sum();

        let redistributed = round_robin_redistribute(&seed, &vehicle_ids);
        let after: usize = vehicle_ids.iter().map(|id| redistributed.instructions_for(id).len()).sum();
        assert_eq!(before, after);
    }
}
