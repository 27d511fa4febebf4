use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
};

use chrono::{Duration, NaiveDateTime};

use crate::{
    environment::Environment,
    error::PathError,
    model::position::Position,
};

/// 50 km/h at 1 km per lattice edge: 72 seconds to cross one edge (§4.2).
const SECONDS_PER_KM_AT_50KMH: i64 = 72;

/// Successful A* result: the path taken, the earliest-arrival timestamp at
/// each node of that path, and the total distance in km (§9: the canonical
/// `PathResult`, picking one of the source's two incompatible definitions).
#[derive(Debug, Clone, PartialEq)]
pub struct PathResult {
    pub positions: Vec<Position>,
    pub arrival_times: Vec<NaiveDateTime>,
    pub distance_km: f64,
}

impl PathResult {
    pub fn destination(&self) -> Position {
        *self.positions.last().expect("path always has >= 1 node")
    }

    pub fn arrival_time(&self) -> NaiveDateTime {
        *self.arrival_times.last().expect("path always has >= 1 node")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Frontier {
    f: i64,
    g: i64,
    position: Position,
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on f, tie-break preferring higher g (more committed
        // progress) - BinaryHeap is a max-heap, so invert f and keep g as-is.
        other.f.cmp(&self.f).then(self.g.cmp(&other.g))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn edge_blocked(env: &Environment, from: Position, to: Position, t_from: NaiveDateTime, t_to: NaiveDateTime) -> bool {
    env.blockages.iter().any(|b| {
        if !(b.start < t_to && t_from < b.end) {
            return false;
        }
        b.blocks_position(&to) || b.blocks_edge(&from, &to)
    })
}

/// Time-aware A* (§4.2): four-neighbour adjacency, edge cost 1 km, Manhattan
/// heuristic (admissible and consistent on this grid), re-opening a closed
/// node only on a strictly lower g, ties broken toward higher g.
pub fn find_path(
    env: &Environment,
    start: Position,
    goal: Position,
    departure: NaiveDateTime,
) -> Result<PathResult, PathError> {
    if start == goal {
        return Ok(PathResult {
            positions: vec![start],
            arrival_times: vec![departure],
            distance_km: 0.0,
        });
    }

    let mut open = BinaryHeap::new();
    let mut best_g: HashMap<Position, i64> = HashMap::new();
    let mut came_from: HashMap<Position, Position> = HashMap::new();
    let mut arrival: HashMap<Position, NaiveDateTime> = HashMap::new();

    best_g.insert(start, 0);
    arrival.insert(start, departure);
    open.push(Frontier {
        f: start.manhattan_distance(&goal),
        g: 0,
        position: start,
    });

    while let Some(Frontier { g, position, .. }) = open.pop() {
        if position == goal {
            return Ok(reconstruct(&came_from, &arrival, start, goal, g));
        }
        if g > *best_g.get(&position).unwrap_or(&i64::MAX) {
            continue;
        }
        let t_here = arrival[&position];

        for next in position.neighbors() {
            if !next.in_bounds(env.grid.width, env.grid.height) {
                continue;
            }
            let t_next = t_here + Duration::seconds(SECONDS_PER_KM_AT_50KMH);
            if edge_blocked(env, position, next, t_here, t_next) {
                continue;
            }
            let tentative_g = g + 1;
            if tentative_g < *best_g.get(&next).unwrap_or(&i64::MAX) {
                best_g.insert(next, tentative_g);
                came_from.insert(next, position);
                arrival.insert(next, t_next);
                open.push(Frontier {
                    f: tentative_g + next.manhattan_distance(&goal),
                    g: tentative_g,
                    position: next,
                });
            }
        }
    }

    Err(PathError::NoPath {
        from: start,
        to: goal,
        departure,
    })
}

fn reconstruct(
    came_from: &HashMap<Position, Position>,
    arrival: &HashMap<Position, NaiveDateTime>,
    start: Position,
    goal: Position,
    total_g: i64,
) -> PathResult {
    let mut positions = vec![goal];
    let mut cur = goal;
    while cur != start {
        cur = came_from[&cur];
        positions.push(cur);
    }
    positions.reverse();
    let arrival_times = positions.iter().map(|p| arrival[p]).collect();
    PathResult {
        positions,
        arrival_times,
        distance_km: total_g as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{blockage::{Blockage, BlockageId}, position::GridBounds};
    use chrono::NaiveDate;

    fn base_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn empty_env() -> Environment {
        Environment::new(base_time(), GridBounds::default())
    }

    #[test]
    fn straight_line_distance_equals_manhattan() {
        let env = empty_env();
        let result = find_path(&env, Position::new(12, 8), Position::new(20, 8), base_time()).unwrap();
        assert_eq!(result.distance_km, 8.0);
        assert_eq!(result.destination(), Position::new(20, 8));
    }

    #[test]
    fn blockage_forces_a_detour() {
        let mut env = empty_env();
        env.add_blockage(Blockage::new(
            BlockageId("B1".into()),
            base_time(),
            base_time() + Duration::hours(24),
            vec![Position::new(10, 5), Position::new(10, 15)],
        ));
        let departure = base_time() + Duration::hours(1);
        let result = find_path(&env, Position::new(5, 10), Position::new(15, 10), departure).unwrap();
        assert_eq!(result.distance_km, 12.0);
    }

    #[test]
    fn monotonicity_when_blockage_expires() {
        let mut env = empty_env();
        let blockage = Blockage::new(
            BlockageId("B1".into()),
            base_time(),
            base_time() + Duration::hours(1),
            vec![Position::new(10, 5), Position::new(10, 15)],
        );
        env.add_blockage(blockage);

        let during = find_path(&env, Position::new(5, 10), Position::new(15, 10), base_time()).unwrap();
        env.expire_blockages(base_time() + Duration::hours(2));
        let after = find_path(
            &env,
            Position::new(5, 10),
            Position::new(15, 10),
            base_time() + Duration::hours(2),
        )
        .unwrap();
        assert!(after.distance_km <= during.distance_km);
    }

    #[test]
    fn same_start_and_goal_is_a_zero_length_path() {
        let env = empty_env();
        let result = find_path(&env, Position::new(3, 3), Position::new(3, 3), base_time()).unwrap();
        assert_eq!(result.distance_km, 0.0);
        assert_eq!(result.positions, vec![Position::new(3, 3)]);
    }

    #[test]
    fn unreachable_goal_outside_grid_fails() {
        let env = empty_env();
        let result = find_path(&env, Position::new(0, 0), Position::new(1000, 1000), base_time());
        assert!(result.is_err());
    }
}
