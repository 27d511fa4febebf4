use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::position::Position;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockageId(pub String);

impl Display for BlockageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A planned street closure (§3): an open polyline of >= 2 lattice points.
/// Every polyline node remains reachable through some alternate route - the
/// input data never isolates a node. Consecutive polyline points are
/// axis-aligned (straight horizontal/vertical runs); every unit-length
/// lattice edge between them is closed, not just the pair's endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blockage {
    pub id: BlockageId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub polyline: Vec<Position>,
}

impl Blockage {
    pub fn new(
        id: BlockageId,
        start: NaiveDateTime,
        end: NaiveDateTime,
        polyline: Vec<Position>,
    ) -> Self {
        debug_assert!(polyline.len() >= 2, "blockage polyline needs >= 2 points");
        Self {
            id,
            start,
            end,
            polyline,
        }
    }

    pub fn is_active_at(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t < self.end
    }

    fn step_between(a: Position, b: Position) -> Position {
        Position::new((b.x - a.x).signum(), (b.y - a.y).signum())
    }

    /// Every unit lattice node lying on the polyline, endpoints included.
    pub fn lattice_points(&self) -> Vec<Position> {
        let mut points = vec![];
        for pair in self.polyline.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let step = Self::step_between(a, b);
            let mut cur = a;
            points.push(cur);
            while cur != b {
                cur = Position::new(cur.x + step.x, cur.y + step.y);
                points.push(cur);
            }
        }
        points
    }

    /// Every closed unit edge, as ordered adjacent lattice-point pairs.
    pub fn edges(&self) -> Vec<(Position, Position)> {
        self.lattice_points().windows(2).map(|w| (w[0], w[1])).collect()
    }

    /// A position is blocked if it lies on the polyline (not just at a
    /// named vertex - every lattice point the segment passes through).
    pub fn blocks_position(&self, p: &Position) -> bool {
        self.lattice_points().contains(p)
    }

    /// An edge `u -> v` is blocked if it coincides (in either direction)
    /// with one of the polyline's closed unit edges.
    pub fn blocks_edge(&self, u: &Position, v: &Position) -> bool {
        self.edges()
            .into_iter()
            .any(|(a, b)| (a == *u && b == *v) || (a == *v && b == *u))
    }
}
