use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Integer lattice point on the rectilinear city grid. Distance between
/// adjacent points is 1 km; inter-position distance is Manhattan (§3) -
/// there is no Euclidean distance anywhere in this crate, on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan_distance(&self, other: &Position) -> i64 {
        ((self.x - other.x).abs() + (self.y - other.y).abs()) as i64
    }

    /// Four-neighbour adjacency, no diagonals (§4.2).
    pub fn neighbors(&self) -> [Position; 4] {
        [
            Position::new(self.x + 1, self.y),
            Position::new(self.x - 1, self.y),
            Position::new(self.x, self.y + 1),
            Position::new(self.x, self.y - 1),
        ]
    }

    pub fn in_bounds(&self, width: i32, height: i32) -> bool {
        (0..=width).contains(&self.x) && (0..=height).contains(&self.y)
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Bounds of the default city grid (§3): 70x50.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBounds {
    pub width: i32,
    pub height: i32,
}

impl Default for GridBounds {
    fn default() -> Self {
        Self {
            width: 70,
            height: 50,
        }
    }
}

impl GridBounds {
    pub fn contains(&self, p: &Position) -> bool {
        p.in_bounds(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manhattan_not_euclidean() {
        let a = Position::new(0, 0);
        let b = Position::new(3, 4);
        assert_eq!(a.manhattan_distance(&b), 7);
    }

    #[test]
    fn neighbors_are_axis_aligned() {
        let p = Position::new(5, 5);
        let ns = p.neighbors();
        assert!(ns.contains(&Position::new(6, 5)));
        assert!(ns.contains(&Position::new(4, 5)));
        assert!(ns.contains(&Position::new(5, 6)));
        assert!(ns.contains(&Position::new(5, 4)));
        assert!(!ns.contains(&Position::new(6, 6)));
    }

    #[test]
    fn bounds_check() {
        let grid = GridBounds::default();
        assert!(grid.contains(&Position::new(0, 0)));
        assert!(grid.contains(&Position::new(70, 50)));
        assert!(!grid.contains(&Position::new(71, 0)));
        assert!(!grid.contains(&Position::new(0, -1)));
    }
}
