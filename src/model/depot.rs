use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::define_map;

use super::position::Position;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DepotId(pub String);

impl Display for DepotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DepotId {
    fn from(s: &str) -> Self {
        DepotId(s.to_string())
    }
}

/// Effective capacity of an auxiliary depot after its daily midnight refill
/// (§3): auxiliaries always end up topped off at this level.
pub const AUX_DEPOT_CAPACITY_M3: f64 = 160.0;

/// A refill/refuel location: either the main plant (unlimited, auto-filled)
/// or an auxiliary tank (§3). Auxiliaries dispense LPG only; fuel is only
/// available where `can_refuel` is true - by default just the main plant
/// (§9, resolving the source's flip-flop on this point).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Depot {
    pub id: DepotId,
    pub position: Position,
    pub capacity_m3: f64,
    pub current_lpg_m3: f64,
    pub can_refuel: bool,
    pub is_main: bool,
}

impl Depot {
    pub fn main_plant(id: DepotId, position: Position) -> Self {
        Self {
            id,
            position,
            capacity_m3: f64::MAX,
            current_lpg_m3: f64::MAX,
            can_refuel: true,
            is_main: true,
        }
    }

    pub fn auxiliary(id: DepotId, position: Position) -> Self {
        Self {
            id,
            position,
            capacity_m3: AUX_DEPOT_CAPACITY_M3,
            current_lpg_m3: AUX_DEPOT_CAPACITY_M3,
            can_refuel: false,
            is_main: false,
        }
    }

    pub fn check_invariants(&self) -> bool {
        self.current_lpg_m3 >= 0.0 && self.current_lpg_m3 <= self.capacity_m3
    }

    pub fn can_supply(&self, amount_m3: f64) -> bool {
        self.is_main || self.current_lpg_m3 >= amount_m3
    }

    /// Withdraw `amount_m3`, clamping the main plant's level (which is never
    /// actually depleted - it's the fallback of last resort).
    pub fn withdraw(&mut self, amount_m3: f64) {
        if !self.is_main {
            self.current_lpg_m3 = (self.current_lpg_m3 - amount_m3).max(0.0);
        }
    }

    /// Daily midnight refill (§4.1): auxiliaries top back up to capacity.
    pub fn refill_to_capacity(&mut self) {
        if !self.is_main {
            self.current_lpg_m3 = self.capacity_m3;
        }
    }
}

define_map!(DepotId, Depot, DepotMap);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aux_depot_refills_at_midnight() {
        let mut depot = Depot::auxiliary(DepotId::from("AUX1"), Position::new(10, 10));
        depot.withdraw(100.0);
        assert_eq!(depot.current_lpg_m3, 60.0);
        depot.refill_to_capacity();
        assert_eq!(depot.current_lpg_m3, AUX_DEPOT_CAPACITY_M3);
    }

    #[test]
    fn main_plant_is_effectively_unlimited_and_never_refuels_aux_style() {
        let main = Depot::main_plant(DepotId::from("MAIN"), Position::new(12, 8));
        assert!(main.can_supply(1_000_000.0));
        assert!(main.can_refuel);
    }

    #[test]
    fn aux_cannot_refuel() {
        let aux = Depot::auxiliary(DepotId::from("AUX1"), Position::new(10, 10));
        assert!(!aux.can_refuel);
    }
}
