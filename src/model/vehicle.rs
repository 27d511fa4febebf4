use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::define_map;

use super::position::Position;

/// One of the four fixed truck classes (§3): fixed reference values, no
/// per-instance variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VehicleType {
    Ta,
    Tb,
    Tc,
    Td,
}

impl VehicleType {
    pub const ALL: [VehicleType; 4] = [
        VehicleType::Ta,
        VehicleType::Tb,
        VehicleType::Tc,
        VehicleType::Td,
    ];

    /// Tare weight, in metric tons.
    pub fn tare_weight_tons(&self) -> f64 {
        match self {
            VehicleType::Ta => 2.5,
            VehicleType::Tb => 2.0,
            VehicleType::Tc => 1.5,
            VehicleType::Td => 1.0,
        }
    }

    /// LPG capacity, in cubic meters.
    pub fn lpg_capacity_m3(&self) -> f64 {
        match self {
            VehicleType::Ta => 25.0,
            VehicleType::Tb => 15.0,
            VehicleType::Tc => 10.0,
            VehicleType::Td => 5.0,
        }
    }

    /// Combined full weight (tare + full LPG load), in metric tons.
    pub fn combined_full_weight_tons(&self) -> f64 {
        match self {
            VehicleType::Ta => 15.0,
            VehicleType::Tb => 9.5,
            VehicleType::Tc => 6.5,
            VehicleType::Td => 3.5,
        }
    }

    /// Number of units of this type in the default fleet.
    pub fn unit_count(&self) -> u32 {
        match self {
            VehicleType::Ta => 2,
            VehicleType::Tb => 4,
            VehicleType::Tc => 4,
            VehicleType::Td => 10,
        }
    }

    /// Every truck shares a 25-gallon fuel tank (§3).
    pub fn fuel_tank_capacity_gal(&self) -> f64 {
        25.0
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            VehicleType::Ta => "TA",
            VehicleType::Tb => "TB",
            VehicleType::Tc => "TC",
            VehicleType::Td => "TD",
        }
    }

    /// Fuel, in gallons, burned driving `distance_km` with `lpg_load_m3` on
    /// board: `distance_km * combined_weight_tons / 180` (§3). Combined
    /// weight scales linearly between tare (empty) and full-load weight.
    pub fn fuel_for_leg(&self, distance_km: f64, lpg_load_m3: f64) -> f64 {
        let capacity = self.lpg_capacity_m3();
        let load_fraction = if capacity > 0.0 {
            (lpg_load_m3 / capacity).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let tare = self.tare_weight_tons();
        let full = self.combined_full_weight_tons();
        let combined_weight = tare + (full - tare) * load_fraction;
        distance_km * combined_weight / 180.0
    }
}

/// Identity `TTNN`: type prefix plus a two-digit (or wider) unit number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub String);

impl VehicleId {
    pub fn new(vehicle_type: VehicleType, unit: u32) -> Self {
        VehicleId(format!("{}{:02}", vehicle_type.prefix(), unit))
    }
}

impl Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VehicleId {
    fn from(s: &str) -> Self {
        VehicleId(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleStatus {
    Available,
    Driving,
    Refueling,
    Reloading,
    Serving,
    Maintenance,
    Idle,
    Unavailable,
}

impl VehicleStatus {
    pub fn is_available_for_assignment(&self) -> bool {
        matches!(self, VehicleStatus::Available | VehicleStatus::Idle)
    }
}

/// A single truck. Owned exclusively by the Environment (§3); plans and
/// evaluators reference it by `VehicleId` and operate on clones, never on
/// the canonical instance directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub vehicle_type: VehicleType,
    pub position: Position,
    pub current_lpg_m3: f64,
    pub current_fuel_gal: f64,
    pub status: VehicleStatus,
}

impl Vehicle {
    pub fn new_full(id: VehicleId, vehicle_type: VehicleType, position: Position) -> Self {
        Self {
            id,
            current_lpg_m3: vehicle_type.lpg_capacity_m3(),
            current_fuel_gal: vehicle_type.fuel_tank_capacity_gal(),
            vehicle_type,
            position,
            status: VehicleStatus::Available,
        }
    }

    pub fn check_invariants(&self) -> bool {
        (0.0..=self.vehicle_type.lpg_capacity_m3() + f64::EPSILON).contains(&self.current_lpg_m3)
            && (0.0..=self.vehicle_type.fuel_tank_capacity_gal() + f64::EPSILON)
                .contains(&self.current_fuel_gal)
    }

    pub fn fuel_for_leg(&self, distance_km: f64) -> f64 {
        self.vehicle_type.fuel_for_leg(distance_km, self.current_lpg_m3)
    }
}

define_map!(VehicleId, Vehicle, VehicleMap);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuel_scales_with_load() {
        let empty = VehicleType::Ta.fuel_for_leg(10.0, 0.0);
        let full = VehicleType::Ta.fuel_for_leg(10.0, 25.0);
        assert!(full > empty);
        assert!((empty - 10.0 * 2.5 / 180.0).abs() < 1e-9);
        assert!((full - 10.0 * 15.0 / 180.0).abs() < 1e-9);
    }

    #[test]
    fn vehicle_id_format() {
        let id = VehicleId::new(VehicleType::Ta, 1);
        assert_eq!(id.to_string(), "TA01");
    }

    #[test]
    fn new_full_vehicle_satisfies_invariants() {
        let v = Vehicle::new_full(VehicleId::new(VehicleType::Tc, 3), VehicleType::Tc, Position::new(0, 0));
        assert!(v.check_invariants());
        assert_eq!(v.current_lpg_m3, 10.0);
        assert_eq!(v.current_fuel_gal, 25.0);
    }
}
