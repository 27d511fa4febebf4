use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::{
    depot::{Depot, DepotId},
    position::{GridBounds, Position},
    vehicle::{Vehicle, VehicleId, VehicleType},
};

/// One depot's placement, as it appears in the typed configuration layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepotConfig {
    pub id: String,
    pub x: i32,
    pub y: i32,
}

/// Everything the bootstrap process needs to stand up a default
/// Environment and wire the control surface (§2 C11). Loaded with the
/// `config` crate's layered precedence: built-in defaults, then an
/// optional `<data-dir>/config.toml`, then `LPG__*` environment
/// variables, in that order - each layer only overrides keys it sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub grid_width: i32,
    pub grid_height: i32,
    pub main_depot: DepotConfig,
    pub auxiliary_depots: Vec<DepotConfig>,
    /// Simulated minutes advanced per tick (§4.7 default: 1).
    pub tick_minutes: i64,
    /// Real-world milliseconds between ticks, clamped to [50, 10000] by the
    /// orchestrator (§6.2).
    pub tick_speed_ms: u64,
    pub http_port: u16,
    pub transfer_minutes: i64,
    pub serve_minutes: i64,
    pub maintenance_minutes: i64,
    pub optimizer_max_iterations: usize,
}

impl Default for SimConfig {
    /// The default 70x50 city (§3) with the main plant placed at the
    /// position used throughout the worked examples (§8 scenario 1) and
    /// two auxiliary depots spread toward opposite corners - exact
    /// auxiliary placement is left to the implementer (see DESIGN.md).
    fn default() -> Self {
        Self {
            grid_width: 70,
            grid_height: 50,
            main_depot: DepotConfig { id: "MAIN".into(), x: 12, y: 8 },
            auxiliary_depots: vec![
                DepotConfig { id: "AUX1".into(), x: 42, y: 10 },
                DepotConfig { id: "AUX2".into(), x: 20, y: 40 },
            ],
            tick_minutes: 1,
            tick_speed_ms: 200,
            http_port: 8080,
            transfer_minutes: 10,
            serve_minutes: 15,
            maintenance_minutes: 15,
            optimizer_max_iterations: 3000,
        }
    }
}

impl SimConfig {
    /// Layers `<data-dir>/config.toml` (if present) and `LPG__*`
    /// environment variables over the built-in defaults.
    pub fn load(data_dir: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&SimConfig::default())?);

        if let Some(dir) = data_dir {
            let candidate = dir.join("config.toml");
            if candidate.exists() {
                builder = builder.add_source(config::File::from(candidate));
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix("LPG").separator("__"),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn grid(&self) -> GridBounds {
        GridBounds { width: self.grid_width, height: self.grid_height }
    }

    /// The main plant plus every auxiliary depot, ready to drop straight
    /// into an `Environment` (§4.1).
    pub fn depots(&self) -> Vec<Depot> {
        let mut depots = vec![Depot::main_plant(
            DepotId::from(self.main_depot.id.as_str()),
            Position::new(self.main_depot.x, self.main_depot.y),
        )];
        for aux in &self.auxiliary_depots {
            depots.push(Depot::auxiliary(
                DepotId::from(aux.id.as_str()),
                Position::new(aux.x, aux.y),
            ));
        }
        depots
    }

    /// The default fleet (§3): every `VehicleType` variant, `unit_count`
    /// copies each, identities `TTNN` numbered from 1, all starting full at
    /// the main plant.
    pub fn default_fleet(&self) -> Vec<Vehicle> {
        let main = Position::new(self.main_depot.x, self.main_depot.y);
        let mut fleet = vec![];
        for vehicle_type in VehicleType::ALL {
            for unit in 1..=vehicle_type.unit_count() {
                fleet.push(Vehicle::new_full(VehicleId::new(vehicle_type, unit), vehicle_type, main));
            }
        }
        fleet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_the_seventy_by_fifty_grid() {
        let config = SimConfig::default();
        assert_eq!(config.grid(), GridBounds { width: 70, height: 50 });
    }

    #[test]
    fn default_fleet_has_twenty_vehicles_across_four_types() {
        let config = SimConfig::default();
        let fleet = config.default_fleet();
        assert_eq!(fleet.len(), 20);
        assert!(fleet.iter().any(|v| v.id == VehicleId::from("TA01")));
        assert!(fleet.iter().any(|v| v.id == VehicleId::from("TD10")));
    }

    #[test]
    fn depots_include_main_plus_two_auxiliaries() {
        let config = SimConfig::default();
        let depots = config.depots();
        assert_eq!(depots.len(), 3);
        assert!(depots.iter().any(|d| d.is_main));
        assert_eq!(depots.iter().filter(|d| !d.is_main).count(), 2);
    }

    #[test]
    fn load_with_no_data_dir_returns_defaults() {
        let config = SimConfig::load(None).expect("defaults always load");
        assert_eq!(config.http_port, 8080);
    }

    #[test]
    fn config_toml_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "http_port = 9090\n").unwrap();

        let config = SimConfig::load(Some(dir.path())).expect("config.toml should load");
        assert_eq!(config.http_port, 9090);
        // an untouched key still falls back to its built-in default.
        assert_eq!(config.tick_speed_ms, 200);
    }

    #[test]
    fn env_var_overrides_both_defaults_and_config_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "http_port = 9090\n").unwrap();

        std::env::set_var("LPG__HTTP_PORT", "7070");
        let config = SimConfig::load(Some(dir.path()));
        std::env::remove_var("LPG__HTTP_PORT");

        assert_eq!(config.expect("layered load should succeed").http_port, 7070);
    }
}
