//! Scans a data directory for the input files named per §6.1's
//! conventions, parses whichever are present, and assembles them into a
//! ready-to-run `Environment` plus its seed event queue.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::info;

use crate::{
    config::SimConfig,
    environment::Environment,
    simulation::{
        event_queue::EventQueue,
        sim_event::{SimEvent, SimEventPayload},
    },
};

use super::{blockages, breakdowns, maintenance, orders};

/// An order-file or blockage-file name carries the `YYYY`/`MM` it covers in
/// its own name (`ventas<YYYY><MM>`, `<YYYY><MM>.bloqueos`); this recovers
/// that pair from the trailing 6 digits of a file stem.
fn year_month_from_name(stem: &str) -> Option<(i32, u32)> {
    let digits: String = stem.chars().rev().take(6).collect::<String>().chars().rev().collect();
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year: i32 = digits[0..4].parse().ok()?;
    let month: u32 = digits[4..6].parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    Some((year, month))
}

/// Builds the initial `Environment` (default grid, depots and fleet from
/// `config`) and a seed `EventQueue` from every recognized file under
/// `data_dir`. Missing files are not an error - an empty data directory
/// yields an otherwise-empty simulation seeded only with a `SimulationEnd`
/// marker left for the caller to add.
pub fn bootstrap(
    config: &SimConfig,
    data_dir: &Path,
    start: NaiveDateTime,
) -> std::io::Result<(Environment, EventQueue<SimEvent>)> {
    let mut environment = Environment::new(start, config.grid());
    for depot in config.depots() {
        environment.depots.insert(depot.id.clone(), depot);
    }
    for vehicle in config.default_fleet() {
        environment.vehicles.insert(vehicle.id.clone(), vehicle);
    }

    let mut events = EventQueue::new();
    let anchor_date: NaiveDate = start.date();

    let entries = std::fs::read_dir(data_dir)?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let name = path.file_name().and_then(|s| s.to_str()).unwrap_or_default();

        if let Some(rest) = stem.strip_prefix("ventas") {
            let Some((year, month)) = year_month_from_name(rest) else { continue };
            let parsed = orders::parse_orders_file(&path, year, month)?;
            info!(file = %path.display(), count = parsed.len(), "loaded orders");
            for order in parsed {
                events.push(SimEvent::new(order.arrival_time, order.id.to_string(), SimEventPayload::OrderArrival(order)));
            }
        } else if name.ends_with(".bloqueos") {
            let Some((year, month)) = year_month_from_name(stem) else { continue };
            let parsed = blockages::parse_blockages_file(&path, year, month)?;
            info!(file = %path.display(), count = parsed.len(), "loaded blockages");
            for blockage in parsed {
                events.push(SimEvent::new(blockage.start, blockage.id.to_string(), SimEventPayload::BlockageStart(blockage.id.clone())));
                events.push(SimEvent::new(blockage.end, blockage.id.to_string(), SimEventPayload::BlockageEnd(blockage.id.clone())));
                environment.add_blockage(blockage);
            }
        } else if name == "mantpreventivo" {
            let parsed = maintenance::parse_maintenance_file(&path)?;
            info!(file = %path.display(), count = parsed.len(), "loaded maintenance schedule");
            for task in parsed {
                let (window_start, window_end) = task.window();
                events.push(SimEvent::new(window_start, task.vehicle_id.to_string(), SimEventPayload::MaintenanceStart(task.clone())));
                events.push(SimEvent::new(window_end, task.vehicle_id.to_string(), SimEventPayload::MaintenanceEnd(task.clone())));
                environment.add_maintenance(task);
            }
        } else if name == "averias.txt" {
            let parsed = breakdowns::parse_breakdowns_file(&path, anchor_date)?;
            info!(file = %path.display(), count = parsed.len(), "loaded breakdown catalogue");
            for incident in parsed {
                let resolve_at = incident.available_at();
                events.push(SimEvent::new(incident.occurred_at, incident.vehicle_id.to_string(), SimEventPayload::IncidentTrigger(incident.clone())));
                events.push(SimEvent::new(resolve_at, incident.vehicle_id.to_string(), SimEventPayload::IncidentResolve(incident.vehicle_id.clone())));
            }
        }
    }

    Ok((environment, events))
}
