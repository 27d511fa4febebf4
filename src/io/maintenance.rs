//! Preventive maintenance schedule format (§6.1): `mantpreventivo`, one
//! record per line, `YYYYMMDD:TTNN`.

use std::path::Path;

use chrono::NaiveDate;

use crate::model::{maintenance::MaintenanceTask, vehicle::VehicleId};

use super::parse_lines;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceRecord {
    pub day: NaiveDate,
    pub vehicle_id: VehicleId,
}

pub fn parse_line(line: &str) -> Result<MaintenanceRecord, String> {
    let (date_str, vehicle_str) = line
        .split_once(':')
        .ok_or_else(|| format!("missing `:` in `{line}`"))?;

    if date_str.len() != 8 || !date_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("expected `YYYYMMDD` date, got `{date_str}`"));
    }
    let year: i32 = date_str[0..4].parse().map_err(|_| format!("bad year `{date_str}`"))?;
    let month: u32 = date_str[4..6].parse().map_err(|_| format!("bad month `{date_str}`"))?;
    let day: u32 = date_str[6..8].parse().map_err(|_| format!("bad day `{date_str}`"))?;
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| format!("invalid calendar date `{date_str}`"))?;

    if vehicle_str.len() != 4 {
        return Err(format!("expected `TTNN` vehicle id, got `{vehicle_str}`"));
    }

    Ok(MaintenanceRecord { day: date, vehicle_id: VehicleId::from(vehicle_str) })
}

pub fn to_maintenance_task(record: &MaintenanceRecord) -> MaintenanceTask {
    MaintenanceTask::new(record.vehicle_id.clone(), record.day)
}

pub fn parse_maintenance_file(path: impl AsRef<Path>) -> std::io::Result<Vec<MaintenanceTask>> {
    let records = parse_lines(path.as_ref(), parse_line)?;
    Ok(records.iter().map(to_maintenance_task).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_scheduled_day_and_vehicle() {
        let record = parse_line("20260305:TA01").unwrap();
        assert_eq!(record.day, NaiveDate::from_ymd_opt(2026, 3, 5).unwrap());
        assert_eq!(record.vehicle_id, VehicleId::from("TA01"));
    }

    #[test]
    fn rejects_an_invalid_calendar_date() {
        assert!(parse_line("20260230:TA01").is_err());
    }

    #[test]
    fn rejects_a_malformed_line() {
        assert!(parse_line("2026-03-05:TA01").is_err());
        assert!(parse_line("20260305-TA01").is_err());
    }
}
