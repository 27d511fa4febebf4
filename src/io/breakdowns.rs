//! Breakdown catalogue format (§6.1): `averias.txt`, one record per line,
//! `Tk_TTNN_TIm` (shift, vehicle, incident type). The file carries no date -
//! every record is anchored to a single reference day supplied by the
//! caller (the simulation's start day; see DESIGN.md's Open Question note).

use std::path::Path;

use chrono::NaiveDate;

use crate::model::{
    incident::{Incident, IncidentType, Shift},
    vehicle::VehicleId,
};

use super::parse_lines;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakdownRecord {
    pub shift: Shift,
    pub vehicle_id: VehicleId,
    pub incident_type: IncidentType,
}

fn parse_shift(s: &str) -> Result<Shift, String> {
    match s {
        "T1" => Ok(Shift::T1),
        "T2" => Ok(Shift::T2),
        "T3" => Ok(Shift::T3),
        other => Err(format!("unknown shift `{other}`")),
    }
}

fn parse_incident_type(s: &str) -> Result<IncidentType, String> {
    match s {
        "TI1" => Ok(IncidentType::Ti1),
        "TI2" => Ok(IncidentType::Ti2),
        "TI3" => Ok(IncidentType::Ti3),
        other => Err(format!("unknown incident type `{other}`")),
    }
}

pub fn parse_line(line: &str) -> Result<BreakdownRecord, String> {
    let parts: Vec<&str> = line.split('_').collect();
    let [shift_str, vehicle_str, type_str] = parts.as_slice() else {
        return Err(format!("expected `Tk_TTNN_TIm`, got `{line}`"));
    };

    let shift = parse_shift(shift_str)?;
    if vehicle_str.len() != 4 {
        return Err(format!("expected `TTNN` vehicle id, got `{vehicle_str}`"));
    }
    let incident_type = parse_incident_type(type_str)?;

    Ok(BreakdownRecord { shift, vehicle_id: VehicleId::from(*vehicle_str), incident_type })
}

pub fn to_incident(record: &BreakdownRecord, anchor_date: NaiveDate) -> Incident {
    let occurred_at = anchor_date.and_time(record.shift.start_time());
    Incident::new(record.vehicle_id.clone(), occurred_at, record.incident_type)
}

pub fn parse_breakdowns_file(path: impl AsRef<Path>, anchor_date: NaiveDate) -> std::io::Result<Vec<Incident>> {
    let records = parse_lines(path.as_ref(), parse_line)?;
    Ok(records.iter().map(|r| to_incident(r, anchor_date)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_shift_vehicle_and_incident_type() {
        let record = parse_line("T2_TA01_TI3").unwrap();
        assert_eq!(record.shift, Shift::T2);
        assert_eq!(record.vehicle_id, VehicleId::from("TA01"));
        assert_eq!(record.incident_type, IncidentType::Ti3);
    }

    #[test]
    fn anchors_occurrence_to_the_supplied_date() {
        let record = parse_line("T1_TB02_TI1").unwrap();
        let anchor = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let incident = to_incident(&record, anchor);
        assert_eq!(incident.occurred_at, anchor.and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn rejects_an_unknown_shift_or_incident_type() {
        assert!(parse_line("T4_TA01_TI1").is_err());
        assert!(parse_line("T1_TA01_TI9").is_err());
        assert!(parse_line("T1_TA01").is_err());
    }
}
