use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::vehicle::VehicleId;

/// Recurs bimonthly (§3): a 24-hour window on the scheduled day during which
/// `vehicle` is pulled from service, returned to the main plant, and held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceTask {
    pub vehicle_id: VehicleId,
    pub day: NaiveDate,
}

impl MaintenanceTask {
    pub fn new(vehicle_id: VehicleId, day: NaiveDate) -> Self {
        Self { vehicle_id, day }
    }

    pub fn window(&self) -> (NaiveDateTime, NaiveDateTime) {
        let start = self.day.and_time(NaiveTime::MIN);
        let end = self.day.and_time(NaiveTime::from_hms_opt(23, 59, 0).unwrap());
        (start, end)
    }

    pub fn is_active_at(&self, t: NaiveDateTime) -> bool {
        let (start, end) = self.window();
        (start..=end).contains(&t)
    }

    pub fn next_occurrence(&self) -> MaintenanceTask {
        MaintenanceTask {
            vehicle_id: self.vehicle_id.clone(),
            day: self.day + chrono::Duration::days(60),
        }
    }
}
