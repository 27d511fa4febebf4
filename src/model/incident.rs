use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::vehicle::VehicleId;

/// One of the three 8-hour windows used to describe incident timing and
/// workshop-release rules (§3, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Shift {
    T1,
    T2,
    T3,
}

impl Shift {
    pub fn containing(time: NaiveTime) -> Shift {
        if time < NaiveTime::from_hms_opt(8, 0, 0).unwrap() {
            Shift::T1
        } else if time < NaiveTime::from_hms_opt(16, 0, 0).unwrap() {
            Shift::T2
        } else {
            Shift::T3
        }
    }

    pub fn start_time(&self) -> NaiveTime {
        match self {
            Shift::T1 => NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            Shift::T2 => NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            Shift::T3 => NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
        }
    }

    fn index0(&self) -> u32 {
        match self {
            Shift::T1 => 0,
            Shift::T2 => 1,
            Shift::T3 => 2,
        }
    }

    fn from_index0(i: u32) -> Shift {
        match i % 3 {
            0 => Shift::T1,
            1 => Shift::T2,
            _ => Shift::T3,
        }
    }

    /// The shift two slots after this one, plus whether that lands on the
    /// following calendar day (shift index wraps below its start).
    fn plus_two(&self) -> (Shift, bool) {
        let new_index = (self.index0() + 2) % 3;
        (Shift::from_index0(new_index), new_index < self.index0())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncidentType {
    /// 2h on-site, no workshop time.
    Ti1,
    /// 2h on-site + 1 shift in workshop.
    Ti2,
    /// 4h on-site + a full day in workshop.
    Ti3,
}

impl IncidentType {
    /// Infers the incident type from an estimated repair duration, as the
    /// control API's `/vehicle/breakdown` endpoint does (§6.2): <= 2h -> TI1,
    /// 3-24h -> TI2, > 24h -> TI3.
    pub fn from_estimated_hours(hours: f64) -> IncidentType {
        if hours <= 2.0 {
            IncidentType::Ti1
        } else if hours <= 24.0 {
            IncidentType::Ti2
        } else {
            IncidentType::Ti3
        }
    }

    pub fn on_site_duration(&self) -> Duration {
        match self {
            IncidentType::Ti1 => Duration::hours(2),
            IncidentType::Ti2 => Duration::hours(2),
            IncidentType::Ti3 => Duration::hours(4),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub vehicle_id: VehicleId,
    pub occurred_at: NaiveDateTime,
    pub incident_type: IncidentType,
}

impl Incident {
    pub fn new(vehicle_id: VehicleId, occurred_at: NaiveDateTime, incident_type: IncidentType) -> Self {
        Self {
            vehicle_id,
            occurred_at,
            incident_type,
        }
    }

    /// The instant the vehicle becomes available again, per §3's
    /// availability-after-workshop rules.
    pub fn available_at(&self) -> NaiveDateTime {
        let day: NaiveDate = self.occurred_at.date();
        let shift = Shift::containing(self.occurred_at.time());
        match self.incident_type {
            IncidentType::Ti1 => self.occurred_at + self.incident_type.on_site_duration(),
            IncidentType::Ti2 => {
                let (release_shift, rolls_over) = shift.plus_two();
                let release_day = if rolls_over { day + Duration::days(1) } else { day };
                release_day.and_time(release_shift.start_time())
            }
            IncidentType::Ti3 => (day + Duration::days(3)).and_time(Shift::T1.start_time()),
        }
    }

    pub fn is_active_at(&self, t: NaiveDateTime) -> bool {
        t < self.available_at()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(day: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn ti1_is_available_after_two_hours_on_site() {
        let inc = Incident::new(VehicleId::from("TA01"), dt(1, 9), IncidentType::Ti1);
        assert_eq!(inc.available_at(), dt(1, 11));
    }

    #[test]
    fn ti2_in_t1_releases_same_day_t3() {
        let inc = Incident::new(VehicleId::from("TA01"), dt(1, 3), IncidentType::Ti2);
        assert_eq!(inc.available_at(), dt(1, 16));
    }

    #[test]
    fn ti2_in_t2_releases_next_day_t1() {
        let inc = Incident::new(VehicleId::from("TA01"), dt(1, 10), IncidentType::Ti2);
        assert_eq!(inc.available_at(), dt(2, 0));
    }

    #[test]
    fn ti2_in_t3_releases_next_day_t2() {
        let inc = Incident::new(VehicleId::from("TA01"), dt(1, 18), IncidentType::Ti2);
        assert_eq!(inc.available_at(), dt(2, 8));
    }

    #[test]
    fn ti3_releases_day_plus_three_at_t1() {
        let inc = Incident::new(VehicleId::from("TA01"), dt(1, 20), IncidentType::Ti3);
        assert_eq!(inc.available_at(), dt(4, 0));
    }

    #[test]
    fn estimated_hours_infer_incident_type() {
        assert_eq!(IncidentType::from_estimated_hours(1.0), IncidentType::Ti1);
        assert_eq!(IncidentType::from_estimated_hours(10.0), IncidentType::Ti2);
        assert_eq!(IncidentType::from_estimated_hours(48.0), IncidentType::Ti3);
    }
}
