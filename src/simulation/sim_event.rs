use chrono::NaiveDateTime;

use crate::model::{
    blockage::BlockageId, incident::Incident, maintenance::MaintenanceTask, order::Order, vehicle::VehicleId,
};

use super::event_queue::Event;

/// Fixed same-timestamp ordering (§5): lower numeric value fires first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SimEventKind {
    OrderArrival,
    BlockageStart,
    BlockageEnd,
    MaintenanceEnd,
    IncidentResolve,
    IncidentTrigger,
    MaintenanceStart,
    Replan,
    SimulationEnd,
}

impl SimEventKind {
    fn priority(&self) -> u8 {
        *self as u8
    }
}

#[derive(Debug, Clone)]
pub enum SimEventPayload {
    OrderArrival(Order),
    BlockageStart(BlockageId),
    BlockageEnd(BlockageId),
    MaintenanceStart(MaintenanceTask),
    MaintenanceEnd(MaintenanceTask),
    IncidentTrigger(Incident),
    IncidentResolve(VehicleId),
    Replan,
    SimulationEnd,
}

/// One entry in the orchestrator's priority queue (§4.7): a timestamp, a
/// kind controlling same-timestamp ordering, and the payload needed to
/// apply that event's semantics to the Environment.
#[derive(Debug, Clone)]
pub struct SimEvent {
    pub time: NaiveDateTime,
    pub kind: SimEventKind,
    pub entity_id: String,
    pub payload: SimEventPayload,
}

impl SimEvent {
    pub fn new(time: NaiveDateTime, entity_id: impl Into<String>, payload: SimEventPayload) -> Self {
        let kind = match &payload {
            SimEventPayload::OrderArrival(_) => SimEventKind::OrderArrival,
            SimEventPayload::BlockageStart(_) => SimEventKind::BlockageStart,
            SimEventPayload::BlockageEnd(_) => SimEventKind::BlockageEnd,
            SimEventPayload::MaintenanceEnd(_) => SimEventKind::MaintenanceEnd,
            SimEventPayload::IncidentResolve(_) => SimEventKind::IncidentResolve,
            SimEventPayload::IncidentTrigger(_) => SimEventKind::IncidentTrigger,
            SimEventPayload::MaintenanceStart(_) => SimEventKind::MaintenanceStart,
            SimEventPayload::Replan => SimEventKind::Replan,
            SimEventPayload::SimulationEnd => SimEventKind::SimulationEnd,
        };
        Self {
            time,
            kind,
            entity_id: entity_id.into(),
            payload,
        }
    }
}

impl Event for SimEvent {
    fn time(&self) -> NaiveDateTime {
        self.time
    }

    fn priority(&self) -> u8 {
        self.kind.priority()
    }

    fn entity_key(&self) -> &str {
        &self.entity_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_ordering_matches_the_fixed_priority_list() {
        assert!(SimEventKind::OrderArrival < SimEventKind::BlockageStart);
        assert!(SimEventKind::BlockageStart < SimEventKind::BlockageEnd);
        assert!(SimEventKind::BlockageEnd < SimEventKind::MaintenanceEnd);
        assert!(SimEventKind::MaintenanceEnd < SimEventKind::IncidentResolve);
        assert!(SimEventKind::IncidentResolve < SimEventKind::IncidentTrigger);
        assert!(SimEventKind::IncidentTrigger < SimEventKind::MaintenanceStart);
        assert!(SimEventKind::MaintenanceStart < SimEventKind::Replan);
        assert!(SimEventKind::Replan < SimEventKind::SimulationEnd);
    }
}
