use chrono::{Duration, NaiveDateTime};

use crate::model::{
    blockage::{Blockage, BlockageId},
    depot::{Depot, DepotId, DepotMap},
    incident::Incident,
    maintenance::MaintenanceTask,
    order::{Order, OrderId, OrderMap},
    position::GridBounds,
    vehicle::{Vehicle, VehicleId, VehicleMap, VehicleStatus},
    Map,
};

/// Process-wide world state (§4.1): clock, fleet, depots, orders, blockages,
/// maintenance schedule and active incidents. Owned exclusively by the
/// simulation orchestrator; plans and evaluators only ever see clones.
#[derive(Debug, Clone)]
pub struct Environment {
    pub now: NaiveDateTime,
    pub grid: GridBounds,
    pub vehicles: VehicleMap,
    pub depots: DepotMap,
    pub orders: OrderMap,
    pub blockages: Vec<Blockage>,
    pub maintenance: Vec<MaintenanceTask>,
    pub incidents: Vec<Incident>,
}

impl Environment {
    pub fn new(now: NaiveDateTime, grid: GridBounds) -> Self {
        Self {
            now,
            grid,
            vehicles: VehicleMap::default(),
            depots: DepotMap::default(),
            orders: OrderMap::default(),
            blockages: vec![],
            maintenance: vec![],
            incidents: vec![],
        }
    }

    pub fn main_depot(&self) -> Option<&Depot> {
        self.depots.values().find(|d| d.is_main)
    }

    pub fn auxiliary_depots(&self) -> impl Iterator<Item = &Depot> {
        self.depots.values().filter(|d| !d.is_main)
    }

    /// Vehicles with status AVAILABLE and not currently held by an incident
    /// or maintenance window (§4.1).
    pub fn available_vehicles(&self) -> Vec<&Vehicle> {
        self.vehicles
            .values()
            .filter(|v| {
                v.status.is_available_for_assignment()
                    && !self.is_in_maintenance(&v.id, self.now)
                    && !self.is_incident_held(&v.id, self.now)
            })
            .collect()
    }

    pub fn pending_orders(&self) -> Vec<&Order> {
        self.orders
            .values()
            .filter(|o| !o.delivered && o.remaining_m3 > 0)
            .collect()
    }

    pub fn active_blockages_at(&self, t: NaiveDateTime) -> Vec<&Blockage> {
        self.blockages.iter().filter(|b| b.is_active_at(t)).collect()
    }

    pub fn find_order(&self, id: &OrderId) -> Option<&Order> {
        self.orders.get(id)
    }

    pub fn find_vehicle(&self, id: &VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    pub fn is_in_maintenance(&self, vehicle_id: &VehicleId, t: NaiveDateTime) -> bool {
        self.maintenance
            .iter()
            .any(|m| &m.vehicle_id == vehicle_id && m.is_active_at(t))
    }

    pub fn is_incident_held(&self, vehicle_id: &VehicleId, t: NaiveDateTime) -> bool {
        self.incidents
            .iter()
            .any(|i| &i.vehicle_id == vehicle_id && i.is_active_at(t))
    }

    pub fn advance_clock(&mut self, delta: Duration) {
        self.now += delta;
    }

    pub fn add_order(&mut self, order: Order) {
        self.orders.insert(order.id.clone(), order);
    }

    pub fn add_blockage(&mut self, blockage: Blockage) {
        self.blockages.push(blockage);
    }

    pub fn add_maintenance(&mut self, task: MaintenanceTask) {
        self.maintenance.push(task);
    }

    pub fn add_incident(&mut self, incident: Incident) {
        if let Some(v) = self.vehicles.get_mut(&incident.vehicle_id) {
            v.status = VehicleStatus::Unavailable;
        }
        self.incidents.push(incident);
    }

    pub fn resolve_incident(&mut self, vehicle_id: &VehicleId) {
        self.incidents.retain(|i| &i.vehicle_id != vehicle_id);
        if let Some(v) = self.vehicles.get_mut(vehicle_id) {
            if !self.maintenance.iter().any(|m| &m.vehicle_id == vehicle_id && m.is_active_at(self.now)) {
                v.status = VehicleStatus::Available;
            }
        }
    }

    /// Auxiliary depots refill to capacity; invoked at each midnight (§4.1).
    pub fn refill_aux_depots(&mut self) {
        for depot in self.depots.values_mut().filter(|d| !d.is_main) {
            depot.refill_to_capacity();
        }
    }

    pub fn expire_blockages(&mut self, t: NaiveDateTime) {
        self.blockages.retain(|b| b.end > t);
    }

    pub fn remove_blockage(&mut self, id: &BlockageId) {
        self.blockages.retain(|b| &b.id != id);
    }

    pub fn check_invariants(&self) -> bool {
        self.vehicles.values().all(|v| v.check_invariants())
            && self.depots.values().all(|d| d.check_invariants())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        depot::Depot,
        position::Position,
        vehicle::{VehicleType},
    };
    use chrono::NaiveDate;

    fn base_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn available_vehicles_excludes_maintenance_and_incidents() {
        let mut env = Environment::new(base_time(), GridBounds::default());
        let v1 = Vehicle::new_full(VehicleId::from("TA01"), VehicleType::Ta, Position::new(0, 0));
        let v2 = Vehicle::new_full(VehicleId::from("TA02"), VehicleType::Ta, Position::new(0, 0));
        env.vehicles.insert(v1.id.clone(), v1);
        env.vehicles.insert(v2.id.clone(), v2);
        env.add_maintenance(MaintenanceTask::new(VehicleId::from("TA02"), base_time().date()));

        assert_eq!(env.available_vehicles().len(), 1);
        assert_eq!(env.available_vehicles()[0].id, VehicleId::from("TA01"));
    }

    #[test]
    fn refill_aux_depots_leaves_main_untouched() {
        let mut env = Environment::new(base_time(), GridBounds::default());
        let main = Depot::main_plant(DepotId::from("MAIN"), Position::new(12, 8));
        let mut aux = Depot::auxiliary(DepotId::from("AUX1"), Position::new(30, 30));
        aux.withdraw(50.0);
        env.depots.insert(main.id.clone(), main);
        env.depots.insert(aux.id.clone(), aux);

        env.refill_aux_depots();
        assert_eq!(env.depots.gets(&DepotId::from("AUX1")).current_lpg_m3, 160.0);
    }

    #[test]
    fn expire_blockages_drops_ended_ones() {
        let mut env = Environment::new(base_time(), GridBounds::default());
        env.add_blockage(Blockage::new(
            BlockageId("B1".into()),
            base_time(),
            base_time() + Duration::hours(1),
            vec![Position::new(0, 0), Position::new(0, 1)],
        ));
        env.expire_blockages(base_time() + Duration::hours(2));
        assert!(env.blockages.is_empty());
    }
}
