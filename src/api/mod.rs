//! The HTTP control surface (§6.2, C10): an axum `Router` sharing one
//! `Arc<tokio::sync::Mutex<SimulationHandle>>` with the tick-loop task.
//! Handlers never hold the mutex across an `.await` other than the lock
//! acquisition itself.

use std::sync::{atomic::AtomicBool, Arc};

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::ApiError,
    model::{
        incident::{Incident, IncidentType},
        order::{Order, OrderId},
        position::Position,
        vehicle::{VehicleId, VehicleStatus, VehicleType},
        Map,
    },
    simulation::{SimEvent, SimEventPayload, SimulationHandle},
};

/// Shared state handed to every handler (§5): the guarded simulation plus a
/// cancellation flag the optimizer checks mid-search.
#[derive(Clone)]
pub struct AppState {
    pub handle: Arc<tokio::sync::Mutex<SimulationHandle>>,
    pub cancel: Arc<AtomicBool>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/simulation/status", get(simulation_status))
        .route("/simulation/start", post(simulation_start))
        .route("/simulation/pause", post(simulation_pause))
        .route("/simulation/reset", post(simulation_reset))
        .route("/simulation/speed", get(simulation_speed_get).post(simulation_speed_post))
        .route("/environment", get(environment_snapshot))
        .route("/vehicle/breakdown", post(vehicle_breakdown))
        .route("/vehicle/repair", post(vehicle_repair))
        .route("/order", post(submit_order))
        .with_state(state)
}

fn success(body: Value) -> Json<Value> {
    let mut map = match body {
        Value::Object(map) => map,
        other => {
            let mut m = serde_json::Map::new();
            m.insert("value".into(), other);
            m
        }
    };
    map.insert("status".into(), json!("success"));
    Json(Value::Object(map))
}

async fn simulation_status(State(state): State<AppState>) -> Json<Value> {
    let status = state.handle.lock().await.status();
    success(json!(status))
}

async fn simulation_start(State(state): State<AppState>) -> Json<Value> {
    state.handle.lock().await.start();
    success(json!({}))
}

async fn simulation_pause(State(state): State<AppState>) -> Json<Value> {
    state.handle.lock().await.pause();
    success(json!({}))
}

async fn simulation_reset(State(state): State<AppState>) -> Json<Value> {
    state.cancel.store(true, std::sync::atomic::Ordering::SeqCst);
    state.handle.lock().await.reset();
    state.cancel.store(false, std::sync::atomic::Ordering::SeqCst);
    success(json!({}))
}

#[derive(Serialize)]
struct SpeedResponse {
    #[serde(rename = "currentSpeed")]
    current_speed: u64,
    unit: &'static str,
    #[serde(rename = "simulationRunning")]
    simulation_running: bool,
}

async fn simulation_speed_get(State(state): State<AppState>) -> Json<Value> {
    let guard = state.handle.lock().await;
    success(json!(SpeedResponse {
        current_speed: guard.tick_speed_ms(),
        unit: "milliseconds",
        simulation_running: guard.is_running(),
    }))
}

#[derive(Deserialize)]
struct SpeedRequest {
    speed: u64,
}

async fn simulation_speed_post(State(state): State<AppState>, Json(req): Json<SpeedRequest>) -> Result<Json<Value>, ApiError> {
    let mut guard = state.handle.lock().await;
    guard.set_speed(req.speed).map_err(ApiError::BadRequest)?;
    Ok(success(json!(SpeedResponse {
        current_speed: guard.tick_speed_ms(),
        unit: "milliseconds",
        simulation_running: guard.is_running(),
    })))
}

#[derive(Serialize)]
struct FuelView {
    current: f64,
    capacity: f64,
    percent: f64,
}

#[derive(Serialize)]
struct LpgView {
    current: f64,
    capacity: f64,
    percent: f64,
}

#[derive(Serialize)]
struct DriveView {
    path: Vec<Position>,
    start: NaiveDateTime,
    end: NaiveDateTime,
}

#[derive(Serialize)]
struct VehicleView {
    id: String,
    #[serde(rename = "type")]
    vehicle_type: VehicleType,
    status: VehicleStatus,
    position: Position,
    fuel: FuelView,
    lpg: LpgView,
    #[serde(skip_serializing_if = "Option::is_none")]
    drive: Option<DriveView>,
}

#[derive(Serialize)]
struct OrderView {
    id: String,
    position: Position,
    #[serde(rename = "arrivalTime")]
    arrival_time: NaiveDateTime,
    #[serde(rename = "dueTime")]
    due_time: NaiveDateTime,
    overdue: bool,
    #[serde(rename = "requestedM3")]
    requested_m3: i32,
    #[serde(rename = "remainingM3")]
    remaining_m3: i32,
}

#[derive(Serialize)]
struct BlockageView {
    id: String,
    start: NaiveDateTime,
    end: NaiveDateTime,
    polyline: Vec<Position>,
}

#[derive(Serialize)]
struct DepotView {
    id: String,
    position: Position,
    #[serde(rename = "isMain")]
    is_main: bool,
    #[serde(rename = "canRefuel")]
    can_refuel: bool,
    #[serde(rename = "currentM3")]
    current_m3: f64,
    #[serde(rename = "capacityM3")]
    capacity_m3: f64,
}

#[derive(Serialize)]
struct EnvironmentSnapshot {
    now: NaiveDateTime,
    vehicles: Vec<VehicleView>,
    orders: Vec<OrderView>,
    blockages: Vec<BlockageView>,
    depots: Vec<DepotView>,
}

async fn environment_snapshot(State(state): State<AppState>) -> Json<Value> {
    let guard = state.handle.lock().await;
    let env = guard.environment();
    let now = env.now;

    let vehicles = env
        .vehicles
        .values()
        .map(|v| {
            let fuel_capacity = v.vehicle_type.fuel_tank_capacity_gal();
            let lpg_capacity = v.vehicle_type.lpg_capacity_m3();
            let drive = guard.remaining_drive_path(&v.id).map(|d| DriveView { path: d.path, start: d.start, end: d.end });
            VehicleView {
                id: v.id.to_string(),
                vehicle_type: v.vehicle_type,
                status: v.status,
                position: v.position,
                fuel: FuelView {
                    current: v.current_fuel_gal,
                    capacity: fuel_capacity,
                    percent: if fuel_capacity > 0.0 { 100.0 * v.current_fuel_gal / fuel_capacity } else { 0.0 },
                },
                lpg: LpgView {
                    current: v.current_lpg_m3,
                    capacity: lpg_capacity,
                    percent: if lpg_capacity > 0.0 { 100.0 * v.current_lpg_m3 / lpg_capacity } else { 0.0 },
                },
                drive,
            }
        })
        .collect();

    let orders = env
        .orders
        .values()
        .filter(|o| !o.delivered)
        .map(|o| OrderView {
            id: o.id.to_string(),
            position: o.customer_position,
            arrival_time: o.arrival_time,
            due_time: o.due_time,
            overdue: o.is_overdue(now),
            requested_m3: o.requested_m3,
            remaining_m3: o.remaining_m3,
        })
        .collect();

    let blockages = env
        .active_blockages_at(now)
        .into_iter()
        .map(|b| BlockageView {
            id: b.id.to_string(),
            start: b.start,
            end: b.end,
            polyline: b.polyline.clone(),
        })
        .collect();

    let depots = env
        .depots
        .values()
        .map(|d| DepotView {
            id: d.id.to_string(),
            position: d.position,
            is_main: d.is_main,
            can_refuel: d.can_refuel,
            current_m3: d.current_lpg_m3,
            capacity_m3: d.capacity_m3,
        })
        .collect();

    success(json!(EnvironmentSnapshot { now, vehicles, orders, blockages, depots }))
}

#[derive(Deserialize)]
struct BreakdownRequest {
    #[serde(rename = "vehicleId")]
    vehicle_id: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(rename = "estimatedRepairHours", default)]
    estimated_repair_hours: Option<f64>,
}

async fn vehicle_breakdown(State(state): State<AppState>, Json(req): Json<BreakdownRequest>) -> Result<Json<Value>, ApiError> {
    let mut guard = state.handle.lock().await;
    let vehicle_id = VehicleId::from(req.vehicle_id.as_str());
    let now = guard.environment().now;
    if guard.environment().find_vehicle(&vehicle_id).is_none() {
        return Err(ApiError::NotFound(format!("no such vehicle `{vehicle_id}`")));
    }

    let incident_type = IncidentType::from_estimated_hours(req.estimated_repair_hours.unwrap_or(4.0));
    let incident = Incident::new(vehicle_id, now, incident_type);
    guard.trigger_breakdown(incident);
    Ok(success(json!({ "reason": req.reason })))
}

#[derive(Deserialize)]
struct RepairRequest {
    #[serde(rename = "vehicleId")]
    vehicle_id: String,
}

async fn vehicle_repair(State(state): State<AppState>, Json(req): Json<RepairRequest>) -> Result<Json<Value>, ApiError> {
    let mut guard = state.handle.lock().await;
    let vehicle_id = VehicleId::from(req.vehicle_id.as_str());
    if guard.environment().find_vehicle(&vehicle_id).is_none() {
        return Err(ApiError::NotFound(format!("no such vehicle `{vehicle_id}`")));
    }
    guard.trigger_repair(&vehicle_id);
    Ok(success(json!({})))
}

#[derive(Deserialize)]
struct OrderRequest {
    #[serde(rename = "clientId")]
    client_id: String,
    x: i32,
    y: i32,
    #[serde(rename = "m3")]
    m3: i32,
    #[serde(rename = "limitHours")]
    limit_hours: i64,
}

async fn submit_order(State(state): State<AppState>, Json(req): Json<OrderRequest>) -> Result<Json<Value>, ApiError> {
    if req.m3 <= 0 {
        return Err(ApiError::BadRequest("m3 must be positive".into()));
    }
    let mut guard = state.handle.lock().await;
    let now = guard.environment().now;
    let order = Order::new(
        OrderId::from(format!("c-{}-{}", req.client_id, uuid::Uuid::new_v4()).as_str()),
        Position::new(req.x, req.y),
        now,
        req.limit_hours,
        req.m3,
    );
    let id = order.id.to_string();
    guard.environment_mut().add_order(order);
    // An order submitted out-of-band from the file-driven event queue still
    // needs the orchestrator to notice it on the next tick (§4.7 step 2).
    guard.enqueue(SimEvent::new(now, id.clone(), SimEventPayload::Replan));
    Ok(success(json!({ "orderId": id })))
}
