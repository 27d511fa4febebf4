use std::fmt::Display;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::define_map;

use super::position::Position;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        OrderId(s.to_string())
    }
}

/// A customer delivery request (§3). `remaining_m3` shrinks as SERVE actions
/// execute against it; partial delivery is permitted, so `delivered` only
/// flips true once `remaining_m3` reaches zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_position: Position,
    pub arrival_time: NaiveDateTime,
    pub due_time: NaiveDateTime,
    pub requested_m3: i32,
    pub remaining_m3: i32,
    pub delivered: bool,
}

impl Order {
    pub fn new(
        id: OrderId,
        customer_position: Position,
        arrival_time: NaiveDateTime,
        limit_hours: i64,
        requested_m3: i32,
    ) -> Self {
        Self {
            id,
            customer_position,
            arrival_time,
            due_time: arrival_time + chrono::Duration::hours(limit_hours),
            requested_m3,
            remaining_m3: requested_m3,
            delivered: false,
        }
    }

    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        now > self.due_time
    }

    pub fn is_served(&self) -> bool {
        self.remaining_m3 == 0
    }

    pub fn assigned_m3(&self) -> i32 {
        self.requested_m3 - self.remaining_m3
    }

    /// Apply a SERVE action for `amount_m3`; clamps to avoid a negative
    /// remainder and flips `delivered` once the order is fully covered.
    pub fn apply_delivery(&mut self, amount_m3: i32) {
        self.remaining_m3 = (self.remaining_m3 - amount_m3).max(0);
        if self.remaining_m3 == 0 {
            self.delivered = true;
        }
    }
}

define_map!(OrderId, Order, OrderMap);
