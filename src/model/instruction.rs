use serde::{Deserialize, Serialize};

use super::order::OrderId;

/// A commitment to deliver `amount_m3` of `order_id` (§3). Splitting is
/// allowed: several instructions across different vehicles may together
/// satisfy one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryInstruction {
    pub order_id: OrderId,
    pub amount_m3: i32,
}

impl DeliveryInstruction {
    pub fn new(order_id: OrderId, amount_m3: i32) -> Self {
        Self { order_id, amount_m3 }
    }
}
