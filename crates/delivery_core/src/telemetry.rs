//! Telemetry / KPIs: run counters and records of finished orders.

use std::collections::HashMap;

use bevy_ecs::prelude::Resource;

use crate::clock::{CancelReason, EventKind};
use crate::ecs::OrderStatus;

/// One order removed from the world by the reconciler after reaching a
/// terminal status. Timestamps are simulation milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedOrderRecord {
    pub order_id: String,
    pub user_id: String,
    pub restaurant_id: String,
    pub courier_id: Option<String>,
    pub status: OrderStatus,
    pub cancel_reason: Option<CancelReason>,
    pub total_amount: f64,
    pub placed_at: u64,
    pub picked_up_at: Option<u64>,
    pub delivered_at: Option<u64>,
    pub cancelled_at: Option<u64>,
    pub estimated_delivery_time: u64,
    pub assignment_attempts: u32,
    pub review_generated: bool,
}

impl CompletedOrderRecord {
    /// Placement to hand-over.
    pub fn delivery_duration(&self) -> Option<u64> {
        self.delivered_at.map(|t| t.saturating_sub(self.placed_at))
    }

    /// Actual minus promised delivery time, in ms (negative = early).
    pub fn lateness_ms(&self) -> Option<i64> {
        self.delivered_at
            .map(|t| t as i64 - self.estimated_delivery_time as i64)
    }
}

/// Inconsistencies the reconciler can repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepairKind {
    /// Order outlived the maximum order duration.
    OrderTimedOut,
    /// Courier pointed at an order that no longer exists or is terminal.
    DanglingCourier,
    /// Busy courier without an order, or available courier with one.
    CourierStatusMismatch,
    /// Order pointed at a courier that is not working on it. Orders already
    /// picked up are cancelled as well.
    DanglingOrderCourier,
    /// Ready order without courier and without a pending assignment, or one
    /// whose retries ran out while a courier is now free nearby.
    AssignmentReissued,
    /// Restaurant listed an order that is gone or already handed over.
    StaleRestaurantOrder,
}

/// Aggregated counts at a point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimCounts {
    pub users: usize,
    pub restaurants: usize,
    pub couriers_available: usize,
    pub couriers_busy: usize,
    pub orders_active: usize,
    pub pending_events: usize,
}

/// Collects simulation telemetry.
#[derive(Debug, Default, Resource)]
pub struct SimTelemetry {
    pub orders_placed: u64,
    pub orders_delivered: u64,
    pub orders_cancelled: HashMap<CancelReason, u64>,
    pub placement_failures: u64,
    pub reviews_generated: u64,
    pub assignment_retries: u64,
    pub assignments_abandoned: u64,
    pub repairs: HashMap<RepairKind, u64>,
    pub dropped_events: HashMap<EventKind, u64>,
    pub events_processed: u64,
    pub output_errors: u64,
    pub ticks: u64,
    pub completed_orders: Vec<CompletedOrderRecord>,
}

impl SimTelemetry {
    pub fn record_cancel(&mut self, reason: CancelReason) {
        *self.orders_cancelled.entry(reason).or_default() += 1;
    }

    pub fn record_repair(&mut self, kind: RepairKind) {
        *self.repairs.entry(kind).or_default() += 1;
    }

    pub fn record_dropped(&mut self, kind: EventKind) {
        *self.dropped_events.entry(kind).or_default() += 1;
    }

    pub fn cancelled(&self, reason: CancelReason) -> u64 {
        self.orders_cancelled.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_cancelled(&self) -> u64 {
        self.orders_cancelled.values().sum()
    }

    pub fn repairs_of(&self, kind: RepairKind) -> u64 {
        self.repairs.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_dropped(&self) -> u64 {
        self.dropped_events.values().sum()
    }

    /// Mean placement-to-delivery time of delivered orders swept so far.
    pub fn mean_delivery_duration_ms(&self) -> Option<f64> {
        let durations: Vec<u64> = self
            .completed_orders
            .iter()
            .filter_map(CompletedOrderRecord::delivery_duration)
            .collect();
        if durations.is_empty() {
            return None;
        }
        Some(durations.iter().sum::<u64>() as f64 / durations.len() as f64)
    }
}
