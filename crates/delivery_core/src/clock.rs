//! Virtual clock and time-ordered event queue.
//!
//! The clock owns the authoritative simulation time (`now`, milliseconds since
//! the scenario start) and a min-heap of pending [Event]s. Events with equal
//! timestamps are returned in insertion order so that a fixed seed always
//! produces the same run.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bevy_ecs::prelude::{Entity, Resource};
use chrono::{DateTime, Utc};

pub const ONE_SEC_MS: u64 = 1000;
pub const ONE_MIN_MS: u64 = 60 * ONE_SEC_MS;
pub const ONE_HOUR_MS: u64 = 60 * ONE_MIN_MS;
pub const ONE_DAY_MS: u64 = 24 * ONE_HOUR_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    PlaceOrder,
    PrepareOrder,
    OrderReady,
    AssignCourier,
    PickUpOrder,
    OrderInTransit,
    CheckDeliveryStatus,
    DeliverOrder,
    CancelOrder,
    UpdateCourierLocation,
    UpdateUserBehaviour,
    UpdateRestaurantStatus,
    GenerateReview,
}

impl EventKind {
    pub const ALL: [EventKind; 13] = [
        EventKind::PlaceOrder,
        EventKind::PrepareOrder,
        EventKind::OrderReady,
        EventKind::AssignCourier,
        EventKind::PickUpOrder,
        EventKind::OrderInTransit,
        EventKind::CheckDeliveryStatus,
        EventKind::DeliverOrder,
        EventKind::CancelOrder,
        EventKind::UpdateCourierLocation,
        EventKind::UpdateUserBehaviour,
        EventKind::UpdateRestaurantStatus,
        EventKind::GenerateReview,
    ];
}

/// Why an order was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelReason {
    /// The order outlived the maximum order duration.
    Timeout,
    /// The customer withdrew the order.
    CustomerRequest,
    /// The courier carrying the food disappeared mid-delivery.
    CourierLost,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelReason::Timeout => "timeout",
            CancelReason::CustomerRequest => "customer_request",
            CancelReason::CourierLost => "courier_lost",
        }
    }
}

/// Payload of a scheduled event. One variant per event kind; each carries the
/// entities its handler operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPayload {
    PlaceOrder { user: Entity },
    PrepareOrder { order: Entity },
    OrderReady { order: Entity },
    AssignCourier { order: Entity, attempt: u32 },
    PickUpOrder { order: Entity },
    OrderInTransit { order: Entity },
    CheckDeliveryStatus { order: Entity },
    DeliverOrder { order: Entity },
    CancelOrder { order: Entity, reason: CancelReason },
    UpdateCourierLocation { courier: Entity },
    UpdateUserBehaviour { user: Entity },
    UpdateRestaurantStatus { restaurant: Entity },
    GenerateReview { order: Entity },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::PlaceOrder { .. } => EventKind::PlaceOrder,
            EventPayload::PrepareOrder { .. } => EventKind::PrepareOrder,
            EventPayload::OrderReady { .. } => EventKind::OrderReady,
            EventPayload::AssignCourier { .. } => EventKind::AssignCourier,
            EventPayload::PickUpOrder { .. } => EventKind::PickUpOrder,
            EventPayload::OrderInTransit { .. } => EventKind::OrderInTransit,
            EventPayload::CheckDeliveryStatus { .. } => EventKind::CheckDeliveryStatus,
            EventPayload::DeliverOrder { .. } => EventKind::DeliverOrder,
            EventPayload::CancelOrder { .. } => EventKind::CancelOrder,
            EventPayload::UpdateCourierLocation { .. } => EventKind::UpdateCourierLocation,
            EventPayload::UpdateUserBehaviour { .. } => EventKind::UpdateUserBehaviour,
            EventPayload::UpdateRestaurantStatus { .. } => EventKind::UpdateRestaurantStatus,
            EventPayload::GenerateReview { .. } => EventKind::GenerateReview,
        }
    }

    /// The entity the event is about. Used by the runner to drop events whose
    /// subject no longer exists.
    pub fn subject(&self) -> Entity {
        match *self {
            EventPayload::PlaceOrder { user } | EventPayload::UpdateUserBehaviour { user } => user,
            EventPayload::UpdateCourierLocation { courier } => courier,
            EventPayload::UpdateRestaurantStatus { restaurant } => restaurant,
            EventPayload::PrepareOrder { order }
            | EventPayload::OrderReady { order }
            | EventPayload::AssignCourier { order, .. }
            | EventPayload::PickUpOrder { order }
            | EventPayload::OrderInTransit { order }
            | EventPayload::CheckDeliveryStatus { order }
            | EventPayload::DeliverOrder { order }
            | EventPayload::CancelOrder { order, .. }
            | EventPayload::GenerateReview { order } => order,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub timestamp: u64,
    /// Insertion sequence number; breaks timestamp ties FIFO.
    pub seq: u64,
    pub payload: EventPayload,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap by (timestamp, seq).
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The event currently being dispatched by the runner.
#[derive(Debug, Clone, Copy, Resource)]
pub struct CurrentEvent(pub Event);

#[derive(Debug, Default, Resource)]
pub struct SimulationClock {
    now: u64,
    /// Unix ms corresponding to simulation time 0.
    epoch_ms: i64,
    next_seq: u64,
    events: BinaryHeap<Event>,
}

impl SimulationClock {
    pub fn new(epoch_ms: i64) -> Self {
        Self {
            epoch_ms,
            ..Default::default()
        }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn epoch_ms(&self) -> i64 {
        self.epoch_ms
    }

    /// Calendar time for a simulation timestamp.
    pub fn datetime_at(&self, timestamp: u64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.epoch_ms.saturating_add(timestamp as i64))
            .unwrap_or_default()
    }

    /// Calendar time of `now`.
    pub fn datetime(&self) -> DateTime<Utc> {
        self.datetime_at(self.now)
    }

    /// Unix seconds for a simulation timestamp (wire-format timestamps).
    pub fn unix_secs_at(&self, timestamp: u64) -> i64 {
        self.epoch_ms.saturating_add(timestamp as i64).div_euclid(1000)
    }

    /// Enqueue an event at an absolute time. Times in the past are clamped to `now`
    /// so the queue never yields an event older than the clock.
    pub fn schedule_at(&mut self, timestamp: u64, payload: EventPayload) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(Event {
            timestamp: timestamp.max(self.now),
            seq,
            payload,
        });
        seq
    }

    pub fn schedule_in(&mut self, delay_ms: u64, payload: EventPayload) -> u64 {
        self.schedule_at(self.now.saturating_add(delay_ms), payload)
    }

    pub fn schedule_in_secs(&mut self, delay_secs: u64, payload: EventPayload) -> u64 {
        self.schedule_in(delay_secs * ONE_SEC_MS, payload)
    }

    pub fn schedule_in_mins(&mut self, delay_mins: u64, payload: EventPayload) -> u64 {
        self.schedule_in(delay_mins * ONE_MIN_MS, payload)
    }

    pub fn peek(&self) -> Option<&Event> {
        self.events.peek()
    }

    pub fn next_event_time(&self) -> Option<u64> {
        self.events.peek().map(|e| e.timestamp)
    }

    /// Dequeue the earliest event. If it lies in the future the clock jumps to it,
    /// which lets tests step through events one at a time.
    pub fn pop_next(&mut self) -> Option<Event> {
        let event = self.events.pop()?;
        self.now = self.now.max(event.timestamp);
        Some(event)
    }

    /// Dequeue the earliest event only if it is due (`timestamp <= now`).
    pub fn pop_due(&mut self) -> Option<Event> {
        if self.events.peek()?.timestamp > self.now {
            return None;
        }
        self.events.pop()
    }

    /// Dequeue up to `max` due events in queue order.
    pub fn pop_due_batch(&mut self, max: usize) -> Vec<Event> {
        let mut batch = Vec::with_capacity(max.min(self.events.len()));
        while batch.len() < max {
            match self.pop_due() {
                Some(event) => batch.push(event),
                None => break,
            }
        }
        batch
    }

    pub fn has_due(&self) -> bool {
        self.events.peek().is_some_and(|e| e.timestamp <= self.now)
    }

    /// Move the clock forward; never moves backward.
    pub fn advance_to(&mut self, timestamp: u64) {
        self.now = self.now.max(timestamp);
    }

    pub fn advance_by(&mut self, delta_ms: u64) {
        self.now = self.now.saturating_add(delta_ms);
    }

    /// Pending events in arbitrary order.
    pub fn pending(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(index: u32) -> EventPayload {
        EventPayload::PlaceOrder {
            user: Entity::from_raw(index),
        }
    }

    #[test]
    fn clock_pops_events_in_time_order() {
        let mut clock = SimulationClock::default();
        clock.schedule_at(10, user(1));
        clock.schedule_at(5, user(2));
        clock.schedule_at(20, user(3));

        let first = clock.pop_next().expect("first event");
        assert_eq!(first.timestamp, 5);
        assert_eq!(clock.now(), 5);

        let second = clock.pop_next().expect("second event");
        assert_eq!(second.timestamp, 10);
        assert_eq!(clock.now(), 10);

        let third = clock.pop_next().expect("third event");
        assert_eq!(third.timestamp, 20);
        assert_eq!(clock.now(), 20);

        assert!(clock.pop_next().is_none());
        assert!(clock.is_empty());
    }

    #[test]
    fn equal_timestamps_are_fifo() {
        let mut clock = SimulationClock::default();
        for i in 0..50 {
            clock.schedule_at(7, user(i));
        }
        for i in 0..50 {
            let event = clock.pop_next().expect("event");
            assert_eq!(event.payload, user(i));
        }
    }

    #[test]
    fn pop_due_respects_now() {
        let mut clock = SimulationClock::default();
        clock.schedule_at(ONE_MIN_MS, user(1));
        clock.schedule_at(2 * ONE_MIN_MS, user(2));
        assert!(clock.pop_due().is_none());

        clock.advance_by(ONE_MIN_MS);
        assert!(clock.has_due());
        assert_eq!(clock.pop_due().map(|e| e.payload), Some(user(1)));
        assert!(clock.pop_due().is_none());
        assert_eq!(clock.now(), ONE_MIN_MS);
    }

    #[test]
    fn batch_dequeue_stops_at_limit_and_at_future_events() {
        let mut clock = SimulationClock::default();
        for i in 0..5 {
            clock.schedule_at(0, user(i));
        }
        clock.schedule_at(100, user(99));

        let batch = clock.pop_due_batch(3);
        assert_eq!(batch.len(), 3);
        let rest = clock.pop_due_batch(10);
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].payload, user(3));
        assert_eq!(clock.len(), 1);
    }

    #[test]
    fn past_events_are_clamped_to_now() {
        let mut clock = SimulationClock::default();
        clock.advance_to(500);
        clock.schedule_at(100, user(1));
        let event = clock.pop_due().expect("due event");
        assert_eq!(event.timestamp, 500);
    }

    #[test]
    fn advance_never_moves_backward() {
        let mut clock = SimulationClock::default();
        clock.advance_to(1_000);
        clock.advance_to(10);
        assert_eq!(clock.now(), 1_000);
    }

    #[test]
    fn datetime_uses_epoch() {
        // 2024-01-01T00:00:00Z
        let clock = SimulationClock::new(1_704_067_200_000);
        let dt = clock.datetime_at(ONE_HOUR_MS);
        assert_eq!(dt.to_rfc3339(), "2024-01-01T01:00:00+00:00");
        assert_eq!(clock.unix_secs_at(ONE_HOUR_MS), 1_704_070_800);
    }

    #[test]
    fn payload_subject_matches_variant() {
        let order = Entity::from_raw(42);
        let payload = EventPayload::AssignCourier { order, attempt: 2 };
        assert_eq!(payload.subject(), order);
        assert_eq!(payload.kind(), EventKind::AssignCourier);
    }
}
