//! ECS components: orders, couriers, restaurants with their menus, and users.
//!
//! Entities refer to each other through [Entity] handles; string ids are kept
//! for the wire format.

use bevy_ecs::prelude::{Component, Entity, Resource};
use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::clock::CancelReason;
use crate::error::InvalidTransition;
use crate::pricing::OrderPricing;
use crate::segment::CustomerSegment;
use crate::spatial::GeoPoint;

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Preparing,
    Ready,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Forward lifecycle. `Cancelled` sits outside it and is reachable from
    /// every non-terminal status.
    pub const LIFECYCLE: [OrderStatus; 6] = [
        OrderStatus::Placed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::PickedUp,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
    ];

    pub fn rank(&self) -> Option<usize> {
        Self::LIFECYCLE.iter().position(|s| s == self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Only the next lifecycle step, or cancellation from a live status.
    pub fn can_advance_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == OrderStatus::Cancelled {
            return true;
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to == from + 1,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::PickedUp => "picked_up",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Component)]
pub struct Order {
    pub id: String,
    pub customer: Entity,
    pub restaurant: Entity,
    pub courier: Option<Entity>,
    pub status: OrderStatus,
    pub items: Vec<String>,
    pub pricing: OrderPricing,
    /// Restaurant location at placement.
    pub pickup_location: GeoPoint,
    /// Customer location at placement.
    pub delivery_location: GeoPoint,
    pub distance_km: f64,
    /// Mean preparation complexity of the ordered items.
    pub complexity: f64,
    pub placed_at: u64,
    /// When the restaurant starts cooking (placement plus acceptance delay).
    pub prep_start_time: u64,
    pub prep_duration_ms: u64,
    /// When the food is ready for pickup.
    pub pickup_time: Option<u64>,
    pub estimated_pickup_time: u64,
    pub estimated_delivery_time: u64,
    pub picked_up_at: Option<u64>,
    pub in_transit_time: Option<u64>,
    pub actual_delivery_time: Option<u64>,
    pub cancelled_at: Option<u64>,
    pub cancel_reason: Option<CancelReason>,
    pub assignment_attempts: u32,
    /// An `AssignCourier` event for this order is queued.
    pub assignment_pending: bool,
    pub review_generated: bool,
    /// Earliest time the reconciler may sweep a delivered order.
    pub review_due_at: Option<u64>,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn placed(
        id: String,
        customer: Entity,
        restaurant: Entity,
        items: Vec<String>,
        pricing: OrderPricing,
        pickup_location: GeoPoint,
        delivery_location: GeoPoint,
        placed_at: u64,
    ) -> Self {
        let distance_km = pickup_location.distance_km(&delivery_location);
        Self {
            id,
            customer,
            restaurant,
            courier: None,
            status: OrderStatus::Placed,
            items,
            pricing,
            pickup_location,
            delivery_location,
            distance_km,
            complexity: 1.0,
            placed_at,
            prep_start_time: placed_at,
            prep_duration_ms: 0,
            pickup_time: None,
            estimated_pickup_time: placed_at,
            estimated_delivery_time: placed_at,
            picked_up_at: None,
            in_transit_time: None,
            actual_delivery_time: None,
            cancelled_at: None,
            cancel_reason: None,
            assignment_attempts: 0,
            assignment_pending: false,
            review_generated: false,
            review_due_at: None,
        }
    }

    /// Last instant the order is still within its allowed lifetime.
    pub fn deadline(&self, max_order_duration_ms: u64) -> u64 {
        self.placed_at.saturating_add(max_order_duration_ms)
    }

    /// The order has been open for longer than `max_order_duration_ms`.
    pub fn is_overdue(&self, now: u64, max_order_duration_ms: u64) -> bool {
        now > self.deadline(max_order_duration_ms)
    }

    /// First instant at which [Order::is_overdue] holds.
    pub fn timeout_at(&self, max_order_duration_ms: u64) -> u64 {
        self.deadline(max_order_duration_ms).saturating_add(1)
    }

    /// Move to `next`, stamping the transition time where the order keeps one.
    /// Backward moves and moves out of a terminal status are rejected and leave
    /// the order untouched.
    pub fn advance_to(&mut self, next: OrderStatus, now: u64) -> Result<(), InvalidTransition> {
        if !self.status.can_advance_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        match next {
            OrderStatus::PickedUp => self.picked_up_at = Some(now),
            OrderStatus::InTransit => self.in_transit_time = Some(now),
            OrderStatus::Delivered => self.actual_delivery_time = Some(now),
            OrderStatus::Cancelled => self.cancelled_at = Some(now),
            _ => {}
        }
        self.status = next;
        Ok(())
    }

    pub fn subtotal(&self) -> f64 {
        self.pricing.subtotal
    }

    pub fn total_amount(&self) -> f64 {
        self.pricing.total
    }

    pub fn delivery_cost(&self) -> f64 {
        self.pricing.delivery_fee
    }

    /// Delivered no later than promised (plus a grace period).
    pub fn delivered_on_time(&self, grace_ms: u64) -> Option<bool> {
        self.actual_delivery_time
            .map(|t| t <= self.estimated_delivery_time.saturating_add(grace_ms))
    }
}

/// Monotonic source of order ids.
#[derive(Debug, Default, Resource)]
pub struct OrderIdSequence {
    next: u64,
}

impl OrderIdSequence {
    pub fn next_id(&mut self) -> String {
        self.next += 1;
        format!("ord-{:08}", self.next)
    }

    pub fn issued(&self) -> u64 {
        self.next
    }
}

// ---------------------------------------------------------------------------
// Couriers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourierStatus {
    #[default]
    Available,
    EnRoutePickup,
    EnRouteDelivery,
}

impl CourierStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourierStatus::Available => "available",
            CourierStatus::EnRoutePickup => "en_route_pickup",
            CourierStatus::EnRouteDelivery => "en_route_delivery",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Component)]
pub struct Courier {
    pub id: String,
    pub status: CourierStatus,
    /// Set iff the courier is not Available.
    pub current_order: Option<Entity>,
    pub location: GeoPoint,
    pub speed_kmh: f64,
    /// Completed deliveries.
    pub experience: u32,
    pub rating: f64,
    pub rating_count: u32,
    /// Simulation time the position was last advanced to.
    pub last_moved_at: u64,
    pub distance_travelled_km: f64,
}

impl Courier {
    pub fn new(id: impl Into<String>, location: GeoPoint, speed_kmh: f64) -> Self {
        Self {
            id: id.into(),
            status: CourierStatus::Available,
            current_order: None,
            location,
            speed_kmh,
            experience: 0,
            rating: 4.5,
            rating_count: 0,
            last_moved_at: 0,
            distance_travelled_km: 0.0,
        }
    }

    pub fn with_rating(mut self, rating: f64, rating_count: u32) -> Self {
        self.rating = rating;
        self.rating_count = rating_count;
        self
    }

    pub fn with_experience(mut self, experience: u32) -> Self {
        self.experience = experience;
        self
    }

    pub fn is_available(&self) -> bool {
        self.status == CourierStatus::Available
    }
}

// ---------------------------------------------------------------------------
// Restaurants and menus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestaurantCluster {
    QuickService,
    #[default]
    Casual,
    FineDining,
}

impl RestaurantCluster {
    /// Typical kitchen time for the cluster, in minutes.
    pub fn base_prep_mins(&self) -> f64 {
        match self {
            RestaurantCluster::QuickService => 10.0,
            RestaurantCluster::Casual => 20.0,
            RestaurantCluster::FineDining => 35.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RestaurantCluster::QuickService => "quick_service",
            RestaurantCluster::Casual => "casual",
            RestaurantCluster::FineDining => "fine_dining",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Component)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    pub location: GeoPoint,
    pub cluster: RestaurantCluster,
    pub cuisines: Vec<String>,
    /// 1 (cheap) ..= 4 (expensive).
    pub price_tier: u8,
    /// Orders the kitchen handles concurrently without slowing down.
    pub capacity: u32,
    pub prep_time_mins: f64,
    pub pickup_efficiency: f64,
    pub avg_prep_time_mins: f64,
    pub min_prep_time_mins: f64,
    pub rating: f64,
    pub rating_count: u32,
    /// 0..=1.
    pub popularity: f64,
    /// Random-walk demand trend in [0.5, 1.5].
    pub trend: f64,
    /// Orders accepted and not yet handed to a courier.
    pub current_orders: Vec<Entity>,
    pub completed_orders: u32,
    /// Preparation times (minutes) observed since the last status update.
    pub observed_prep_mins: Vec<f64>,
}

impl Restaurant {
    pub fn new(id: impl Into<String>, location: GeoPoint, cluster: RestaurantCluster) -> Self {
        let id = id.into();
        let base = cluster.base_prep_mins();
        Self {
            name: id.clone(),
            id,
            location,
            cluster,
            cuisines: Vec::new(),
            price_tier: 2,
            capacity: 10,
            prep_time_mins: base,
            pickup_efficiency: 1.0,
            avg_prep_time_mins: base,
            min_prep_time_mins: (base * 0.5).max(5.0),
            rating: 4.2,
            rating_count: 0,
            popularity: 0.5,
            trend: 1.0,
            current_orders: Vec::new(),
            completed_orders: 0,
            observed_prep_mins: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_cuisines<I, S>(mut self, cuisines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cuisines = cuisines.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_price_tier(mut self, tier: u8) -> Self {
        self.price_tier = tier.clamp(1, 4);
        self
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_prep_time(mut self, prep_time_mins: f64) -> Self {
        self.prep_time_mins = prep_time_mins;
        self.avg_prep_time_mins = prep_time_mins;
        self
    }

    pub fn with_rating(mut self, rating: f64, rating_count: u32) -> Self {
        self.rating = rating;
        self.rating_count = rating_count;
        self
    }

    pub fn with_popularity(mut self, popularity: f64) -> Self {
        self.popularity = popularity.clamp(0.0, 1.0);
        self
    }

    /// Active orders relative to capacity.
    pub fn load(&self) -> f64 {
        if self.capacity == 0 {
            return 1.0;
        }
        self.current_orders.len() as f64 / self.capacity as f64
    }

    pub fn remove_order(&mut self, order: Entity) {
        self.current_orders.retain(|o| *o != order);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuCategory {
    Breakfast,
    Appetizer,
    Main,
    Side,
    Dessert,
    Drink,
}

impl MenuCategory {
    pub const ALL: [MenuCategory; 6] = [
        MenuCategory::Breakfast,
        MenuCategory::Appetizer,
        MenuCategory::Main,
        MenuCategory::Side,
        MenuCategory::Dessert,
        MenuCategory::Drink,
    ];

    /// Items ordered alongside a main.
    pub fn is_complementary(&self) -> bool {
        matches!(
            self,
            MenuCategory::Side | MenuCategory::Drink | MenuCategory::Dessert
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    pub category: MenuCategory,
    pub price: f64,
    /// 1.0 (assemble) ..= 3.0 (elaborate).
    pub prep_complexity: f64,
    /// 0..=1.
    pub popularity: f64,
    pub is_hot: bool,
}

impl MenuItem {
    pub fn new(id: impl Into<String>, category: MenuCategory, price: f64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            category,
            price,
            prep_complexity: 1.5,
            popularity: 0.5,
            is_hot: matches!(
                category,
                MenuCategory::Main | MenuCategory::Breakfast | MenuCategory::Appetizer
            ),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_complexity(mut self, complexity: f64) -> Self {
        self.prep_complexity = complexity.clamp(1.0, 3.0);
        self
    }

    pub fn with_popularity(mut self, popularity: f64) -> Self {
        self.popularity = popularity.clamp(0.0, 1.0);
        self
    }

    pub fn with_hot(mut self, is_hot: bool) -> Self {
        self.is_hot = is_hot;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Component)]
pub struct Menu(pub Vec<MenuItem>);

impl Menu {
    pub fn items(&self) -> &[MenuItem] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&MenuItem> {
        self.0.iter().find(|i| i.id == id)
    }

    pub fn average_price(&self) -> f64 {
        if self.0.is_empty() {
            return 0.0;
        }
        self.0.iter().map(|i| i.price).sum::<f64>() / self.0.len() as f64
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// How an order ended, as seen by the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderOutcome {
    OnTime,
    Late,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Component)]
pub struct User {
    pub id: String,
    pub location: GeoPoint,
    pub segment: CustomerSegment,
    /// Adaptive ordering rate, orders per day.
    pub order_frequency: f64,
    pub last_order_time: Option<u64>,
    /// Demand generation skips the user before this time.
    pub next_order_at: u64,
    /// Order counts by weekday (Monday = 0) and hour.
    pub purchase_patterns: [[u32; 24]; 7],
    pub total_orders: u32,
    pub cancelled_orders: u32,
    pub lifetime_spend: f64,
    /// Cuisine name and affinity weight (1.0 = neutral).
    pub cuisine_preferences: Vec<(String, f64)>,
    /// Outcomes not yet folded into `order_frequency`.
    pub recent_outcomes: Vec<OrderOutcome>,
}

impl User {
    pub fn new(id: impl Into<String>, location: GeoPoint, segment: CustomerSegment) -> Self {
        Self {
            id: id.into(),
            location,
            segment,
            order_frequency: segment.default_daily_frequency(),
            last_order_time: None,
            next_order_at: 0,
            purchase_patterns: [[0; 24]; 7],
            total_orders: 0,
            cancelled_orders: 0,
            lifetime_spend: 0.0,
            cuisine_preferences: Vec::new(),
            recent_outcomes: Vec::new(),
        }
    }

    pub fn with_order_frequency(mut self, orders_per_day: f64) -> Self {
        self.order_frequency = orders_per_day;
        self
    }

    pub fn with_cuisine_preference(mut self, cuisine: impl Into<String>, weight: f64) -> Self {
        self.cuisine_preferences.push((cuisine.into(), weight));
        self
    }

    pub fn record_purchase(&mut self, weekday: Weekday, hour: u32) {
        let day = weekday.num_days_from_monday() as usize;
        self.purchase_patterns[day][(hour as usize).min(23)] += 1;
    }

    pub fn pattern_total(&self) -> u32 {
        self.purchase_patterns.iter().flatten().sum()
    }

    pub fn cuisine_affinity(&self, cuisine: &str) -> Option<f64> {
        self.cuisine_preferences
            .iter()
            .find(|(c, _)| c.eq_ignore_ascii_case(cuisine))
            .map(|(_, w)| *w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Order {
        Order::placed(
            "ord-1".into(),
            Entity::from_raw(1),
            Entity::from_raw(2),
            vec!["item-1".into()],
            OrderPricing::default(),
            GeoPoint::new(52.52, 13.40),
            GeoPoint::new(52.53, 13.41),
            0,
        )
    }

    #[test]
    fn order_walks_the_lifecycle_forward() {
        let mut order = order();
        for (i, next) in OrderStatus::LIFECYCLE.iter().skip(1).enumerate() {
            order.advance_to(*next, i as u64).expect("forward step");
        }
        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.actual_delivery_time, Some(4));
        assert_eq!(order.picked_up_at, Some(2));
    }

    #[test]
    fn backward_and_skipping_moves_are_rejected() {
        let mut order = order();
        order.advance_to(OrderStatus::Preparing, 1).unwrap();
        let err = order.advance_to(OrderStatus::Placed, 2).unwrap_err();
        assert_eq!(err.from, OrderStatus::Preparing);
        assert!(order.advance_to(OrderStatus::PickedUp, 2).is_err());
        assert_eq!(order.status, OrderStatus::Preparing);
    }

    #[test]
    fn terminal_states_are_final() {
        let mut order = order();
        order.advance_to(OrderStatus::Cancelled, 5).unwrap();
        assert_eq!(order.cancelled_at, Some(5));
        assert!(order.advance_to(OrderStatus::Preparing, 6).is_err());
        assert!(order.advance_to(OrderStatus::Cancelled, 6).is_err());
    }

    #[test]
    fn order_ids_are_sequential() {
        let mut seq = OrderIdSequence::default();
        assert_eq!(seq.next_id(), "ord-00000001");
        assert_eq!(seq.next_id(), "ord-00000002");
        assert_eq!(seq.issued(), 2);
    }

    #[test]
    fn purchase_patterns_index_by_weekday_and_hour() {
        let mut user = User::new("u", GeoPoint::new(0.0, 0.0), CustomerSegment::Regular);
        user.record_purchase(Weekday::Fri, 19);
        user.record_purchase(Weekday::Fri, 19);
        assert_eq!(user.purchase_patterns[4][19], 2);
        assert_eq!(user.pattern_total(), 2);
    }
}
