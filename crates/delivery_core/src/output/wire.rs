//! Wire format of emitted events.
//!
//! Every message is a JSON object with a common envelope (`timestamp` in unix
//! seconds, `eventType`, and the optional `userId`, `restaurantId`,
//! `deliveryPartnerId`) followed by the type-specific fields, flattened.

use serde::Serialize;

use crate::spatial::GeoPoint;

/// Output topic; one per emitted event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    OrderPlaced,
    OrderPreparation,
    OrderReady,
    CourierAssignment,
    OrderPickup,
    OrderInTransit,
    DeliveryStatusCheck,
    OrderDelivery,
    OrderCancellation,
    PartnerLocation,
    UserBehaviour,
    RestaurantStatus,
    Review,
}

impl Topic {
    pub const ALL: [Topic; 13] = [
        Topic::OrderPlaced,
        Topic::OrderPreparation,
        Topic::OrderReady,
        Topic::CourierAssignment,
        Topic::OrderPickup,
        Topic::OrderInTransit,
        Topic::DeliveryStatusCheck,
        Topic::OrderDelivery,
        Topic::OrderCancellation,
        Topic::PartnerLocation,
        Topic::UserBehaviour,
        Topic::RestaurantStatus,
        Topic::Review,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Topic::OrderPlaced => "order_placed_events",
            Topic::OrderPreparation => "order_preparation_events",
            Topic::OrderReady => "order_ready_events",
            Topic::CourierAssignment => "courier_assignment_events",
            Topic::OrderPickup => "order_pickup_events",
            Topic::OrderInTransit => "order_in_transit_events",
            Topic::DeliveryStatusCheck => "delivery_status_check_events",
            Topic::OrderDelivery => "order_delivery_events",
            Topic::OrderCancellation => "order_cancellation_events",
            Topic::PartnerLocation => "partner_location_events",
            Topic::UserBehaviour => "user_behaviour_events",
            Topic::RestaurantStatus => "restaurant_status_events",
            Topic::Review => "review_events",
        }
    }

    /// Value of the `eventType` envelope field.
    pub fn event_type(&self) -> &'static str {
        match self {
            Topic::OrderPlaced => "order_placed",
            Topic::OrderPreparation => "order_preparation",
            Topic::OrderReady => "order_ready",
            Topic::CourierAssignment => "courier_assignment",
            Topic::OrderPickup => "order_pickup",
            Topic::OrderInTransit => "order_in_transit",
            Topic::DeliveryStatusCheck => "delivery_status_check",
            Topic::OrderDelivery => "order_delivery",
            Topic::OrderCancellation => "order_cancellation",
            Topic::PartnerLocation => "partner_location",
            Topic::UserBehaviour => "user_behaviour",
            Topic::RestaurantStatus => "restaurant_status",
            Topic::Review => "review",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlaced {
    pub order_id: String,
    pub item_ids: Vec<String>,
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub total_amount: f64,
    pub status: &'static str,
    pub order_placed_at: i64,
    pub estimated_pickup_time: i64,
    pub estimated_delivery_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPreparation {
    pub order_id: String,
    pub status: &'static str,
    pub prep_start_time: i64,
    pub estimated_ready_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReady {
    pub order_id: String,
    pub status: &'static str,
    pub ready_at: i64,
    pub awaiting_courier: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourierAssignment {
    pub order_id: String,
    pub partner_id: String,
    pub status: &'static str,
    pub attempt: u32,
    pub distance_to_restaurant_km: f64,
    pub estimated_pickup_time: i64,
    pub estimated_delivery_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPickup {
    pub order_id: String,
    pub partner_id: String,
    pub status: &'static str,
    pub pickup_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInTransit {
    pub order_id: String,
    pub partner_id: String,
    pub status: &'static str,
    pub remaining_distance_km: f64,
    pub estimated_delivery_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStatusCheck {
    pub order_id: String,
    pub partner_id: String,
    pub status: &'static str,
    pub current_location: GeoPoint,
    pub remaining_distance_km: f64,
    pub arrived: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDelivery {
    pub order_id: String,
    pub partner_id: String,
    pub status: &'static str,
    pub actual_delivery_time: i64,
    pub estimated_delivery_time: i64,
    pub on_time: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCancellation {
    pub order_id: String,
    pub status: &'static str,
    pub previous_status: &'static str,
    pub reason: &'static str,
    pub cancelled_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerLocation {
    pub partner_id: String,
    pub new_location: GeoPoint,
    pub status: &'static str,
    /// Effective speed in km/h.
    pub speed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBehaviour {
    pub order_frequency: f64,
    pub segment: &'static str,
    pub previous_segment: &'static str,
    pub total_orders: u32,
    pub cancelled_orders: u32,
    pub lifetime_spend: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantStatus {
    pub avg_prep_time: f64,
    pub pickup_efficiency: f64,
    pub current_orders: usize,
    pub capacity: u32,
    pub trend: f64,
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSubmitted {
    pub order_id: String,
    pub food_rating: f64,
    pub delivery_rating: f64,
    pub overall_rating: f64,
}

/// Type-specific part of an output event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventBody {
    OrderPlaced(OrderPlaced),
    OrderPreparation(OrderPreparation),
    OrderReady(OrderReady),
    CourierAssignment(CourierAssignment),
    OrderPickup(OrderPickup),
    OrderInTransit(OrderInTransit),
    DeliveryStatusCheck(DeliveryStatusCheck),
    OrderDelivery(OrderDelivery),
    OrderCancellation(OrderCancellation),
    PartnerLocation(PartnerLocation),
    UserBehaviour(UserBehaviour),
    RestaurantStatus(RestaurantStatus),
    Review(ReviewSubmitted),
}

impl EventBody {
    pub fn topic(&self) -> Topic {
        match self {
            EventBody::OrderPlaced(_) => Topic::OrderPlaced,
            EventBody::OrderPreparation(_) => Topic::OrderPreparation,
            EventBody::OrderReady(_) => Topic::OrderReady,
            EventBody::CourierAssignment(_) => Topic::CourierAssignment,
            EventBody::OrderPickup(_) => Topic::OrderPickup,
            EventBody::OrderInTransit(_) => Topic::OrderInTransit,
            EventBody::DeliveryStatusCheck(_) => Topic::DeliveryStatusCheck,
            EventBody::OrderDelivery(_) => Topic::OrderDelivery,
            EventBody::OrderCancellation(_) => Topic::OrderCancellation,
            EventBody::PartnerLocation(_) => Topic::PartnerLocation,
            EventBody::UserBehaviour(_) => Topic::UserBehaviour,
            EventBody::RestaurantStatus(_) => Topic::RestaurantStatus,
            EventBody::Review(_) => Topic::Review,
        }
    }
}

/// A complete output message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputEvent {
    /// Unix seconds.
    pub timestamp: i64,
    pub event_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restaurant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_partner_id: Option<String>,
    #[serde(flatten)]
    pub body: EventBody,
}

impl OutputEvent {
    pub fn new(timestamp: i64, body: EventBody) -> Self {
        Self {
            timestamp,
            event_type: body.topic().event_type(),
            user_id: None,
            restaurant_id: None,
            delivery_partner_id: None,
            body,
        }
    }

    pub fn with_user(mut self, id: impl Into<String>) -> Self {
        self.user_id = Some(id.into());
        self
    }

    pub fn with_restaurant(mut self, id: impl Into<String>) -> Self {
        self.restaurant_id = Some(id.into());
        self
    }

    pub fn with_partner(mut self, id: Option<&str>) -> Self {
        self.delivery_partner_id = id.map(str::to_string);
        self
    }

    pub fn topic(&self) -> Topic {
        self.body.topic()
    }
}
