pub mod assign_courier;
pub mod cancel_order;
pub mod check_delivery_status;
pub mod deliver_order;
pub mod demand_generation;
pub mod environment;
pub mod generate_review;
pub mod movement;
pub mod order_in_transit;
pub mod order_ready;
pub mod pick_up_order;
pub mod place_order;
pub mod prepare_order;
pub mod reconcile;
pub mod update_courier_location;
pub mod update_restaurant_status;
pub mod update_user_behaviour;

use crate::courier::MovementConditions;
use crate::traffic::TrafficConditions;
use crate::weather::WeatherState;

pub(crate) fn movement_conditions(
    traffic: &TrafficConditions,
    weather: &WeatherState,
) -> MovementConditions {
    MovementConditions {
        traffic_factor: traffic.speed_factor(),
        weather_factor: weather.speed_factor(),
    }
}
