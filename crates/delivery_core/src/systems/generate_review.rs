use bevy_ecs::prelude::{Query, Res, ResMut};
use rand::Rng;
use tracing::{debug, warn};

use crate::clock::{CurrentEvent, EventPayload, SimulationClock};
use crate::ecs::{Courier, Order, OrderStatus, Restaurant, User};
use crate::output::wire::{EventBody, ReviewSubmitted};
use crate::output::{EventOutbox, OutputEvent};
use crate::review::{review_probability, sample_review, smooth_rating, ReviewInputs};
use crate::rng::SimRng;
use crate::scenario::SimulationParams;
use crate::telemetry::SimTelemetry;
use crate::weather::WeatherState;

/// Maybe leave a review for a delivered order and fold it into the
/// restaurant and courier ratings.
#[allow(clippy::too_many_arguments)]
pub fn generate_review_system(
    event: Res<CurrentEvent>,
    clock: Res<SimulationClock>,
    params: Res<SimulationParams>,
    mut rng: ResMut<SimRng>,
    weather: Res<WeatherState>,
    mut telemetry: ResMut<SimTelemetry>,
    mut outbox: ResMut<EventOutbox>,
    mut orders: Query<&mut Order>,
    users: Query<&User>,
    mut restaurants: Query<&mut Restaurant>,
    mut couriers: Query<&mut Courier>,
) {
    let EventPayload::GenerateReview { order: order_entity } = event.0.payload else {
        return;
    };
    let Ok(mut order) = orders.get_mut(order_entity) else {
        warn!(?order_entity, "review for unknown order");
        return;
    };
    if order.status != OrderStatus::Delivered || order.review_generated {
        return;
    }
    let Ok(user) = users.get(order.customer) else {
        warn!(order = %order.id, "review for order without customer");
        return;
    };
    let Ok(mut restaurant) = restaurants.get_mut(order.restaurant) else {
        warn!(order = %order.id, "review for order without restaurant");
        return;
    };

    let delivered_at = order.actual_delivery_time.unwrap_or(order.estimated_delivery_time);
    let inputs = ReviewInputs {
        order_total: order.total_amount(),
        lateness_ms: delivered_at as i64 - order.estimated_delivery_time as i64,
        customer_frequency: user.order_frequency,
        segment: user.segment,
        restaurant_rating: restaurant.rating,
        item_count: order.items.len(),
        avg_complexity: order.complexity,
        adverse_weather: weather.condition.is_adverse(),
        weather_intensity: weather.intensity,
    };
    let rng = rng.rng();
    let p = review_probability(&params.review, &inputs);
    if rng.gen::<f64>() >= p {
        debug!(order = %order.id, p, "no review");
        return;
    }

    let review = sample_review(rng, &inputs);
    let alpha = params.review.smoothing_alpha;
    let restaurant_observed = (review.food_rating + review.overall_rating) / 2.0;
    restaurant.rating = smooth_rating(restaurant.rating, restaurant_observed, alpha);
    restaurant.rating_count += 1;

    let mut partner_id = None;
    if let Some(Ok(mut courier)) = order.courier.map(|c| couriers.get_mut(c)) {
        courier.rating = smooth_rating(courier.rating, review.delivery_rating, alpha);
        courier.rating_count += 1;
        partner_id = Some(courier.id.clone());
    }
    order.review_generated = true;
    telemetry.reviews_generated += 1;

    outbox.push(
        OutputEvent::new(
            clock.unix_secs_at(clock.now()),
            EventBody::Review(ReviewSubmitted {
                order_id: order.id.clone(),
                food_rating: review.food_rating,
                delivery_rating: review.delivery_rating,
                overall_rating: review.overall_rating,
            }),
        )
        .with_user(user.id.clone())
        .with_restaurant(restaurant.id.clone())
        .with_partner(partner_id.as_deref()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::prelude::{Entity, Schedule, World};

    use crate::clock::Event;
    use crate::ecs::RestaurantCluster;
    use crate::pricing::OrderPricing;
    use crate::review::ReviewConfig;
    use crate::segment::CustomerSegment;
    use crate::spatial::GeoPoint;

    const KITCHEN: GeoPoint = GeoPoint::new(52.52, 13.40);
    const HOME: GeoPoint = GeoPoint::new(52.53, 13.40);

    struct Fixture {
        world: World,
        order: Entity,
        restaurant: Entity,
        courier: Entity,
    }

    fn fixture(review: ReviewConfig) -> Fixture {
        let mut world = World::new();
        world.insert_resource(SimulationClock::default());
        world.insert_resource(SimulationParams::default().with_review(review));
        world.insert_resource(SimRng::new(Some(7)));
        world.insert_resource(WeatherState::default());
        world.insert_resource(SimTelemetry::default());
        world.insert_resource(EventOutbox::default());

        let user = world
            .spawn(User::new("u-1", HOME, CustomerSegment::Regular))
            .id();
        let restaurant = world
            .spawn(Restaurant::new("r-1", KITCHEN, RestaurantCluster::Casual).with_rating(3.0, 10))
            .id();
        let courier = world
            .spawn(Courier::new("c-1", HOME, 20.0).with_rating(4.0, 10))
            .id();
        let mut order = Order::placed(
            "ord-1".into(),
            user,
            restaurant,
            vec!["m-1".into()],
            OrderPricing::default(),
            KITCHEN,
            HOME,
            0,
        );
        order.status = OrderStatus::Delivered;
        order.courier = Some(courier);
        order.estimated_delivery_time = 1_800_000;
        order.actual_delivery_time = Some(1_800_000);
        let order = world.spawn(order).id();
        Fixture {
            world,
            order,
            restaurant,
            courier,
        }
    }

    fn run(f: &mut Fixture) {
        f.world.insert_resource(CurrentEvent(Event {
            timestamp: 0,
            seq: 0,
            payload: EventPayload::GenerateReview { order: f.order },
        }));
        let mut schedule = Schedule::default();
        schedule.add_systems(generate_review_system);
        schedule.run(&mut f.world);
    }

    fn submitted(world: &World) -> Vec<ReviewSubmitted> {
        world
            .resource::<EventOutbox>()
            .events()
            .iter()
            .filter_map(|e| match &e.body {
                EventBody::Review(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn review_folds_into_restaurant_and_courier_ratings() {
        let mut f = fixture(ReviewConfig {
            smoothing_alpha: 0.5,
            base_probability: 1.0,
        });

        run(&mut f);

        let reviews = submitted(&f.world);
        assert_eq!(reviews.len(), 1);
        let review = &reviews[0];
        assert_eq!(review.order_id, "ord-1");

        let restaurant = f.world.get::<Restaurant>(f.restaurant).expect("restaurant");
        let observed = (review.food_rating + review.overall_rating) / 2.0;
        let expected = 0.5 * observed + 0.5 * 3.0;
        assert!((restaurant.rating - expected).abs() < 1e-9, "{} vs {expected}", restaurant.rating);
        assert_eq!(restaurant.rating_count, 11);

        let courier = f.world.get::<Courier>(f.courier).expect("courier");
        let expected = 0.5 * review.delivery_rating + 0.5 * 4.0;
        assert!((courier.rating - expected).abs() < 1e-9, "{} vs {expected}", courier.rating);
        assert_eq!(courier.rating_count, 11);

        assert!(f.world.get::<Order>(f.order).expect("order").review_generated);
        assert_eq!(f.world.resource::<SimTelemetry>().reviews_generated, 1);
        let event = &f.world.resource::<EventOutbox>().events()[0];
        assert_eq!(event.user_id.as_deref(), Some("u-1"));
        assert_eq!(event.restaurant_id.as_deref(), Some("r-1"));
        assert_eq!(event.delivery_partner_id.as_deref(), Some("c-1"));
    }

    #[test]
    fn an_order_is_reviewed_at_most_once() {
        let mut f = fixture(ReviewConfig {
            smoothing_alpha: 0.5,
            base_probability: 1.0,
        });

        run(&mut f);
        let rating = f.world.get::<Restaurant>(f.restaurant).map(|r| r.rating);
        run(&mut f);

        assert_eq!(f.world.resource::<SimTelemetry>().reviews_generated, 1);
        assert_eq!(f.world.get::<Restaurant>(f.restaurant).map(|r| r.rating), rating);
        assert_eq!(submitted(&f.world).len(), 1);
    }

    #[test]
    fn skipped_review_leaves_ratings_alone() {
        let mut f = fixture(ReviewConfig {
            smoothing_alpha: 0.5,
            base_probability: 0.0,
        });

        run(&mut f);

        assert!(!f.world.get::<Order>(f.order).expect("order").review_generated);
        assert_eq!(f.world.get::<Restaurant>(f.restaurant).map(|r| r.rating), Some(3.0));
        assert_eq!(f.world.get::<Courier>(f.courier).map(|c| c.rating), Some(4.0));
        assert!(f.world.resource::<EventOutbox>().is_empty());
    }
}
