use bevy_ecs::prelude::{Entity, Query, Res, ResMut};
use rand::Rng;

use crate::clock::{EventPayload, SimulationClock};
use crate::demand::probability::order_probability;
use crate::demand::DemandContext;
use crate::ecs::User;
use crate::rng::SimRng;
use crate::scenario::SimulationParams;
use crate::traffic::TrafficConditions;
use crate::weather::WeatherState;

/// One Bernoulli draw per eligible user; successes become `PlaceOrder` events
/// at `now`.
pub fn demand_generation_system(
    mut clock: ResMut<SimulationClock>,
    params: Res<SimulationParams>,
    mut rng: ResMut<SimRng>,
    weather: Res<WeatherState>,
    traffic: Res<TrafficConditions>,
    users: Query<(Entity, &User)>,
) {
    if !params.demand.enabled {
        return;
    }
    let now = clock.now();
    let ctx = DemandContext::new(
        &clock.datetime(),
        params.city.centre.lat,
        &weather,
        &traffic,
        &params.demand.special_days,
    );
    let demand = &params.demand;
    let rng = rng.rng();
    for (entity, user) in users.iter() {
        if now < user.next_order_at {
            continue;
        }
        let p = order_probability(
            user,
            demand.segment_rates.for_segment(user.segment),
            &ctx,
            now,
            params.tick_ms,
            demand.cool_down_hours,
        );
        if p > 0.0 && rng.gen::<f64>() < p {
            clock.schedule_at(now, EventPayload::PlaceOrder { user: entity });
        }
    }
}
