use bevy_ecs::prelude::{Entity, Query, ResMut};

use crate::clock::{EventPayload, SimulationClock};
use crate::ecs::Courier;

/// Queue a location update for every courier that is out on a job.
pub fn movement_system(mut clock: ResMut<SimulationClock>, couriers: Query<(Entity, &Courier)>) {
    let now = clock.now();
    for (entity, courier) in couriers.iter() {
        if !courier.is_available() {
            clock.schedule_at(now, EventPayload::UpdateCourierLocation { courier: entity });
        }
    }
}
