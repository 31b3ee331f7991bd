use bevy_ecs::prelude::{Query, Res, ResMut};
use tracing::{info, warn};

use crate::clock::{CurrentEvent, EventPayload, SimulationClock};
use crate::ecs::{OrderOutcome, User};
use crate::output::wire::{EventBody, UserBehaviour};
use crate::output::{EventOutbox, OutputEvent};
use crate::segment::CustomerSegment;

fn outcome_factor(outcome: OrderOutcome) -> f64 {
    match outcome {
        OrderOutcome::OnTime => 1.05,
        OrderOutcome::Late => 0.97,
        OrderOutcome::Cancelled => 0.9,
    }
}

/// Fold outcomes into an ordering frequency, clamped to the segment's range.
pub fn adapt_frequency(frequency: f64, segment: CustomerSegment, outcomes: &[OrderOutcome]) -> f64 {
    let profile = segment.profile();
    let adapted = outcomes
        .iter()
        .fold(frequency, |f, o| f * outcome_factor(*o));
    adapted.clamp(profile.min_daily_frequency, profile.max_daily_frequency)
}

/// Adapt the customer's ordering frequency to recent outcomes and migrate
/// the segment when the frequency crosses a threshold.
pub fn update_user_behaviour_system(
    event: Res<CurrentEvent>,
    clock: Res<SimulationClock>,
    mut outbox: ResMut<EventOutbox>,
    mut users: Query<&mut User>,
) {
    let EventPayload::UpdateUserBehaviour { user: user_entity } = event.0.payload else {
        return;
    };
    let Ok(mut user) = users.get_mut(user_entity) else {
        warn!(?user_entity, "behaviour update for unknown user");
        return;
    };

    let previous = user.segment;
    let outcomes = std::mem::take(&mut user.recent_outcomes);
    user.order_frequency = adapt_frequency(user.order_frequency, previous, &outcomes);
    user.segment = CustomerSegment::for_frequency(user.order_frequency);
    if user.segment != previous {
        info!(
            user = %user.id,
            from = previous.as_str(),
            to = user.segment.as_str(),
            frequency = user.order_frequency,
            "customer changed segment"
        );
    }

    outbox.push(
        OutputEvent::new(
            clock.unix_secs_at(clock.now()),
            EventBody::UserBehaviour(UserBehaviour {
                order_frequency: user.order_frequency,
                segment: user.segment.as_str(),
                previous_segment: previous.as_str(),
                total_orders: user.total_orders,
                cancelled_orders: user.cancelled_orders,
                lifetime_spend: user.lifetime_spend,
            }),
        )
        .with_user(user.id.clone()),
    );
}
