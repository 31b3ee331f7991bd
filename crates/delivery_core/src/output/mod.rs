//! Output: the per-tick outbox and its flush into an [OutputSink].
//!
//! Handlers append [OutputEvent]s to the [EventOutbox] while they run. At the
//! end of a tick the outbox is drained, serialized in parallel on a worker
//! pool, and written to the sink in the original order.

pub mod sink;
pub mod wire;

use bevy_ecs::prelude::Resource;
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::warn;

pub use sink::{JsonLinesSink, MemorySink, OutputSink};
pub use wire::{EventBody, OutputEvent, Topic};

use crate::error::SinkError;

/// Events emitted during the current tick, in emission order.
#[derive(Debug, Default, Resource)]
pub struct EventOutbox {
    events: Vec<OutputEvent>,
}

impl EventOutbox {
    pub fn push(&mut self, event: OutputEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[OutputEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> Vec<OutputEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub written: usize,
    pub failed: usize,
}

fn serialize(event: &OutputEvent) -> Result<Vec<u8>, SinkError> {
    Ok(serde_json::to_vec(event)?)
}

/// Serialize events, on `pool` when given. Order of the result matches `events`.
pub fn serialize_events(
    events: &[OutputEvent],
    pool: Option<&ThreadPool>,
) -> Vec<Result<Vec<u8>, SinkError>> {
    match pool {
        Some(pool) => pool.install(|| events.par_iter().map(serialize).collect()),
        None => events.iter().map(serialize).collect(),
    }
}

/// Write `events` to `sink` in order. Failures are logged and counted; they
/// never abort the flush.
pub fn write_events(
    events: &[OutputEvent],
    sink: &mut dyn OutputSink,
    pool: Option<&ThreadPool>,
) -> FlushStats {
    let mut stats = FlushStats::default();
    for (event, payload) in events.iter().zip(serialize_events(events, pool)) {
        let topic = event.topic().name();
        let result = payload.and_then(|bytes| sink.write_message(topic, &bytes));
        match result {
            Ok(()) => stats.written += 1,
            Err(err) => {
                warn!(topic, event_type = event.event_type, error = %err, "failed to emit event");
                stats.failed += 1;
            }
        }
    }
    stats
}

/// Drain the outbox into the sink.
pub fn flush_outbox(
    outbox: &mut EventOutbox,
    sink: &mut dyn OutputSink,
    pool: Option<&ThreadPool>,
) -> FlushStats {
    let events = outbox.drain();
    if events.is_empty() {
        return FlushStats::default();
    }
    write_events(&events, sink, pool)
}

/// Worker pool of `threads` threads (at least one).
pub fn build_pool(threads: usize) -> Result<ThreadPool, SinkError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|i| format!("delivery-output-{i}"))
        .build()
        .map_err(|err| SinkError::Pool(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::wire::{OrderReady, ReviewSubmitted};

    fn ready(i: usize) -> OutputEvent {
        OutputEvent::new(
            i as i64,
            EventBody::OrderReady(OrderReady {
                order_id: format!("ord-{i}"),
                status: "ready",
                ready_at: i as i64,
                awaiting_courier: true,
            }),
        )
    }

    struct FailingSink {
        fail_on: usize,
        seen: usize,
        inner: MemorySink,
    }

    impl OutputSink for FailingSink {
        fn write_message(&mut self, topic: &str, payload: &[u8]) -> Result<(), SinkError> {
            self.seen += 1;
            if self.seen == self.fail_on {
                return Err(SinkError::Closed);
            }
            self.inner.write_message(topic, payload)
        }
    }

    #[test]
    fn parallel_flush_preserves_order() {
        let pool = build_pool(4).expect("pool");
        let mut outbox = EventOutbox::default();
        for i in 0..500 {
            outbox.push(ready(i));
        }
        outbox.push(OutputEvent::new(
            9,
            EventBody::Review(ReviewSubmitted {
                order_id: "ord-x".into(),
                food_rating: 5.0,
                delivery_rating: 4.0,
                overall_rating: 4.6,
            }),
        ));
        let mut sink = MemorySink::new();
        let stats = flush_outbox(&mut outbox, &mut sink, Some(&pool));
        assert_eq!(stats, FlushStats { written: 501, failed: 0 });
        assert!(outbox.is_empty());
        let ready_events = sink.events_on("order_ready_events");
        for (i, event) in ready_events.iter().enumerate() {
            assert_eq!(event["orderId"], format!("ord-{i}"));
        }
        assert_eq!(sink.topics().last(), Some(&"review_events"));
    }

    #[test]
    fn sink_errors_are_counted_not_fatal() {
        let mut outbox = EventOutbox::default();
        for i in 0..3 {
            outbox.push(ready(i));
        }
        let mut sink = FailingSink {
            fail_on: 2,
            seen: 0,
            inner: MemorySink::new(),
        };
        let stats = flush_outbox(&mut outbox, &mut sink, None);
        assert_eq!(stats, FlushStats { written: 2, failed: 1 });
        assert_eq!(sink.inner.len(), 2);
    }
}
