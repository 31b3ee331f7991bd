#![allow(dead_code)]

use bevy_ecs::prelude::World;
use delivery_core::clock::SimulationClock;
use delivery_core::runner::{run_tick, SimulationSchedules};

/// Owns the tick schedules so tests can step the simulation without a sink.
pub struct TickRunner {
    schedules: SimulationSchedules,
}

impl Default for TickRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl TickRunner {
    pub fn new() -> Self {
        Self {
            schedules: SimulationSchedules::new(),
        }
    }

    /// Run a single tick (returns `false` at the end date).
    pub fn tick(&mut self, world: &mut World) -> bool {
        run_tick(world, &mut self.schedules)
    }

    /// Run up to `ticks` ticks, returning how many ran.
    pub fn run_ticks(&mut self, world: &mut World, ticks: usize) -> usize {
        (0..ticks).take_while(|_| self.tick(world)).count()
    }

    /// Tick until the clock reaches `until_ms` (or the end date), calling
    /// `check` after every tick.
    pub fn run_until_with<F>(&mut self, world: &mut World, until_ms: u64, mut check: F) -> usize
    where
        F: FnMut(&mut World),
    {
        let mut ticks = 0;
        while world.resource::<SimulationClock>().now() < until_ms && self.tick(world) {
            check(world);
            ticks += 1;
        }
        ticks
    }

    pub fn run_until(&mut self, world: &mut World, until_ms: u64) -> usize {
        self.run_until_with(world, until_ms, |_| {})
    }
}
