//! Fixed-rate simulation loop.
//!
//! Each tick: drain pending movement reports into the world, advance the
//! world to "now", and broadcast the resulting snapshot to every subscribed
//! connection. Pacing uses absolute deadlines (`next += period`) so the
//! tick rate does not drift with per-tick work.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};
use world_shared::clock::wall_clock_seconds;
use world_shared::entity::Character;

use crate::registry::ResponderRegistry;
use crate::world::{Stamped, WorldState};

/// Buffer of client-submitted character reports awaiting the next tick.
#[derive(Debug, Default)]
pub struct ReportQueue {
    pending: Mutex<Vec<Stamped<Character>>>,
}

impl ReportQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a report tagged with its receipt time.
    pub fn push(&self, reported_at: f64, character: Character) {
        self.pending
            .lock()
            .expect("report queue poisoned")
            .push(Stamped {
                reported_at,
                value: character,
            });
    }

    /// Takes every pending report, leaving the queue empty.
    pub fn drain(&self) -> Vec<Stamped<Character>> {
        std::mem::take(&mut *self.pending.lock().expect("report queue poisoned"))
    }

    pub fn len(&self) -> usize {
        self.pending.lock().expect("report queue poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The fixed-rate driver tying world, reports, and responders together.
pub struct SimulationLoop {
    world: Arc<Mutex<WorldState>>,
    reports: Arc<ReportQueue>,
    registry: Arc<ResponderRegistry>,
    period: Duration,
    shutdown: watch::Receiver<bool>,
}

impl SimulationLoop {
    pub fn new(
        world: Arc<Mutex<WorldState>>,
        reports: Arc<ReportQueue>,
        registry: Arc<ResponderRegistry>,
        period: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            world,
            reports,
            registry,
            period,
            shutdown,
        }
    }

    /// Executes one tick at simulation time `now`. Returns the number of
    /// snapshot writes issued.
    pub fn tick(&self, now: f64) -> usize {
        let drained = self.reports.drain();
        let snapshot = {
            let mut world = self.world.lock().expect("world state poisoned");
            for report in drained {
                world.add_character(report.reported_at, report.value);
            }
            world.update(now);
            world.snapshot(now)
        };
        let issued = self.registry.broadcast(&snapshot);
        debug!(
            time = now,
            characters = snapshot.characters.len(),
            issued, "tick"
        );
        issued
    }

    /// Runs until the shutdown signal flips. Never terminates on its own.
    pub async fn run(mut self) {
        info!(period_ms = self.period.as_millis() as u64, "simulation loop started");
        let mut next = Instant::now();
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(next) => {
                    self.tick(wall_clock_seconds());
                    next += self.period;
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("simulation loop stopped");
    }
}
