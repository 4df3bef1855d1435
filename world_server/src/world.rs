//! Authoritative world state.
//!
//! A name-keyed store of elements and characters gated by a monotonically
//! increasing simulation time. Entries are upserted by two producers only:
//! drained client reports and the physics step itself. Nothing is ever
//! deleted at runtime.
//!
//! Determinism notes:
//! - `BTreeMap` keys give stable name-ordered iteration, so force
//!   accumulation, surface correction, and snapshot layout are reproducible.

use std::collections::BTreeMap;

use tracing::{debug, warn};
use world_shared::entity::{Character, Element};
use world_shared::net::WorldSnapshot;
use world_shared::store::WorldDatabase;

use crate::physics;

/// A stored value plus the time the producing report was received.
#[derive(Debug, Clone)]
pub struct Stamped<T> {
    pub reported_at: f64,
    pub value: T,
}

/// The authoritative, name-keyed world.
#[derive(Debug, Default)]
pub struct WorldState {
    elements: BTreeMap<String, Stamped<Element>>,
    characters: BTreeMap<String, Stamped<Character>>,
    /// Simulation time of the last applied update; strictly increasing.
    last_updated: f64,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a world from a persisted database; every entry is stamped
    /// with the database's save time.
    pub fn from_database(db: WorldDatabase) -> Self {
        let mut world = Self {
            last_updated: db.time,
            ..Self::default()
        };
        for element in db.elements {
            world.add_element(db.time, element);
        }
        for character in db.characters {
            world.add_character(db.time, character);
        }
        world
    }

    /// Captures the world into a persistable document.
    pub fn to_database(&self) -> WorldDatabase {
        WorldDatabase {
            time: self.last_updated,
            elements: self.elements(),
            characters: self.characters(),
        }
    }

    /// Upserts an element by name. Never triggers integration.
    pub fn add_element(&mut self, time: f64, element: Element) {
        debug!(name = %element.name, time, "upserting element");
        self.elements.insert(
            element.name.clone(),
            Stamped {
                reported_at: time,
                value: element,
            },
        );
    }

    /// Upserts a character by name. Unknown names are valid: a report for a
    /// character the world has never seen simply creates it.
    pub fn add_character(&mut self, time: f64, character: Character) {
        debug!(name = %character.name, time, "upserting character");
        self.characters.insert(
            character.name.clone(),
            Stamped {
                reported_at: time,
                value: character,
            },
        );
    }

    /// Advances the simulation to `time`.
    ///
    /// A repeated or stale timestamp is a logged no-op, never an error: the
    /// loop may legitimately be driven twice for the same tick. The first
    /// update of a fresh world only establishes the time baseline, since no
    /// meaningful `dt` exists yet.
    pub fn update(&mut self, time: f64) {
        if time <= self.last_updated {
            warn!(
                time,
                last_updated = self.last_updated,
                "simulation time did not advance, skipping update"
            );
            return;
        }
        if self.last_updated == 0.0 {
            debug!(time, "first update, establishing time baseline");
            self.last_updated = time;
            return;
        }

        let dt = time - self.last_updated;
        let grounds: Vec<Element> = self
            .elements
            .values()
            .filter(|e| e.value.is_ground())
            .map(|e| e.value.clone())
            .collect();

        for stamped in self.characters.values_mut() {
            physics::step_character(&mut stamped.value, &grounds, dt);
        }
        self.last_updated = time;
    }

    /// Deep snapshot of all elements, in name order.
    pub fn elements(&self) -> Vec<Element> {
        self.elements.values().map(|e| e.value.clone()).collect()
    }

    /// Deep snapshot of all characters, in name order.
    pub fn characters(&self) -> Vec<Character> {
        self.characters.values().map(|c| c.value.clone()).collect()
    }

    /// Builds the broadcast payload for the given tick time.
    pub fn snapshot(&self, time: f64) -> WorldSnapshot {
        WorldSnapshot {
            time,
            elements: self.elements(),
            characters: self.characters(),
        }
    }

    pub fn last_updated(&self) -> f64 {
        self.last_updated
    }
}
