//! Persisted world database.
//!
//! A single JSON document holding the simulation time plus every element
//! and character. Load/save are opaque to the simulation core; the server
//! binary decides what a failed load means (at startup: fatal, the process
//! must not run on a partially-loaded world).

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::entity::{Character, Element};

/// On-disk world document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldDatabase {
    /// Simulation time the world was saved at.
    pub time: f64,
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default)]
    pub characters: Vec<Character>,
}

impl WorldDatabase {
    /// Reads and parses a world database file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read world database {}", path.display()))?;
        let db = serde_json::from_str(&raw)
            .with_context(|| format!("parse world database {}", path.display()))?;
        Ok(db)
    }

    /// Writes the database as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let raw = serde_json::to_string_pretty(self).context("serialize world database")?;
        fs::write(path, raw).with_context(|| format!("write world database {}", path.display()))?;
        Ok(())
    }
}
