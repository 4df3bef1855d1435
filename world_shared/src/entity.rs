//! Entity model.
//!
//! The authoritative world vocabulary shared by client and server:
//! elements (ground bodies and passive scenery) and characters. All types
//! are serde-derived because they travel both over the wire and into the
//! persisted world database.

use serde::{Deserialize, Serialize};

use crate::math::Vec3;

/// Kinematic state owned by exactly one element or character.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicState {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Must stay strictly positive.
    pub mass: f64,
    pub radius: f64,
}

impl Default for PhysicState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            mass: 1.0,
            radius: 1.0,
        }
    }
}

impl PhysicState {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

/// Element type tag. Ground elements act as gravity sources and collision
/// surfaces; everything else is passive scenery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Ground,
    Other,
}

/// A named world element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Unique key within the world.
    pub name: String,
    pub kind: ElementKind,
    pub physic: PhysicState,
    /// RGB, each channel in [0,1].
    pub color: [f32; 3],
}

impl Element {
    pub fn is_ground(&self) -> bool {
        self.kind == ElementKind::Ground
    }
}

/// Character lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterStatus {
    #[default]
    Unknown,
    Loading,
    OnGround,
    Jumping,
    Dead,
}

/// A named player character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    /// Unique key within the world.
    pub name: String,
    pub physic: PhysicState,
    /// Summed gravitational force applied on the last simulation step.
    pub gravity: Vec3,
    /// Outward surface normal, the negated-normalized gravity vector.
    pub normal: Vec3,
    pub status: CharacterStatus,
}

impl Character {
    /// A freshly created character at the origin, still loading in.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            physic: PhysicState::default(),
            gravity: Vec3::ZERO,
            normal: Vec3::ZERO,
            status: CharacterStatus::Loading,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_tag() {
        let e = Element {
            name: "terra".into(),
            kind: ElementKind::Ground,
            physic: PhysicState::default(),
            color: [0.2, 0.6, 0.2],
        };
        assert!(e.is_ground());
    }

    #[test]
    fn named_character_defaults() {
        let c = Character::named("hero");
        assert_eq!(c.status, CharacterStatus::Loading);
        assert_eq!(c.physic.position, Vec3::ZERO);
        assert!(c.physic.mass > 0.0);
    }

    #[test]
    fn status_serializes_snake_case() {
        let s = serde_json::to_string(&CharacterStatus::OnGround).unwrap();
        assert_eq!(s, "\"on_ground\"");
    }
}
