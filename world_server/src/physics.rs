//! Physics integration.
//!
//! Pure computation, no shared state:
//! - Newtonian gravity between ground elements and characters.
//! - Explicit (forward) Euler integration, applied per axis.
//! - Surface-penetration correction against ground bodies.
//!
//! Determinism notes:
//! - Callers pass grounds in name order; forces accumulate and surface
//!   corrections apply in that same order, so results are reproducible.

use world_shared::entity::{Character, CharacterStatus, Element, PhysicState};
use world_shared::math::Vec3;

/// Gravitational constant, m^3 kg^-1 s^-2.
pub const G: f64 = 6.674e-11;

/// Pairs closer than this contribute no force and cannot be pushed apart:
/// there is no defined direction between coincident centers.
pub const DISTANCE_EPSILON: f64 = 1e-9;

/// Gravitational pull of `source` on `target`, pointing from the target
/// toward the source.
pub fn gravitational_force(source: &PhysicState, target: &PhysicState) -> Vec3 {
    let offset = source.position - target.position;
    let dist = offset.len();
    if dist < DISTANCE_EPSILON {
        return Vec3::ZERO;
    }
    let magnitude = G * source.mass * target.mass / (dist * dist);
    offset * (magnitude / dist)
}

/// Advances one character by `dt` seconds under the given ground bodies.
///
/// Stores the summed force as the character's gravity vector and its
/// negated-normalized form as the surface normal, then Euler-integrates
/// and resolves any surface penetration.
pub fn step_character(character: &mut Character, grounds: &[Element], dt: f64) {
    let mut force = Vec3::ZERO;
    for ground in grounds {
        force += gravitational_force(&ground.physic, &character.physic);
    }
    character.gravity = force;
    character.normal = (-force).normalized_or_zero();

    let accel = force * (1.0 / character.physic.mass);
    character.physic.velocity += accel * dt;
    character.physic.position += character.physic.velocity * dt;

    for ground in grounds {
        correct_surface(character, ground);
    }
}

/// Pushes a penetrating character back onto the combined-radius shell of
/// `ground` along the outward normal and marks it on the ground.
pub fn correct_surface(character: &mut Character, ground: &Element) {
    let contact = character.physic.radius + ground.physic.radius;
    let offset = character.physic.position - ground.physic.position;
    let dist = offset.len();
    if dist >= contact || dist < DISTANCE_EPSILON {
        return;
    }
    character.physic.position = ground.physic.position + offset * (contact / dist);
    character.status = CharacterStatus::OnGround;
}

#[cfg(test)]
mod tests {
    use super::*;
    use world_shared::entity::ElementKind;

    fn ground(mass: f64, radius: f64) -> Element {
        Element {
            name: "terra".into(),
            kind: ElementKind::Ground,
            physic: PhysicState {
                position: Vec3::ZERO,
                velocity: Vec3::ZERO,
                mass,
                radius,
            },
            color: [0.4, 0.3, 0.2],
        }
    }

    fn character_at(x: f64) -> Character {
        let mut c = Character::named("hero");
        c.physic.position = Vec3::new(x, 0.0, 0.0);
        c
    }

    #[test]
    fn force_points_from_target_toward_source() {
        let g = ground(1e24, 10.0);
        let c = character_at(20.0);
        let f = gravitational_force(&g.physic, &c.physic);
        assert!(f.x < 0.0);
        assert_eq!(f.y, 0.0);
        assert_eq!(f.z, 0.0);
    }

    #[test]
    fn force_strictly_decreases_with_distance() {
        let g = ground(1e20, 10.0);
        let mut last = f64::INFINITY;
        for x in [15.0, 20.0, 30.0, 50.0, 100.0] {
            let f = gravitational_force(&g.physic, &character_at(x).physic).len();
            assert!(f < last, "force did not decrease at x={x}");
            last = f;
        }
    }

    #[test]
    fn coincident_pair_contributes_nothing() {
        let g = ground(1e24, 10.0);
        let c = character_at(0.0);
        assert_eq!(gravitational_force(&g.physic, &c.physic), Vec3::ZERO);
    }

    #[test]
    fn penetration_resolves_exactly_to_contact_distance() {
        let g = ground(1e24, 10.0);
        let mut c = character_at(7.5);
        correct_surface(&mut c, &g);
        let dist = c.physic.position.distance(g.physic.position);
        let contact = c.physic.radius + g.physic.radius;
        assert!((dist - contact).abs() < 1e-9, "dist={dist}, contact={contact}");
        assert_eq!(c.status, CharacterStatus::OnGround);
    }

    #[test]
    fn correction_leaves_separated_bodies_alone() {
        let g = ground(1e24, 10.0);
        let mut c = character_at(20.0);
        let before = c.physic.position;
        correct_surface(&mut c, &g);
        assert_eq!(c.physic.position, before);
        assert_ne!(c.status, CharacterStatus::OnGround);
    }

    #[test]
    fn one_step_pulls_character_inward() {
        // Acceptance scenario: ground 1e24 kg r=10 at origin, character at
        // (20,0,0), unit mass/radius, at rest, dt = 1 s.
        let grounds = vec![ground(1e24, 10.0)];
        let mut c = character_at(20.0);
        step_character(&mut c, &grounds, 1.0);
        assert!(c.physic.velocity.x < 0.0);
        assert!(c.gravity.x < 0.0);
        assert!((c.normal - Vec3::new(1.0, 0.0, 0.0)).len() < 1e-12);
        assert_ne!(c.status, CharacterStatus::OnGround);
    }

    #[test]
    fn falling_body_settles_on_the_surface_shell() {
        // A gentler mass keeps forward Euler stable at dt = 1 s so the fall
        // actually terminates on the shell instead of tunneling through.
        let grounds = vec![ground(5e11, 10.0)];
        let mut c = character_at(20.0);
        for _ in 0..30 {
            step_character(&mut c, &grounds, 1.0);
        }
        let dist = c.physic.position.distance(grounds[0].physic.position);
        assert!((dist - 11.0).abs() < 1e-9, "dist={dist}");
        assert_eq!(c.status, CharacterStatus::OnGround);
    }

    #[test]
    fn normal_is_negated_normalized_gravity() {
        let grounds = vec![ground(1e20, 10.0)];
        let mut c = character_at(25.0);
        step_character(&mut c, &grounds, 0.1);
        let expected = (-c.gravity).normalized_or_zero();
        assert_eq!(c.normal, expected);
    }
}
