//! Geometric predicate engine
//!
//! Pure functions over bounding boxes (plus a contact flag for `ontop`).
//! Tolerances are fixed. `on_top` and `under` are not inverses of each other:
//! `on_top` needs contact and a z band, `under` only a strict vertical order.

use crate::condition::Predicate;
use crate::error::PhysicsError;
use crate::physics::{in_contact, PhysicsWorld};
use crate::types::{Aabb, ObjectId};

/// Allowed gap between A's base and B's top for `ontop`
pub const ON_TOP_Z_TOLERANCE: f64 = 0.025;

/// `nextto` threshold is the mean combined extent divided by this
pub const NEXT_TO_DIVISOR: f64 = 6.0;

/// A rests on B
#[must_use]
pub fn on_top(a: &Aabb, b: &Aabb, in_contact: bool) -> bool {
    let center = a.center();
    let base_z = a.min.z;
    let top_z = b.max.z;
    b.footprint_contains(center.x, center.y)
        && base_z >= top_z - ON_TOP_Z_TOLERANCE
        && base_z <= top_z + ON_TOP_Z_TOLERANCE
        && in_contact
}

/// A is inside B, or hovers within B's footprint above it
#[must_use]
pub fn inside(a: &Aabb, b: &Aabb) -> bool {
    let center = a.center();
    let center_inside = b.contains_point(&center);
    let volume_lesser = a.volume() < b.volume();
    let (ea, eb) = (a.extent(), b.extent());
    let dims_lesser = (0..3).filter(|&i| ea[i] <= eb[i]).count() >= 2;
    let above = b.footprint_contains(center.x, center.y) && b.max.z <= a.min.z;
    (center_inside && volume_lesser && dims_lesser) || above
}

/// Gap between two boxes along every axis, zero where they overlap
#[must_use]
pub fn separation(a: &Aabb, b: &Aabb) -> f64 {
    let mut sq = 0.0;
    for i in 0..3 {
        let gap = (a.min[i].max(b.min[i]) - a.max[i].min(b.max[i])).max(0.0);
        sq += gap * gap;
    }
    sq.sqrt()
}

/// A is near B relative to their combined size
#[must_use]
pub fn next_to(a: &Aabb, b: &Aabb) -> bool {
    let combined = a.extent() + b.extent();
    let mean = (combined.x + combined.y + combined.z) / 3.0;
    separation(a, b) <= mean / NEXT_TO_DIVISOR
}

/// A's centre lies in B's footprint and A is entirely below B
#[must_use]
pub fn under(a: &Aabb, b: &Aabb) -> bool {
    let center = a.center();
    b.footprint_contains(center.x, center.y) && a.max.z <= b.min.z
}

/// Evaluate `predicate(a, b)` against the live scene
///
/// # Errors
/// Propagates unknown-body errors from the engine
pub fn evaluate<W: PhysicsWorld + ?Sized>(
    world: &W,
    predicate: Predicate,
    a: ObjectId,
    b: ObjectId,
) -> Result<bool, PhysicsError> {
    let (aabb_a, aabb_b) = (world.aabb(a)?, world.aabb(b)?);
    let holds = match predicate {
        Predicate::OnTop => on_top(&aabb_a, &aabb_b, in_contact(world, a, b)?),
        Predicate::Inside => inside(&aabb_a, &aabb_b),
        Predicate::NextTo => next_to(&aabb_a, &aabb_b),
        Predicate::Under => under(&aabb_a, &aabb_b),
        Predicate::Touching => in_contact(world, a, b)?,
    };
    Ok(holds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn bx(min: [f64; 3], max: [f64; 3]) -> Aabb {
        Aabb::new(Vector3::from(min), Vector3::from(max))
    }

    #[test]
    fn on_top_z_band_is_inclusive() {
        let table = bx([-1.0, -1.0, -0.5], [1.0, 1.0, 0.0]);
        let exact = bx([-0.1, -0.1, 0.025], [0.1, 0.1, 0.2]);
        let beyond = bx([-0.1, -0.1, 0.0251], [0.1, 0.1, 0.2]);
        assert!(on_top(&exact, &table, true));
        assert!(!on_top(&beyond, &table, true));
        assert!(!on_top(&exact, &table, false));
    }

    #[test]
    fn on_top_needs_center_over_footprint() {
        let table = bx([-1.0, -1.0, -0.5], [1.0, 1.0, 0.0]);
        let off = bx([1.05, -0.1, 0.0], [1.25, 0.1, 0.2]);
        assert!(!on_top(&off, &table, true));
    }

    #[test]
    fn inside_small_box_in_big_box() {
        let bowl = bx([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let apple = bx([0.4, 0.4, 0.1], [0.6, 0.6, 0.3]);
        assert!(inside(&apple, &bowl));
        assert!(!inside(&bowl, &apple));
    }

    #[test]
    fn inside_accepts_hovering_over_footprint() {
        let shelf = bx([0.0, 0.0, 0.0], [1.0, 1.0, 0.1]);
        let above = bx([0.2, 0.2, 0.5], [0.8, 0.8, 0.9]);
        assert!(inside(&above, &shelf));
    }

    #[test]
    fn next_to_threshold() {
        let a = bx([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        // mean combined extent 2.0, threshold 1/3
        let near = bx([1.3, 0.0, 0.0], [2.3, 1.0, 1.0]);
        let far = bx([1.4, 0.0, 0.0], [2.4, 1.0, 1.0]);
        assert!(next_to(&a, &near));
        assert!(!next_to(&a, &far));
    }

    #[test]
    fn under_and_on_top_are_not_inverses() {
        let table = bx([-1.0, -1.0, 0.5], [1.0, 1.0, 0.6]);
        let box_below = bx([-0.1, -0.1, 0.0], [0.1, 0.1, 0.2]);
        assert!(under(&box_below, &table));
        // the table is far above the box and not in contact
        assert!(!on_top(&table, &box_below, false));
    }

    #[test]
    fn separation_is_zero_when_overlapping() {
        let a = bx([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let b = bx([0.5, 0.5, 0.5], [2.0, 2.0, 2.0]);
        assert_eq!(separation(&a, &b), 0.0);
    }
}
