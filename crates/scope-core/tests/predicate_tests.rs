use nalgebra::Vector3;
use proptest::prelude::*;
use scope_core::predicates::{inside, next_to, on_top, separation, under, ON_TOP_Z_TOLERANCE};
use scope_core::types::Aabb;

fn aabb_strategy() -> impl Strategy<Value = Aabb> {
    (
        (-5.0..5.0f64, -5.0..5.0f64, -5.0..5.0f64),
        (0.01..2.0f64, 0.01..2.0f64, 0.01..2.0f64),
    )
        .prop_map(|((x, y, z), (w, d, h))| {
            Aabb::new(Vector3::new(x, y, z), Vector3::new(x + w, y + d, z + h))
        })
}

proptest! {
    #[test]
    fn prop_next_to_is_symmetric(a in aabb_strategy(), b in aabb_strategy()) {
        prop_assert_eq!(next_to(&a, &b), next_to(&b, &a));
        prop_assert!((separation(&a, &b) - separation(&b, &a)).abs() < 1e-12);
    }

    #[test]
    fn prop_box_resting_on_top_is_on_top(
        b in aabb_strategy(),
        (w, d, h) in (0.01..0.5f64, 0.01..0.5f64, 0.05..0.5f64),
        gap in -ON_TOP_Z_TOLERANCE..ON_TOP_Z_TOLERANCE,
    ) {
        let c = b.center();
        let a = Aabb::new(
            Vector3::new(c.x - w / 2.0, c.y - d / 2.0, b.max.z + gap),
            Vector3::new(c.x + w / 2.0, c.y + d / 2.0, b.max.z + gap + h),
        );
        prop_assert!(on_top(&a, &b, true));
        prop_assert!(!on_top(&a, &b, false));
        prop_assert!(!under(&a, &b));
    }

    #[test]
    fn prop_under_excludes_vertical_overlap(a in aabb_strategy(), b in aabb_strategy()) {
        if under(&a, &b) {
            prop_assert!(a.max.z <= b.min.z);
            prop_assert!(!under(&b, &a) || a.max.z == b.min.z);
        }
    }

    #[test]
    fn prop_shrunken_copy_is_inside(b in aabb_strategy(), f in 0.1..0.9f64) {
        let c = b.center();
        let half = b.extent() * (f / 2.0);
        let a = Aabb::from_center_half_extents(c, half);
        prop_assert!(inside(&a, &b));
    }
}

#[test]
fn test_on_top_boundary_exact() {
    let table = Aabb::new(Vector3::new(0.0, 0.0, -1.0), Vector3::new(1.0, 1.0, 0.0));
    let at_tolerance = Aabb::new(Vector3::new(0.4, 0.4, 0.025), Vector3::new(0.6, 0.6, 0.3));
    let past_tolerance = Aabb::new(Vector3::new(0.4, 0.4, 0.0251), Vector3::new(0.6, 0.6, 0.3));
    assert!(on_top(&at_tolerance, &table, true));
    assert!(!on_top(&past_tolerance, &table, true));
}
