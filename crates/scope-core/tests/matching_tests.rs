use proptest::prelude::*;
use scope_core::matching::MatchGraph;
use scope_core::types::{ObjectId, RoleId};
use std::collections::HashSet;

fn brute_force_perfect(adjacency: &[Vec<bool>], objects: usize) -> bool {
    fn assign(role: usize, adjacency: &[Vec<bool>], used: &mut Vec<bool>) -> bool {
        if role == adjacency.len() {
            return true;
        }
        for (obj, &edge) in adjacency[role].iter().enumerate() {
            if edge && !used[obj] {
                used[obj] = true;
                if assign(role + 1, adjacency, used) {
                    return true;
                }
                used[obj] = false;
            }
        }
        false
    }
    assign(0, adjacency, &mut vec![false; objects])
}

fn build(adjacency: &[Vec<bool>]) -> (MatchGraph, Vec<RoleId>) {
    let mut graph = MatchGraph::new();
    let roles: Vec<RoleId> = (0..adjacency.len()).map(|i| RoleId::new(format!("r{i}"))).collect();
    for (i, row) in adjacency.iter().enumerate() {
        graph.add_role(&roles[i]);
        for (j, &edge) in row.iter().enumerate() {
            if edge {
                graph.add_edge(&roles[i], ObjectId(j as u32));
            }
        }
    }
    (graph, roles)
}

proptest! {
    #[test]
    fn prop_matching_agrees_with_brute_force(
        roles in 1..5usize,
        objects in 1..5usize,
        bits in proptest::collection::vec(any::<bool>(), 16)
    ) {
        let adjacency: Vec<Vec<bool>> = (0..roles)
            .map(|i| (0..objects).map(|j| bits[i * 4 + j]).collect())
            .collect();
        let (graph, role_ids) = build(&adjacency);
        let expected = brute_force_perfect(&adjacency, objects);
        let found = graph.perfect_matching();
        prop_assert_eq!(found.is_some(), expected);

        if let Some(assignments) = found {
            let mut seen = HashSet::new();
            for (i, role) in role_ids.iter().enumerate() {
                let object = assignments[role];
                prop_assert!(adjacency[i][object.0 as usize]);
                prop_assert!(seen.insert(object));
            }
        }
    }

    #[test]
    fn prop_maximum_matching_is_valid(
        roles in 1..6usize,
        objects in 1..6usize,
        bits in proptest::collection::vec(any::<bool>(), 25)
    ) {
        let adjacency: Vec<Vec<bool>> = (0..roles)
            .map(|i| (0..objects).map(|j| bits[i * 5 + j]).collect())
            .collect();
        let (graph, role_ids) = build(&adjacency);
        let matched = graph.maximum_matching();
        prop_assert!(matched.len() <= roles.min(objects));
        let distinct: HashSet<_> = matched.values().collect();
        prop_assert_eq!(distinct.len(), matched.len());
        for (role, object) in &matched {
            let i = role_ids.iter().position(|r| r == role).unwrap();
            prop_assert!(adjacency[i][object.0 as usize]);
        }
    }
}

#[test]
fn test_three_roles_hall_violation() {
    // three roles share two objects: Hall's condition fails
    let adjacency = vec![
        vec![true, true, false],
        vec![true, true, false],
        vec![true, true, false],
    ];
    let (graph, _) = build(&adjacency);
    assert!(graph.perfect_matching().is_none());
    assert_eq!(graph.maximum_matching().len(), 2);
}
