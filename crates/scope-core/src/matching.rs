//! Bipartite matching of roles to candidate objects
//!
//! One [`MatchGraph`] per room instance: role nodes on one side, candidate
//! object nodes on the other, an edge wherever the object survived filtering
//! for the role. A room instance is accepted only when the maximum matching
//! saturates every role.

use crate::resolver::CandidateScope;
use crate::types::{ObjectId, RoleId, RoomInstanceId, RoomType};
use indexmap::IndexMap;
use petgraph::algo::maximum_matching;
use petgraph::graph::{NodeIndex, UnGraph};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use tracing::debug;

/// Node of a [`MatchGraph`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchNode {
    /// Task role
    Role(RoleId),
    /// Scene object
    Object(ObjectId),
}

/// Bipartite role/object graph of one room instance
#[derive(Debug, Clone, Default)]
pub struct MatchGraph {
    graph: UnGraph<MatchNode, ()>,
    roles: IndexMap<RoleId, NodeIndex>,
    objects: HashMap<ObjectId, NodeIndex>,
}

impl MatchGraph {
    /// Empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph for one room instance of a room type
    #[must_use]
    pub fn for_room(candidates: &CandidateScope, room_type: &RoomType, room: &RoomInstanceId) -> Self {
        let mut graph = Self::new();
        for role in candidates.roles(room_type) {
            graph.add_role(&role);
            let objects = candidates
                .candidates(room_type, &role)
                .and_then(|per_room| per_room.get(room));
            for &object in objects.into_iter().flatten() {
                graph.add_edge(&role, object);
            }
        }
        graph
    }

    /// Add a role node; roles without edges make the matching imperfect
    pub fn add_role(&mut self, role: &RoleId) -> NodeIndex {
        if let Some(&idx) = self.roles.get(role) {
            return idx;
        }
        let idx = self.graph.add_node(MatchNode::Role(role.clone()));
        self.roles.insert(role.clone(), idx);
        idx
    }

    /// Add an edge between a role and a candidate object
    pub fn add_edge(&mut self, role: &RoleId, object: ObjectId) {
        let role_idx = self.add_role(role);
        let object_idx = *self
            .objects
            .entry(object)
            .or_insert_with(|| self.graph.add_node(MatchNode::Object(object)));
        if self.graph.find_edge(role_idx, object_idx).is_none() {
            self.graph.add_edge(role_idx, object_idx, ());
        }
    }

    /// Number of role nodes
    #[must_use]
    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    /// Number of edges
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// A maximum matching, as role → object pairs
    #[must_use]
    pub fn maximum_matching(&self) -> IndexMap<RoleId, ObjectId> {
        let matching = maximum_matching(&self.graph);
        let mut out = IndexMap::new();
        for (role, &idx) in &self.roles {
            if let Some(mate) = matching.mate(idx) {
                if let MatchNode::Object(object) = self.graph[mate] {
                    out.insert(role.clone(), object);
                }
            }
        }
        out
    }

    /// The maximum matching if it covers every role
    #[must_use]
    pub fn perfect_matching(&self) -> Option<IndexMap<RoleId, ObjectId>> {
        let matched = self.maximum_matching();
        (matched.len() == self.roles.len()).then_some(matched)
    }
}

/// Accepted room instance with its role assignments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMatch {
    /// Chosen room instance
    pub room: RoomInstanceId,
    /// Role → object
    pub assignments: IndexMap<RoleId, ObjectId>,
    /// Room instances tried, including the accepted one
    pub tried: usize,
}

/// Try the room instances of a room type in random order until one yields a
/// perfect matching
#[must_use]
pub fn match_room_type<R: Rng + ?Sized>(
    candidates: &CandidateScope,
    room_type: &RoomType,
    rng: &mut R,
) -> Option<RoomMatch> {
    let mut rooms = candidates.room_instances(room_type);
    rooms.shuffle(rng);
    for (i, room) in rooms.into_iter().enumerate() {
        let graph = MatchGraph::for_room(candidates, room_type, &room);
        if let Some(assignments) = graph.perfect_matching() {
            debug!(%room_type, %room, roles = graph.role_count(), "perfect matching found");
            return Some(RoomMatch {
                room,
                assignments,
                tried: i + 1,
            });
        }
        debug!(%room_type, %room, "no perfect matching");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(name: &str) -> RoleId {
        RoleId::new(name)
    }

    #[test]
    fn perfect_matching_needs_augmenting_path() {
        // greedy a->1 would block b; the maximum matching is a->2, b->1
        let mut g = MatchGraph::new();
        g.add_edge(&role("a"), ObjectId(1));
        g.add_edge(&role("a"), ObjectId(2));
        g.add_edge(&role("b"), ObjectId(1));
        let m = g.perfect_matching().unwrap();
        assert_eq!(m[&role("a")], ObjectId(2));
        assert_eq!(m[&role("b")], ObjectId(1));
    }

    #[test]
    fn two_roles_one_object_is_imperfect() {
        let mut g = MatchGraph::new();
        g.add_edge(&role("a"), ObjectId(1));
        g.add_edge(&role("b"), ObjectId(1));
        assert!(g.perfect_matching().is_none());
        assert_eq!(g.maximum_matching().len(), 1);
    }

    #[test]
    fn isolated_role_is_imperfect() {
        let mut g = MatchGraph::new();
        g.add_role(&role("a"));
        assert!(g.perfect_matching().is_none());
    }

    #[test]
    fn duplicate_edges_are_ignored() {
        let mut g = MatchGraph::new();
        g.add_edge(&role("a"), ObjectId(1));
        g.add_edge(&role("a"), ObjectId(1));
        assert_eq!(g.edge_count(), 1);
    }
}
