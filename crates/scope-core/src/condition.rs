//! Ground conditions
//!
//! A condition is a relation applied to an ordered tuple of roles with a
//! polarity. Kinematic relations form the closed [`Predicate`] enum; unary
//! object states and room membership complete [`Relation`].
//!
//! On the wire a condition is `{"predicate": "ontop", "body": [..],
//! "positive": true}`. `inroom` carries the room type as its second operand:
//! `{"predicate": "inroom", "body": ["table.n.02_1", "living_room"]}`.

use crate::error::InvariantViolation;
use crate::types::{RoleId, RoomType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Binary spatial predicates evaluated on bounding boxes and contacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Predicate {
    /// A rests on B
    OnTop,
    /// A is contained in (or covered by) B
    Inside,
    /// A is near B
    NextTo,
    /// A is beneath B
    Under,
    /// A and B share a contact point
    Touching,
}

impl Predicate {
    /// All predicates
    pub const ALL: [Predicate; 5] = [
        Predicate::OnTop,
        Predicate::Inside,
        Predicate::NextTo,
        Predicate::Under,
        Predicate::Touching,
    ];

    /// Wire name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Predicate::OnTop => "ontop",
            Predicate::Inside => "inside",
            Predicate::NextTo => "nextto",
            Predicate::Under => "under",
            Predicate::Touching => "touching",
        }
    }

    /// Support-map predicate used to actively place A, if any
    #[must_use]
    pub fn support_predicate(self) -> Option<SupportPredicate> {
        match self {
            Predicate::OnTop => Some(SupportPredicate::OnTop),
            Predicate::Inside => Some(SupportPredicate::Inside),
            Predicate::NextTo | Predicate::Under | Predicate::Touching => None,
        }
    }

    /// Goal conditions re-checked during room filtering
    #[must_use]
    pub fn constrains_room_filtering(self) -> bool {
        matches!(self, Predicate::OnTop | Predicate::Inside | Predicate::Under)
    }
}

/// Predicates that own a support map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportPredicate {
    /// Resting on an upward-facing surface
    OnTop,
    /// Resting inside a cavity
    Inside,
}

impl fmt::Display for SupportPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupportPredicate::OnTop => f.write_str("ontop"),
            SupportPredicate::Inside => f.write_str("inside"),
        }
    }
}

/// Unary states that carry no placement risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectState {
    /// Heated past its cooking point
    Cooked,
    /// Heated past its burn point
    Burnt,
    /// Below its freezing point
    Frozen,
    /// Covered in dust particles
    Dusty,
    /// Covered in stain particles
    Stained,
    /// Cut into parts
    Sliced,
    /// Saturated with liquid
    Soaked,
    /// Switched on
    ToggledOn,
    /// Articulated joints opened
    Open,
}

impl ObjectState {
    /// Wire name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ObjectState::Cooked => "cooked",
            ObjectState::Burnt => "burnt",
            ObjectState::Frozen => "frozen",
            ObjectState::Dusty => "dusty",
            ObjectState::Stained => "stained",
            ObjectState::Sliced => "sliced",
            ObjectState::Soaked => "soaked",
            ObjectState::ToggledOn => "toggled_on",
            ObjectState::Open => "open",
        }
    }
}

/// What a condition asserts about its body
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Relation {
    /// Binary spatial predicate over `[A, B]`
    Kinematic(Predicate),
    /// Unary state over `[A]`
    State(ObjectState),
    /// `[A]` is located in a room of this type
    InRoom(RoomType),
}

impl Relation {
    /// Wire name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Relation::Kinematic(p) => p.name(),
            Relation::State(s) => s.name(),
            Relation::InRoom(_) => "inroom",
        }
    }

    /// Roles in the body (room type excluded)
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            Relation::Kinematic(_) => 2,
            Relation::State(_) | Relation::InRoom(_) => 1,
        }
    }
}

/// A ground condition: `{relation, body, polarity}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawCondition", into = "RawCondition")]
pub struct Condition {
    /// The relation
    pub relation: Relation,
    /// Ordered role operands
    pub body: Vec<RoleId>,
    /// `false` for a negated condition
    pub positive: bool,
}

impl Condition {
    /// Positive kinematic condition `predicate(a, b)`
    #[must_use]
    pub fn kinematic(predicate: Predicate, a: impl Into<RoleId>, b: impl Into<RoleId>) -> Self {
        Self {
            relation: Relation::Kinematic(predicate),
            body: vec![a.into(), b.into()],
            positive: true,
        }
    }

    /// Positive unary state condition
    #[must_use]
    pub fn state(state: ObjectState, role: impl Into<RoleId>) -> Self {
        Self {
            relation: Relation::State(state),
            body: vec![role.into()],
            positive: true,
        }
    }

    /// Room assignment `inroom(role, room_type)`
    #[must_use]
    pub fn in_room(role: impl Into<RoleId>, room_type: impl Into<RoomType>) -> Self {
        Self {
            relation: Relation::InRoom(room_type.into()),
            body: vec![role.into()],
            positive: true,
        }
    }

    /// Flip polarity
    #[must_use]
    pub fn negated(mut self) -> Self {
        self.positive = !self.positive;
        self
    }

    /// Whether `role` is an operand
    #[inline]
    #[must_use]
    pub fn involves(&self, role: &RoleId) -> bool {
        self.body.contains(role)
    }

    /// Kinematic predicate, if this is one
    #[inline]
    #[must_use]
    pub fn predicate(&self) -> Option<Predicate> {
        match self.relation {
            Relation::Kinematic(p) => Some(p),
            _ => None,
        }
    }

    /// Check operand count against the relation
    ///
    /// # Errors
    /// `InvariantViolation::Arity` when the body length is wrong
    pub fn check_arity(&self) -> Result<(), InvariantViolation> {
        let expected = self.relation.arity();
        if self.body.len() == expected {
            Ok(())
        } else {
            Err(InvariantViolation::Arity {
                predicate: self.relation.name().to_string(),
                expected,
                actual: self.body.len(),
            })
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.positive {
            f.write_str("not ")?;
        }
        write!(f, "{}(", self.relation.name())?;
        for (i, role) in self.body.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{role}")?;
        }
        if let Relation::InRoom(room_type) = &self.relation {
            write!(f, ", {room_type}")?;
        }
        f.write_str(")")
    }
}

/// Error parsing a relation name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionParseError {
    /// Name is not a known relation
    #[error("unknown predicate [{0}]")]
    UnknownPredicate(String),

    /// `inroom` without a room type operand
    #[error("inroom needs [role, room_type], got {0} operands")]
    InRoomOperands(usize),
}

impl FromStr for Predicate {
    type Err = ConditionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ontop" | "on_top" => Ok(Predicate::OnTop),
            "inside" => Ok(Predicate::Inside),
            "nextto" | "next_to" => Ok(Predicate::NextTo),
            "under" => Ok(Predicate::Under),
            "touching" => Ok(Predicate::Touching),
            _ => Err(ConditionParseError::UnknownPredicate(s.to_string())),
        }
    }
}

impl FromStr for ObjectState {
    type Err = ConditionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cooked" => Ok(ObjectState::Cooked),
            "burnt" => Ok(ObjectState::Burnt),
            "frozen" => Ok(ObjectState::Frozen),
            "dusty" => Ok(ObjectState::Dusty),
            "stained" => Ok(ObjectState::Stained),
            "sliced" => Ok(ObjectState::Sliced),
            "soaked" => Ok(ObjectState::Soaked),
            "toggled_on" | "toggledon" => Ok(ObjectState::ToggledOn),
            "open" => Ok(ObjectState::Open),
            _ => Err(ConditionParseError::UnknownPredicate(s.to_string())),
        }
    }
}

fn default_positive() -> bool {
    true
}

/// Wire form of [`Condition`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCondition {
    predicate: String,
    body: Vec<String>,
    #[serde(default = "default_positive")]
    positive: bool,
}

impl TryFrom<RawCondition> for Condition {
    type Error = ConditionParseError;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        let mut body: Vec<RoleId> = raw.body.into_iter().map(RoleId::from).collect();
        let relation = if raw.predicate.eq_ignore_ascii_case("inroom") {
            if body.len() != 2 {
                return Err(ConditionParseError::InRoomOperands(body.len()));
            }
            match body.pop() {
                Some(room) => Relation::InRoom(RoomType(room.0)),
                None => return Err(ConditionParseError::InRoomOperands(0)),
            }
        } else if let Ok(p) = raw.predicate.parse::<Predicate>() {
            Relation::Kinematic(p)
        } else {
            Relation::State(raw.predicate.parse::<ObjectState>()?)
        };
        Ok(Condition {
            relation,
            body,
            positive: raw.positive,
        })
    }
}

impl From<Condition> for RawCondition {
    fn from(c: Condition) -> Self {
        let predicate = c.relation.name().to_string();
        let mut body: Vec<String> = c.body.into_iter().map(|r| r.0).collect();
        if let Relation::InRoom(room_type) = c.relation {
            body.push(room_type.0);
        }
        RawCondition {
            predicate,
            body,
            positive: c.positive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_wire_conditions() {
        let json = r#"[
            {"predicate": "ontop", "body": ["apple.n.01_1", "table.n.02_1"]},
            {"predicate": "cooked", "body": ["apple.n.01_1"], "positive": false},
            {"predicate": "inroom", "body": ["table.n.02_1", "kitchen"]}
        ]"#;
        let parsed: Vec<Condition> = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed,
            vec![
                Condition::kinematic(Predicate::OnTop, "apple.n.01_1", "table.n.02_1"),
                Condition::state(ObjectState::Cooked, "apple.n.01_1").negated(),
                Condition::in_room("table.n.02_1", "kitchen"),
            ]
        );
        assert_eq!(parsed[2].body.len(), 1);
    }

    #[test]
    fn rejects_unknown_predicate() {
        let json = r#"{"predicate": "levitating", "body": ["a"]}"#;
        assert!(serde_json::from_str::<Condition>(json).is_err());
    }

    #[test]
    fn round_trips_inroom() {
        let c = Condition::in_room("chair.n.01_1", "living_room");
        let text = serde_json::to_string(&c).unwrap();
        assert!(text.contains("living_room"));
        assert_eq!(serde_json::from_str::<Condition>(&text).unwrap(), c);
    }

    #[test]
    fn displays_negation() {
        let c = Condition::kinematic(Predicate::Inside, "a", "b").negated();
        assert_eq!(c.to_string(), "not inside(a, b)");
    }

    #[test]
    fn arity_is_checked() {
        let mut c = Condition::kinematic(Predicate::NextTo, "a", "b");
        c.body.pop();
        assert!(c.check_arity().is_err());
    }
}
