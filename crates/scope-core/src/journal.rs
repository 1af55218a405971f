//! Hash-chained sampling journal
//!
//! Every sampling decision of an attempt is appended as a [`JournalRecord`].
//! Each entry stores the SHA-256 of its content chained to the previous
//! entry, so the final [`SamplingJournal::digest`] summarizes the whole
//! attempt. Records hold no wall-clock data: two runs with the same seed,
//! task and scene produce identical digests.

use crate::types::{ObjectId, RoleId, RoomInstanceId, RoomType};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stage of the sampling pipeline a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Room-type resolution over the scene
    SceneCheck,
    /// Sampleable role bound to an existing or imported object
    Instantiation,
    /// Candidate filtering against initial conditions
    InitialFilter,
    /// Goal-condition set picked for an attempt
    GoalSelection,
    /// Candidate filtering against goal conditions
    GoalFilter,
    /// Per-room-instance bipartite matching
    Matching,
    /// Final condition enforcement
    Enforcement,
    /// Diagnostic re-sampling
    Debug,
}

impl Phase {
    fn tag(self) -> u8 {
        match self {
            Phase::SceneCheck => 0,
            Phase::Instantiation => 1,
            Phase::InitialFilter => 2,
            Phase::GoalSelection => 3,
            Phase::GoalFilter => 4,
            Phase::Matching => 5,
            Phase::Enforcement => 6,
            Phase::Debug => 7,
        }
    }
}

/// One sampling event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    /// Pipeline stage
    pub phase: Phase,
    /// Room type under consideration
    pub room_type: Option<RoomType>,
    /// Role under consideration
    pub role: Option<RoleId>,
    /// Room instance under consideration
    pub room_instance: Option<RoomInstanceId>,
    /// Candidate or bound object
    pub object: Option<ObjectId>,
    /// Condition text
    pub condition: Option<String>,
    /// Whether the step succeeded
    pub success: bool,
    /// Short free-form note
    pub detail: String,
}

impl JournalRecord {
    /// Record with only a phase and an outcome
    #[must_use]
    pub fn new(phase: Phase, success: bool) -> Self {
        Self {
            phase,
            room_type: None,
            role: None,
            room_instance: None,
            object: None,
            condition: None,
            success,
            detail: String::new(),
        }
    }

    /// With room type
    #[must_use]
    pub fn room_type(mut self, room_type: &RoomType) -> Self {
        self.room_type = Some(room_type.clone());
        self
    }

    /// With role
    #[must_use]
    pub fn role(mut self, role: &RoleId) -> Self {
        self.role = Some(role.clone());
        self
    }

    /// With room instance
    #[must_use]
    pub fn room_instance(mut self, room: &RoomInstanceId) -> Self {
        self.room_instance = Some(room.clone());
        self
    }

    /// With object
    #[must_use]
    pub fn object(mut self, object: ObjectId) -> Self {
        self.object = Some(object);
        self
    }

    /// With condition text
    #[must_use]
    pub fn condition(mut self, condition: impl ToString) -> Self {
        self.condition = Some(condition.to_string());
        self
    }

    /// With detail
    #[must_use]
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

/// A record with its position in the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Zero-based position
    pub seq: u64,
    /// Content
    pub record: JournalRecord,
    /// Hash of the previous entry, zeros for the first
    pub prev_hash: [u8; 32],
    /// Hash of this entry
    pub hash: [u8; 32],
}

/// Journal verification failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JournalError {
    /// An entry's link or hash does not match its content
    #[error("journal integrity violation at entry {seq}")]
    IntegrityViolation {
        /// First bad entry
        seq: u64,
    },
}

/// Append-only record of one sampling attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingJournal {
    entries: Vec<JournalEntry>,
}

impl SamplingJournal {
    /// Empty journal
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return its sequence number
    pub fn record(&mut self, record: JournalRecord) -> u64 {
        let seq = self.entries.len() as u64;
        let prev_hash = self.entries.last().map_or([0u8; 32], |e| e.hash);
        let hash = compute_hash(seq, &record, &prev_hash);
        self.entries.push(JournalEntry {
            seq,
            record,
            prev_hash,
            hash,
        });
        seq
    }

    /// All entries in order
    #[must_use]
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records of one phase
    pub fn phase(&self, phase: Phase) -> impl Iterator<Item = &JournalRecord> {
        self.entries
            .iter()
            .map(|e| &e.record)
            .filter(move |r| r.phase == phase)
    }

    /// Hex hash of the last entry, or of the empty chain
    #[must_use]
    pub fn digest(&self) -> String {
        hex::encode(self.entries.last().map_or([0u8; 32], |e| e.hash))
    }

    /// Recompute every link of the chain
    ///
    /// # Errors
    /// `IntegrityViolation` naming the first entry that does not match
    pub fn verify_integrity(&self) -> Result<(), JournalError> {
        let mut prev = [0u8; 32];
        for (i, entry) in self.entries.iter().enumerate() {
            let seq = i as u64;
            if entry.seq != seq
                || entry.prev_hash != prev
                || entry.hash != compute_hash(seq, &entry.record, &prev)
            {
                return Err(JournalError::IntegrityViolation { seq });
            }
            prev = entry.hash;
        }
        Ok(())
    }
}

fn update_opt(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(s) => {
            hasher.update([1]);
            hasher.update(s.as_bytes());
            hasher.update([0]);
        }
        None => hasher.update([0]),
    }
}

fn compute_hash(seq: u64, record: &JournalRecord, prev_hash: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(seq.to_le_bytes());
    hasher.update([record.phase.tag()]);
    update_opt(&mut hasher, record.room_type.as_ref().map(RoomType::as_str));
    update_opt(&mut hasher, record.role.as_ref().map(RoleId::as_str));
    update_opt(&mut hasher, record.room_instance.as_ref().map(RoomInstanceId::as_str));
    match record.object {
        Some(id) => {
            hasher.update([1]);
            hasher.update(id.0.to_le_bytes());
        }
        None => hasher.update([0]),
    }
    update_opt(&mut hasher, record.condition.as_deref());
    hasher.update([u8::from(record.success)]);
    hasher.update(record.detail.as_bytes());
    hasher.update([0]);
    hasher.update(prev_hash);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_journal() -> SamplingJournal {
        let mut journal = SamplingJournal::new();
        journal.record(
            JournalRecord::new(Phase::Matching, true)
                .room_type(&RoomType::new("kitchen"))
                .room_instance(&RoomInstanceId::new("kitchen_0")),
        );
        journal.record(
            JournalRecord::new(Phase::Enforcement, false)
                .role(&RoleId::new("apple.n.01_1"))
                .object(ObjectId(4))
                .condition("ontop(apple.n.01_1, table.n.02_1)"),
        );
        journal
    }

    #[test]
    fn chain_verifies() {
        let journal = sample_journal();
        assert_eq!(journal.len(), 2);
        assert_eq!(journal.entries()[1].prev_hash, journal.entries()[0].hash);
        journal.verify_integrity().unwrap();
    }

    #[test]
    fn tampering_is_detected() {
        let mut journal = sample_journal();
        journal.entries[0].record.success = false;
        assert_eq!(
            journal.verify_integrity(),
            Err(JournalError::IntegrityViolation { seq: 0 })
        );
    }

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(sample_journal().digest(), sample_journal().digest());
        assert_eq!(SamplingJournal::new().digest(), "0".repeat(64));
    }
}
