use serde::{Deserialize, Serialize};

use crate::participant::ParticipantId;

/// Identifier of a spawned hazard instance.
pub type HazardId = u32;

/// One tick of input from a participant.
///
/// `jump_requested` and `dash_requested` are edge-triggered: true only on the
/// tick the key went down. `slide_held` is level-triggered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceInput {
    pub jump_requested: bool,
    pub dash_requested: bool,
    pub slide_held: bool,
}

impl RaceInput {
    /// Fold a newer sample into this one. Edge flags accumulate so a press
    /// seen between two ticks is not lost; the level flag takes the latest value.
    pub fn merge(&mut self, newer: RaceInput) {
        self.jump_requested |= newer.jump_requested;
        self.dash_requested |= newer.dash_requested;
        self.slide_held = newer.slide_held;
    }
}

/// What the external physics collaborator observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollisionKind {
    EnterGround,
    ExitGround,
    EnterKillZone,
    EnterFinishZone,
    EnterHazard { hazard_id: HazardId },
}

/// A discrete collision notification tagged with the participant it concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionEvent {
    pub participant: ParticipantId,
    pub kind: CollisionKind,
}

impl CollisionEvent {
    pub fn new(participant: ParticipantId, kind: CollisionKind) -> Self {
        Self { participant, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_edges_and_latest_level() {
        let mut acc = RaceInput {
            jump_requested: true,
            dash_requested: false,
            slide_held: true,
        };
        acc.merge(RaceInput {
            jump_requested: false,
            dash_requested: true,
            slide_held: false,
        });
        assert!(acc.jump_requested, "jump press must survive a later release");
        assert!(acc.dash_requested);
        assert!(!acc.slide_held, "slide follows the latest sample");
    }
}
