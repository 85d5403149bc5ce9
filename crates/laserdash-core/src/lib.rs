pub mod authority;
pub mod error;
pub mod input;
pub mod net;
pub mod participant;
pub mod roster;
pub mod timer;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::input::{CollisionEvent, CollisionKind};
    use crate::participant::{Participant, ParticipantId};

    /// Create `n` participants with sequential IDs starting at 1.
    pub fn make_participants(n: usize) -> Vec<Participant> {
        (0..n)
            .map(|i| Participant::new(i as ParticipantId + 1, format!("P{}", i + 1)))
            .collect()
    }

    pub fn finish(participant: ParticipantId) -> CollisionEvent {
        CollisionEvent::new(participant, CollisionKind::EnterFinishZone)
    }

    pub fn kill(participant: ParticipantId) -> CollisionEvent {
        CollisionEvent::new(participant, CollisionKind::EnterKillZone)
    }

    pub fn land(participant: ParticipantId) -> CollisionEvent {
        CollisionEvent::new(participant, CollisionKind::EnterGround)
    }

    pub fn leave_ground(participant: ParticipantId) -> CollisionEvent {
        CollisionEvent::new(participant, CollisionKind::ExitGround)
    }
}
