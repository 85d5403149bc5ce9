use laserdash_core::error::AbilityRejection;
use laserdash_core::input::HazardId;
use laserdash_core::net::messages::Standing;
use laserdash_core::participant::ParticipantId;
use laserdash_core::roster::RosterNotice;

/// Outcomes produced by the authority for broadcast and for the
/// presentation collaborators (UI, effects, audio). Nothing here feeds back
/// into the simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum RaceEvent {
    /// A countdown step became visible ("3", "2", "1", "GO!").
    CountdownStep { text: String },
    RaceStarted { at: f32 },
    Finished {
        participant: ParticipantId,
        rank: u32,
        time: f32,
    },
    Died { participant: ParticipantId },
    Stunned { participant: ParticipantId },
    AbilityRejected {
        participant: ParticipantId,
        reason: AbilityRejection,
    },
    HazardWarning { hazard_id: HazardId, lane: u8 },
    HazardActive { hazard_id: HazardId, lane: u8 },
    HazardCleared { hazard_id: HazardId },
    HazardStruck {
        hazard_id: HazardId,
        lane: u8,
        participant: ParticipantId,
    },
    /// Final standings, emitted once per race.
    LeaderboardReady { standings: Vec<Standing> },
    Restarted,
    Roster(RosterNotice),
}

impl From<RosterNotice> for RaceEvent {
    fn from(notice: RosterNotice) -> Self {
        Self::Roster(notice)
    }
}
