use serde::{Deserialize, Serialize};

use crate::input::RaceInput;
use crate::participant::ParticipantId;
use crate::roster::RosterNotice;

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Any -> Authority
    PlayerInput = 0x01,
    RequestFullResync = 0x02,
    AddToRoster = 0x03,
    RemoveFromRoster = 0x04,
    RequestRestart = 0x05,

    // Authority -> All
    Snapshot = 0x10,
    LeaderboardReady = 0x11,
    LeaderboardHidden = 0x12,
    RosterAdd = 0x13,
    RosterRemove = 0x14,
    RosterReset = 0x15,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::PlayerInput),
            0x02 => Some(Self::RequestFullResync),
            0x03 => Some(Self::AddToRoster),
            0x04 => Some(Self::RemoveFromRoster),
            0x05 => Some(Self::RequestRestart),
            0x10 => Some(Self::Snapshot),
            0x11 => Some(Self::LeaderboardReady),
            0x12 => Some(Self::LeaderboardHidden),
            0x13 => Some(Self::RosterAdd),
            0x14 => Some(Self::RosterRemove),
            0x15 => Some(Self::RosterReset),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInputMsg {
    pub participant_id: ParticipantId,
    pub tick: u32,
    pub input: RaceInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFullResyncMsg {
    pub participant_id: ParticipantId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddToRosterMsg {
    pub participant_id: ParticipantId,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveFromRosterMsg {
    pub participant_id: ParticipantId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRestartMsg {
    pub participant_id: ParticipantId,
}

/// Periodic authoritative snapshot. `state_data` is the MessagePack-encoded
/// race snapshot owned by the simulation crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMsg {
    pub tick: u32,
    pub state_data: Vec<u8>,
}

/// How a participant's race ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StandingOutcome {
    Finished { time: f32 },
    Dead,
    Unfinished,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub rank: u32,
    pub outcome: StandingOutcome,
}

/// Final standings, ordered by rank ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardMsg {
    pub standings: Vec<Standing>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardHiddenMsg {
    pub tick: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterAddMsg {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub slot: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRemoveMsg {
    pub participant_id: ParticipantId,
}

/// Clears the observer's roster ahead of a full resync's adds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterResetMsg {}

/// Messages sent to the authority.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    PlayerInput(PlayerInputMsg),
    RequestFullResync(RequestFullResyncMsg),
    AddToRoster(AddToRosterMsg),
    RemoveFromRoster(RemoveFromRosterMsg),
    RequestRestart(RequestRestartMsg),
}

impl ClientMessage {
    /// The participant this message concerns.
    pub fn participant_id(&self) -> ParticipantId {
        match self {
            Self::PlayerInput(m) => m.participant_id,
            Self::RequestFullResync(m) => m.participant_id,
            Self::AddToRoster(m) => m.participant_id,
            Self::RemoveFromRoster(m) => m.participant_id,
            Self::RequestRestart(m) => m.participant_id,
        }
    }
}

/// Messages broadcast by the authority.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Snapshot(SnapshotMsg),
    LeaderboardReady(LeaderboardMsg),
    LeaderboardHidden(LeaderboardHiddenMsg),
    RosterAdd(RosterAddMsg),
    RosterRemove(RosterRemoveMsg),
    RosterReset(RosterResetMsg),
}

impl From<&RosterNotice> for ServerMessage {
    fn from(notice: &RosterNotice) -> Self {
        match notice {
            RosterNotice::Add {
                participant,
                display_name,
                slot,
            } => Self::RosterAdd(RosterAddMsg {
                participant_id: *participant,
                display_name: display_name.clone(),
                slot: u8::try_from(*slot).unwrap_or(u8::MAX),
            }),
            RosterNotice::Remove { participant } => Self::RosterRemove(RosterRemoveMsg {
                participant_id: *participant,
            }),
            RosterNotice::Reset => Self::RosterReset(RosterResetMsg {}),
        }
    }
}

impl ServerMessage {
    /// The roster change carried by this message, if any.
    pub fn roster_notice(&self) -> Option<RosterNotice> {
        match self {
            Self::RosterAdd(m) => Some(RosterNotice::Add {
                participant: m.participant_id,
                display_name: m.display_name.clone(),
                slot: usize::from(m.slot),
            }),
            Self::RosterRemove(m) => Some(RosterNotice::Remove {
                participant: m.participant_id,
            }),
            Self::RosterReset(_) => Some(RosterNotice::Reset),
            _ => None,
        }
    }
}
