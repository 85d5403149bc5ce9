use serde::{Deserialize, Serialize};

use laserdash_core::participant::{Participant, ParticipantId};

use crate::kinematics::Vec2;

/// Mutually exclusive life status. Terminal variants freeze the entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EntityStatus {
    Active,
    Stunned { remaining: f32 },
    Dead,
    Finished { finish_time: f32 },
}

impl EntityStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Dead | Self::Finished { .. })
    }
}

/// Dash ability cycle: ready, dashing, then cooling down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum DashState {
    #[default]
    Ready,
    Dashing { remaining: f32 },
    Cooldown { remaining: f32 },
}

/// Public movement label derived from the entity's fields for broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementState {
    /// Grounded and not moving horizontally.
    Grounded,
    /// Grounded and running.
    Running,
    Airborne,
    Sliding,
    Dashing,
    Stunned,
    Dead,
    Finished,
}

/// Authoritative per-participant record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantEntity {
    pub id: ParticipantId,
    pub display_name: String,
    pub position: Vec2,
    pub velocity: Vec2,
    pub(crate) status: EntityStatus,
    pub(crate) dash: DashState,
    pub(crate) sliding: bool,
    pub(crate) ground_contacts: u32,
    pub(crate) jump_count: u8,
    pub(crate) rank: u32,
    /// Joined while the race was running or over; sits out until restart.
    pub(crate) spectator: bool,
    /// Left mid-race; kept so counts stay consistent until restart.
    pub(crate) departed: bool,
}

impl ParticipantEntity {
    pub fn new(participant: &Participant, spawn: Vec2) -> Self {
        Self {
            id: participant.id,
            display_name: participant.display_name.clone(),
            position: spawn,
            velocity: Vec2::ZERO,
            status: EntityStatus::Active,
            dash: DashState::Ready,
            sliding: false,
            ground_contacts: 0,
            jump_count: 0,
            rank: 0,
            spectator: false,
            departed: false,
        }
    }

    pub fn status(&self) -> EntityStatus {
        self.status
    }

    pub fn dash(&self) -> DashState {
        self.dash
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_grounded(&self) -> bool {
        self.ground_contacts > 0
    }

    pub fn is_airborne(&self) -> bool {
        !self.is_grounded() || self.velocity.y > 0.0
    }

    pub fn is_dashing(&self) -> bool {
        matches!(self.dash, DashState::Dashing { .. })
    }

    pub fn is_sliding(&self) -> bool {
        self.sliding
    }

    pub fn is_stunned(&self) -> bool {
        matches!(self.status, EntityStatus::Stunned { .. })
    }

    pub fn is_spectator(&self) -> bool {
        self.spectator
    }

    pub fn is_departed(&self) -> bool {
        self.departed
    }

    pub fn ground_contacts(&self) -> u32 {
        self.ground_contacts
    }

    pub fn jump_count(&self) -> u8 {
        self.jump_count
    }

    /// 0 means unranked.
    pub fn rank(&self) -> u32 {
        self.rank
    }

    pub fn finish_time(&self) -> Option<f32> {
        match self.status {
            EntityStatus::Finished { finish_time } => Some(finish_time),
            _ => None,
        }
    }

    pub fn skill_cooldown_remaining(&self) -> f32 {
        match self.dash {
            DashState::Cooldown { remaining } => remaining,
            _ => 0.0,
        }
    }

    pub fn dash_remaining(&self) -> f32 {
        match self.dash {
            DashState::Dashing { remaining } => remaining,
            _ => 0.0,
        }
    }

    pub fn stun_remaining(&self) -> f32 {
        match self.status {
            EntityStatus::Stunned { remaining } => remaining,
            _ => 0.0,
        }
    }

    /// Remaining cooldown as a fraction of `full_cooldown`, 0 when ready.
    pub fn cooldown_fraction(&self, full_cooldown: f32) -> f32 {
        if full_cooldown <= 0.0 {
            return 0.0;
        }
        (self.skill_cooldown_remaining() / full_cooldown).clamp(0.0, 1.0)
    }

    pub fn movement_state(&self) -> MovementState {
        match self.status {
            EntityStatus::Dead => MovementState::Dead,
            EntityStatus::Finished { .. } => MovementState::Finished,
            EntityStatus::Stunned { .. } => MovementState::Stunned,
            EntityStatus::Active if self.is_dashing() => MovementState::Dashing,
            EntityStatus::Active if self.sliding && self.is_grounded() => MovementState::Sliding,
            EntityStatus::Active if self.is_airborne() => MovementState::Airborne,
            EntityStatus::Active if self.velocity.x.abs() > f32::EPSILON => MovementState::Running,
            EntityStatus::Active => MovementState::Grounded,
        }
    }

    /// Assign a place. Returns false if a rank was already set.
    pub(crate) fn assign_rank(&mut self, rank: u32) -> bool {
        if self.rank != 0 || rank == 0 {
            return false;
        }
        self.rank = rank;
        true
    }

    /// Put the entity back on its spawn point with a clean slate.
    pub(crate) fn reset(&mut self, spawn: Vec2) {
        self.position = spawn;
        self.velocity = Vec2::ZERO;
        self.status = EntityStatus::Active;
        self.dash = DashState::Ready;
        self.sliding = false;
        self.ground_contacts = 0;
        self.jump_count = 0;
        self.rank = 0;
        self.spectator = false;
    }
}

/// Deterministic spawn point for a participant.
pub fn spawn_position(id: ParticipantId, spacing: f32) -> Vec2 {
    Vec2::new(id as f32 * spacing, 0.0)
}
