use serde::{Deserialize, Serialize};

use laserdash_core::input::HazardId;
use laserdash_core::net::protocol::ProtocolError;
use laserdash_core::participant::ParticipantId;

use crate::coordinator::RacePhase;
use crate::entity::{MovementState, ParticipantEntity};
use crate::hazard::{Hazard, HazardPhase};
use crate::kinematics::{Body, Vec2};

/// Public fields of one entity as broadcast to replicas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: ParticipantId,
    pub display_name: String,
    pub position: Vec2,
    pub velocity: Vec2,
    pub state: MovementState,
    pub grounded: bool,
    pub sliding: bool,
    pub jump_count: u8,
    pub skill_cooldown_remaining: f32,
    pub rank: u32,
    pub finish_time: Option<f32>,
    pub spectator: bool,
}

impl EntitySnapshot {
    pub fn body(&self) -> Body {
        Body {
            position: self.position,
            velocity: self.velocity,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, MovementState::Dead | MovementState::Finished)
    }
}

impl From<&ParticipantEntity> for EntitySnapshot {
    fn from(e: &ParticipantEntity) -> Self {
        Self {
            id: e.id,
            display_name: e.display_name.clone(),
            position: e.position,
            velocity: e.velocity,
            state: e.movement_state(),
            grounded: e.is_grounded(),
            sliding: e.is_sliding(),
            jump_count: e.jump_count(),
            skill_cooldown_remaining: e.skill_cooldown_remaining(),
            rank: e.rank(),
            finish_time: e.finish_time(),
            spectator: e.is_spectator(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardSnapshot {
    pub id: HazardId,
    pub lane: u8,
    pub phase: HazardPhase,
    pub remaining_life: f32,
}

impl From<&Hazard> for HazardSnapshot {
    fn from(h: &Hazard) -> Self {
        Self {
            id: h.id,
            lane: h.lane,
            phase: h.phase(),
            remaining_life: h.remaining_life(),
        }
    }
}

/// Complete authoritative race state for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub tick: u32,
    pub sim_time: f32,
    pub phase: RacePhase,
    pub countdown_text: String,
    pub show_countdown: bool,
    pub start_timestamp: Option<f32>,
    pub finished_count: u32,
    pub dead_count: u32,
    pub hazard: Option<HazardSnapshot>,
    pub entities: Vec<EntitySnapshot>,
}

impl RaceSnapshot {
    pub fn entity(&self, id: ParticipantId) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Race time at this snapshot; zero before the start.
    pub fn elapsed(&self) -> f32 {
        self.start_timestamp
            .map_or(0.0, |start| (self.sim_time - start).max(0.0))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        rmp_serde::to_vec(self).map_err(|e| ProtocolError::SerializeError(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        rmp_serde::from_slice(data).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use laserdash_core::participant::Participant;

    use super::*;
    use crate::coordinator::CountdownStep;

    fn sample() -> RaceSnapshot {
        let e = ParticipantEntity::new(&Participant::new(7, "Zed"), Vec2::new(14.0, 0.0));
        RaceSnapshot {
            tick: 30,
            sim_time: 2.0,
            phase: RacePhase::Countdown(CountdownStep::Number(2)),
            countdown_text: "2".into(),
            show_countdown: true,
            start_timestamp: None,
            finished_count: 0,
            dead_count: 0,
            hazard: None,
            entities: vec![EntitySnapshot::from(&e)],
        }
    }

    #[test]
    fn bytes_roundtrip() {
        let snap = sample();
        let decoded = RaceSnapshot::from_bytes(&snap.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, snap);
    }

    #[test]
    fn garbage_bytes_rejected() {
        assert!(matches!(
            RaceSnapshot::from_bytes(&[0xc1, 0x00]),
            Err(ProtocolError::DeserializeError(_))
        ));
    }

    #[test]
    fn json_view_for_debugging() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["countdown_text"], "2");
        assert_eq!(json["entities"][0]["display_name"], "Zed");
    }

    #[test]
    fn elapsed_before_and_after_start() {
        let mut snap = sample();
        assert_eq!(snap.elapsed(), 0.0);
        snap.start_timestamp = Some(1.5);
        assert_eq!(snap.elapsed(), 0.5);
        assert!(snap.entity(7).is_some());
        assert!(snap.entity(8).is_none());
    }
}
