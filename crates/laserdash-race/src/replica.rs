//! Observer-side view of the race.
//!
//! A replica never writes shared state. It caches the latest authoritative
//! snapshot, predicts its own participant's body from local input, and
//! pulls every rendered body back toward the authoritative one each frame.

use std::collections::BTreeMap;

use laserdash_core::input::RaceInput;
use laserdash_core::net::messages::{ServerMessage, Standing};
use laserdash_core::net::protocol::ProtocolError;
use laserdash_core::participant::ParticipantId;
use laserdash_core::roster::RosterTable;

use crate::config::RaceConfig;
use crate::coordinator::RacePhase;
use crate::entity::MovementState;
use crate::kinematics::Body;
use crate::reconcile::{Correction, Reconciler};
use crate::snapshot::RaceSnapshot;

pub struct ReplicaView {
    cfg: RaceConfig,
    local_id: Option<ParticipantId>,
    latest: Option<RaceSnapshot>,
    bodies: BTreeMap<ParticipantId, Body>,
    reconciler: Reconciler,
    clock: f32,
    roster: RosterTable,
    leaderboard: Option<Vec<Standing>>,
}

impl ReplicaView {
    /// `local_id` is the participant under this process's input, if any.
    pub fn new(cfg: RaceConfig, local_id: Option<ParticipantId>) -> Self {
        Self {
            reconciler: Reconciler::new(cfg.reconcile.clone()),
            roster: RosterTable::new(cfg.roster.capacity),
            cfg,
            local_id,
            latest: None,
            bodies: BTreeMap::new(),
            clock: 0.0,
            leaderboard: None,
        }
    }

    pub fn latest(&self) -> Option<&RaceSnapshot> {
        self.latest.as_ref()
    }

    /// Rendered body for `id`.
    pub fn body(&self, id: ParticipantId) -> Option<&Body> {
        self.bodies.get(&id)
    }

    pub fn roster(&self) -> &RosterTable {
        &self.roster
    }

    pub fn leaderboard(&self) -> Option<&[Standing]> {
        self.leaderboard.as_deref()
    }

    pub fn countdown_text(&self) -> &str {
        self.latest.as_ref().map_or("", |s| s.countdown_text.as_str())
    }

    pub fn show_countdown(&self) -> bool {
        self.latest.as_ref().is_some_and(|s| s.show_countdown)
    }

    /// Cache a snapshot. Older or duplicate ticks are dropped. Bodies are
    /// created at the authoritative position for new entities and removed
    /// for entities no longer present.
    pub fn apply_snapshot(&mut self, snapshot: RaceSnapshot) -> bool {
        if let Some(prev) = &self.latest
            && snapshot.tick <= prev.tick
        {
            tracing::debug!(tick = snapshot.tick, latest = prev.tick, "stale snapshot dropped");
            return false;
        }
        self.bodies
            .retain(|id, _| snapshot.entities.iter().any(|e| e.id == *id));
        for e in &snapshot.entities {
            self.bodies.entry(e.id).or_insert_with(|| e.body());
        }
        self.latest = Some(snapshot);
        true
    }

    /// Route one authority broadcast into the view.
    pub fn apply_server_message(&mut self, msg: &ServerMessage) -> Result<(), ProtocolError> {
        match msg {
            ServerMessage::Snapshot(m) => {
                let snapshot = RaceSnapshot::from_bytes(&m.state_data)?;
                self.apply_snapshot(snapshot);
            },
            ServerMessage::LeaderboardReady(m) => {
                self.leaderboard = Some(m.standings.clone());
            },
            ServerMessage::LeaderboardHidden(_) => {
                self.leaderboard = None;
            },
            ServerMessage::RosterAdd(_)
            | ServerMessage::RosterRemove(_)
            | ServerMessage::RosterReset(_) => {
                if let Some(notice) = msg.roster_notice() {
                    self.roster.apply_notice(&notice);
                }
            },
        }
        Ok(())
    }

    /// Advance the local participant's body from local input. The result is
    /// only ever corrected by snapshots; it is never sent anywhere.
    pub fn predict_local(&mut self, input: &RaceInput, dt: f32) {
        let Some(id) = self.local_id else {
            return;
        };
        let (Some(snap), Some(body)) = (self.latest.as_ref(), self.bodies.get_mut(&id)) else {
            return;
        };
        let Some(auth) = snap.entity(id) else {
            return;
        };
        let m = &self.cfg.movement;

        if auth.is_terminal() {
            body.velocity = auth.velocity;
            return;
        }
        if snap.phase != RacePhase::Running {
            body.velocity.x = 0.0;
        } else {
            let dashing = auth.state == MovementState::Dashing;
            let stunned = auth.state == MovementState::Stunned;
            body.velocity.x = if dashing { m.dash_speed } else { m.run_speed };
            if !stunned {
                if input.jump_requested && !dashing && auth.jump_count < m.max_jumps {
                    body.velocity.y = m.jump_speed;
                }
                if input.dash_requested && !dashing && auth.skill_cooldown_remaining <= 0.0 {
                    body.velocity.x = m.dash_speed;
                    body.velocity.y = body.velocity.y.max(0.0);
                }
            }
        }
        if auth.grounded && body.velocity.y <= 0.0 {
            body.velocity.y = 0.0;
        } else {
            body.velocity.y = (body.velocity.y + m.gravity * dt).max(-m.max_fall_speed);
        }
        body.integrate(dt);
    }

    /// One render frame: reconcile every body against the latest snapshot.
    pub fn render_frame(&mut self, dt: f32) -> Vec<(ParticipantId, Correction)> {
        self.clock += dt;
        let Some(snap) = self.latest.as_ref() else {
            return Vec::new();
        };
        let mut corrections = Vec::with_capacity(self.bodies.len());
        for (id, body) in self.bodies.iter_mut() {
            let Some(auth) = snap.entity(*id) else {
                continue;
            };
            let auth = auth.body();
            let correction = if Some(*id) == self.local_id {
                self.reconciler
                    .reconcile_predicted(body, &auth, self.clock, dt)
            } else {
                self.reconciler.reconcile_remote(body, &auth, dt)
            };
            corrections.push((*id, correction));
        }
        corrections
    }
}
