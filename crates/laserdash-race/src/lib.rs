pub mod config;
pub mod coordinator;
pub mod entity;
pub mod events;
pub mod hazard;
pub mod kinematics;
pub mod movement;
pub mod reconcile;
pub mod replica;
pub mod snapshot;

use std::collections::{BTreeMap, HashMap};

use laserdash_core::authority::Role;
use laserdash_core::error::Rejection;
use laserdash_core::input::{CollisionEvent, CollisionKind, RaceInput};
use laserdash_core::net::messages::{ClientMessage, Standing};
use laserdash_core::net::protocol::ProtocolError;
use laserdash_core::participant::{Participant, ParticipantId};
use laserdash_core::roster::{RosterNotice, RosterSync, RosterTable};

use config::RaceConfig;
use coordinator::{RacePhase, RaceProgress};
use entity::{ParticipantEntity, spawn_position};
use events::RaceEvent;
use hazard::HazardScheduler;
use snapshot::{EntitySnapshot, HazardSnapshot, RaceSnapshot};

/// One race session: the entity store plus the components that write it.
///
/// The session is the handle every component goes through. It owns exactly
/// one `RaceProgress`, so there is one coordinator per session and never a
/// process-wide one. Every mutating entry point checks the session's role
/// and is rejected on a replica.
pub struct RaceSession {
    config: RaceConfig,
    role: Role,
    tick: u32,
    sim_time: f32,
    entities: BTreeMap<ParticipantId, ParticipantEntity>,
    progress: RaceProgress,
    hazards: HazardScheduler,
    roster: RosterSync,
}

impl RaceSession {
    pub fn new(config: RaceConfig, role: Role) -> Self {
        Self {
            progress: RaceProgress::new(config.countdown.clone()),
            hazards: HazardScheduler::new(config.hazard.clone()),
            roster: RosterSync::new(role, config.roster.capacity, config.roster.sync_hold),
            config,
            role,
            tick: 0,
            sim_time: 0.0,
            entities: BTreeMap::new(),
        }
    }

    /// Start the session clock at `now` and arm the countdown lead-in.
    /// Calling it again is a no-op.
    pub fn begin(&mut self, now: f32) -> Result<(), Rejection> {
        self.role.require("begin")?;
        if self.progress.is_armed() {
            return Ok(());
        }
        self.sim_time = now;
        self.progress.arm();
        tracing::info!(participants = self.entities.len(), "race session started");
        Ok(())
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn tick_count(&self) -> u32 {
        self.tick
    }

    pub fn sim_time(&self) -> f32 {
        self.sim_time
    }

    pub fn phase(&self) -> RacePhase {
        self.progress.phase()
    }

    pub fn progress(&self) -> &RaceProgress {
        &self.progress
    }

    pub fn hazards(&self) -> &HazardScheduler {
        &self.hazards
    }

    pub fn roster(&self) -> &RosterTable {
        self.roster.table()
    }

    pub fn entity(&self, id: ParticipantId) -> Option<&ParticipantEntity> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &ParticipantEntity> {
        self.entities.values()
    }

    /// Spawn an entity for `participant`. Joining while the race runs (or
    /// after it ended) makes the entity a spectator until the next restart.
    /// A participant who left mid-race and comes back keeps their record.
    pub fn add_participant(&mut self, participant: &Participant) -> Result<(), Rejection> {
        self.role.require("add participant")?;
        if let Some(existing) = self.entities.get_mut(&participant.id) {
            if existing.departed {
                existing.departed = false;
                tracing::info!(participant = participant.id, "participant rejoined");
                return Ok(());
            }
            return Err(Rejection::DuplicateEvent {
                participant: participant.id,
            });
        }
        let mut entity = ParticipantEntity::new(
            participant,
            spawn_position(participant.id, self.config.movement.spawn_spacing),
        );
        entity.spectator = matches!(self.phase(), RacePhase::Running | RacePhase::Ended);
        tracing::info!(
            participant = participant.id,
            spectator = entity.spectator,
            "participant joined"
        );
        self.entities.insert(participant.id, entity);
        Ok(())
    }

    /// Handle a participant leaving. Before the countdown (or for spectators
    /// and after the race) the entity is dropped. Mid-race, a racer who has
    /// not finished forfeits as dead and the record stays until restart.
    pub fn remove_participant(&mut self, id: ParticipantId) -> Result<Vec<RaceEvent>, Rejection> {
        self.role.require("remove participant")?;
        let phase = self.phase();
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(Rejection::UnknownParticipant(id))?;

        let mid_race = matches!(phase, RacePhase::Countdown(_) | RacePhase::Running);
        if !mid_race || entity.spectator {
            self.entities.remove(&id);
            tracing::info!(participant = id, "participant removed");
            return Ok(Vec::new());
        }

        entity.departed = true;
        let mut events = Vec::new();
        if movement::die(entity) && self.progress.record_death() {
            tracing::info!(participant = id, "participant forfeited");
            events.push(RaceEvent::Died { participant: id });
        }
        events.extend(self.resolve_end());
        Ok(events)
    }

    /// Advance the session by `dt` seconds with this tick's inputs.
    pub fn tick(
        &mut self,
        dt: f32,
        inputs: &HashMap<ParticipantId, RaceInput>,
    ) -> Result<Vec<RaceEvent>, Rejection> {
        self.role.require("tick")?;
        self.tick = self.tick.wrapping_add(1);
        self.sim_time += dt;
        self.roster.tick(dt);

        let was_running = self.progress.is_running();
        let mut events = self.progress.advance(self.sim_time, dt);
        let running = self.progress.is_running();
        if running && !was_running {
            self.hazards.arm(self.sim_time);
        }
        if running {
            events.extend(self.hazards.tick(self.sim_time, dt));
        }

        for entity in self.entities.values_mut() {
            if entity.spectator {
                continue;
            }
            let input = inputs.get(&entity.id).copied().unwrap_or_default();
            let report = movement::step(entity, &input, running, &self.config.movement, dt);
            events.extend(
                report
                    .rejections
                    .into_iter()
                    .map(|reason| RaceEvent::AbilityRejected {
                        participant: entity.id,
                        reason,
                    }),
            );
        }

        events.extend(self.resolve_end());
        Ok(events)
    }

    /// Apply one collision notification from the physics collaborator.
    pub fn handle_collision(&mut self, event: &CollisionEvent) -> Result<Vec<RaceEvent>, Rejection> {
        self.role.require("collision")?;
        if !self.entities.contains_key(&event.participant) {
            return Err(Rejection::UnknownParticipant(event.participant));
        }
        self.handle_collisions(std::slice::from_ref(event))
    }

    /// Apply a batch of collision notifications, then run the end check
    /// once. Notifications for unknown participants are skipped.
    pub fn handle_collisions(
        &mut self,
        batch: &[CollisionEvent],
    ) -> Result<Vec<RaceEvent>, Rejection> {
        self.role.require("collision")?;
        let mut events = Vec::new();
        for event in batch {
            self.apply_collision(event, &mut events);
        }
        events.extend(self.resolve_end());
        Ok(events)
    }

    fn apply_collision(&mut self, event: &CollisionEvent, events: &mut Vec<RaceEvent>) {
        let running = self.progress.is_running();
        let elapsed = self.progress.elapsed(self.sim_time);
        let id = event.participant;
        let Some(entity) = self.entities.get_mut(&id) else {
            tracing::warn!(participant = id, "collision for unknown participant");
            return;
        };
        if entity.spectator {
            return;
        }

        match event.kind {
            CollisionKind::EnterGround => {
                movement::enter_ground(entity);
            },
            CollisionKind::ExitGround => movement::exit_ground(entity),
            CollisionKind::EnterKillZone if running => {
                if movement::die(entity) && self.progress.record_death() {
                    tracing::info!(participant = id, "participant died");
                    events.push(RaceEvent::Died { participant: id });
                }
            },
            CollisionKind::EnterFinishZone if running => {
                if !movement::finish(entity, elapsed) {
                    return;
                }
                if let Some(rank) = self.progress.record_finish() {
                    entity.assign_rank(rank);
                    tracing::info!(participant = id, rank, time = elapsed, "participant finished");
                    events.push(RaceEvent::Finished {
                        participant: id,
                        rank,
                        time: elapsed,
                    });
                }
            },
            CollisionKind::EnterHazard { hazard_id } if running => {
                let Some(lane) = self.hazards.contact(hazard_id, id) else {
                    return;
                };
                if movement::apply_stun(entity, self.config.movement.stun_duration) {
                    tracing::debug!(participant = id, lane, "hazard stun");
                    events.push(RaceEvent::Stunned { participant: id });
                    events.push(RaceEvent::HazardStruck {
                        hazard_id,
                        lane,
                        participant: id,
                    });
                }
            },
            CollisionKind::EnterKillZone
            | CollisionKind::EnterFinishZone
            | CollisionKind::EnterHazard { .. } => {
                tracing::debug!(participant = id, kind = ?event.kind, "collision ignored outside race");
            },
        }
    }

    /// Stun a participant directly.
    pub fn apply_stun(&mut self, id: ParticipantId) -> Result<Vec<RaceEvent>, Rejection> {
        self.role.require("apply stun")?;
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(Rejection::UnknownParticipant(id))?;
        if movement::apply_stun(entity, self.config.movement.stun_duration) {
            Ok(vec![RaceEvent::Stunned { participant: id }])
        } else {
            Ok(Vec::new())
        }
    }

    /// End the active hazard early.
    pub fn destroy_hazard(&mut self) -> Result<Vec<RaceEvent>, Rejection> {
        self.role.require("destroy hazard")?;
        Ok(self.hazards.destroy_active(self.sim_time))
    }

    /// Handle a request sent to the authority by participant `from`.
    /// `live` is the current connection list used for roster passes.
    /// Inputs are not requests: they are buffered by the caller and passed
    /// to `tick`.
    pub fn handle_request(
        &mut self,
        from: ParticipantId,
        request: &ClientMessage,
        live: &[Participant],
    ) -> Result<Vec<RaceEvent>, Rejection> {
        self.role.require("request")?;
        tracing::debug!(from, about = request.participant_id(), "request received");
        match request {
            ClientMessage::PlayerInput(_) => Ok(Vec::new()),
            ClientMessage::RequestFullResync(_) => {
                Ok(roster_events(self.roster.request_full_resync(live)?))
            },
            ClientMessage::AddToRoster(m) => {
                let participant = Participant::new(m.participant_id, m.display_name.clone());
                Ok(roster_events(self.roster.add(&participant)?))
            },
            ClientMessage::RemoveFromRoster(m) => {
                Ok(roster_events(self.roster.remove(m.participant_id)?))
            },
            ClientMessage::RequestRestart(_) => self.restart(),
        }
    }

    /// Compare the roster against the live connection list, resyncing on
    /// growth and releasing stale slots on shrinkage.
    pub fn observe_live(&mut self, live: &[Participant]) -> Result<Vec<RaceEvent>, Rejection> {
        Ok(roster_events(self.roster.observe_live(live)?))
    }

    /// Release roster slots whose occupant is no longer live.
    pub fn correct_roster_drift(
        &mut self,
        live: &[Participant],
    ) -> Result<Vec<RaceEvent>, Rejection> {
        Ok(roster_events(self.roster.correct_drift(live)?))
    }

    /// Wipe race progress and every entity back to spawn, drop departed
    /// records, and re-arm the countdown.
    pub fn restart(&mut self) -> Result<Vec<RaceEvent>, Rejection> {
        self.role.require("restart")?;
        self.entities.retain(|_, e| !e.departed);
        let spacing = self.config.movement.spawn_spacing;
        for entity in self.entities.values_mut() {
            entity.reset(spawn_position(entity.id, spacing));
        }
        self.progress.restart();
        self.hazards.reset();
        tracing::info!(participants = self.entities.len(), "race restarted");
        Ok(vec![RaceEvent::Restarted])
    }

    pub fn snapshot(&self) -> RaceSnapshot {
        RaceSnapshot {
            tick: self.tick,
            sim_time: self.sim_time,
            phase: self.progress.phase(),
            countdown_text: self.progress.countdown_text(),
            show_countdown: self.progress.show_countdown(),
            start_timestamp: self.progress.start_timestamp(),
            finished_count: self.progress.finished_count(),
            dead_count: self.progress.dead_count(),
            hazard: self.hazards.current().map(HazardSnapshot::from),
            entities: self.entities.values().map(EntitySnapshot::from).collect(),
        }
    }

    pub fn serialize_snapshot(&self) -> Result<Vec<u8>, ProtocolError> {
        self.snapshot().to_bytes()
    }

    /// Current standings: ranked first, then unranked racers by id.
    pub fn leaderboard(&self) -> Vec<Standing> {
        coordinator::standings(&self.entities)
    }

    fn resolve_end(&mut self) -> Vec<RaceEvent> {
        let Some(standings) = self.progress.resolve_end(&mut self.entities) else {
            return Vec::new();
        };
        let mut events = self.hazards.halt();
        events.push(RaceEvent::LeaderboardReady { standings });
        events
    }
}

fn roster_events(notices: Vec<RosterNotice>) -> Vec<RaceEvent> {
    notices.into_iter().map(RaceEvent::from).collect()
}

#[cfg(test)]
mod tests {
    use laserdash_core::net::messages::{RequestRestartMsg, StandingOutcome};
    use laserdash_core::test_helpers::{finish, kill, land, make_participants};

    use super::*;
    use crate::coordinator::CountdownStep;
    use crate::entity::EntityStatus;

    const DT: f32 = 0.25;

    fn no_inputs() -> HashMap<ParticipantId, RaceInput> {
        HashMap::new()
    }

    fn session(n: usize) -> RaceSession {
        let mut s = RaceSession::new(RaceConfig::default(), Role::Authority);
        for p in make_participants(n) {
            s.add_participant(&p).unwrap();
        }
        s.begin(0.0).unwrap();
        s
    }

    fn run_until_running(s: &mut RaceSession) -> Vec<RaceEvent> {
        let mut events = Vec::new();
        for _ in 0..100 {
            if s.phase() == RacePhase::Running {
                return events;
            }
            events.extend(s.tick(DT, &no_inputs()).unwrap());
        }
        panic!("race never started");
    }

    fn ticks(s: &mut RaceSession, n: usize) -> Vec<RaceEvent> {
        (0..n)
            .flat_map(|_| s.tick(DT, &no_inputs()).unwrap())
            .collect()
    }

    #[test]
    fn participants_spawn_deterministically() {
        let s = session(3);
        let xs: Vec<f32> = s.entities().map(|e| e.position.x).collect();
        assert_eq!(xs, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn countdown_then_running() {
        let mut s = session(2);
        let events = run_until_running(&mut s);
        let texts: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                RaceEvent::CountdownStep { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["3", "2", "1", "GO!"]);
        assert!(events.iter().any(|e| matches!(e, RaceEvent::RaceStarted { .. })));
        assert_eq!(s.progress().start_timestamp(), Some(4.5));
    }

    #[test]
    fn nobody_moves_before_running() {
        let mut s = session(2);
        for _ in 0..2 {
            s.handle_collision(&land(1)).unwrap();
        }
        let mut inputs = HashMap::new();
        inputs.insert(
            1,
            RaceInput {
                jump_requested: true,
                dash_requested: true,
                slide_held: true,
            },
        );
        for _ in 0..8 {
            s.tick(DT, &inputs).unwrap();
            assert_ne!(s.phase(), RacePhase::Running);
            let e = s.entity(1).unwrap();
            assert_eq!(e.velocity.x, 0.0);
            assert_eq!(e.jump_count(), 0);
            assert!(!e.is_dashing());
        }
    }

    #[test]
    fn three_racers_ranked_in_finish_order() {
        let mut s = session(3);
        run_until_running(&mut s);
        ticks(&mut s, 4);
        s.handle_collision(&finish(2)).unwrap();
        ticks(&mut s, 1);
        s.handle_collision(&finish(3)).unwrap();
        ticks(&mut s, 1);
        let events = s.handle_collision(&finish(1)).unwrap();

        let standings = events
            .iter()
            .find_map(|e| match e {
                RaceEvent::LeaderboardReady { standings } => Some(standings.clone()),
                _ => None,
            })
            .expect("leaderboard after the last finisher");
        let order: Vec<(ParticipantId, u32)> =
            standings.iter().map(|st| (st.participant_id, st.rank)).collect();
        assert_eq!(order, vec![(2, 1), (3, 2), (1, 3)]);
        assert_eq!(s.phase(), RacePhase::Ended);

        let t2 = s.entity(2).unwrap().finish_time().unwrap();
        let t1 = s.entity(1).unwrap().finish_time().unwrap();
        assert!((t2 - 1.0).abs() < 1e-4);
        assert!(t1 > t2);
    }

    #[test]
    fn finish_death_finish_across_ticks() {
        let mut s = session(3);
        run_until_running(&mut s);
        ticks(&mut s, 2);
        s.handle_collision(&finish(1)).unwrap();
        ticks(&mut s, 1);
        s.handle_collision(&kill(2)).unwrap();
        ticks(&mut s, 1);
        assert_eq!(s.phase(), RacePhase::Running);
        let events = s.handle_collision(&finish(3)).unwrap();

        let standings = events
            .iter()
            .find_map(|e| match e {
                RaceEvent::LeaderboardReady { standings } => Some(standings.clone()),
                _ => None,
            })
            .expect("leaderboard once everyone is done");
        let order: Vec<(ParticipantId, u32)> =
            standings.iter().map(|st| (st.participant_id, st.rank)).collect();
        assert_eq!(order, vec![(1, 1), (3, 2), (2, 3)]);
        assert_eq!(standings[2].outcome, StandingOutcome::Dead);
    }

    #[test]
    fn race_end_clears_the_live_hazard() {
        let mut s = session(1);
        run_until_running(&mut s);
        let initial_delay = s.config().hazard.initial_delay;
        ticks(&mut s, (initial_delay / DT) as usize + 2);
        let hazard_id = s.hazards().current().expect("first hazard is up").id;

        let events = s.handle_collision(&finish(1)).unwrap();
        assert_eq!(s.phase(), RacePhase::Ended);
        assert!(events.contains(&RaceEvent::HazardCleared { hazard_id }));
        assert!(s.hazards().current().is_none());

        ticks(&mut s, 20);
        assert!(s.snapshot().hazard.is_none());
    }

    #[test]
    fn finish_is_idempotent() {
        let mut s = session(2);
        run_until_running(&mut s);
        let first = s.handle_collision(&finish(1)).unwrap();
        assert_eq!(first.len(), 1);
        assert!(s.handle_collision(&finish(1)).unwrap().is_empty());
        assert!(s.handle_collision(&kill(1)).unwrap().is_empty());
        assert_eq!(s.progress().finished_count(), 1);
        assert_eq!(s.progress().dead_count(), 0);
        assert_eq!(s.entity(1).unwrap().rank(), 1);
    }

    #[test]
    fn dead_ranked_after_finishers() {
        let mut s = session(3);
        run_until_running(&mut s);
        let events = s
            .handle_collisions(&[kill(3), finish(2), kill(1)])
            .unwrap();
        assert_eq!(s.phase(), RacePhase::Ended);
        let boards: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, RaceEvent::LeaderboardReady { .. }))
            .collect();
        assert_eq!(boards.len(), 1, "one batch, one leaderboard");
        assert_eq!(s.entity(2).unwrap().rank(), 1);
        assert_eq!(s.entity(1).unwrap().rank(), 2);
        assert_eq!(s.entity(3).unwrap().rank(), 3);
        assert_eq!(s.leaderboard()[2].outcome, StandingOutcome::Dead);
    }

    #[test]
    fn events_after_end_are_ignored() {
        let mut s = session(1);
        run_until_running(&mut s);
        s.handle_collision(&finish(1)).unwrap();
        assert_eq!(s.phase(), RacePhase::Ended);
        assert!(s.handle_collision(&kill(1)).unwrap().is_empty());
        assert_eq!(s.progress().dead_count(), 0);
    }

    #[test]
    fn restart_wipes_everything_and_counts_down_again() {
        let mut s = session(2);
        run_until_running(&mut s);
        ticks(&mut s, 12);
        s.handle_collisions(&[finish(1), kill(2)]).unwrap();
        assert_eq!(s.phase(), RacePhase::Ended);

        let events = s.restart().unwrap();
        assert_eq!(events, vec![RaceEvent::Restarted]);
        assert_eq!(s.phase(), RacePhase::WaitingToStart);
        assert_eq!(s.progress().finished_count(), 0);
        assert_eq!(s.progress().dead_count(), 0);
        assert!(s.hazards().current().is_none());
        for e in s.entities() {
            assert_eq!(e.status(), EntityStatus::Active);
            assert_eq!(e.rank(), 0);
            assert_eq!(e.finish_time(), None);
            assert_eq!(e.position, spawn_position(e.id, 2.0));
        }

        ticks(&mut s, 4);
        assert_eq!(
            s.phase(),
            RacePhase::Countdown(CountdownStep::Number(3)),
            "restart never skips the countdown"
        );
    }

    #[test]
    fn replica_rejects_mutations() {
        let mut s = RaceSession::new(RaceConfig::default(), Role::Replica);
        let p = &make_participants(1)[0];
        let violation = |op| Rejection::AuthorityViolation { operation: op };
        assert_eq!(s.add_participant(p), Err(violation("add participant")));
        assert_eq!(s.begin(0.0), Err(violation("begin")));
        assert_eq!(s.tick(DT, &no_inputs()), Err(violation("tick")));
        assert_eq!(s.restart(), Err(violation("restart")));
        assert_eq!(s.handle_collision(&finish(1)), Err(violation("collision")));
        assert_eq!(
            s.handle_request(
                1,
                &ClientMessage::RequestRestart(RequestRestartMsg { participant_id: 1 }),
                &[],
            ),
            Err(violation("request"))
        );
        assert_eq!(s.tick_count(), 0);
        assert_eq!(s.entities().count(), 0);
    }

    #[test]
    fn late_joiner_spectates_until_restart() {
        let mut s = session(1);
        run_until_running(&mut s);
        s.add_participant(&Participant::new(9, "Late")).unwrap();
        assert!(s.entity(9).unwrap().is_spectator());
        let events = s.handle_collision(&finish(1)).unwrap();
        let standings = events
            .iter()
            .find_map(|e| match e {
                RaceEvent::LeaderboardReady { standings } => Some(standings.clone()),
                _ => None,
            })
            .expect("spectator does not hold up the end");
        assert_eq!(standings.len(), 1);

        s.restart().unwrap();
        assert!(!s.entity(9).unwrap().is_spectator());
    }

    #[test]
    fn leaving_mid_race_is_a_forfeit() {
        let mut s = session(2);
        run_until_running(&mut s);
        let events = s.remove_participant(2).unwrap();
        assert_eq!(events, vec![RaceEvent::Died { participant: 2 }]);
        assert!(s.entity(2).unwrap().is_departed());

        let events = s.handle_collision(&finish(1)).unwrap();
        assert!(events.iter().any(|e| matches!(e, RaceEvent::LeaderboardReady { .. })));

        s.restart().unwrap();
        assert!(s.entity(2).is_none(), "departed records purged on restart");
    }

    #[test]
    fn leaving_before_countdown_drops_entity() {
        let mut s = RaceSession::new(RaceConfig::default(), Role::Authority);
        s.add_participant(&Participant::new(1, "A")).unwrap();
        assert!(s.remove_participant(1).unwrap().is_empty());
        assert!(s.entity(1).is_none());
        assert_eq!(s.remove_participant(1), Err(Rejection::UnknownParticipant(1)));
    }

    #[test]
    fn duplicate_join_rejected_without_change() {
        let mut s = session(1);
        let before = s.entity(1).unwrap().clone();
        assert_eq!(
            s.add_participant(&Participant::new(1, "Other")),
            Err(Rejection::DuplicateEvent { participant: 1 })
        );
        assert_eq!(s.entity(1).unwrap(), &before);
    }

    #[test]
    fn hazard_contact_stuns_once() {
        let mut s = session(1);
        run_until_running(&mut s);
        // initial delay 2.0 + warning 1.3 at 0.25 steps
        let mut active = None;
        for _ in 0..40 {
            for e in s.tick(DT, &no_inputs()).unwrap() {
                if let RaceEvent::HazardActive { hazard_id, lane } = e {
                    active = Some((hazard_id, lane));
                }
            }
            if active.is_some() {
                break;
            }
        }
        let (hazard_id, lane) = active.expect("hazard went active");
        let touch = CollisionEvent::new(1, CollisionKind::EnterHazard { hazard_id });
        let events = s.handle_collision(&touch).unwrap();
        assert_eq!(
            events,
            vec![
                RaceEvent::Stunned { participant: 1 },
                RaceEvent::HazardStruck {
                    hazard_id,
                    lane,
                    participant: 1
                },
            ]
        );
        assert!(s.entity(1).unwrap().is_stunned());

        ticks(&mut s, 1);
        assert!(!s.entity(1).unwrap().is_stunned());
        assert!(s.handle_collision(&touch).unwrap().is_empty(), "at most once");
    }

    #[test]
    fn ability_rejections_surface_as_events() {
        let mut s = session(1);
        run_until_running(&mut s);
        let mut inputs = HashMap::new();
        inputs.insert(
            1,
            RaceInput {
                dash_requested: true,
                ..Default::default()
            },
        );
        assert!(s.tick(0.05, &inputs).unwrap().is_empty());
        let events = s.tick(0.05, &inputs).unwrap();
        assert_eq!(
            events,
            vec![RaceEvent::AbilityRejected {
                participant: 1,
                reason: laserdash_core::error::AbilityRejection::AlreadyDashing,
            }]
        );
    }

    #[test]
    fn roster_requests_flow_through_session() {
        let mut s = session(0);
        let live = make_participants(2);
        let events = s.observe_live(&live).unwrap();
        assert_eq!(events.first(), Some(&RaceEvent::Roster(RosterNotice::Reset)));
        assert_eq!(events.len(), 3);
        assert_eq!(s.roster().len(), 2);

        let events = s
            .handle_request(
                1,
                &ClientMessage::RequestFullResync(
                    laserdash_core::net::messages::RequestFullResyncMsg { participant_id: 1 },
                ),
                &live,
            )
            .unwrap();
        assert!(events.is_empty(), "collapsed while the sync flag is held");

        let events = s.correct_roster_drift(&live[..1]).unwrap();
        assert_eq!(events, vec![RaceEvent::Roster(RosterNotice::Remove { participant: 2 })]);
    }

    #[test]
    fn snapshot_reflects_race_state() {
        let mut s = session(2);
        ticks(&mut s, 5);
        let snap = s.snapshot();
        assert_eq!(snap.tick, 5);
        assert_eq!(snap.countdown_text, "3");
        assert!(snap.show_countdown);
        assert_eq!(snap.entities.len(), 2);

        let decoded = RaceSnapshot::from_bytes(&s.serialize_snapshot().unwrap()).unwrap();
        assert_eq!(decoded, snap);
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        fn arb_collision(n: u64) -> impl Strategy<Value = CollisionEvent> {
            (1..=n, 0u8..4).prop_map(|(id, k)| match k {
                0 => finish(id),
                1 => kill(id),
                2 => land(id),
                _ => CollisionEvent::new(id, CollisionKind::ExitGround),
            })
        }

        proptest! {
            #[test]
            fn counts_bounded_and_ranks_unique(
                batches in prop::collection::vec(prop::collection::vec(arb_collision(4), 0..4), 1..20),
            ) {
                let mut s = session(4);
                run_until_running(&mut s);
                let mut boards = 0;
                for batch in batches {
                    for e in s.handle_collisions(&batch).unwrap() {
                        if matches!(e, RaceEvent::LeaderboardReady { .. }) {
                            boards += 1;
                        }
                    }
                    s.tick(DT, &no_inputs()).unwrap();
                    let p = s.progress();
                    prop_assert!(p.finished_count() + p.dead_count() <= 4);
                }
                prop_assert!(boards <= 1);

                let mut ranks: Vec<u32> = s.entities().map(|e| e.rank()).filter(|r| *r > 0).collect();
                ranks.sort_unstable();
                let expected: Vec<u32> = (1..=ranks.len() as u32).collect();
                prop_assert_eq!(ranks, expected);
            }
        }
    }
}
