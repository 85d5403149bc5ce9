use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use laserdash_core::net::messages::{Standing, StandingOutcome};
use laserdash_core::participant::ParticipantId;
use laserdash_core::timer::Timer;

use crate::config::CountdownConfig;
use crate::entity::{EntityStatus, ParticipantEntity};
use crate::events::RaceEvent;

/// One visible countdown step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountdownStep {
    Number(u8),
    Go,
}

/// Race lifecycle. Only moves forward; `restart` is the one way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RacePhase {
    WaitingToStart,
    Countdown(CountdownStep),
    Running,
    Ended,
}

/// Race-level bookkeeping: phase clock, finish/death counts, ranking.
///
/// Owned by exactly one `RaceSession`; components that need it receive it
/// through the session rather than through any shared global.
#[derive(Debug, Clone)]
pub struct RaceProgress {
    cfg: CountdownConfig,
    phase: RacePhase,
    phase_timer: Timer,
    armed: bool,
    start_timestamp: Option<f32>,
    finished_count: u32,
    dead_count: u32,
    end_check_pending: bool,
}

impl RaceProgress {
    pub(crate) fn new(cfg: CountdownConfig) -> Self {
        Self {
            phase_timer: Timer::new(cfg.lead_in),
            cfg,
            phase: RacePhase::WaitingToStart,
            armed: false,
            start_timestamp: None,
            finished_count: 0,
            dead_count: 0,
            end_check_pending: false,
        }
    }

    /// Start the lead-in toward the countdown.
    pub(crate) fn arm(&mut self) {
        if !self.armed {
            self.armed = true;
            self.phase_timer = Timer::new(self.cfg.lead_in);
        }
    }

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == RacePhase::Running
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn start_timestamp(&self) -> Option<f32> {
        self.start_timestamp
    }

    pub fn finished_count(&self) -> u32 {
        self.finished_count
    }

    pub fn dead_count(&self) -> u32 {
        self.dead_count
    }

    /// Race time elapsed at `now`; zero before the race starts.
    pub fn elapsed(&self, now: f32) -> f32 {
        self.start_timestamp.map_or(0.0, |start| (now - start).max(0.0))
    }

    pub fn countdown_text(&self) -> String {
        match self.phase {
            RacePhase::Countdown(CountdownStep::Number(n)) => n.to_string(),
            RacePhase::Countdown(CountdownStep::Go) => "GO!".to_string(),
            _ => String::new(),
        }
    }

    pub fn show_countdown(&self) -> bool {
        matches!(self.phase, RacePhase::Countdown(_))
    }

    /// Advance the phase clock. `now` is the session time after this tick.
    pub(crate) fn advance(&mut self, now: f32, dt: f32) -> Vec<RaceEvent> {
        if !self.armed || matches!(self.phase, RacePhase::Running | RacePhase::Ended) {
            return Vec::new();
        }
        self.phase_timer.tick(dt);
        if !self.phase_timer.is_expired() {
            return Vec::new();
        }

        let next = match self.phase {
            RacePhase::WaitingToStart if self.cfg.steps > 0 => {
                RacePhase::Countdown(CountdownStep::Number(self.cfg.steps))
            },
            RacePhase::Countdown(CountdownStep::Number(n)) if n > 1 => {
                RacePhase::Countdown(CountdownStep::Number(n - 1))
            },
            RacePhase::WaitingToStart | RacePhase::Countdown(CountdownStep::Number(_)) => {
                RacePhase::Countdown(CountdownStep::Go)
            },
            _ => RacePhase::Running,
        };
        self.phase = next;

        match next {
            RacePhase::Countdown(step) => {
                self.phase_timer = Timer::new(match step {
                    CountdownStep::Number(_) => self.cfg.step_duration,
                    CountdownStep::Go => self.cfg.go_duration,
                });
                let text = self.countdown_text();
                tracing::debug!(%text, "countdown step");
                vec![RaceEvent::CountdownStep { text }]
            },
            _ => {
                self.start_timestamp = Some(now);
                tracing::info!(at = now, "race started");
                vec![RaceEvent::RaceStarted { at: now }]
            },
        }
    }

    /// Count a finisher. Returns the rank to assign, or None once the race
    /// has ended.
    pub(crate) fn record_finish(&mut self) -> Option<u32> {
        if self.phase == RacePhase::Ended {
            tracing::debug!("finish ignored, race already ended");
            return None;
        }
        self.finished_count += 1;
        self.end_check_pending = true;
        Some(self.finished_count)
    }

    /// Count a death. Returns false once the race has ended.
    pub(crate) fn record_death(&mut self) -> bool {
        if self.phase == RacePhase::Ended {
            tracing::debug!("death ignored, race already ended");
            return false;
        }
        self.dead_count += 1;
        self.end_check_pending = true;
        true
    }

    /// Run the end check if any finish or death happened since the last one.
    /// On the transition to Ended, ranks the unranked dead after the
    /// finishers (ascending id) and returns the final standings.
    pub(crate) fn resolve_end(
        &mut self,
        entities: &mut BTreeMap<ParticipantId, ParticipantEntity>,
    ) -> Option<Vec<Standing>> {
        if !self.end_check_pending || !self.is_running() {
            return None;
        }
        self.end_check_pending = false;

        let total = entities.values().filter(|e| !e.is_spectator()).count() as u32;
        if total == 0 || self.finished_count + self.dead_count < total {
            return None;
        }

        self.phase = RacePhase::Ended;
        let mut next_rank = self.finished_count + 1;
        for entity in entities.values_mut() {
            if entity.status() == EntityStatus::Dead
                && !entity.is_spectator()
                && entity.assign_rank(next_rank)
            {
                next_rank += 1;
            }
        }
        tracing::info!(
            finished = self.finished_count,
            dead = self.dead_count,
            "race ended"
        );
        Some(standings(entities))
    }

    /// Back to WaitingToStart with the lead-in re-armed.
    pub(crate) fn restart(&mut self) {
        *self = Self::new(self.cfg.clone());
        self.arm();
    }
}

/// Ranked participants in rank order, then unranked racers by id.
/// Spectators are left out.
pub fn standings(entities: &BTreeMap<ParticipantId, ParticipantEntity>) -> Vec<Standing> {
    let mut ranked: Vec<&ParticipantEntity> = entities
        .values()
        .filter(|e| !e.is_spectator())
        .collect();
    ranked.sort_by_key(|e| (e.rank() == 0, e.rank(), e.id));
    ranked
        .into_iter()
        .map(|e| Standing {
            participant_id: e.id,
            display_name: e.display_name.clone(),
            rank: e.rank(),
            outcome: match e.status() {
                EntityStatus::Finished { finish_time } => StandingOutcome::Finished {
                    time: finish_time,
                },
                EntityStatus::Dead => StandingOutcome::Dead,
                _ => StandingOutcome::Unfinished,
            },
        })
        .collect()
}
