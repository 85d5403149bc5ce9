use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use laserdash_core::input::HazardId;
use laserdash_core::participant::ParticipantId;
use laserdash_core::timer::Timer;

use crate::config::HazardConfig;
use crate::events::RaceEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HazardPhase {
    /// Telegraphed lane, no collision effect.
    Warning,
    /// Stuns on contact.
    Active,
    Expired,
}

/// One hazard instance occupying a lane.
#[derive(Debug, Clone)]
pub struct Hazard {
    pub id: HazardId,
    pub lane: u8,
    phase: HazardPhase,
    life: Timer,
    struck: Vec<ParticipantId>,
}

impl Hazard {
    fn new(id: HazardId, lane: u8, phase: HazardPhase, duration: f32) -> Self {
        Self {
            id,
            lane,
            phase,
            life: Timer::new(duration),
            struck: Vec::new(),
        }
    }

    pub fn phase(&self) -> HazardPhase {
        self.phase
    }

    pub fn remaining_life(&self) -> f32 {
        self.life.remaining()
    }
}

/// Serializes warning-then-active hazard cycles, one at a time.
#[derive(Debug, Clone)]
pub struct HazardScheduler {
    cfg: HazardConfig,
    rng: StdRng,
    next_trigger: Option<f32>,
    current: Option<Hazard>,
    next_id: HazardId,
}

impl HazardScheduler {
    pub fn new(cfg: HazardConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(cfg.seed),
            cfg,
            next_trigger: None,
            current: None,
            next_id: 1,
        }
    }

    pub fn current(&self) -> Option<&Hazard> {
        self.current.as_ref()
    }

    pub fn next_trigger_time(&self) -> Option<f32> {
        self.next_trigger
    }

    pub fn cycle_in_progress(&self) -> bool {
        self.current.is_some()
    }

    /// Schedule the first cycle relative to the race start.
    pub fn arm(&mut self, now: f32) {
        self.next_trigger = Some(now + self.cfg.initial_delay);
    }

    /// Drop any hazard and the pending trigger. The lane RNG keeps its
    /// position so later races do not replay the same lanes.
    pub fn reset(&mut self) {
        self.current = None;
        self.next_trigger = None;
    }

    /// Stop scheduling for good: clear whatever hazard is up, in either
    /// phase, and drop the pending trigger.
    pub fn halt(&mut self) -> Vec<RaceEvent> {
        self.next_trigger = None;
        match self.current.take() {
            Some(hazard) => {
                tracing::debug!(hazard_id = hazard.id, "hazard cleared at race end");
                vec![RaceEvent::HazardCleared {
                    hazard_id: hazard.id,
                }]
            },
            None => Vec::new(),
        }
    }

    /// Advance the current cycle, or start one once the trigger time passes.
    /// Call only while the race is running.
    pub fn tick(&mut self, now: f32, dt: f32) -> Vec<RaceEvent> {
        let Some(hazard) = self.current.as_mut() else {
            return match self.next_trigger {
                Some(at) if now >= at => self.start_cycle(),
                _ => Vec::new(),
            };
        };

        hazard.life.tick(dt);
        if !hazard.life.is_expired() {
            return Vec::new();
        }
        let (old, lane, phase) = (hazard.id, hazard.lane, hazard.phase);
        match phase {
            HazardPhase::Warning => {
                let id = self.allocate_id();
                self.current = Some(Hazard::new(
                    id,
                    lane,
                    HazardPhase::Active,
                    self.cfg.active_duration,
                ));
                tracing::debug!(hazard = id, lane, "hazard active");
                vec![
                    RaceEvent::HazardCleared { hazard_id: old },
                    RaceEvent::HazardActive { hazard_id: id, lane },
                ]
            },
            HazardPhase::Active | HazardPhase::Expired => self.end_cycle(now),
        }
    }

    /// Register contact between `participant` and hazard `hazard_id`.
    /// Returns the lane when this contact should stun: the hazard must be
    /// the live active one and must not have struck this participant yet.
    pub fn contact(&mut self, hazard_id: HazardId, participant: ParticipantId) -> Option<u8> {
        let hazard = self.current.as_mut()?;
        if hazard.id != hazard_id
            || hazard.phase != HazardPhase::Active
            || hazard.struck.contains(&participant)
        {
            return None;
        }
        hazard.struck.push(participant);
        Some(hazard.lane)
    }

    /// End the active hazard early. Warnings are left alone.
    pub fn destroy_active(&mut self, now: f32) -> Vec<RaceEvent> {
        match &self.current {
            Some(h) if h.phase == HazardPhase::Active => self.end_cycle(now),
            _ => Vec::new(),
        }
    }

    fn start_cycle(&mut self) -> Vec<RaceEvent> {
        let lane = self.rng.random_range(0..self.cfg.lanes.max(1));
        let id = self.allocate_id();
        self.current = Some(Hazard::new(
            id,
            lane,
            HazardPhase::Warning,
            self.cfg.warning_duration,
        ));
        self.next_trigger = None;
        tracing::debug!(hazard = id, lane, "hazard warning");
        vec![RaceEvent::HazardWarning { hazard_id: id, lane }]
    }

    fn end_cycle(&mut self, now: f32) -> Vec<RaceEvent> {
        let Some(mut hazard) = self.current.take() else {
            return Vec::new();
        };
        hazard.phase = HazardPhase::Expired;
        self.next_trigger = Some(now + self.cfg.cycle_interval);
        tracing::debug!(hazard = hazard.id, next = now + self.cfg.cycle_interval, "hazard cleared");
        vec![RaceEvent::HazardCleared {
            hazard_id: hazard.id,
        }]
    }

    fn allocate_id(&mut self) -> HazardId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed() -> HazardScheduler {
        let mut s = HazardScheduler::new(HazardConfig::default());
        s.arm(0.0);
        s
    }

    /// Tick at a fixed step until `until`, collecting (time, event) pairs.
    fn run(s: &mut HazardScheduler, from: f32, until: f32, dt: f32) -> Vec<(f32, RaceEvent)> {
        let mut out = Vec::new();
        let mut now = from;
        while now < until {
            now += dt;
            for e in s.tick(now, dt) {
                out.push((now, e));
            }
        }
        out
    }

    #[test]
    fn nothing_before_initial_delay() {
        let mut s = armed();
        assert!(run(&mut s, 0.0, 1.75, 0.25).is_empty());
        assert!(!s.cycle_in_progress());
    }

    #[test]
    fn unarmed_scheduler_is_idle() {
        let mut s = HazardScheduler::new(HazardConfig::default());
        assert!(run(&mut s, 0.0, 30.0, 0.25).is_empty());
    }

    #[test]
    fn warning_then_active_then_interval() {
        let mut s = armed();
        let events = run(&mut s, 0.0, 12.0, 0.25);
        let kinds: Vec<&RaceEvent> = events.iter().map(|(_, e)| e).collect();

        let (t_warn, lane) = match &events[0] {
            (t, RaceEvent::HazardWarning { lane, .. }) => (*t, *lane),
            other => panic!("expected warning first, got {other:?}"),
        };
        assert_eq!(t_warn, 2.0);
        assert!(lane < 7);

        assert!(matches!(kinds[1], RaceEvent::HazardCleared { .. }));
        match &events[2] {
            (t, RaceEvent::HazardActive { lane: l, .. }) => {
                assert!(*t >= t_warn + 1.3);
                assert_eq!(*l, lane, "active hazard stays in the warned lane");
            },
            other => panic!("expected active, got {other:?}"),
        }
        let t_clear = match &events[3] {
            (t, RaceEvent::HazardCleared { .. }) => *t,
            other => panic!("expected clear, got {other:?}"),
        };
        let (t_next, _) = events
            .iter()
            .skip(4)
            .find(|(_, e)| matches!(e, RaceEvent::HazardWarning { .. }))
            .expect("second cycle");
        assert!(*t_next >= t_clear + 5.0);
    }

    #[test]
    fn same_seed_same_lanes() {
        let lanes = |seed| {
            let mut s = HazardScheduler::new(HazardConfig {
                seed,
                ..Default::default()
            });
            s.arm(0.0);
            run(&mut s, 0.0, 60.0, 0.25)
                .into_iter()
                .filter_map(|(_, e)| match e {
                    RaceEvent::HazardWarning { lane, .. } => Some(lane),
                    _ => None,
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(lanes(9), lanes(9));
        assert!(lanes(9).len() >= 5);
    }

    #[test]
    fn contact_stuns_once_and_only_while_active() {
        let mut s = armed();
        run(&mut s, 0.0, 2.0, 0.25);
        let warning = s.current().unwrap().id;
        assert_eq!(s.contact(warning, 1), None, "warnings do not stun");

        run(&mut s, 2.0, 3.5, 0.25);
        let active = s.current().unwrap();
        assert_eq!(active.phase(), HazardPhase::Active);
        let (id, lane) = (active.id, active.lane);
        assert_eq!(s.contact(id, 1), Some(lane));
        assert_eq!(s.contact(id, 1), None);
        assert_eq!(s.contact(id, 2), Some(lane));
        assert_eq!(s.contact(warning, 3), None, "stale id");
    }

    #[test]
    fn destroy_ends_cycle_early() {
        let mut s = armed();
        run(&mut s, 0.0, 2.0, 0.25);
        assert!(s.destroy_active(2.0).is_empty(), "warning is not destroyable");
        run(&mut s, 2.0, 3.5, 0.25);
        let events = s.destroy_active(3.5);
        assert!(matches!(events.as_slice(), [RaceEvent::HazardCleared { .. }]));
        assert!(!s.cycle_in_progress());
        assert_eq!(s.next_trigger_time(), Some(8.5));
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn cycles_never_overlap(seed in any::<u64>(), dt in 0.01f32..0.5) {
                let cfg = HazardConfig { seed, ..Default::default() };
                let mut s = HazardScheduler::new(cfg.clone());
                s.arm(0.0);
                let mut live: Option<HazardId> = None;
                let mut now = 0.0f32;
                while now < 40.0 {
                    now += dt;
                    for event in s.tick(now, dt) {
                        match event {
                            RaceEvent::HazardWarning { hazard_id, lane }
                            | RaceEvent::HazardActive { hazard_id, lane } => {
                                prop_assert!(live.is_none(), "two hazards alive");
                                prop_assert!(lane < cfg.lanes);
                                live = Some(hazard_id);
                            },
                            RaceEvent::HazardCleared { hazard_id } => {
                                prop_assert_eq!(live, Some(hazard_id));
                                live = None;
                            },
                            _ => {},
                        }
                    }
                }
            }
        }
    }
}
