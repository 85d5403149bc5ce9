//! Per-tick movement and ability transitions for one entity.
//!
//! Everything here runs on the authority only. Ground contact, kill and
//! finish come in as collision notifications; the step function owns the
//! rest (jump, dash, slide, stun expiry, gravity and fall tuning).

use laserdash_core::error::AbilityRejection;
use laserdash_core::input::RaceInput;

use crate::config::MovementConfig;
use crate::entity::{DashState, EntityStatus, ParticipantEntity};
use crate::kinematics::Vec2;

/// What one step changed that callers may want to surface.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StepReport {
    pub rejections: Vec<AbilityRejection>,
    pub stun_cleared: bool,
}

/// Advance `entity` by `dt` seconds.
///
/// `race_running` gates input: outside the Running phase the entity only
/// stops horizontally and falls, and its ability timers stay frozen.
pub fn step(
    entity: &mut ParticipantEntity,
    input: &RaceInput,
    race_running: bool,
    cfg: &MovementConfig,
    dt: f32,
) -> StepReport {
    let mut report = StepReport::default();

    if entity.is_terminal() {
        entity.velocity = Vec2::ZERO;
        return report;
    }

    if let EntityStatus::Stunned { remaining } = &mut entity.status {
        *remaining -= dt;
        if *remaining <= 0.0 {
            entity.status = EntityStatus::Active;
            report.stun_cleared = true;
        }
    }

    if !race_running {
        entity.velocity.x = 0.0;
        apply_gravity(entity, cfg, dt, false);
        entity.position += entity.velocity * dt;
        return report;
    }

    if !entity.is_stunned() {
        handle_input(entity, input, cfg, &mut report);
    }

    advance_dash(entity, cfg, dt);

    entity.velocity.x = if entity.is_dashing() {
        cfg.dash_speed
    } else {
        cfg.run_speed
    };
    apply_gravity(entity, cfg, dt, true);
    entity.position += entity.velocity * dt;

    report
}

fn handle_input(
    entity: &mut ParticipantEntity,
    input: &RaceInput,
    cfg: &MovementConfig,
    report: &mut StepReport,
) {
    if input.jump_requested {
        if entity.is_dashing() {
            report.rejections.push(AbilityRejection::JumpWhileDashing);
        } else if entity.jump_count >= cfg.max_jumps {
            report.rejections.push(AbilityRejection::JumpLimitReached);
        } else {
            entity.velocity.y = cfg.jump_speed;
            entity.jump_count += 1;
        }
    }

    if input.dash_requested {
        match entity.dash {
            DashState::Dashing { .. } => {
                report.rejections.push(AbilityRejection::AlreadyDashing);
            },
            DashState::Cooldown { remaining } => {
                report
                    .rejections
                    .push(AbilityRejection::DashOnCooldown { remaining });
            },
            DashState::Ready => {
                entity.dash = DashState::Dashing {
                    remaining: cfg.dash_duration,
                };
                entity.velocity.y = entity.velocity.y.max(0.0);
            },
        }
    }

    if !input.slide_held {
        entity.sliding = false;
    } else if entity.is_grounded() {
        entity.sliding = true;
    }

    for rejection in &report.rejections {
        tracing::debug!(participant = entity.id, %rejection, "ability request ignored");
    }
}

fn advance_dash(entity: &mut ParticipantEntity, cfg: &MovementConfig, dt: f32) {
    entity.dash = match entity.dash {
        DashState::Dashing { remaining } if remaining - dt <= 0.0 => DashState::Cooldown {
            remaining: cfg.skill_cooldown,
        },
        DashState::Dashing { remaining } => DashState::Dashing {
            remaining: remaining - dt,
        },
        DashState::Cooldown { remaining } if remaining - dt <= 0.0 => DashState::Ready,
        DashState::Cooldown { remaining } => DashState::Cooldown {
            remaining: remaining - dt,
        },
        DashState::Ready => DashState::Ready,
    };
}

/// Base gravity plus optional fall tuning. Ground contact holds the entity
/// up while it is not rising.
fn apply_gravity(entity: &mut ParticipantEntity, cfg: &MovementConfig, dt: f32, tuned: bool) {
    if entity.is_grounded() && entity.velocity.y <= 0.0 {
        entity.velocity.y = 0.0;
        return;
    }

    let vy = &mut entity.velocity.y;
    *vy += cfg.gravity * dt;

    if !tuned {
        return;
    }
    if *vy < 0.0 {
        *vy -= cfg.extra_fall_accel * dt;
    } else if *vy > 0.0 && *vy < cfg.apex_band {
        *vy -= cfg.extra_fall_accel * cfg.apex_factor * dt;
    }
    *vy = vy.max(-cfg.max_fall_speed);
}

/// Register one ground collider contact. Returns true on the transition
/// from airborne to grounded.
pub fn enter_ground(entity: &mut ParticipantEntity) -> bool {
    if entity.is_terminal() {
        return false;
    }
    entity.ground_contacts += 1;
    if entity.ground_contacts != 1 {
        return false;
    }
    entity.jump_count = 0;
    if entity.velocity.y < 0.0 {
        entity.velocity.y = 0.0;
    }
    true
}

/// Drop one ground collider contact. Extra exits are ignored.
pub fn exit_ground(entity: &mut ParticipantEntity) {
    if entity.is_terminal() {
        return;
    }
    entity.ground_contacts = entity.ground_contacts.saturating_sub(1);
}

/// Stun for `duration`. Ignored when already stunned or terminal.
pub fn apply_stun(entity: &mut ParticipantEntity, duration: f32) -> bool {
    if entity.status != EntityStatus::Active {
        return false;
    }
    entity.status = EntityStatus::Stunned {
        remaining: duration,
    };
    true
}

/// Mark dead. Returns false when already terminal.
pub fn die(entity: &mut ParticipantEntity) -> bool {
    if entity.is_terminal() {
        return false;
    }
    entity.status = EntityStatus::Dead;
    freeze(entity);
    true
}

/// Mark finished at `elapsed` race time. Returns false when already terminal.
pub fn finish(entity: &mut ParticipantEntity, elapsed: f32) -> bool {
    if entity.is_terminal() {
        return false;
    }
    entity.status = EntityStatus::Finished {
        finish_time: elapsed,
    };
    freeze(entity);
    true
}

fn freeze(entity: &mut ParticipantEntity) {
    entity.velocity = Vec2::ZERO;
    entity.sliding = false;
    if entity.is_dashing() {
        entity.dash = DashState::Ready;
    }
}
