use crate::config::ReconcileConfig;
use crate::kinematics::Body;

/// What a reconciliation pass did to a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    None,
    /// Position (and for predicted bodies, velocity) replaced outright.
    Snapped,
    /// Moved a bounded step toward the authoritative position.
    Smoothed,
}

/// Distance-graded correction of replica bodies toward authoritative state.
#[derive(Debug, Clone)]
pub struct Reconciler {
    cfg: ReconcileConfig,
    last_snap: Option<f32>,
}

impl Reconciler {
    pub fn new(cfg: ReconcileConfig) -> Self {
        Self {
            cfg,
            last_snap: None,
        }
    }

    /// Correct the locally predicted body. Large errors snap immediately;
    /// moderate errors are smoothed at a bounded speed once the cooldown
    /// since the last snap has passed; small errors are left alone.
    pub fn reconcile_predicted(
        &mut self,
        body: &mut Body,
        authoritative: &Body,
        now: f32,
        dt: f32,
    ) -> Correction {
        let error = body.position.distance(authoritative.position);
        if error > self.cfg.snap_distance {
            *body = *authoritative;
            self.last_snap = Some(now);
            tracing::debug!(error, "prediction snapped");
            return Correction::Snapped;
        }
        let cooled = self
            .last_snap
            .is_none_or(|at| now - at >= self.cfg.correction_cooldown);
        if error > self.cfg.correct_distance && cooled {
            body.position = body
                .position
                .move_towards(authoritative.position, self.cfg.correction_speed * dt);
            return Correction::Smoothed;
        }
        Correction::None
    }

    /// Correct a remote body, which has no prediction to protect: snap
    /// beyond the remote threshold, otherwise glide outside the deadband.
    pub fn reconcile_remote(&self, body: &mut Body, authoritative: &Body, dt: f32) -> Correction {
        let error = body.position.distance(authoritative.position);
        body.velocity = authoritative.velocity;
        if error > self.cfg.remote_snap_distance {
            body.position = authoritative.position;
            Correction::Snapped
        } else if error > self.cfg.remote_deadband {
            body.position = body
                .position
                .move_towards(authoritative.position, self.cfg.remote_glide_speed * dt);
            Correction::Smoothed
        } else {
            Correction::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::Vec2;

    const DT: f32 = 1.0 / 60.0;

    fn body(x: f32) -> Body {
        Body::at(Vec2::new(x, 0.0))
    }

    fn moving(x: f32, vx: f32) -> Body {
        Body {
            position: Vec2::new(x, 0.0),
            velocity: Vec2::new(vx, 0.0),
        }
    }

    #[test]
    fn large_error_snaps_position_and_velocity() {
        let mut r = Reconciler::new(ReconcileConfig::default());
        let mut b = moving(0.0, 1.0);
        let auth = moving(0.6, 5.0);
        assert_eq!(r.reconcile_predicted(&mut b, &auth, 1.0, DT), Correction::Snapped);
        assert_eq!(b, auth);
    }

    #[test]
    fn moderate_error_smooths_by_bounded_step() {
        let mut r = Reconciler::new(ReconcileConfig::default());
        let mut b = body(0.0);
        let auth = body(0.3);
        assert_eq!(r.reconcile_predicted(&mut b, &auth, 1.0, DT), Correction::Smoothed);
        assert!((b.position.x - 2.0 * DT).abs() < 1e-6);
    }

    #[test]
    fn small_error_is_accepted() {
        let mut r = Reconciler::new(ReconcileConfig::default());
        let mut b = body(0.0);
        assert_eq!(r.reconcile_predicted(&mut b, &body(0.05), 1.0, DT), Correction::None);
        assert_eq!(b.position.x, 0.0);
    }

    #[test]
    fn smoothing_waits_for_cooldown_after_snap() {
        let mut r = Reconciler::new(ReconcileConfig::default());
        let mut b = body(0.0);
        r.reconcile_predicted(&mut b, &body(1.0), 1.0, DT);
        b.position.x = 0.7;
        assert_eq!(r.reconcile_predicted(&mut b, &body(1.0), 1.05, DT), Correction::None);
        assert_eq!(r.reconcile_predicted(&mut b, &body(1.0), 1.2, DT), Correction::Smoothed);
    }

    #[test]
    fn remote_rules() {
        let r = Reconciler::new(ReconcileConfig::default());

        let mut b = body(0.0);
        assert_eq!(r.reconcile_remote(&mut b, &body(1.5), DT), Correction::Snapped);
        assert_eq!(b.position.x, 1.5);

        let mut b = body(0.0);
        assert_eq!(r.reconcile_remote(&mut b, &body(0.8), DT), Correction::Smoothed);
        assert!((b.position.x - 10.0 * DT).abs() < 1e-6);

        let mut b = body(0.0);
        assert_eq!(r.reconcile_remote(&mut b, &body(0.05), DT), Correction::None);
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn converges_to_a_still_target(
                start in -5.0f32..5.0,
                target in -5.0f32..5.0,
            ) {
                let cfg = ReconcileConfig::default();
                let mut r = Reconciler::new(cfg.clone());
                let mut b = body(start);
                let auth = body(target);
                let mut now = 0.0;
                for _ in 0..600 {
                    now += DT;
                    r.reconcile_predicted(&mut b, &auth, now, DT);
                }
                prop_assert!(b.position.distance(auth.position) <= cfg.correct_distance + 1e-4);
            }

            #[test]
            fn correction_never_overshoots(
                start in -0.5f32..0.5,
                target in -0.5f32..0.5,
            ) {
                let mut r = Reconciler::new(ReconcileConfig::default());
                let mut b = body(start);
                let auth = body(target);
                let before = b.position.distance(auth.position);
                r.reconcile_predicted(&mut b, &auth, 1.0, DT);
                prop_assert!(b.position.distance(auth.position) <= before + 1e-6);
            }
        }
    }
}
