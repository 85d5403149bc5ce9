use serde::{Deserialize, Serialize};

/// A tick-counted countdown. Advanced explicitly by the simulation clock;
/// nothing here sleeps or suspends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Timer {
    remaining: f32,
}

impl Timer {
    pub fn new(duration: f32) -> Self {
        Self {
            remaining: duration.max(0.0),
        }
    }

    /// An already-expired timer.
    pub fn expired() -> Self {
        Self { remaining: 0.0 }
    }

    /// Advance by `dt`. Returns true only on the tick the timer runs out.
    pub fn tick(&mut self, dt: f32) -> bool {
        if self.remaining <= 0.0 {
            return false;
        }
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            self.remaining = 0.0;
            true
        } else {
            false
        }
    }

    pub fn is_expired(&self) -> bool {
        self.remaining <= 0.0
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }
}
