//! One-pole IIR filters.
//!
//! The same primitive serves three jobs in the receiver: a slow envelope
//! follower for level sensing, a DC blocker ahead of the mixer, and the
//! loop filter inside the PLL.

use core::f32::consts::PI;

/// `y += a * (x - y)` with `a = 1 - exp(-2pi * f)`, `f` normalized to the
/// sample rate.
#[derive(Clone, Copy)]
pub struct OnePoleLowpass {
    factor: f32,
    history: f32,
}

impl OnePoleLowpass {
    pub fn new(normalized_frequency: f32) -> Self {
        OnePoleLowpass {
            factor: 1.0 - libm::expf(-2.0 * PI * normalized_frequency),
            history: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.history = 0.0;
    }

    pub fn process(&mut self, input: f32) -> f32 {
        self.history += self.factor * (input - self.history);
        self.history
    }

    pub fn output(&self) -> f32 {
        self.history
    }
}

/// Complement of the lowpass: passes what the lowpass removes.
#[derive(Clone, Copy)]
pub struct OnePoleHighpass {
    lowpass: OnePoleLowpass,
}

impl OnePoleHighpass {
    pub fn new(normalized_frequency: f32) -> Self {
        OnePoleHighpass {
            lowpass: OnePoleLowpass::new(normalized_frequency),
        }
    }

    pub fn process(&mut self, input: f32) -> f32 {
        input - self.lowpass.process(input)
    }
}
