//! Symbol-timing alignment correlator.
//!
//! Each block is preceded by a run of `{2, 1}` symbol pairs. Correlating
//! the recovered I/Q histories against that pattern produces a detection
//! function that peaks once per pair, exactly at the symbol boundary; the
//! demodulator averages those peaks into its decision phase. A three-point
//! parabolic fit around each peak recovers the boundary to a fraction of a
//! sample.

use super::window::{Bay, Window};

/// Alignment pattern, oldest symbol first.
const ALIGNMENT_PATTERN: [u8; 2] = [2, 1];

/// Number of symbols in the alignment pattern.
pub const ALIGNMENT_LENGTH: usize = ALIGNMENT_PATTERN.len();

/// Writes required after a reset before a peak may be reported.
const RIPE_AGE: u32 = 3;

pub struct Correlator<const M: usize> {
    history: Window<f32, 3>,
    age: u32,
    maximum: f32,
}

impl<const M: usize> Correlator<M> {
    const THRESHOLD: f32 = (M * ALIGNMENT_LENGTH / 2) as f32;

    pub fn new() -> Self {
        Correlator {
            history: Window::new(),
            age: 0,
            maximum: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.history = Window::new();
        self.age = 0;
        self.maximum = 0.0;
    }

    /// Correlates the current I/Q histories against the pattern. Returns
    /// the sub-sample tilt of a freshly detected peak, in [-0.5, 0.5].
    pub fn process(
        &mut self,
        i_history: &Bay<f32, M, ALIGNMENT_LENGTH>,
        q_history: &Bay<f32, M, ALIGNMENT_LENGTH>,
    ) -> Option<f32> {
        let mut correlation = 0.0;

        for (window, &symbol) in ALIGNMENT_PATTERN.iter().rev().enumerate() {
            let i_sum = i_history[window].sum();
            let q_sum = q_history[window].sum();

            correlation += if symbol & 2 != 0 { i_sum } else { -i_sum };
            correlation += if symbol & 1 != 0 { q_sum } else { -q_sum };
        }

        if correlation < 0.0 {
            // Re-arm at each valley so every pair in the run reports.
            self.maximum = 0.0;
        } else if correlation > self.maximum {
            self.maximum = correlation;
        }

        self.history.write(correlation);
        self.age += 1;

        // The previous value sitting at the running maximum means the
        // function just turned down: that sample was the peak.
        let peak = self.history[1];
        if self.age < RIPE_AGE || peak != self.maximum || peak < Self::THRESHOLD {
            return None;
        }

        let left = peak - self.history[2];
        let right = peak - self.history[0];
        let span = left + right;
        let tilt = if span > f32::EPSILON {
            (0.5 * (left - right) / span).clamp(-0.5, 0.5)
        } else {
            0.0
        };
        Some(tilt)
    }
}

impl<const M: usize> Default for Correlator<M> {
    fn default() -> Self {
        Self::new()
    }
}
