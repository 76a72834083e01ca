//! Software phase-locked loop.
//!
//! A phase accumulator stepped once per sample, pulled toward lock by a
//! scalar phase error supplied by the demodulator. The filtered error
//! feeds back along two paths, giving a PI-like response: directly into
//! the phase (proportional) and into the step size (integral), so the
//! loop absorbs both a phase offset and a clock-rate mismatch.

use super::one_pole::OnePoleLowpass;
use super::trig::wrap_phase;

pub struct PhaseLockedLoop {
    nominal_frequency: f32,
    phase_increment: f32,
    phase: f32,
    phase_error: f32,
    lpf: OnePoleLowpass,
}

impl PhaseLockedLoop {
    /// `normalized_frequency` is the symbol rate over the sample rate.
    pub fn new(normalized_frequency: f32) -> Self {
        PhaseLockedLoop {
            nominal_frequency: normalized_frequency,
            phase_increment: normalized_frequency,
            phase: 0.0,
            phase_error: 0.0,
            lpf: OnePoleLowpass::new(normalized_frequency / 32.0),
        }
    }

    /// Back to nominal, forgetting any learned clock-rate offset.
    pub fn reset(&mut self) {
        self.phase_increment = self.nominal_frequency;
        self.phase = 0.0;
        self.phase_error = 0.0;
    }

    /// Restarts the phase for a new lock attempt but keeps the learned
    /// step, since the sender's clock has not changed.
    pub fn sync(&mut self) {
        self.phase = 0.0;
        self.phase_error = 0.0;
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn phase_increment(&self) -> f32 {
        self.phase_increment
    }

    /// Advances one sample under the given phase error and returns the new
    /// phase.
    pub fn process(&mut self, error: f32) -> f32 {
        self.phase_error = self.lpf.process(error);

        self.phase_increment =
            (self.phase_increment - self.phase_error / 4096.0).clamp(0.0, 1.0);

        self.phase = wrap_phase(self.phase + self.phase_increment - self.phase_error / 16.0);
        self.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_runs_at_the_nominal_rate() {
        let mut pll = PhaseLockedLoop::new(1.0 / 8.0);
        for _ in 0..7 {
            pll.process(0.0);
        }
        assert!((pll.phase() - 7.0 / 8.0).abs() < 1e-5);
        pll.process(0.0);
        assert!(pll.phase() < 1e-5);
    }

    #[test]
    fn phase_stays_in_the_unit_interval() {
        let mut pll = PhaseLockedLoop::new(1.0 / 6.0);
        for i in 0..10_000 {
            let error = if i % 3 == 0 { 4.0 } else { -3.0 };
            let phase = pll.process(error);
            assert!((0.0..1.0).contains(&phase), "phase = {phase}");
            let increment = pll.phase_increment();
            assert!((0.0..=1.0).contains(&increment), "step = {increment}");
        }
    }

    #[test]
    fn sync_keeps_the_learned_step() {
        let mut pll = PhaseLockedLoop::new(1.0 / 8.0);
        for _ in 0..500 {
            pll.process(0.5);
        }
        let learned = pll.phase_increment();
        assert!(learned != 1.0 / 8.0);

        pll.sync();
        assert_eq!(pll.phase(), 0.0);
        assert_eq!(pll.phase_increment(), learned);
    }

    #[test]
    fn reset_restores_the_nominal_step() {
        let mut pll = PhaseLockedLoop::new(1.0 / 8.0);
        for _ in 0..500 {
            pll.process(-0.5);
        }
        pll.reset();
        assert_eq!(pll.phase_increment(), 1.0 / 8.0);
        assert_eq!(pll.phase(), 0.0);
    }

    #[test]
    fn a_positive_error_retards_the_phase() {
        let mut reference = PhaseLockedLoop::new(1.0 / 8.0);
        let mut steered = PhaseLockedLoop::new(1.0 / 8.0);
        for _ in 0..3 {
            reference.process(0.0);
            steered.process(1.0);
        }
        assert!(steered.phase() < reference.phase());
    }
}
