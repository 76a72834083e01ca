//! QPSK demodulation.
//!
//! [`Demodulator`] turns real-valued audio samples into hard-decided
//! two-bit symbols. Per sample the chain runs: DC-blocking highpass,
//! envelope follower (for level sensing and AGC), I/Q mix against a
//! table oscillator driven by the PLL, carrier-rejection lowpass on each
//! branch, PLL update, and a decision whenever the PLL phase crosses the
//! decision phase learned during alignment.
//!
//! The state machine walks settle → sense gain → carrier sync → align →
//! locked. Carrier sync locks the PLL onto the all-zeros run that leads
//! every block; alignment then finds the symbol-decision phase by
//! correlating against the known `{2, 1}` run. Only the locked state
//! emits symbols, so everything sent before a completed alignment is
//! discarded by construction.

pub mod correlator;
pub mod crf;
pub mod one_pole;
pub mod pll;
pub mod trig;
pub mod window;

use tracing::{debug, trace, warn};

use crate::fifo::{Consumer, Producer, RingBuffer};
use correlator::{Correlator, ALIGNMENT_LENGTH};
use crf::CarrierRejectionFilter;
use one_pole::{OnePoleHighpass, OnePoleLowpass};
use pll::PhaseLockedLoop;
use trig::{cosine, sine, vector_to_phase, wrap_phase};
use window::Bay;

/// Alignment pairs sent before each marker; one correlation peak each.
pub const ALIGNMENT_PAIRS: u32 = 8;

/// Minimum envelope level treated as a live signal.
const LEVEL_THRESHOLD: f32 = 0.05;

/// Envelope level the AGC normalizes to.
const AGC_TARGET: f32 = 0.64;

/// Consecutive zero symbols that prove carrier lock.
const CARRIER_SYNC_LENGTH: u32 = 32;

const HPF_FREQUENCY: f32 = 0.001;
const FOLLOWER_FREQUENCY: f32 = 0.0001;
const SYMBOL_FIFO_CAPACITY: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitToSettle,
    SenseGain,
    CarrierSync,
    Align,
    Locked,
    Error,
}

/// Streaming demodulator at `M` samples per symbol.
pub struct Demodulator<const M: usize> {
    state: State,
    symbols_in: Producer<u8>,
    symbols_out: Consumer<u8>,

    hpf: OnePoleHighpass,
    follower: OnePoleLowpass,
    agc_gain: f32,

    pll: PhaseLockedLoop,
    crf_i: CarrierRejectionFilter<M>,
    crf_q: CarrierRejectionFilter<M>,

    correlator: Correlator<M>,
    i_history: Bay<f32, M, ALIGNMENT_LENGTH>,
    q_history: Bay<f32, M, ALIGNMENT_LENGTH>,

    decision_phase: f32,
    settling_time: u32,
    skipped_samples: u32,
    skipped_symbols: u32,
    peak_count: u32,
    phase_sum_x: f32,
    phase_sum_y: f32,
}

impl<const M: usize> Demodulator<M> {
    pub fn new(sample_rate: u32) -> Self {
        let (symbols_in, symbols_out) = RingBuffer::new(SYMBOL_FIFO_CAPACITY);

        Demodulator {
            state: State::WaitToSettle,
            symbols_in,
            symbols_out,
            hpf: OnePoleHighpass::new(HPF_FREQUENCY),
            follower: OnePoleLowpass::new(FOLLOWER_FREQUENCY),
            agc_gain: 1.0,
            pll: PhaseLockedLoop::new(1.0 / M as f32),
            crf_i: CarrierRejectionFilter::new(),
            crf_q: CarrierRejectionFilter::new(),
            correlator: Correlator::new(),
            i_history: Bay::new(),
            q_history: Bay::new(),
            decision_phase: 0.0,
            settling_time: sample_rate / 4,
            skipped_samples: 0,
            skipped_symbols: 0,
            peak_count: 0,
            phase_sum_x: 0.0,
            phase_sum_y: 0.0,
        }
    }

    pub fn symbols_available(&self) -> usize {
        self.symbols_out.available()
    }

    pub fn pop_symbol(&mut self) -> Option<u8> {
        self.symbols_out.pop()
    }

    /// Envelope follower output, the receiver's view of the input level.
    pub fn signal_power(&self) -> f32 {
        self.follower.output()
    }

    pub fn pll_phase(&self) -> f32 {
        self.pll.phase()
    }

    pub fn pll_phase_increment(&self) -> f32 {
        self.pll.phase_increment()
    }

    pub fn decision_phase(&self) -> f32 {
        self.decision_phase
    }

    /// True once the carrier has been lost or never found; terminal until
    /// the next discovery restart.
    pub fn carrier_lost(&self) -> bool {
        self.state == State::Error
    }

    /// Restarts carrier acquisition. With `discover` the level sensing and
    /// AGC run again from scratch; without it the known gain is kept and
    /// the receiver goes straight back to locking the PLL, as it does
    /// between blocks of one transmission.
    pub fn sync_carrier(&mut self, discover: bool) {
        self.skipped_samples = 0;
        self.skipped_symbols = 0;
        self.symbols_out.flush();

        if discover {
            self.follower.reset();
            self.state = State::WaitToSettle;
        } else {
            self.state = State::CarrierSync;
        }

        self.pll.sync();
    }

    /// Drops into alignment: the next `{2, 1}` run will re-derive the
    /// decision phase.
    fn sync_decision(&mut self) {
        self.symbols_out.flush();
        self.state = State::Align;
        self.decision_phase = 0.0;
        self.correlator.reset();
        self.skipped_symbols = 0;
        self.peak_count = 0;
        self.phase_sum_x = 0.0;
        self.phase_sum_y = 0.0;
    }

    pub fn process(&mut self, sample: f32) {
        let sample = self.hpf.process(sample);

        self.follower.process(libm::fabsf(sample));
        let level = self.follower.output();

        let sample = sample * self.agc_gain;

        match self.state {
            State::WaitToSettle => {
                if self.skipped_samples < self.settling_time {
                    self.skipped_samples += 1;
                } else if level > LEVEL_THRESHOLD {
                    self.skipped_samples = 0;
                    self.state = State::SenseGain;
                    debug!(level, "input settled, sensing level");
                }
            }
            State::SenseGain => {
                if self.skipped_samples < self.settling_time {
                    self.skipped_samples += 1;
                } else if level > LEVEL_THRESHOLD {
                    self.agc_gain = AGC_TARGET / level;
                    self.state = State::CarrierSync;
                    debug!(level, gain = self.agc_gain, "gain set, locking carrier");
                } else {
                    self.state = State::WaitToSettle;
                }
            }
            State::Error => {}
            _ => {
                if level < LEVEL_THRESHOLD {
                    warn!(level, "carrier lost");
                    self.state = State::Error;
                } else {
                    self.demodulate(sample);
                }
            }
        }
    }

    fn demodulate(&mut self, sample: f32) {
        let phase = self.pll.phase();
        let i_osc = cosine(phase);
        let q_osc = sine(phase);

        let i = self.crf_i.process(sample * i_osc);
        let q = self.crf_q.process(sample * -q_osc);

        let phase_error = if self.state == State::CarrierSync {
            // The leader is all zero symbols, constellation point (-1, -1).
            q - i
        } else {
            (if q > 0.0 { i } else { -i }) - (if i > 0.0 { q } else { -q })
        };

        self.pll.process(phase_error / 8.0);

        self.i_history.write(i);
        self.q_history.write(q);

        let prev_phase = phase;
        let phase = self.pll.phase();
        let wrapped = prev_phase > phase;

        let crossed = if wrapped {
            prev_phase < self.decision_phase || phase >= self.decision_phase
        } else {
            prev_phase < self.decision_phase && phase >= self.decision_phase
        };

        if crossed {
            match self.state {
                State::CarrierSync => {
                    if self.decide_symbol(false) == 0 {
                        self.skipped_symbols += 1;
                    } else if self.skipped_symbols >= CARRIER_SYNC_LENGTH {
                        // The zero run is over; what follows is alignment.
                        debug!(zeros = self.skipped_symbols, "carrier locked, aligning");
                        self.sync_decision();
                    } else {
                        self.skipped_symbols = 0;
                    }
                }
                State::Locked => {
                    let symbol = self.decide_symbol(true);
                    if !self.symbols_in.push(symbol) {
                        warn!("symbol fifo overflow, symbol dropped");
                    }
                }
                _ => {}
            }
        }

        if self.state == State::Align {
            if let Some(tilt) = self.correlator.process(&self.i_history, &self.q_history) {
                let estimate = wrap_phase(prev_phase + self.pll.phase_increment() * tilt);
                self.phase_sum_x += cosine(estimate);
                self.phase_sum_y += sine(estimate);
                self.peak_count += 1;
                trace!(peak = self.peak_count, tilt, estimate, "alignment peak");

                if self.peak_count == ALIGNMENT_PAIRS {
                    self.decision_phase = vector_to_phase(self.phase_sum_x, self.phase_sum_y);
                    debug!(decision_phase = self.decision_phase, "decision phase set");
                }
            }

            // Hold off until the phase has moved well past the decision
            // point, so the first crossing falls on a whole symbol.
            if self.peak_count >= ALIGNMENT_PAIRS
                && wrap_phase(phase - self.decision_phase) > 0.5
            {
                self.state = State::Locked;
            }
        }
    }

    fn decide_symbol(&self, adjust_timing: bool) -> u8 {
        const LATEST: usize = 0;
        const LATE: usize = 1;
        let early = M - 2;
        let earliest = M - 1;

        let i_window = &self.i_history[0];
        let q_window = &self.q_history[0];

        let mut i_sum = i_window.sum();
        let mut q_sum = q_window.sum();

        let i_on_time = i_sum - i_window[LATEST] - i_window[earliest];
        let q_on_time = q_sum - q_window[LATEST] - q_window[earliest];

        if adjust_timing {
            let i_late = i_sum - i_window[early] - i_window[earliest];
            let q_late = q_sum - q_window[early] - q_window[earliest];
            let i_early = i_sum - i_window[LATE] - i_window[LATEST];
            let q_early = q_sum - q_window[LATE] - q_window[LATEST];

            let late_strength = libm::fabsf(i_late) + libm::fabsf(q_late);
            let early_strength = libm::fabsf(i_early) + libm::fabsf(q_early);
            let on_time_strength = libm::fabsf(i_on_time) + libm::fabsf(q_on_time);

            let threshold = 1.25 * on_time_strength;

            if late_strength > threshold && early_strength <= threshold {
                i_sum = i_late;
                q_sum = q_late;
            } else if early_strength > threshold && late_strength <= threshold {
                i_sum = i_early;
                q_sum = q_early;
            }
        } else {
            i_sum = i_on_time;
            q_sum = q_on_time;
        }

        (if i_sum < 0.0 { 0 } else { 2 }) | (if q_sum < 0.0 { 0 } else { 1 })
    }
}
