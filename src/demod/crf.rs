//! Carrier-rejection filter.
//!
//! After mixing, each of the I and Q branches carries the baseband symbol
//! plus an image at twice the carrier frequency. A short equiripple FIR
//! with its cutoff at the symbol rate removes the image. One kernel is
//! compiled in per supported samples-per-symbol ratio; the taps are fixed
//! data from an offline equiripple design over the bands
//! `[0, 1/M]` pass, `[2/M, 1/2]` stop.

use super::window::Window;

pub const KERNEL_LENGTH: usize = 7;

const KERNEL_06: [f32; KERNEL_LENGTH] = [
    -7.61504431e-02,
    4.23661388e-05,
    3.04728871e-01,
    5.00042366e-01,
    3.04728871e-01,
    4.23661388e-05,
    -7.61504431e-02,
];
const KERNEL_08: [f32; KERNEL_LENGTH] = [
    -4.62606751e-02,
    1.25000000e-01,
    2.96260675e-01,
    3.82800831e-01,
    2.96260675e-01,
    1.25000000e-01,
    -4.62606751e-02,
];
const KERNEL_12: [f32; KERNEL_LENGTH] = [
    4.06822339e-02,
    2.09317766e-01,
    2.09317766e-01,
    2.54748848e-01,
    2.09317766e-01,
    2.09317766e-01,
    4.06822339e-02,
];
const KERNEL_16: [f32; KERNEL_LENGTH] = [
    1.56977082e-01,
    1.37855092e-01,
    1.68060009e-01,
    1.79345186e-01,
    1.68060009e-01,
    1.37855092e-01,
    1.56977082e-01,
];
const KERNEL_18: [f32; KERNEL_LENGTH] = [
    1.70307392e-01,
    1.19520171e-01,
    1.40486857e-01,
    1.48054138e-01,
    1.40486857e-01,
    1.19520171e-01,
    1.70307392e-01,
];
const KERNEL_24: [f32; KERNEL_LENGTH] = [
    1.98219423e-01,
    7.96402625e-02,
    8.76371060e-02,
    9.05001755e-02,
    8.76371060e-02,
    7.96402625e-02,
    1.98219423e-01,
];
const KERNEL_32: [f32; KERNEL_LENGTH] = [
    2.18214705e-01,
    4.99257841e-02,
    5.25785277e-02,
    5.34812099e-02,
    5.25785277e-02,
    4.99257841e-02,
    2.18214705e-01,
];

/// Low-pass for one demodulated branch at `M` samples per symbol.
#[derive(Clone, Copy)]
pub struct CarrierRejectionFilter<const M: usize> {
    window: Window<f32, KERNEL_LENGTH>,
}

impl<const M: usize> CarrierRejectionFilter<M> {
    // Evaluated during monomorphization, so a ratio without a kernel is a
    // build failure rather than a runtime branch.
    const KERNEL: [f32; KERNEL_LENGTH] = match M {
        6 => KERNEL_06,
        8 => KERNEL_08,
        12 => KERNEL_12,
        16 => KERNEL_16,
        18 => KERNEL_18,
        24 => KERNEL_24,
        32 => KERNEL_32,
        _ => panic!("no carrier-rejection kernel for this samples-per-symbol ratio"),
    };

    pub fn new() -> Self {
        CarrierRejectionFilter {
            window: Window::new(),
        }
    }

    pub fn process(&mut self, input: f32) -> f32 {
        self.window.write(input);

        let mut sum = 0.0;
        for (age, tap) in Self::KERNEL.iter().enumerate() {
            sum += self.window[age] * tap;
        }
        sum
    }
}

impl<const M: usize> Default for CarrierRejectionFilter<M> {
    fn default() -> Self {
        Self::new()
    }
}
