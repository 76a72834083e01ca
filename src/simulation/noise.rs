//! Channel impairments for decoder tests.

use alloc::vec::Vec;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// RMS level of `signal`.
pub fn rms(signal: &[f32]) -> f32 {
    let power: f32 = signal.iter().map(|&x| x * x).sum::<f32>() / signal.len() as f32;
    libm::sqrtf(power)
}

/// Adds white Gaussian noise at `snr_db` below the signal's RMS level.
/// Seeded, so a failing test replays the same channel.
pub fn awgn(signal: &[f32], snr_db: f32, seed: u64) -> Vec<f32> {
    let sigma = rms(signal) / libm::powf(10.0, snr_db / 20.0);
    let normal = Normal::new(0.0, sigma).unwrap();
    let mut rng = SmallRng::seed_from_u64(seed);

    signal.iter().map(|&x| x + normal.sample(&mut rng)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_level_matches_the_requested_snr() {
        let tone: Vec<f32> = (0..48_000)
            .map(|n| (core::f32::consts::TAU * n as f32 / 8.0).sin())
            .collect();

        let noisy = awgn(&tone, 20.0, 1);
        let noise: Vec<f32> = noisy.iter().zip(tone.iter()).map(|(a, b)| a - b).collect();

        let expected = rms(&tone) / 10.0;
        assert!((rms(&noise) - expected).abs() / expected < 0.05);
    }

    #[test]
    fn the_same_seed_replays_the_same_channel() {
        let signal = [0.5f32; 64];
        assert_eq!(awgn(&signal, 10.0, 7), awgn(&signal, 10.0, 7));
        assert_ne!(awgn(&signal, 10.0, 7), awgn(&signal, 10.0, 8));
    }
}
