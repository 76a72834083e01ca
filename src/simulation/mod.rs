//! Signal synthesis for tests and benchmarks.
//!
//! A conforming modulator: one carrier cycle per symbol, symbols scaled by
//! 1/sqrt(2) so every constellation point stays inside [-1, 1]. The
//! low-level writers (`write_carrier`, `write_alignment`, `write_marker`,
//! `write_packet`) let a test assemble arbitrary — including deliberately
//! broken — transmissions; [`Modulator::encode`] produces a whole
//! well-formed one.

pub mod noise;

use alloc::vec::Vec;
use core::f32::consts::{SQRT_2, TAU};

use crate::crc::crc32;
use crate::decoder::{Config, BLOCK_MARKER, END_MARKER};
use crate::demod::ALIGNMENT_PAIRS;
use crate::hamming;

pub struct Modulator {
    symbol_rate: usize,
    packet_size: usize,
    block_size: usize,
    crc_seed: u32,
    ecc: bool,
    /// One waveform per symbol value.
    symbol_table: [Vec<f32>; 4],
    signal: Vec<f32>,
}

impl Modulator {
    pub fn new(config: &Config) -> Self {
        let samples_per_symbol = (config.sample_rate / config.symbol_rate) as usize;

        let symbol_table = core::array::from_fn(|symbol| {
            let i = (symbol as i32 & 2) - 1;
            let q = (symbol as i32 & 1) * 2 - 1;
            (0..samples_per_symbol)
                .map(|n| {
                    let phase = TAU * n as f32 / samples_per_symbol as f32;
                    (i as f32 * libm::cosf(phase) - q as f32 * libm::sinf(phase)) / SQRT_2
                })
                .collect()
        });

        Modulator {
            symbol_rate: config.symbol_rate as usize,
            packet_size: config.packet_size,
            block_size: config.block_size,
            crc_seed: config.crc_seed,
            ecc: config.ecc,
            symbol_table,
            signal: Vec::new(),
        }
    }

    pub fn write_symbol(&mut self, symbol: u8) {
        self.signal
            .extend_from_slice(&self.symbol_table[usize::from(symbol & 3)]);
    }

    pub fn write_byte(&mut self, byte: u8) {
        for shift in [6, 4, 2, 0] {
            self.write_symbol((byte >> shift) & 3);
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.write_byte(byte);
        }
    }

    pub fn write_silence(&mut self, samples: usize) {
        self.signal.extend(core::iter::repeat(0.0).take(samples));
    }

    /// A run of zero symbols, the carrier the receiver levels and locks on.
    pub fn write_carrier(&mut self, symbols: usize) {
        for _ in 0..symbols {
            self.write_symbol(0);
        }
    }

    /// The `{2, 1}` run the receiver derives its decision phase from.
    pub fn write_alignment(&mut self) {
        for _ in 0..ALIGNMENT_PAIRS {
            self.write_symbol(2);
            self.write_symbol(1);
        }
    }

    /// Sixteen symbols spelling `code`, most-significant pair first.
    pub fn write_marker(&mut self, code: u32) {
        for pair in (0..16).rev() {
            self.write_symbol(((code >> (2 * pair)) & 3) as u8);
        }
    }

    /// Frames `payload` with its CRC and, when enabled, the parity word —
    /// exposed so tests can corrupt the framed bytes before writing them.
    pub fn frame_packet(&self, payload: &[u8]) -> Vec<u8> {
        assert_eq!(payload.len(), self.packet_size);
        let mut bytes = payload.to_vec();
        bytes.extend_from_slice(&crc32(self.crc_seed, payload).to_be_bytes());
        if self.ecc {
            bytes.extend_from_slice(&hamming::protect(&bytes).to_le_bytes());
        }
        bytes
    }

    pub fn write_packet(&mut self, payload: &[u8]) {
        let framed = self.frame_packet(payload);
        self.write_bytes(&framed);
    }

    /// Alignment, block marker, then the block's packets back to back.
    pub fn write_block(&mut self, block: &[u8]) {
        assert_eq!(block.len(), self.block_size);
        self.write_alignment();
        self.write_marker(BLOCK_MARKER);
        for packet in block.chunks(self.packet_size) {
            self.write_packet(packet);
        }
    }

    /// Alignment followed by the end-of-transmission marker.
    pub fn write_end(&mut self) {
        self.write_alignment();
        self.write_marker(END_MARKER);
    }

    /// A complete transmission of `data`, which must be a whole number of
    /// blocks: leading carrier, the blocks separated by page-write gaps,
    /// the end marker and a short run-out.
    pub fn encode(mut self, data: &[u8]) -> Vec<f32> {
        assert_eq!(data.len() % self.block_size, 0);

        // One second: enough for the two settling periods and the zero run.
        self.write_carrier(self.symbol_rate);

        for block in data.chunks(self.block_size) {
            self.write_block(block);
            // Dead time for the caller's flash write.
            self.write_carrier(self.symbol_rate / 4);
        }

        self.write_end();
        self.write_carrier(16);

        self.finish()
    }

    pub fn finish(self) -> Vec<f32> {
        self.signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_waveforms_stay_in_range() {
        let modulator = Modulator::new(&Config::default());
        for waveform in &modulator.symbol_table {
            assert_eq!(waveform.len(), 8);
            for &sample in waveform {
                assert!((-1.0..=1.0).contains(&sample));
            }
        }
    }

    #[test]
    fn opposite_symbols_are_negated() {
        let modulator = Modulator::new(&Config::default());
        for n in 0..8 {
            assert!(
                (modulator.symbol_table[0][n] + modulator.symbol_table[3][n]).abs() < 1e-6
            );
            assert!(
                (modulator.symbol_table[1][n] + modulator.symbol_table[2][n]).abs() < 1e-6
            );
        }
    }

    #[test]
    fn marker_symbols_spell_the_code() {
        let mut modulator = Modulator::new(&Config::default());
        modulator.write_marker(0x1B734E92);

        // 0x1B734E92 read out two bits at a time, MSB first.
        let expected = [0u8, 1, 2, 3, 1, 3, 0, 3, 1, 0, 3, 2, 2, 1, 0, 2];
        let sps = modulator.symbol_table[0].len();
        assert_eq!(modulator.signal.len(), expected.len() * sps);
        for (index, &symbol) in expected.iter().enumerate() {
            let offset = index * sps;
            let written = &modulator.signal[offset..offset + sps];
            assert_eq!(written, modulator.symbol_table[symbol as usize].as_slice());
        }
    }

    #[test]
    fn encode_rejects_partial_blocks() {
        let modulator = Modulator::new(&Config::default());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            modulator.encode(&[0u8; 100])
        }));
        assert!(result.is_err());
    }
}
