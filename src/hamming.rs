//! Single-bit error correction for packets.
//!
//! Extended-Hamming protection with a non-interleaved layout: instead of
//! threading parity bits through the data, the data bits stay where they
//! are and the numbering simply skips the power-of-two positions the
//! parity bits would occupy. Data bits are therefore numbered
//! 3, 5, 6, 7, 9, ... (LSB first within each byte), and the 16-bit parity
//! word collects, at word bit `k`, the parity of all bit numbers with bit
//! `k` set. An encoder must use exactly this numbering for the syndrome
//! arithmetic to work out.

/// Number of parity bits in the transmitted parity word.
pub const PARITY_BITS: usize = 16;

/// Largest protectable region, in bits, for a 16-bit parity word.
pub const MAX_DATA_BITS: usize = (1 << PARITY_BITS) - 1 - PARITY_BITS;

/// Computes the parity word for `data`.
pub fn protect(data: &[u8]) -> u16 {
    debug_assert!(data.len() * 8 <= MAX_DATA_BITS);

    let mut accumulator: u32 = 0;
    let mut bit_num: u32 = 1;

    for i in 0..data.len() * 8 {
        // Skip the bit numbers reserved for parity.
        while bit_num & (bit_num - 1) == 0 {
            bit_num += 1;
        }
        if (data[i / 8] >> (i % 8)) & 1 != 0 {
            accumulator ^= bit_num;
        }
        bit_num += 1;
    }

    accumulator as u16
}

/// Repairs at most one flipped bit in `data`, given the parity word that
/// was computed over the original contents.
///
/// A zero syndrome means the region is clean; a power-of-two syndrome
/// means the flip hit the parity word itself, which nothing downstream
/// depends on. Anything else addresses a single data bit, which is
/// flipped back in place.
pub fn correct(data: &mut [u8], parity: u16) {
    let mut syndrome: u32 = 0;
    let mut bit_num: u32 = 1;

    for i in 0..data.len() * 8 {
        while bit_num & (bit_num - 1) == 0 {
            syndrome ^= u32::from(parity) & bit_num;
            bit_num += 1;
        }
        if (data[i / 8] >> (i % 8)) & 1 != 0 {
            syndrome ^= bit_num;
        }
        bit_num += 1;
    }

    if syndrome & syndrome.wrapping_sub(1) != 0 {
        // The bit number maps back to a data position by discounting the
        // parity numbers that were skipped below it.
        let width = 32 - syndrome.leading_zeros();
        let bit_pos = (syndrome - 1 - width) as usize;

        if bit_pos < data.len() * 8 {
            data[bit_pos / 8] ^= 1 << (bit_pos % 8);
        }
    }
}
