//! Seeded CRC-32 for packet validation.
//!
//! Packets carry a CRC-32/IEEE (reflected polynomial `0xEDB88320`) over the
//! payload, chained from a caller-supplied seed exactly like
//! `zlib.crc32(data, seed)`. The seed lets a host tie a transmission to a
//! particular target or session; a seed of zero is the plain CRC-32
//! everyone knows, with check value `0xCBF43926` for `"123456789"`.

use crc::{Crc, CRC_32_ISO_HDLC};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// CRC-32 of `data`, continued from `seed`.
pub fn crc32(seed: u32, data: &[u8]) -> u32 {
    // The zlib convention starts the shift register at !seed.
    // `digest_with_initial` bit-reverses its argument before loading the
    // register (the algorithm is reflected), so pass the seed pre-reversed.
    let mut digest = CRC32.digest_with_initial((!seed).reverse_bits());
    digest.update(data);
    digest.finalize()
}
