//! CRC-32 (IEEE 802.3).
//!
//! Reflected polynomial 0xedb88320, register starts at all ones and the result
//! is the complement of the final register.  Byte-at-a-time table lookup; the
//! table is built at compile time.

const POLY: u32 = 0xedb8_8320;

static TABLE: [u32; 256] = make_table();

const fn make_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ POLY } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Incremental digest, for data that arrives or is read in pieces.
#[derive(Debug, Clone, Copy)]
pub struct Crc32 {
    crc: u32,
}

impl Crc32 {
    pub const fn new() -> Crc32 {
        Crc32 { crc: 0xffff_ffff }
    }

    pub fn update(&mut self, data: &[u8]) {
        let mut crc = self.crc;
        for &b in data {
            crc = TABLE[((crc ^ b as u32) & 0xff) as usize] ^ (crc >> 8);
        }
        self.crc = crc;
    }

    /// The digest of everything passed to `update` so far.
    pub fn finalize(&self) -> u32 {
        !self.crc
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Crc32::new()
    }
}

/// Digest of a whole byte range.
pub fn digest(data: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(data);
    crc.finalize()
}

#[cfg(test)]
mod tests {
    use rand::{RngCore, SeedableRng};
    use rand_xoshiro::Xoshiro256Plus;

    use super::*;

    /// Bit at a time, straight from the definition.
    fn bitwise(data: &[u8]) -> u32 {
        let mut crc: u32 = 0xffff_ffff;
        for &b in data {
            crc ^= b as u32;
            for _ in 0..8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ POLY;
                } else {
                    crc >>= 1;
                }
            }
        }
        !crc
    }

    #[test]
    fn check_values() {
        assert_eq!(digest(b""), 0);
        assert_eq!(digest(b"123456789"), 0xcbf4_3926);
        assert_eq!(digest(b"The quick brown fox jumps over the lazy dog"), 0x414f_a339);
    }

    #[test]
    fn deterministic() {
        let data = b"firmware body";
        assert_eq!(digest(data), digest(data));
    }

    #[test]
    fn matches_reference() {
        let mut rng = Xoshiro256Plus::seed_from_u64(11);
        for len in [0, 1, 3, 16, 255, 256, 1000, 4097] {
            let mut data = vec![0u8; len];
            rng.fill_bytes(&mut data);
            let ours = digest(&data);
            assert_eq!(ours, bitwise(&data), "len {}", len);
            assert_eq!(ours, crc32fast::hash(&data), "len {}", len);
        }
    }

    #[test]
    fn single_bit_flips_detected() {
        let mut data = [0u8; 64];
        Xoshiro256Plus::seed_from_u64(5).fill_bytes(&mut data);
        let good = digest(&data);
        for byte in 0..data.len() {
            for bit in 0..8 {
                data[byte] ^= 1 << bit;
                assert_ne!(digest(&data), good, "byte {} bit {}", byte, bit);
                data[byte] ^= 1 << bit;
            }
        }
    }

    #[test]
    fn incremental_matches_oneshot() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let whole = digest(&data);
        for split in [0, 1, 7, 500, 999, 1000] {
            let mut crc = Crc32::new();
            crc.update(&data[..split]);
            crc.update(&data[split..]);
            assert_eq!(crc.finalize(), whole, "split {}", split);
        }
        assert_eq!(Crc32::default().finalize(), digest(&[]));
    }
}
