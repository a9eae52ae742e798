//! Firmware body generation.
//!
//! Bodies are pseudo-random but fully determined by their seed, so a failing
//! test can be reproduced exactly.

use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

pub struct GeneratedImage {
    pub data: Vec<u8>,
}

pub struct GenBuilder {
    /// Size of the body in bytes.
    size: usize,
    /// Seed for the PRNG
    seed: u64,
}

impl Default for GenBuilder {
    fn default() -> Self {
        GenBuilder {
            size: 76_137,
            seed: 1,
        }
    }
}

impl GenBuilder {
    pub fn size(&mut self, size: usize) -> &mut Self {
        self.size = size;
        self
    }

    pub fn seed(&mut self, seed: u64) -> &mut Self {
        self.seed = seed;
        self
    }

    pub fn build(&self) -> GeneratedImage {
        let mut rng = Xoshiro256Plus::seed_from_u64(self.seed);
        let mut data = vec![0u8; self.size];
        rng.fill_bytes(&mut data);
        GeneratedImage { data }
    }
}

impl GeneratedImage {
    /// Split the body into chunks of irregular sizes, up to `max` bytes, the
    /// way a transport would deliver it.
    pub fn chunks(&self, seed: u64, max: usize) -> Vec<&[u8]> {
        let mut rng = Xoshiro256Plus::seed_from_u64(seed);
        let mut rest = &self.data[..];
        let mut out = Vec::new();
        while !rest.is_empty() {
            let len = (rng.next_u32() as usize % max.max(1) + 1).min(rest.len());
            let (head, tail) = rest.split_at(len);
            out.push(head);
            rest = tail;
        }
        out
    }
}
