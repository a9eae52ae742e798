//! Validated address ranges.

use crate::{Error, Result};

/// A non-empty range `[base, base + capacity)` that fits in the 32-bit address
/// space.  Built once, so bounds checks never redo the overflow reasoning.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Region {
    base: u32,
    capacity: u32,
}

impl Region {
    pub const fn new(base: u32, capacity: u32) -> Result<Region> {
        if capacity == 0 || base.checked_add(capacity - 1).is_none() {
            return Err(Error::Layout);
        }
        Ok(Region { base, capacity })
    }

    pub const fn base(&self) -> u32 {
        self.base
    }

    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// One past the last address.  May be 2^32.
    pub const fn end(&self) -> u64 {
        self.base as u64 + self.capacity as u64
    }

    /// Is `[addr, addr + len)` entirely within the region.
    pub fn contains(&self, addr: u32, len: usize) -> bool {
        addr >= self.base
            && (addr as u64)
                .checked_add(len as u64)
                .is_some_and(|end| end <= self.end())
    }

    pub fn contains_region(&self, other: &Region) -> bool {
        other.base >= self.base && other.end() <= self.end()
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        (self.base as u64) < other.end() && (other.base as u64) < self.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction() {
        assert_eq!(Region::new(0x1000, 0), Err(Error::Layout));
        assert_eq!(Region::new(0xffff_ff00, 0x101), Err(Error::Layout));
        let top = Region::new(0xffff_ff00, 0x100).unwrap();
        assert_eq!(top.end(), 1 << 32);
    }

    #[test]
    fn contains_edges() {
        let r = Region::new(0x8001_0000, 0x7_0000).unwrap();
        assert!(r.contains(0x8001_0000, 0x7_0000));
        assert!(r.contains(0x8007_ffff, 1));
        assert!(!r.contains(0x8000_ffff, 1));
        assert!(!r.contains(0x8001_0000, 0x7_0001));
        assert!(!r.contains(0x8008_0000, 1));
        assert!(!r.contains(0xffff_ffff, usize::MAX));
    }

    #[test]
    fn overlap() {
        let boot = Region::new(0x8000_0000, 0x1_0000).unwrap();
        let app = Region::new(0x8001_0000, 0x7_0000).unwrap();
        let bad = Region::new(0x8000_f000, 0x2000).unwrap();
        assert!(!boot.overlaps(&app));
        assert!(boot.overlaps(&bad));
        assert!(app.overlaps(&bad));
        let whole = Region::new(0x8000_0000, 0x8_0000).unwrap();
        assert!(whole.contains_region(&app));
        assert!(!app.contains_region(&whole));
    }
}
