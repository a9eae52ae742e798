//! Partition configuration.
//!
//! Nothing in the core has a compiled in address.  A board describes where
//! its bootloader lives and where the application partition is, and the
//! partition is built from that description.

use crate::{header::HEADER_SIZE, Error, Region, Result};

/// Header sentinel, "RVBL".
pub const BOOT_MAGIC: u32 = 0x5256_424c;

/// Where the application partition lives, and which sentinel marks a valid
/// header in it.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PartitionConfig {
    pub base: u32,
    pub capacity: u32,
    pub magic: u32,
}

impl PartitionConfig {
    pub const fn new(base: u32, capacity: u32) -> Self {
        PartitionConfig { base, capacity, magic: BOOT_MAGIC }
    }

    pub const fn with_magic(self, magic: u32) -> Self {
        PartitionConfig { magic, ..self }
    }

    /// The partition as a region.  It must have room for at least the header.
    pub fn region(&self) -> Result<Region> {
        if (self.capacity as usize) < HEADER_SIZE {
            return Err(Error::Layout);
        }
        Region::new(self.base, self.capacity)
    }
}

/// A board's flash map: the bootloader's own code and data, and the
/// application partition.  These must never overlap.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct BoardLayout {
    pub bootloader: Region,
    pub app: PartitionConfig,
}

impl BoardLayout {
    pub const fn new(bootloader: Region, app: PartitionConfig) -> Self {
        BoardLayout { bootloader, app }
    }

    /// Validate the map, returning the application region.
    pub fn check(&self) -> Result<Region> {
        let app = self.app.region()?;
        if self.bootloader.overlaps(&app) {
            return Err(Error::Layout);
        }
        Ok(app)
    }
}

/// QEMU virt: bootloader in the first 64k of flash, application in the
/// following 448k.
pub const QEMU_VIRT: BoardLayout = BoardLayout {
    bootloader: match Region::new(0x8000_0000, 64 * 1024) {
        Ok(region) => region,
        Err(_) => panic!("QEMU bootloader region"),
    },
    app: PartitionConfig::new(0x8001_0000, 448 * 1024),
};
