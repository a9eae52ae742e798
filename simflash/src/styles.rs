//! Flash styles
//!
//! Various microcontrollers have various types of flash memories available to
//! them.  Each style describes a whole device, and how much of the front of it
//! is held by the bootloader.  The rest is the application partition.

use crate::Result;
use crate::SimFlash;

/// The configuration of a single flash device.
#[derive(Debug)]
pub struct AreaLayout {
    pub name: &'static str,
    /// Address the device is mapped at.
    pub base: u32,
    pub read_size: usize,
    pub write_size: usize,
    pub erase_size: usize,
    pub sectors: usize,
    /// Leading sectors reserved for the bootloader.
    pub boot_sectors: usize,
    /// Base and size of the bootloader when it runs from another device.
    pub external_boot: Option<(u32, u32)>,
}

impl AreaLayout {
    pub fn build(&self) -> Result<SimFlash> {
        SimFlash::new(
            self.base,
            self.read_size,
            self.write_size,
            self.erase_size,
            self.sectors,
        )
    }

    /// Base address and capacity of the bootloader's own region.
    pub fn boot_region(&self) -> (u32, u32) {
        match self.external_boot {
            Some(region) => region,
            None => (self.base, (self.boot_sectors * self.erase_size) as u32),
        }
    }

    /// Base address and capacity of the application partition.
    pub fn app_region(&self) -> (u32, u32) {
        let boot = (self.boot_sectors * self.erase_size) as u32;
        let total = (self.sectors * self.erase_size) as u32;
        (self.base + boot, total - boot)
    }
}

/// QEMU virt machine.  Flash is plain memory, so it is byte writable.  The
/// bootloader takes the first 64k, the application the remaining 448k.
pub static QEMU_VIRT: AreaLayout = AreaLayout {
    name: "qemu-virt",
    base: 0x8000_0000,
    read_size: 1,
    write_size: 1,
    erase_size: 4 * 1024,
    sectors: 128,
    boot_sectors: 16,
    external_boot: None,
};

/// K64-style.
/// These devices have small uniform sectors.
pub static K64: AreaLayout = AreaLayout {
    name: "k64",
    base: 0x0000_0000,
    read_size: 1,
    write_size: 8,
    erase_size: 4 * 1024,
    sectors: 48,
    boot_sectors: 8,
    external_boot: None,
};

/// STM32F4-style.
/// These devices have a fairly small number of relatively large sectors, so a
/// whole sector goes to the bootloader.
pub static STM32F: AreaLayout = AreaLayout {
    name: "stm32f",
    base: 0x0800_0000,
    read_size: 1,
    write_size: 8,
    erase_size: 128 * 1024,
    sectors: 4,
    boot_sectors: 1,
    external_boot: None,
};

/// External flash.  The bootloader runs from the internal flash of the MCU,
/// so the whole device is the partition.  Programmed a word at a time.
pub static EXT: AreaLayout = AreaLayout {
    name: "ext",
    base: 0x9000_0000,
    read_size: 1,
    write_size: 4,
    erase_size: 4 * 1024,
    sectors: 64,
    boot_sectors: 0,
    external_boot: Some((0x0000_0000, 32 * 1024)),
};

/// All of the flash devices.
pub static ALL_FLASHES: [&AreaLayout; 4] = [&QEMU_VIRT, &K64, &STM32F, &EXT];

/// An iterator that returns each device, freshly erased, with its layout.
pub fn all_flashes() -> impl Iterator<Item = (&'static AreaLayout, Result<SimFlash>)> {
    ALL_FLASHES.iter().map(|layout| (*layout, layout.build()))
}
