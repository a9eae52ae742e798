//! Simulated flash
//!
//! The NOR-type flashes used in microcontrollers differ quite a bit in terms
//! of capabilities provided.  This simulator attempts to capture the parts of
//! that diversity the update core cares about:
//!
//! - Erase works on whole sectors, and leaves every byte at 0xff.
//! - Programming can only happen in units of the write size, and only into
//!   erased space.  Programming over data that has not been erased is
//!   reported as an error rather than silently ANDing the bits together, as
//!   it is always a bug in the caller.
//! - Reads are byte granular.
//!
//! On top of that, the simulator can inject the two failures that matter for
//! a fail-safe update: a device that reports an error, and power being lost
//! part way through programming.  After a power cut every operation fails
//! until [`SimFlash::power_on`] is called, which models the next boot.

use std::{fs, path::Path};

use anyhow::{anyhow, bail, Result};
use storage::{check_erase, check_read, check_write, Error, Flash, ReadFlash, ERASED_BYTE};

pub mod gen;
pub mod styles;

/// An injected fault, armed until it fires.
#[derive(Debug, Clone, Copy)]
enum Fault {
    /// Fail the operation once this many more have succeeded.
    FailOp(usize),
    /// Lose power once this many more bytes have been programmed or erased.
    PowerCut(usize),
}

pub struct SimFlash {
    base: u32,
    read_size: usize,
    write_size: usize,
    erase_size: usize,
    data: Vec<u8>,
    /// Erase count per sector.
    wear: Vec<usize>,
    fault: Option<Fault>,
    powered: bool,
}

impl SimFlash {
    pub fn new(
        base: u32,
        read_size: usize,
        write_size: usize,
        erase_size: usize,
        sectors: usize,
    ) -> Result<SimFlash> {
        for size in [read_size, write_size, erase_size] {
            if !size.is_power_of_two() {
                bail!("Flash granularity {} is not a power of two", size);
            }
        }
        if erase_size % write_size != 0 {
            bail!("Erase size {} not a multiple of write size {}", erase_size, write_size);
        }
        if base as usize % erase_size != 0 {
            bail!("Base 0x{:x} not sector aligned", base);
        }
        let capacity = erase_size
            .checked_mul(sectors)
            .ok_or_else(|| anyhow!("Flash size overflow"))?;
        if base as u64 + capacity as u64 > 1 << 32 {
            bail!("Flash at 0x{:x} does not fit the address space", base);
        }

        Ok(SimFlash {
            base,
            read_size,
            write_size,
            erase_size,
            data: vec![ERASED_BYTE; capacity],
            wear: vec![0; sectors],
            fault: None,
            powered: true,
        })
    }

    /// Make the operation after `ops` further successful ones fail.
    pub fn fail_after(&mut self, ops: usize) {
        self.fault = Some(Fault::FailOp(ops));
    }

    /// Lose power once `bytes` more bytes have been programmed or erased.
    pub fn cut_power_after(&mut self, bytes: usize) {
        self.fault = Some(Fault::PowerCut(bytes));
    }

    /// Restore power and disarm any pending fault.  Contents are retained.
    pub fn power_on(&mut self) {
        self.fault = None;
        self.powered = true;
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Flip the bits in `mask` of the byte at `addr`, bypassing the device
    /// rules.  Models bit rot or a tampered image.
    pub fn corrupt(&mut self, addr: u32, mask: u8) -> Result<()> {
        let offset = check_read(&*self, addr, 1).map_err(|e| anyhow!("corrupt: {}", e))?;
        self.data[offset] ^= mask;
        Ok(())
    }

    /// Place raw bytes at a device relative offset, bypassing the device
    /// rules.
    pub fn install(&mut self, data: &[u8], offset: usize) -> Result<()> {
        let dest = offset
            .checked_add(data.len())
            .and_then(|end| self.data.get_mut(offset..end))
            .ok_or_else(|| anyhow!("Install of {} bytes at 0x{:x} does not fit", data.len(), offset))?;
        dest.copy_from_slice(data);
        Ok(())
    }

    /// The entire contents of the device.
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    /// How many times the sector containing `addr` has been erased.
    pub fn erase_count(&self, addr: u32) -> Option<usize> {
        let offset = addr.checked_sub(self.base)? as usize;
        self.wear.get(offset / self.erase_size).copied()
    }

    /// Worst wear across the device.
    pub fn max_wear(&self) -> usize {
        self.wear.iter().copied().max().unwrap_or(0)
    }

    /// Write a snapshot of the device to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, &self.data)?;
        Ok(())
    }

    /// Build a device from `layout`, restoring contents previously saved with
    /// [`SimFlash::save`].
    pub fn load(layout: &styles::AreaLayout, path: &Path) -> Result<SimFlash> {
        let mut flash = layout.build()?;
        let data = fs::read(path)?;
        if data.len() != flash.data.len() {
            bail!(
                "Snapshot is {} bytes, device is {} bytes",
                data.len(),
                flash.data.len()
            );
        }
        flash.data = data;
        Ok(flash)
    }

    /// Account for an operation against any armed fault.  `bytes` is how much
    /// of the device the operation changes.  Returns how many of those bytes
    /// may be changed before power is lost, or an error if the operation fails
    /// outright.
    fn start_op(&mut self, bytes: usize) -> storage::Result<usize> {
        if !self.powered {
            return Err(Error::Failed);
        }
        match self.fault {
            Some(Fault::FailOp(0)) => {
                self.fault = None;
                Err(Error::Failed)
            }
            Some(Fault::FailOp(n)) => {
                self.fault = Some(Fault::FailOp(n - 1));
                Ok(bytes)
            }
            Some(Fault::PowerCut(left)) if left < bytes || (left == bytes && bytes > 0) => {
                // Power goes during this operation.
                self.fault = None;
                self.powered = false;
                Ok(left)
            }
            Some(Fault::PowerCut(left)) => {
                self.fault = Some(Fault::PowerCut(left - bytes));
                Ok(bytes)
            }
            None => Ok(bytes),
        }
    }
}

impl ReadFlash for SimFlash {
    fn read_size(&self) -> usize {
        self.read_size
    }

    fn base(&self) -> u32 {
        self.base
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn read(&mut self, addr: u32, bytes: &mut [u8]) -> storage::Result<()> {
        let offset = check_read(&*self, addr, bytes.len())?;
        self.start_op(0)?;
        bytes.copy_from_slice(&self.data[offset..offset + bytes.len()]);
        Ok(())
    }
}

impl Flash for SimFlash {
    fn write_size(&self) -> usize {
        self.write_size
    }

    fn erase_size(&self) -> usize {
        self.erase_size
    }

    fn erase(&mut self, addr: u32, len: usize) -> storage::Result<()> {
        let offset = check_erase(&*self, addr, len)?;
        let done = self.start_op(len)?;

        // Sectors are erased in order; an interrupted erase leaves the
        // remainder untouched.
        self.data[offset..offset + done].fill(ERASED_BYTE);
        let first = offset / self.erase_size;
        let last = (offset + done).div_ceil(self.erase_size);
        for count in &mut self.wear[first..last] {
            *count += 1;
        }

        if done < len {
            return Err(Error::Failed);
        }
        Ok(())
    }

    fn write(&mut self, addr: u32, bytes: &[u8]) -> storage::Result<()> {
        let offset = check_write(&*self, addr, bytes.len())?;
        if !self.powered {
            return Err(Error::Failed);
        }
        let dest = &self.data[offset..offset + bytes.len()];
        if dest.iter().any(|&b| b != ERASED_BYTE) {
            return Err(Error::NotErased);
        }
        let done = self.start_op(bytes.len())?;

        self.data[offset..offset + done].copy_from_slice(&bytes[..done]);

        if done < bytes.len() {
            return Err(Error::Failed);
        }
        Ok(())
    }
}
