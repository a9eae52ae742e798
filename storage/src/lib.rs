//! Platform medium interface.
//!
//! The bootloader core never programs flash itself.  Each target supplies a
//! medium that knows how to read, program and erase its device, and the core
//! layers its partition bounds and update ordering on top.  Addresses handed
//! to a medium are absolute, matching the way the partition layout is
//! described for a board.
//!
//! Every operation blocks until the device has finished, and reports only
//! success or failure.  There is no partial completion visible across this
//! interface.

#![cfg_attr(not(any(feature = "std", test)), no_std)]

#[cfg(feature = "nor-flash")]
mod nor;

#[cfg(feature = "nor-flash")]
pub use nor::NorMedium;

/// Value every byte holds after an erase.
pub const ERASED_BYTE: u8 = 0xff;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Error {
    NotAligned,
    OutOfBounds,
    /// Attempt to program a byte that has not been erased.
    NotErased,
    /// The device reported a failure for an otherwise valid request.
    Failed,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Error::NotAligned => "request not aligned to device granularity",
            Error::OutOfBounds => "request outside device",
            Error::NotErased => "program over non-erased data",
            Error::Failed => "device operation failed",
        };
        f.write_str(msg)
    }
}

pub type Result<T> = core::result::Result<T, Error>;

/// Read only interface into flash.
pub trait ReadFlash {
    /// What is the read size (alignment and size multiple).
    fn read_size(&self) -> usize;
    /// Absolute address of the first byte of the device.
    fn base(&self) -> u32;
    /// Size of the device in bytes.
    fn capacity(&self) -> usize;
    fn read(&mut self, addr: u32, bytes: &mut [u8]) -> Result<()>;
}

/// Flash that can be programmed and erased.
pub trait Flash: ReadFlash {
    /// Write size (alignment and size multiple).
    fn write_size(&self) -> usize;
    /// Erase size (alignment and size multiple).
    fn erase_size(&self) -> usize;

    /// Erase `len` bytes starting at `addr` back to [`ERASED_BYTE`].
    fn erase(&mut self, addr: u32, len: usize) -> Result<()>;
    /// Program `bytes` at `addr`.  Program can only clear bits.
    fn write(&mut self, addr: u32, bytes: &[u8]) -> Result<()>;
}

impl<T: ReadFlash + ?Sized> ReadFlash for &mut T {
    fn read_size(&self) -> usize {
        (**self).read_size()
    }
    fn base(&self) -> u32 {
        (**self).base()
    }
    fn capacity(&self) -> usize {
        (**self).capacity()
    }
    fn read(&mut self, addr: u32, bytes: &mut [u8]) -> Result<()> {
        (**self).read(addr, bytes)
    }
}

impl<T: Flash + ?Sized> Flash for &mut T {
    fn write_size(&self) -> usize {
        (**self).write_size()
    }
    fn erase_size(&self) -> usize {
        (**self).erase_size()
    }
    fn erase(&mut self, addr: u32, len: usize) -> Result<()> {
        (**self).erase(addr, len)
    }
    fn write(&mut self, addr: u32, bytes: &[u8]) -> Result<()> {
        (**self).write(addr, bytes)
    }
}

// Argument validation shared by medium implementations.  Each returns the
// device-relative offset of `addr` on success.
pub fn check_read<T: ReadFlash + ?Sized>(
    flash: &T,
    addr: u32,
    length: usize,
) -> Result<usize> {
    check_slice(flash, flash.read_size(), addr, length)
}

pub fn check_erase<T: Flash + ?Sized>(
    flash: &T,
    addr: u32,
    length: usize,
) -> Result<usize> {
    check_slice(flash, flash.erase_size(), addr, length)
}

pub fn check_write<T: Flash + ?Sized>(
    flash: &T,
    addr: u32,
    length: usize,
) -> Result<usize> {
    check_slice(flash, flash.write_size(), addr, length)
}

pub fn check_slice<T: ReadFlash + ?Sized>(
    flash: &T,
    align: usize,
    addr: u32,
    length: usize,
) -> Result<usize> {
    let offset = addr
        .checked_sub(flash.base())
        .ok_or(Error::OutOfBounds)? as usize;
    if length > flash.capacity() || offset > flash.capacity() - length {
        return Err(Error::OutOfBounds);
    }
    if offset % align != 0 || length % align != 0 {
        return Err(Error::NotAligned);
    }
    Ok(offset)
}
