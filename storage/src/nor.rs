//! Bridge from `embedded-storage` NOR drivers.
//!
//! HAL flash drivers implement `NorFlash` with offsets relative to their own
//! start.  `NorMedium` places such a driver at an absolute address so it can
//! back a partition.

use embedded_storage::nor_flash::{
    NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

use crate::{Error, Flash, ReadFlash, Result};

pub struct NorMedium<T> {
    inner: T,
    base: u32,
}

impl<T> NorMedium<T> {
    /// Wrap `inner`, whose offset zero is mapped at `base`.
    pub fn new(inner: T, base: u32) -> Self {
        NorMedium { inner, base }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn offset(&self, addr: u32) -> Result<u32> {
        addr.checked_sub(self.base).ok_or(Error::OutOfBounds)
    }
}

fn convert<E: NorFlashError>(e: E) -> Error {
    match e.kind() {
        NorFlashErrorKind::NotAligned => Error::NotAligned,
        NorFlashErrorKind::OutOfBounds => Error::OutOfBounds,
        _ => Error::Failed,
    }
}

impl<T: NorFlash> ReadFlash for NorMedium<T> {
    fn read_size(&self) -> usize {
        T::READ_SIZE
    }

    fn base(&self) -> u32 {
        self.base
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    fn read(&mut self, addr: u32, bytes: &mut [u8]) -> Result<()> {
        let offset = self.offset(addr)?;
        self.inner.read(offset, bytes).map_err(convert)
    }
}

impl<T: NorFlash> Flash for NorMedium<T> {
    fn write_size(&self) -> usize {
        T::WRITE_SIZE
    }

    fn erase_size(&self) -> usize {
        T::ERASE_SIZE
    }

    fn erase(&mut self, addr: u32, len: usize) -> Result<()> {
        let from = self.offset(addr)?;
        let to = u32::try_from(len)
            .ok()
            .and_then(|len| from.checked_add(len))
            .ok_or(Error::OutOfBounds)?;
        self.inner.erase(from, to).map_err(convert)
    }

    fn write(&mut self, addr: u32, bytes: &[u8]) -> Result<()> {
        let offset = self.offset(addr)?;
        self.inner.write(offset, bytes).map_err(convert)
    }
}
