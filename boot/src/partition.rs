//! Flash abstraction layer.
//!
//! A `Partition` owns a medium and the one region of it the updater may
//! touch.  Every write and read is checked against that region before the
//! medium sees it, which is what keeps an update from overwriting the
//! bootloader or running off the end of the partition.

use log::{debug, info, warn};
use storage::{Flash, ReadFlash};

use crate::{
    header::{FirmwareHeader, HEADER_SIZE},
    update::MAX_WRITE_SIZE,
    BoardLayout, Error, Region, Result,
};

pub struct Partition<F> {
    flash: F,
    region: Region,
    magic: u32,
}

impl<F: Flash> Partition<F> {
    /// Bind `flash` to the application partition of `board` for updating.
    /// Besides the checks of [`Partition::open`], the partition must start
    /// and end on erase boundaries, and the header must span more than one
    /// write unit so the magic word can be programmed last.
    pub fn new(flash: F, board: &BoardLayout) -> Result<Self> {
        let part = Partition::open(flash, board)?;

        let erase_size = part.flash.erase_size();
        let write_size = part.flash.write_size();
        let offset = (part.region.base() - part.flash.base()) as usize;
        if erase_size == 0
            || offset % erase_size != 0
            || part.region.capacity() as usize % erase_size != 0
        {
            return Err(Error::Layout);
        }
        if write_size == 0 || write_size > MAX_WRITE_SIZE || HEADER_SIZE % write_size != 0 {
            warn!("write size {} cannot commit the magic word last", write_size);
            return Err(Error::Layout);
        }

        debug!("partition writable, write {} erase {}", write_size, erase_size);
        Ok(part)
    }

    /// Program `data` at `addr`, which must lie wholly inside the partition.
    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        if !self.region.contains(addr, data.len()) {
            warn!("write 0x{:08x} len {} outside partition", addr, data.len());
            return Err(Error::Bounds);
        }
        debug!("write 0x{:08x} len {}", addr, data.len());
        self.flash.write(addr, data)?;
        Ok(())
    }

    /// Return the whole partition to the erased state.
    pub fn erase(&mut self) -> Result<()> {
        info!(
            "erase 0x{:08x} len {}",
            self.region.base(),
            self.region.capacity()
        );
        self.flash
            .erase(self.region.base(), self.region.capacity() as usize)?;
        Ok(())
    }

    /// Write `header` to the front of the partition.  This publishes the
    /// image, so it is only reachable through a session that has written the
    /// body.  The magic word goes last, so a torn header write does not leave
    /// a valid sentinel behind.
    pub(crate) fn commit_header(&mut self, header: &FirmwareHeader) -> Result<()> {
        let raw = header.to_bytes();
        let split = self.flash.write_size().max(4);
        let base = self.region.base();

        info!(
            "commit header size {} crc 0x{:08x} version {}",
            header.size, header.checksum, header.version
        );
        self.write(base + split as u32, &raw[split..])?;
        self.write(base, &raw[..split])
    }

    /// Medium write unit.
    pub(crate) fn write_size(&self) -> usize {
        self.flash.write_size()
    }

    /// Give up the partition, returning the medium.
    pub fn into_inner(self) -> F {
        self.flash
    }
}

impl<F: ReadFlash> Partition<F> {
    /// Bind `flash` to the application partition of `board` for reading.
    /// The board map must keep the partition clear of the bootloader, and
    /// the partition must lie within the medium.
    pub fn open(flash: F, board: &BoardLayout) -> Result<Self> {
        let region = board.check()?;
        let capacity = u32::try_from(flash.capacity()).map_err(|_| Error::Layout)?;
        let device = Region::new(flash.base(), capacity)?;
        if !device.contains_region(&region) {
            return Err(Error::Layout);
        }

        debug!("partition 0x{:08x}..0x{:08x}", region.base(), region.end());
        Ok(Partition { flash, region, magic: board.app.magic })
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Sentinel expected in a committed header.
    pub fn magic(&self) -> u32 {
        self.magic
    }

    /// Address of the first body byte.
    pub fn body_base(&self) -> u32 {
        self.region.base() + HEADER_SIZE as u32
    }

    /// Largest body the partition can hold.
    pub fn max_body(&self) -> u32 {
        self.region.capacity() - HEADER_SIZE as u32
    }

    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        if !self.region.contains(addr, buf.len()) {
            return Err(Error::Bounds);
        }
        self.flash.read(addr, buf)?;
        Ok(())
    }

    /// Read whatever is in the header slot, committed or not.
    pub fn read_header(&mut self) -> Result<FirmwareHeader> {
        let mut raw = [0u8; HEADER_SIZE];
        self.read(self.region.base(), &mut raw)?;
        Ok(FirmwareHeader::from_bytes(&raw))
    }
}
