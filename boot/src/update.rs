//! Update session.
//!
//! An update moves a partition from erased, through a written body, to a
//! committed header.  Each state is its own type, and each step consumes the
//! previous one, so there is no way to write the header first, to skip the
//! erase, or to carry on after a step failed.  A failed step drops the
//! session; the partition is left without a valid header and the next update
//! starts again from `begin_update`.
//!
//! Body bytes are appended in order from just past the header slot.  Callers
//! can hand over chunks of any size; partial write units are held back until
//! they fill, and the last one is padded with erased bytes at commit.

use heapless::Vec;
use log::{debug, info, warn};
use storage::{Flash, ERASED_BYTE};

use crate::{
    crc32::Crc32,
    header::{FirmwareHeader, Rejection, HEADER_SIZE},
    Error, Partition, Result,
};

/// Largest medium write unit a partition supports.  The header must span at
/// least two write units so the magic word can be written last.
pub const MAX_WRITE_SIZE: usize = HEADER_SIZE / 2;

/// Read buffer used when checking the body.
const VERIFY_CHUNK: usize = 128;

impl<F: Flash> Partition<F> {
    /// Start an update by erasing the partition.
    pub fn begin_update(&mut self) -> Result<Erased<'_, F>> {
        self.erase()?;
        Ok(Erased { partition: self })
    }
}

/// The partition has been erased and nothing written yet.
pub struct Erased<'p, F> {
    partition: &'p mut Partition<F>,
}

impl<'p, F: Flash> Erased<'p, F> {
    /// Write the first chunk of the body.  An empty chunk is allowed and
    /// records a zero length body.
    pub fn write_body(self, data: &[u8]) -> Result<BodyWritten<'p, F>> {
        let session = BodyWritten {
            partition: self.partition,
            len: 0,
            flushed: 0,
            crc: Crc32::new(),
            pending: Vec::new(),
        };
        session.write_body(data)
    }
}

/// Body bytes have been written; the header has not.
pub struct BodyWritten<'p, F> {
    partition: &'p mut Partition<F>,
    /// Body bytes accepted so far.
    len: u32,
    /// Bytes sent to the medium, a multiple of the write size.
    flushed: u32,
    crc: Crc32,
    /// Tail that does not yet fill a write unit.
    pending: Vec<u8, MAX_WRITE_SIZE>,
}

impl<'p, F: Flash> BodyWritten<'p, F> {
    /// Append more of the body.
    pub fn write_body(mut self, data: &[u8]) -> Result<Self> {
        let room = self.partition.max_body() - self.len;
        if data.len() > room as usize {
            warn!("body overflow: {} bytes with {} left", data.len(), room);
            return Err(Error::Bounds);
        }
        self.crc.update(data);
        self.len += data.len() as u32;

        let unit = self.partition.write_size();
        let mut data = data;

        if !self.pending.is_empty() {
            let take = (unit - self.pending.len()).min(data.len());
            let (head, rest) = data.split_at(take);
            self.pending
                .extend_from_slice(head)
                .map_err(|_| Error::Layout)?;
            data = rest;
            if self.pending.len() == unit {
                self.flush_pending()?;
            }
        }

        let whole = data.len() - data.len() % unit;
        if whole > 0 {
            let addr = self.cursor();
            self.partition.write(addr, &data[..whole])?;
            self.flushed += whole as u32;
        }

        self.pending
            .extend_from_slice(&data[whole..])
            .map_err(|_| Error::Layout)?;
        Ok(self)
    }

    /// Body bytes written so far.
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Digest of the body written so far.
    pub fn checksum(&self) -> u32 {
        self.crc.finalize()
    }

    /// Publish the body under a header built from what was written.
    pub fn commit(self, version: u32) -> Result<FirmwareHeader> {
        let header = FirmwareHeader {
            magic: self.partition.magic(),
            size: self.len,
            checksum: self.checksum(),
            version,
        };
        self.commit_header(header)
    }

    /// Publish the body under a caller supplied header.  The header must
    /// describe exactly the body that was written; anything else is refused
    /// before the medium is touched.
    pub fn commit_header(mut self, header: FirmwareHeader) -> Result<FirmwareHeader> {
        if header.magic != self.partition.magic() {
            return Err(Rejection::BadMagic(header.magic).into());
        }
        if header.size != self.len {
            return Err(Rejection::BadSize(header.size).into());
        }
        let actual = self.checksum();
        if header.checksum != actual {
            return Err(Rejection::ChecksumMismatch { expected: header.checksum, actual }.into());
        }

        if !self.pending.is_empty() {
            let unit = self.partition.write_size();
            self.pending
                .resize(unit, ERASED_BYTE)
                .map_err(|_| Error::Layout)?;
            self.flush_pending()?;
        }
        self.verify()?;

        self.partition.commit_header(&header)?;
        info!("update committed, {} byte body", header.size);
        Ok(header)
    }

    /// Address the next write unit goes to.
    fn cursor(&self) -> u32 {
        self.partition.body_base() + self.flushed
    }

    fn flush_pending(&mut self) -> Result<()> {
        let addr = self.cursor();
        self.partition.write(addr, &self.pending)?;
        self.flushed += self.pending.len() as u32;
        self.pending.clear();
        Ok(())
    }

    /// Read the body back from the medium and check it against the digest
    /// of what was handed to us.
    fn verify(&mut self) -> Result<()> {
        let mut crc = Crc32::new();
        let mut buffer = [0u8; VERIFY_CHUNK];
        let base = self.partition.body_base();
        let mut pos = 0;
        while pos < self.len {
            let todo = (self.len - pos).min(VERIFY_CHUNK as u32);
            let buf = &mut buffer[..todo as usize];
            self.partition.read(base + pos, buf)?;
            crc.update(buf);
            pos += todo;
        }

        let expected = self.checksum();
        let actual = crc.finalize();
        if actual != expected {
            warn!("body readback 0x{:08x}, wrote 0x{:08x}", actual, expected);
            return Err(Rejection::ChecksumMismatch { expected, actual }.into());
        }
        debug!("body readback ok, {} bytes", self.len);
        Ok(())
    }
}
