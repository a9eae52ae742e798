//! Boot image validation.
//!
//! Before control is handed to the partition, the header is read back and the
//! body digested from flash.  The partition is accepted only if the header
//! carries the sentinel, its size fits the partition, and the body's CRC
//! matches the stored one.

use log::{info, warn};
use storage::ReadFlash;

use crate::{
    crc32::Crc32,
    header::{FirmwareHeader, Rejection},
    Error, Partition, Result,
};

/// Body read buffer.  Sized for the stack of a small bootloader.
const CHUNK: usize = 128;

/// An image is a committed header in a partition.  Holding one does not mean
/// the body is intact; call [`Image::validate`] for that.
pub struct Image<'p, F> {
    partition: &'p mut Partition<F>,
    pub header: FirmwareHeader,
}

impl<'p, F: ReadFlash> Image<'p, F> {
    /// Make an image from the partition, if the header slot holds a header
    /// with the right sentinel and a size that fits.
    pub fn from_partition(partition: &'p mut Partition<F>) -> Result<Image<'p, F>> {
        let header = partition.read_header()?;
        header.check(partition.magic(), partition.region().capacity())?;
        Ok(Image { partition, header })
    }

    /// Check the body against the header's checksum.
    pub fn validate(&mut self) -> Result<()> {
        let actual = self.calculate_crc()?;
        if actual != self.header.checksum {
            return Err(Error::Integrity(Rejection::ChecksumMismatch {
                expected: self.header.checksum,
                actual,
            }));
        }
        Ok(())
    }

    /// Address of the first body byte, where control would be transferred.
    pub fn body_base(&self) -> u32 {
        self.partition.body_base()
    }

    /// Compute the CRC of the body as it sits in flash.
    fn calculate_crc(&mut self) -> Result<u32> {
        let mut crc = Crc32::new();
        let mut buffer = [0u8; CHUNK];
        let base = self.partition.body_base();
        let size = self.header.size;
        let mut pos = 0;
        while pos < size {
            let todo = (size - pos).min(CHUNK as u32);
            let buf = &mut buffer[..todo as usize];
            self.partition.read(base + pos, buf)?;
            crc.update(buf);
            pos += todo;
        }
        Ok(crc.finalize())
    }
}

/// Outcome of checking a partition at boot.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Verdict {
    /// The partition may be booted.
    Accept(FirmwareHeader),
    /// It may not.
    Reject(Rejection),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept(_))
    }
}

/// Apply the validation rule to a partition.  Anything short of a fully
/// verified image, including a medium that cannot be read, is a rejection.
pub fn evaluate<F: ReadFlash>(partition: &mut Partition<F>) -> Verdict {
    let checked = Image::from_partition(partition).and_then(|mut image| {
        image.validate()?;
        Ok(image.header)
    });
    match checked {
        Ok(header) => {
            info!("image ok: {} bytes, version {}", header.size, header.version);
            Verdict::Accept(header)
        }
        Err(e) => {
            let rejection = match e {
                Error::Integrity(r) => r,
                Error::Medium(e) => Rejection::Unreadable(e),
                // The header passed the size check, so every read was in
                // bounds.
                Error::Bounds | Error::Layout => Rejection::Unreadable(storage::Error::OutOfBounds),
            };
            warn!("image rejected: {}", rejection);
            Verdict::Reject(rejection)
        }
    }
}

#[cfg(test)]
mod tests {
    use simflash::{styles, SimFlash};

    use super::*;
    use crate::{digest, BoardLayout, PartitionConfig, HEADER_SIZE, QEMU_VIRT};

    fn qemu() -> (SimFlash, BoardLayout, PartitionConfig) {
        (styles::QEMU_VIRT.build().unwrap(), QEMU_VIRT, QEMU_VIRT.app)
    }

    /// A medium the validator can read but never program.
    struct ReadOnly<'a>(&'a mut SimFlash);

    impl ReadFlash for ReadOnly<'_> {
        fn read_size(&self) -> usize {
            self.0.read_size()
        }

        fn base(&self) -> u32 {
            self.0.base()
        }

        fn capacity(&self) -> usize {
            self.0.capacity()
        }

        fn read(&mut self, addr: u32, buf: &mut [u8]) -> storage::Result<()> {
            self.0.read(addr, buf)
        }
    }

    fn committed(flash: &mut SimFlash, board: &BoardLayout, body: &[u8]) -> FirmwareHeader {
        let mut part = Partition::new(flash, board).unwrap();
        let header = part.begin_update().unwrap().write_body(body).unwrap().commit(3).unwrap();
        header
    }

    #[test]
    fn fresh_partition_rejected() {
        let (mut flash, board, _) = qemu();
        let mut part = Partition::new(&mut flash, &board).unwrap();
        assert_eq!(
            Image::from_partition(&mut part).err(),
            Some(Error::Integrity(Rejection::Erased))
        );
        assert_eq!(evaluate(&mut part), Verdict::Reject(Rejection::Erased));
    }

    #[test]
    fn accept_and_locate() {
        let (mut flash, board, config) = qemu();
        let header = committed(&mut flash, &board, b"123456789");
        assert_eq!(header.checksum, 0xcbf4_3926);

        let mut part = Partition::new(&mut flash, &board).unwrap();
        let mut image = Image::from_partition(&mut part).unwrap();
        assert_eq!(image.header, header);
        assert_eq!(image.body_base(), config.base + HEADER_SIZE as u32);
        image.validate().unwrap();
        assert!(evaluate(&mut part).is_accept());
    }

    #[test]
    fn single_byte_corruption_rejected() {
        let (mut flash, board, config) = qemu();
        let body: Vec<u8> = (0..1000u32).map(|i| (i * 7) as u8).collect();
        let header = committed(&mut flash, &board, &body);

        flash.corrupt(config.base + HEADER_SIZE as u32 + 500, 0x10).unwrap();
        let mut damaged = body.clone();
        damaged[500] ^= 0x10;

        let mut part = Partition::new(&mut flash, &board).unwrap();
        assert_eq!(
            evaluate(&mut part),
            Verdict::Reject(Rejection::ChecksumMismatch {
                expected: header.checksum,
                actual: digest(&damaged),
            })
        );
    }

    #[test]
    fn corrupt_header_rejected() {
        let (mut flash, board, config) = qemu();
        committed(&mut flash, &board, b"abc");
        flash.corrupt(config.base, 0x01).unwrap();
        let mut part = Partition::new(&mut flash, &board).unwrap();
        assert_eq!(
            evaluate(&mut part),
            Verdict::Reject(Rejection::BadMagic(crate::BOOT_MAGIC ^ 0x01))
        );
    }

    #[test]
    fn oversized_header_rejected() {
        let (mut flash, board, config) = qemu();
        let max = config.capacity - HEADER_SIZE as u32;
        let header = FirmwareHeader { magic: crate::BOOT_MAGIC, size: max + 1, checksum: 0, version: 0 };
        flash
            .install(&header.to_bytes(), (config.base - flash.base()) as usize)
            .unwrap();
        let mut part = Partition::new(&mut flash, &board).unwrap();
        assert_eq!(evaluate(&mut part), Verdict::Reject(Rejection::BadSize(max + 1)));
    }

    #[test]
    fn other_magic_is_foreign() {
        let (mut flash, board, config) = qemu();
        committed(&mut flash, &board, b"abc");
        let other = BoardLayout { app: config.with_magic(0x4f54_4845), ..board };
        let mut part = Partition::new(&mut flash, &other).unwrap();
        assert_eq!(
            evaluate(&mut part),
            Verdict::Reject(Rejection::BadMagic(crate::BOOT_MAGIC))
        );
    }

    #[test]
    fn unreadable_medium_rejected() {
        let (mut flash, board, _) = qemu();
        committed(&mut flash, &board, &[0x42; 300]);
        // Header read succeeds, the second body chunk does not.
        flash.fail_after(2);
        let mut part = Partition::new(&mut flash, &board).unwrap();
        assert_eq!(
            evaluate(&mut part),
            Verdict::Reject(Rejection::Unreadable(storage::Error::Failed))
        );
    }

    #[test]
    fn validates_over_read_only_medium() {
        let (mut flash, board, _) = qemu();
        let header = committed(&mut flash, &board, b"read only");
        let mut part = Partition::open(ReadOnly(&mut flash), &board).unwrap();
        assert_eq!(evaluate(&mut part), Verdict::Accept(header));
        assert_eq!(part.max_body(), board.app.capacity - HEADER_SIZE as u32);
    }
}
