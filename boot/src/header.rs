//! Firmware header and the rule that decides whether a partition may boot.
//!
//! The header is four little-endian words at the start of the partition:
//!
//! ```text
//! offset 0:  magic      sentinel marking a committed image
//! offset 4:  size       body length in bytes
//! offset 8:  checksum   CRC-32 of body[0..size)
//! offset 12: version    opaque to the core
//! offset 16: body
//! ```

use crate::{crc32::digest, Error, Result};

pub const HEADER_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FirmwareHeader {
    pub magic: u32,
    pub size: u32,
    pub checksum: u32,
    pub version: u32,
}

/// Why a header, or the image behind it, was refused.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Rejection {
    /// The header slot still holds erased flash.  Nothing was ever committed,
    /// or an update was interrupted before its commit.
    Erased,
    BadMagic(u32),
    /// Body length does not fit the partition, or does not match what was
    /// written.
    BadSize(u32),
    ChecksumMismatch { expected: u32, actual: u32 },
    /// An image file ends before its body does.
    Truncated,
    /// The medium failed while the image was being read.
    Unreadable(storage::Error),
}

impl core::fmt::Display for Rejection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Rejection::Erased => f.write_str("header erased"),
            Rejection::BadMagic(m) => write!(f, "bad magic 0x{:08x}", m),
            Rejection::BadSize(s) => write!(f, "bad size {}", s),
            Rejection::ChecksumMismatch { expected, actual } => write!(
                f,
                "checksum mismatch, header 0x{:08x} body 0x{:08x}",
                expected, actual
            ),
            Rejection::Truncated => f.write_str("image truncated"),
            Rejection::Unreadable(e) => write!(f, "unreadable: {}", e),
        }
    }
}

impl FirmwareHeader {
    /// Header describing `body`.
    pub fn for_body(magic: u32, body: &[u8], version: u32) -> Result<FirmwareHeader> {
        let size = u32::try_from(body.len()).map_err(|_| Error::Bounds)?;
        Ok(FirmwareHeader { magic, size, checksum: digest(body), version })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        raw[0..4].copy_from_slice(&self.magic.to_le_bytes());
        raw[4..8].copy_from_slice(&self.size.to_le_bytes());
        raw[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        raw[12..16].copy_from_slice(&self.version.to_le_bytes());
        raw
    }

    pub fn from_bytes(raw: &[u8; HEADER_SIZE]) -> FirmwareHeader {
        let word = |at: usize| u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);
        FirmwareHeader {
            magic: word(0),
            size: word(4),
            checksum: word(8),
            version: word(12),
        }
    }

    /// Every field reads as erased flash.
    pub fn is_erased(&self) -> bool {
        self.to_bytes().iter().all(|&b| b == storage::ERASED_BYTE)
    }

    /// The parts of the rule that need only the header: sentinel, and a body
    /// that fits in a partition of `capacity` bytes.
    pub fn check(&self, magic: u32, capacity: u32) -> core::result::Result<(), Rejection> {
        if self.is_erased() {
            return Err(Rejection::Erased);
        }
        if self.magic != magic {
            return Err(Rejection::BadMagic(self.magic));
        }
        if capacity < HEADER_SIZE as u32 || self.size > capacity - HEADER_SIZE as u32 {
            return Err(Rejection::BadSize(self.size));
        }
        Ok(())
    }

    /// The whole rule, against a body held in memory.
    pub fn check_body(
        &self,
        magic: u32,
        capacity: u32,
        body: &[u8],
    ) -> core::result::Result<(), Rejection> {
        self.check(magic, capacity)?;
        let body = body.get(..self.size as usize).ok_or(Rejection::Truncated)?;
        let actual = digest(body);
        if actual != self.checksum {
            return Err(Rejection::ChecksumMismatch { expected: self.checksum, actual });
        }
        Ok(())
    }
}

/// Split an image file into its header and body, applying the validation
/// rule for a partition of `capacity` bytes.  Bytes past the body are padding
/// and are ignored.
pub fn split_image(image: &[u8], magic: u32, capacity: u32) -> Result<(FirmwareHeader, &[u8])> {
    let raw: &[u8; HEADER_SIZE] = image
        .get(..HEADER_SIZE)
        .and_then(|h| h.try_into().ok())
        .ok_or(Rejection::Truncated)?;
    let header = FirmwareHeader::from_bytes(raw);
    let body = &image[HEADER_SIZE..];
    header.check_body(magic, capacity, body)?;
    Ok((header, &body[..header.size as usize]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BOOT_MAGIC;

    const CAPACITY: u32 = 0x1000;

    #[test]
    fn wire_layout() {
        let header = FirmwareHeader {
            magic: BOOT_MAGIC,
            size: 0x0000_0200,
            checksum: 0xcbf4_3926,
            version: 7,
        };
        let raw = header.to_bytes();
        assert_eq!(&raw[0..4], b"LBVR");
        assert_eq!(&raw[4..8], &[0x00, 0x02, 0x00, 0x00]);
        assert_eq!(&raw[8..12], &[0x26, 0x39, 0xf4, 0xcb]);
        assert_eq!(&raw[12..16], &[7, 0, 0, 0]);
        assert_eq!(FirmwareHeader::from_bytes(&raw), header);
    }

    #[test]
    fn erased_header_rejected() {
        let header = FirmwareHeader::from_bytes(&[0xff; HEADER_SIZE]);
        assert!(header.is_erased());
        assert_eq!(header.check(BOOT_MAGIC, CAPACITY), Err(Rejection::Erased));
    }

    #[test]
    fn size_limits() {
        let body = [0u8; 0];
        let mut header = FirmwareHeader::for_body(BOOT_MAGIC, &body, 1).unwrap();
        assert_eq!(header.check(BOOT_MAGIC, CAPACITY), Ok(()));

        header.size = CAPACITY - HEADER_SIZE as u32;
        assert_eq!(header.check(BOOT_MAGIC, CAPACITY), Ok(()));
        header.size += 1;
        assert_eq!(
            header.check(BOOT_MAGIC, CAPACITY),
            Err(Rejection::BadSize(CAPACITY - HEADER_SIZE as u32 + 1))
        );
    }

    #[test]
    fn body_rule() {
        let body = b"123456789";
        let header = FirmwareHeader::for_body(BOOT_MAGIC, body, 3).unwrap();
        assert_eq!(header.size, 9);
        assert_eq!(header.checksum, 0xcbf4_3926);
        assert_eq!(header.check_body(BOOT_MAGIC, CAPACITY, body), Ok(()));
        assert_eq!(
            header.check_body(0x1234_5678, CAPACITY, body),
            Err(Rejection::BadMagic(BOOT_MAGIC))
        );
        assert_eq!(
            header.check_body(BOOT_MAGIC, CAPACITY, b"123456780"),
            Err(Rejection::ChecksumMismatch {
                expected: 0xcbf4_3926,
                actual: digest(b"123456780")
            })
        );
        assert_eq!(
            header.check_body(BOOT_MAGIC, CAPACITY, b"1234"),
            Err(Rejection::Truncated)
        );
    }

    #[test]
    fn image_file() {
        let body = b"hello, partition";
        let header = FirmwareHeader::for_body(BOOT_MAGIC, body, 9).unwrap();
        let mut file = header.to_bytes().to_vec();
        file.extend_from_slice(body);
        file.extend_from_slice(&[0xff; 7]);

        let (parsed, parsed_body) = split_image(&file, BOOT_MAGIC, CAPACITY).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed_body, body);

        assert_eq!(
            split_image(&file[..10], BOOT_MAGIC, CAPACITY),
            Err(Error::Integrity(Rejection::Truncated))
        );
        assert_eq!(
            split_image(&file[..20], BOOT_MAGIC, CAPACITY),
            Err(Error::Integrity(Rejection::Truncated))
        );
    }
}
