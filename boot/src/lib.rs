//! Flash update core for a minimal embedded bootloader.
//!
//! An application partition is written in two phases.  The body goes in first,
//! starting just past the header slot.  Only once the whole body is on flash,
//! and reads back correctly, is the 16 byte header written to the front of the
//! partition.  The header is the single thing the boot validator trusts: if
//! power is lost anywhere before it lands, the partition holds no valid header
//! and is refused at the next boot.
//!
//! The sequence is enforced by types.  [`Partition::begin_update`] erases and
//! hands out an [`Erased`] session, which must record a body write to become a
//! [`BodyWritten`] session, which is the only way to reach the header commit.

#![cfg_attr(not(any(feature = "std", test)), no_std)]

mod config;
mod crc32;
mod header;
mod image;
mod partition;
mod region;
mod update;

pub use config::{BoardLayout, PartitionConfig, BOOT_MAGIC, QEMU_VIRT};
pub use crc32::{digest, Crc32};
pub use header::{split_image, FirmwareHeader, Rejection, HEADER_SIZE};
pub use image::{evaluate, Image, Verdict};
pub use partition::Partition;
pub use region::Region;
pub use update::{BodyWritten, Erased, MAX_WRITE_SIZE};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Error {
    /// Request falls outside the partition.  Nothing was sent to the medium.
    Bounds,
    /// The medium failed an in-bounds request.
    Medium(storage::Error),
    /// The partition contents, or a header offered for commit, do not satisfy
    /// the validation rule.
    Integrity(Rejection),
    /// The partition configuration does not fit the medium.
    Layout,
}

/// Convert the medium error into our error type.
impl From<storage::Error> for Error {
    fn from(e: storage::Error) -> Self {
        Error::Medium(e)
    }
}

impl From<Rejection> for Error {
    fn from(r: Rejection) -> Self {
        Error::Integrity(r)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Bounds => f.write_str("access outside partition"),
            Error::Medium(e) => write!(f, "medium failure: {}", e),
            Error::Integrity(r) => write!(f, "integrity failure: {}", r),
            Error::Layout => f.write_str("partition layout does not fit medium"),
        }
    }
}
