//! CRC-32 (reflected IEEE 802.3, polynomial `0xEDB88320`) over a byte
//! prefix. Used to guard [`crate::record::BootRecord`] integrity.
//!
//! Reuses the `crc` crate's `crc32::checksum_ieee`, its IEEE table
//! rather than the Castagnoli one the filesystem checksum path reaches
//! for elsewhere in this dependency.

use crc::crc32;

/// Computes the CRC-32 of `data` against the crate's precomputed IEEE
/// lookup table.
pub fn checksum(data: &[u8]) -> u32
{
    crc32::checksum_ieee(data)
}
