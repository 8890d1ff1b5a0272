//! Boot record layout, codec, and in-memory mutators.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::crc;
use crate::error::InvalidTierError;

/// Current on-disk format version. `BootRecord::validate` rejects
/// anything else.
pub const VERSION: u32 = 1;

/// Trailer magic, also doubling as the overall journal "signature".
pub const TRAILER_MAGIC: u32 = 0xA771A771;

pub const TIER_1: u8 = 1;
pub const TIER_2: u8 = 2;
pub const TIER_3: u8 = 3;

pub const DEFAULT_TRIES_T2: u8 = 3;
pub const DEFAULT_TRIES_T3: u8 = 3;

/// Latched anomaly flags carried in [`BootRecord::flags`].
pub mod flags
{
    pub const EMERGENCY: u32 = 0x01;
    pub const QUARANTINE: u32 = 0x02;
    pub const BROWNOUT: u32 = 0x04;
    pub const DIRTY: u32 = 0x08;
    pub const NETWORK_GATED: u32 = 0x10;
}

/// The fixed-layout, densely packed boot record.
///
/// Serialized via `bincode` with fixed-width integer encoding, which
/// produces the exact little-endian, no-padding byte layout the wire
/// format requires without relying on any language's native struct
/// layout.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BootRecord
{
    pub version: u32,
    pub tier: u8,
    pub tries_t2: u8,
    pub tries_t3: u8,
    pub rollback_idx: u8,
    pub flags: u32,
    pub boot_count: u64,
    pub timestamp: u64,
    pub crc32: u32,
    pub trailer: u32,
}

fn bincode_options() -> impl bincode::Options
{
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

/// Encoded size of a single page. All fields are fixed-width integers,
/// so this is constant regardless of content.
pub const PAGE_SIZE: usize = 36;

impl BootRecord
{
    /// Creates a fresh record: tier 1, full try counters, zeroed flags
    /// and rollback index, `boot_count = 0`, `timestamp = now`, and a
    /// freshly computed CRC and trailer.
    pub fn create_default() -> Self
    {
        let mut rec = BootRecord {
            version: VERSION,
            tier: TIER_1,
            tries_t2: DEFAULT_TRIES_T2,
            tries_t3: DEFAULT_TRIES_T3,
            rollback_idx: 0,
            flags: 0,
            boot_count: 0,
            timestamp: now(),
            crc32: 0,
            trailer: TRAILER_MAGIC,
        };
        rec.crc32 = rec.calculate_crc();
        rec
    }

    /// Recomputes the CRC over the byte prefix preceding `crc32`
    /// (i.e. excluding both `crc32` and `trailer`).
    pub fn calculate_crc(&self) -> u32
    {
        crc::checksum(&self.prefix_bytes())
    }

    fn prefix_bytes(&self) -> Vec<u8>
    {
        #[derive(Serialize)]
        struct Prefix
        {
            version: u32,
            tier: u8,
            tries_t2: u8,
            tries_t3: u8,
            rollback_idx: u8,
            flags: u32,
            boot_count: u64,
            timestamp: u64,
        }

        let prefix = Prefix {
            version: self.version,
            tier: self.tier,
            tries_t2: self.tries_t2,
            tries_t3: self.tries_t3,
            rollback_idx: self.rollback_idx,
            flags: self.flags,
            boot_count: self.boot_count,
            timestamp: self.timestamp,
        };

        bincode_options()
            .serialize(&prefix)
            .expect("fixed-width record prefix always serializes")
    }

    /// `true` iff the trailer magic matches, the CRC matches the
    /// recomputed prefix checksum, the version is current, and the
    /// tier is in range. Checked cheapest-first.
    pub fn validate(&self) -> bool
    {
        self.trailer == TRAILER_MAGIC
            && self.crc32 == self.calculate_crc()
            && self.version == VERSION
            && matches!(self.tier, TIER_1 | TIER_2 | TIER_3)
    }

    /// Serializes this record to exactly [`PAGE_SIZE`] bytes.
    pub fn to_bytes(&self) -> Vec<u8>
    {
        let bytes = bincode_options()
            .serialize(self)
            .expect("fixed-width BootRecord always serializes");
        debug_assert_eq!(bytes.len(), PAGE_SIZE);
        bytes
    }

    /// Deserializes a record from a page-sized byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error>
    {
        bincode_options().deserialize(bytes)
    }

    /// Decrements the remaining tries at `tier` (2 or 3), saturating at
    /// zero, and returns the new remaining count. Any other tier value
    /// is rejected without mutating the record.
    pub fn decrement_tries(&mut self, tier: u8) -> Result<u8, InvalidTierError>
    {
        match tier {
            TIER_2 => {
                self.tries_t2 = self.tries_t2.saturating_sub(1);
                Ok(self.tries_t2)
            }
            TIER_3 => {
                self.tries_t3 = self.tries_t3.saturating_sub(1);
                Ok(self.tries_t3)
            }
            other => Err(InvalidTierError(other)),
        }
    }

    /// Restores both try counters to their initial values.
    pub fn reset_tries(&mut self)
    {
        self.tries_t2 = DEFAULT_TRIES_T2;
        self.tries_t3 = DEFAULT_TRIES_T3;
    }

    pub fn set_flag(&mut self, mask: u32)
    {
        self.flags |= mask;
    }

    pub fn clear_flag(&mut self, mask: u32)
    {
        self.flags &= !mask;
    }

    pub fn has_flag(&self, mask: u32) -> bool
    {
        self.flags & mask != 0
    }
}

pub(crate) fn now() -> u64
{
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl fmt::Display for BootRecord
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        writeln!(f, "=== Boot Record ===")?;
        writeln!(f, "  Version:       {}", self.version)?;
        writeln!(f, "  Tier:          {}", self.tier)?;
        writeln!(f, "  Tries T2:      {}", self.tries_t2)?;
        writeln!(f, "  Tries T3:      {}", self.tries_t3)?;
        writeln!(f, "  Rollback IDX:  {}", self.rollback_idx)?;
        write!(f, "  Flags:         0x{:08X}", self.flags)?;
        if self.flags != 0 {
            write!(f, " (")?;
            let mut first = true;
            for (mask, name) in [
                (flags::EMERGENCY, "EMERGENCY"),
                (flags::QUARANTINE, "QUARANTINE"),
                (flags::BROWNOUT, "BROWNOUT"),
                (flags::DIRTY, "DIRTY"),
                (flags::NETWORK_GATED, "NETWORK_GATED"),
            ] {
                if self.has_flag(mask) {
                    if !first {
                        write!(f, " ")?;
                    }
                    write!(f, "{name}")?;
                    first = false;
                }
            }
            write!(f, ")")?;
        }
        writeln!(f)?;
        writeln!(f, "  Boot Count:    {}", self.boot_count)?;
        writeln!(f, "  Timestamp:     {}", self.timestamp)?;
        writeln!(f, "  CRC32:         0x{:08X}", self.crc32)?;
        writeln!(
            f,
            "  Trailer:       0x{:08X} {}",
            self.trailer,
            if self.trailer == TRAILER_MAGIC { "(OK)" } else { "(INVALID)" }
        )?;
        writeln!(f, "  Valid:         {}", if self.validate() { "YES" } else { "NO" })?;
        write!(f, "===================")
    }
}
