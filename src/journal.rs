//! Dual-page atomic journal store.
//!
//! Two identical [`record::PAGE_SIZE`]-byte pages are kept at offsets
//! `0` (Page A) and `PAGE_SIZE` (Page B). `write` commits A then B,
//! fsyncing each; `read`/`recover` always re-validates both pages
//! before trusting either, so a reader never observes a torn record.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use crate::error::JournalError;
use crate::logger::Logger;
use crate::record::{BootRecord, PAGE_SIZE};

const PAGE_A_OFFSET: u64 = 0;
const PAGE_B_OFFSET: u64 = PAGE_SIZE as u64;
const JOURNAL_FILE_SIZE: u64 = (PAGE_SIZE * 2) as u64;

/// An open, single-writer handle onto a two-page journal file.
///
/// Holds an explicit value rather than relying on process-wide mutable
/// state: callers obtain one from [`JournalStore::init`] and thread it
/// through `read`/`write`/`close` themselves, which makes the
/// single-writer contract a matter of ordinary ownership rather than an
/// undocumented global invariant.
#[derive(Debug)]
pub struct JournalStore
{
    path: PathBuf,
    file: File,
}

impl JournalStore
{
    /// Opens (creating if missing) the journal at `path`. Fresh or
    /// short files are bootstrapped to the two-page invariant with a
    /// synthesized default record, written and fsynced to both pages.
    pub fn init(path: impl AsRef<Path>) -> Result<Self, JournalError>
    {
        let path = path.as_ref().to_path_buf();
        let existed = path.exists();
        let existing_len = if existed { std::fs::metadata(&path)?.len() } else { 0 };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .mode(0o600)
            .open(&path)?;

        if !existed || existing_len < JOURNAL_FILE_SIZE {
            let rec = BootRecord::create_default();
            write_page(&mut file, PAGE_A_OFFSET, &rec)?;
            write_page(&mut file, PAGE_B_OFFSET, &rec)?;
        }

        Ok(JournalStore { path, file })
    }

    /// The path this store was opened against.
    pub fn path(&self) -> &Path
    {
        &self.path
    }

    /// Reads the current record. Always performs full recovery: see
    /// [`JournalStore::recover`].
    pub fn read(&mut self) -> Result<BootRecord, JournalError>
    {
        self.recover(None)
    }

    /// Recovers the current record from the two pages, repairing
    /// whichever page disagrees:
    ///
    /// - both valid: return the page with the larger `boot_count`
    ///   (Page A wins ties); no repair write.
    /// - only one valid: copy it onto the other page, return it.
    /// - neither valid: synthesize a default record, write it to both
    ///   pages, return it.
    pub fn recover(&mut self, logger: Option<&mut Logger>) -> Result<BootRecord, JournalError>
    {
        let page_a = read_page(&mut self.file, PAGE_A_OFFSET).ok();
        let page_b = read_page(&mut self.file, PAGE_B_OFFSET).ok();

        let a_valid = page_a.map(|r| r.validate()).unwrap_or(false);
        let b_valid = page_b.map(|r| r.validate()).unwrap_or(false);

        match (a_valid, b_valid) {
            (true, true) => {
                let a = page_a.unwrap();
                let b = page_b.unwrap();
                let winner = if a.boot_count >= b.boot_count { a } else { b };
                log(logger, &format!(
                    "journal: recovered from page {} (boot_count={})",
                    if a.boot_count >= b.boot_count { "A" } else { "B" },
                    winner.boot_count
                ));
                Ok(winner)
            }
            (true, false) => {
                let a = page_a.unwrap();
                write_page(&mut self.file, PAGE_B_OFFSET, &a)?;
                log(logger, "journal: recovered from page A only, repaired page B");
                Ok(a)
            }
            (false, true) => {
                let b = page_b.unwrap();
                write_page(&mut self.file, PAGE_A_OFFSET, &b)?;
                log(logger, "journal: recovered from page B only, repaired page A");
                Ok(b)
            }
            (false, false) => {
                let rec = BootRecord::create_default();
                write_page(&mut self.file, PAGE_A_OFFSET, &rec)?;
                write_page(&mut self.file, PAGE_B_OFFSET, &rec)?;
                log(logger, "journal: both pages corrupt, synthesized default record");
                Ok(rec)
            }
        }
    }

    /// Commits `rec`: stamps `timestamp` and `trailer`, recomputes
    /// `crc32`, then writes Page A (fsync) strictly before Page B
    /// (fsync). A failure after Page A succeeds leaves Page A ahead of
    /// Page B; the next `recover` picks Page A by `boot_count` and
    /// re-mirrors it.
    pub fn write(&mut self, rec: &BootRecord) -> Result<(), JournalError>
    {
        let mut updated = *rec;
        updated.timestamp = crate::record::now();
        updated.trailer = crate::record::TRAILER_MAGIC;
        updated.crc32 = updated.calculate_crc();

        if !updated.validate() {
            return Err(JournalError::Invalid(
                "record failed self-validation immediately after being stamped".into(),
            ));
        }

        write_page(&mut self.file, PAGE_A_OFFSET, &updated)?;
        write_page(&mut self.file, PAGE_B_OFFSET, &updated)?;
        Ok(())
    }

    /// Releases the underlying descriptor. Safe to call more than
    /// once; subsequent calls are no-ops because `close` is only ever
    /// reachable while the store is alive (dropping does the rest).
    pub fn close(self)
    {
        drop(self);
    }
}

fn log(logger: Option<&mut Logger>, msg: &str)
{
    if let Some(logger) = logger {
        logger.log(1, msg);
    }
}

fn read_page(file: &mut File, offset: u64) -> std::io::Result<BootRecord>
{
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = [0u8; PAGE_SIZE];
    file.read_exact(&mut buf)?;
    BootRecord::from_bytes(&buf)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

fn write_page(file: &mut File, offset: u64, rec: &BootRecord) -> std::io::Result<()>
{
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(&rec.to_bytes())?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::record::{flags, TIER_2, TIER_3};
    use tempfile::tempdir;

    fn corrupt_page(path: &Path, offset: u64, byte_idx: u64, value: u8)
    {
        let mut f = OpenOptions::new().write(true).open(path).unwrap();
        f.seek(SeekFrom::Start(offset + byte_idx)).unwrap();
        f.write_all(&[value]).unwrap();
        f.sync_all().unwrap();
    }

    #[test]
    fn fresh_journal_has_default_record()
    {
        let dir = tempdir().unwrap();
        let path = dir.path().join("j1");
        let mut store = JournalStore::init(&path).unwrap();
        let rec = store.read().unwrap();

        assert_eq!(rec.tier, 1);
        assert_eq!(rec.tries_t2, 3);
        assert_eq!(rec.tries_t3, 3);
        assert_eq!(rec.flags, 0);
        assert_eq!(rec.boot_count, 0);
        assert_eq!(rec.trailer, crate::record::TRAILER_MAGIC);
        assert!(rec.validate());
    }

    #[test]
    fn brownout_latches_across_reopen()
    {
        let dir = tempdir().unwrap();
        let path = dir.path().join("j2");

        let mut store = JournalStore::init(&path).unwrap();
        let mut rec = store.read().unwrap();
        rec.set_flag(flags::BROWNOUT);
        rec.tier = 1;
        rec.boot_count = 1;
        store.write(&rec).unwrap();
        store.close();

        let mut store = JournalStore::init(&path).unwrap();
        let rec = store.read().unwrap();
        assert!(rec.has_flag(flags::BROWNOUT));
        assert_eq!(rec.boot_count, 1);
    }

    #[test]
    fn tier2_exhaustion_across_cycles()
    {
        let dir = tempdir().unwrap();
        let path = dir.path().join("j3");

        for _ in 0..3 {
            let mut store = JournalStore::init(&path).unwrap();
            let mut rec = store.read().unwrap();
            rec.decrement_tries(TIER_2).unwrap();
            store.write(&rec).unwrap();
            store.close();
        }

        let mut store = JournalStore::init(&path).unwrap();
        let mut rec = store.read().unwrap();
        assert_eq!(rec.tries_t2, 0);
        assert_eq!(rec.decrement_tries(TIER_2).unwrap(), 0);
    }

    #[test]
    fn page_a_corruption_is_repaired_from_page_b()
    {
        let dir = tempdir().unwrap();
        let path = dir.path().join("j4");

        let mut store = JournalStore::init(&path).unwrap();
        let mut rec = store.read().unwrap();
        rec.boot_count = 100;
        rec.tier = TIER_3;
        store.write(&rec).unwrap();
        drop(store);

        // crc32 sits right before the trailer at the tail of the page.
        let crc_offset = (PAGE_SIZE - 8) as u64;
        corrupt_page(&path, PAGE_A_OFFSET, crc_offset, 0xEF);

        let mut store = JournalStore::init(&path).unwrap();
        let recovered = store.read().unwrap();
        assert_eq!(recovered.boot_count, 100);
        assert_eq!(recovered.tier, TIER_3);

        let mut file = OpenOptions::new().read(true).open(&path).unwrap();
        let a = read_page(&mut file, PAGE_A_OFFSET).unwrap();
        let b = read_page(&mut file, PAGE_B_OFFSET).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn both_pages_corrupt_falls_back_to_default()
    {
        let dir = tempdir().unwrap();
        let path = dir.path().join("j5");

        {
            let _store = JournalStore::init(&path).unwrap();
        }
        corrupt_page(&path, PAGE_A_OFFSET, 0, 0xFF);
        corrupt_page(&path, PAGE_B_OFFSET, 0, 0xFF);

        let mut store = JournalStore::init(&path).unwrap();
        let rec = store.read().unwrap();
        assert!(rec.validate());
        assert_eq!(rec.boot_count, 0);

        let mut file = OpenOptions::new().read(true).open(&path).unwrap();
        let a = read_page(&mut file, PAGE_A_OFFSET).unwrap();
        let b = read_page(&mut file, PAGE_B_OFFSET).unwrap();
        assert!(a.validate());
        assert!(b.validate());
    }

    #[test]
    fn torn_write_crash_recovers_latest_by_boot_count()
    {
        let dir = tempdir().unwrap();
        let path = dir.path().join("j6");

        let mut store = JournalStore::init(&path).unwrap();
        let mut rec = store.read().unwrap();
        rec.boot_count = 7;
        store.write(&rec).unwrap();

        // Simulate a crash between the Page A and Page B writes of the
        // next commit: write Page A only.
        let mut rec2 = rec;
        rec2.boot_count = 8;
        rec2.timestamp = crate::record::now();
        rec2.trailer = crate::record::TRAILER_MAGIC;
        rec2.crc32 = rec2.calculate_crc();
        write_page(&mut store.file, PAGE_A_OFFSET, &rec2).unwrap();
        drop(store);

        let mut store = JournalStore::init(&path).unwrap();
        let recovered = store.read().unwrap();
        assert_eq!(recovered.boot_count, 8);

        let mut file = OpenOptions::new().read(true).open(&path).unwrap();
        let a = read_page(&mut file, PAGE_A_OFFSET).unwrap();
        let b = read_page(&mut file, PAGE_B_OFFSET).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn monotonic_boot_count_across_close_and_reinit()
    {
        let dir = tempdir().unwrap();
        let path = dir.path().join("j7");

        for _ in 1..=5u64 {
            let mut store = JournalStore::init(&path).unwrap();
            let mut rec = store.read().unwrap();
            rec.boot_count += 1;
            store.write(&rec).unwrap();
            store.close();
        }

        let mut store = JournalStore::init(&path).unwrap();
        let rec = store.read().unwrap();
        assert_eq!(rec.boot_count, 5);
    }
}
