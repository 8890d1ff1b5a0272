//! The six independent health probes.
//!
//! Each probe is a pure function of the host environment. A probe
//! that finds no sensor of its kind returns `ok: true` with a
//! "not available" message — the surrounding system must not fail
//! merely because telemetry is absent.

use std::fs;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;
use std::process::Command;

use anyhow::Context;
use serde::Serialize;

use crate::error::HealthError;

/// Wire/JSON message budget: a probe message is a human string capped
/// at construction so it never blows the report's transport budget.
pub const MAX_MESSAGE_LEN: usize = 255;

fn cap_message(message: String) -> String
{
    if message.len() <= MAX_MESSAGE_LEN {
        return message;
    }
    let mut end = MAX_MESSAGE_LEN;
    while end > 0 && !message.is_char_boundary(end) {
        end -= 1;
    }
    message.truncate(end);
    message
}

/// Result of a single probe: a verdict, a human message, and a
/// check-specific numeric value (ECC error count, free percent, free
/// KB, or temperature in Celsius; `0` for watchdog/network).
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct HealthCheckResult
{
    pub ok: bool,
    pub message: String,
    pub value: u32,
}

impl HealthCheckResult
{
    fn ok(message: impl Into<String>) -> Self
    {
        Self { ok: true, message: cap_message(message.into()), value: 0 }
    }

    fn ok_with_value(message: impl Into<String>, value: u32) -> Self
    {
        Self { ok: true, message: cap_message(message.into()), value }
    }

    pub(crate) fn fail(message: impl Into<String>) -> Self
    {
        Self { ok: false, message: cap_message(message.into()), value: 0 }
    }

    fn fail_with_value(message: impl Into<String>, value: u32) -> Self
    {
        Self { ok: false, message: cap_message(message.into()), value }
    }
}

fn is_char_device(path: &str) -> bool
{
    fs::metadata(path)
        .map(|m| m.file_type().is_char_device())
        .unwrap_or(false)
}

/// Watchdog presence: checks `/dev/watchdog` then `/dev/watchdog0`.
pub fn probe_watchdog() -> HealthCheckResult
{
    if is_char_device("/dev/watchdog") {
        return HealthCheckResult::ok("Watchdog device present at /dev/watchdog");
    }
    if is_char_device("/dev/watchdog0") {
        return HealthCheckResult::ok("Watchdog device present at /dev/watchdog0");
    }
    HealthCheckResult::fail("No watchdog device found")
}

fn read_counter(path: &Path) -> Option<u64>
{
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// ECC memory error counters under `/sys/devices/system/edac/mc/mc*/`.
/// Absent tree ⇒ OK. Any uncorrectable error ⇒ fail. Otherwise OK iff
/// the correctable total is under `threshold`.
pub fn probe_ecc(threshold: u32) -> HealthCheckResult
{
    let edac_root = Path::new("/sys/devices/system/edac");
    if !edac_root.exists() {
        return HealthCheckResult::ok("EDAC not available, assuming OK");
    }

    let mut ce_total: u64 = 0;
    let mut ue_total: u64 = 0;

    if let Ok(entries) = fs::read_dir(edac_root.join("mc")) {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with("mc") {
                continue;
            }
            let dir = entry.path();
            if let Some(ce) = read_counter(&dir.join("ce_count")) {
                ce_total += ce;
            }
            if let Some(ue) = read_counter(&dir.join("ue_count")) {
                ue_total += ue;
            }
        }
    }

    let ce_total = ce_total.min(u32::MAX as u64) as u32;

    if ue_total > 0 {
        return HealthCheckResult::fail_with_value(
            format!("Uncorrectable ECC errors detected: {ue_total}"),
            ce_total,
        );
    }
    if ce_total < threshold {
        return HealthCheckResult::ok_with_value(
            format!("ECC errors within threshold: {ce_total} < {threshold}"),
            ce_total,
        );
    }
    HealthCheckResult::fail_with_value(
        format!("ECC errors exceed threshold: {ce_total} >= {threshold}"),
        ce_total,
    )
}

/// Free space on the filesystem backing `/`, via `statvfs(2)`.
pub fn probe_storage(min_free_pct: u8) -> HealthCheckResult
{
    let free_pct = match statvfs_free_pct("/") {
        Ok(pct) => pct,
        Err(e) => return HealthCheckResult::fail(format!("Failed to check storage: {e:#}")),
    };

    if free_pct >= min_free_pct {
        HealthCheckResult::ok_with_value(
            format!("Storage healthy: {free_pct}% free"),
            free_pct as u32,
        )
    } else {
        HealthCheckResult::fail_with_value(
            format!("Storage low: {free_pct}% free (min: {min_free_pct}%)"),
            free_pct as u32,
        )
    }
}

fn statvfs_free_pct(path: &str) -> anyhow::Result<u8>
{
    use std::ffi::CString;
    use std::mem::MaybeUninit;

    let c_path = CString::new(path).context("path contains a NUL byte")?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();

    // SAFETY: `c_path` is a valid NUL-terminated C string and `stat`
    // points at enough space for a `statvfs` struct; libc initializes
    // it fully on success.
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error()).context("statvfs syscall failed");
    }
    let stat = unsafe { stat.assume_init() };

    if stat.f_blocks == 0 {
        return Ok(0);
    }
    let free_pct = (stat.f_bavail as u128 * 100 / stat.f_blocks as u128) as u8;
    Ok(free_pct)
}

/// Reachability of `8.8.8.8` then `1.1.1.1` via one `ping` each,
/// bounded by `timeout_sec`.
pub fn probe_network(timeout_sec: u8) -> HealthCheckResult
{
    const TARGETS: [&str; 2] = ["8.8.8.8", "1.1.1.1"];

    for target in TARGETS {
        let status = Command::new("ping")
            .arg("-c")
            .arg("1")
            .arg("-W")
            .arg(timeout_sec.to_string())
            .arg(target)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status();

        if matches!(status, Ok(s) if s.success()) {
            return HealthCheckResult::ok(format!("Network reachable (tested: {target})"));
        }
    }

    HealthCheckResult::fail("Network unreachable")
}

/// Free main memory from `/proc/meminfo`: `MemAvailable` if present,
/// else `MemFree`.
///
/// Returns `Err` only when `/proc/meminfo` itself can't be read — the
/// one data source this probe has no fallback for. A present-but-odd
/// file (missing fields, garbled values) is reported as an `ok: false`
/// result instead, same as every other probe's failure mode.
pub fn probe_memory(min_free_kb: u32) -> Result<HealthCheckResult, HealthError>
{
    let content = fs::read_to_string("/proc/meminfo")
        .map_err(|e| HealthError(format!("/proc/meminfo unreadable: {e}")))?;

    let result = match parse_meminfo(&content) {
        Ok((available, total)) => {
            let pct = if total > 0 { available * 100 / total } else { 0 };
            let value = available.min(u32::MAX as u64) as u32;
            if available >= min_free_kb as u64 {
                HealthCheckResult::ok_with_value(
                    format!("Memory healthy: {available}KB available ({pct}%)"),
                    value,
                )
            } else {
                HealthCheckResult::fail_with_value(
                    format!("Low memory: {available}KB available ({pct}%)"),
                    value,
                )
            }
        }
        Err(e) => HealthCheckResult::fail(format!("Failed to parse memory info: {e:#}")),
    };

    Ok(result)
}

fn parse_meminfo(content: &str) -> anyhow::Result<(u64, u64)>
{
    let mut mem_available: Option<u64> = None;
    let mut mem_free: Option<u64> = None;
    let mut mem_total: Option<u64> = None;

    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("MemAvailable:") {
            mem_available = parse_kb(rest);
        } else if let Some(rest) = line.strip_prefix("MemFree:") {
            mem_free = parse_kb(rest);
        } else if let Some(rest) = line.strip_prefix("MemTotal:") {
            mem_total = parse_kb(rest);
        }
    }

    let available = mem_available
        .or(mem_free)
        .context("neither MemAvailable nor MemFree present")?;
    let total = mem_total.context("MemTotal missing")?;
    Ok((available, total))
}

fn parse_kb(rest: &str) -> Option<u64>
{
    rest.trim().split_whitespace().next()?.parse().ok()
}

/// Peak temperature across `/sys/class/thermal/thermal_zone*/temp`
/// (millidegrees) and `/sys/class/hwmon/*/temp*_input`. No sensors
/// found ⇒ OK.
///
/// Thermal zones and hwmon sensors are scanned as two independent
/// directory trees so a sensor under one never shadows the other.
pub fn probe_temperature(max_celsius: u8) -> HealthCheckResult
{
    let mut max_temp_c: i64 = i64::MIN;
    let mut found = false;

    if let Ok(entries) = fs::read_dir("/sys/class/thermal") {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with("thermal_zone") {
                continue;
            }
            if let Some(millic) = read_counter(&entry.path().join("temp")) {
                if millic > 0 {
                    max_temp_c = max_temp_c.max(millic as i64 / 1000);
                    found = true;
                }
            }
        }
    }

    if let Ok(hwmon_entries) = fs::read_dir("/sys/class/hwmon") {
        for hwmon in hwmon_entries.flatten() {
            let hwmon_path = hwmon.path();
            let Ok(sensor_entries) = fs::read_dir(&hwmon_path) else { continue };
            for sensor in sensor_entries.flatten() {
                let name = sensor.file_name();
                let name = name.to_string_lossy();
                if name.contains("temp") && name.contains("_input") {
                    if let Some(millic) = read_counter(&sensor.path()) {
                        if millic > 0 {
                            max_temp_c = max_temp_c.max(millic as i64 / 1000);
                            found = true;
                        }
                    }
                }
            }
        }
    }

    if !found {
        return HealthCheckResult::ok("Temperature monitoring not available");
    }

    let max_temp_c = max_temp_c.max(0) as u32;
    if max_temp_c <= max_celsius as u32 {
        HealthCheckResult::ok_with_value(
            format!("Temperature normal: {max_temp_c}\u{b0}C (max: {max_celsius}\u{b0}C)"),
            max_temp_c,
        )
    } else {
        HealthCheckResult::fail_with_value(
            format!("Temperature critical: {max_temp_c}\u{b0}C (max: {max_celsius}\u{b0}C)"),
            max_temp_c,
        )
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn parse_kb_handles_meminfo_line_tail()
    {
        assert_eq!(parse_kb(" 2000000 kB"), Some(2000000));
    }

    #[test]
    fn parse_kb_rejects_garbage()
    {
        assert_eq!(parse_kb(" not-a-number kB"), None);
    }

    #[test]
    fn probe_watchdog_reports_absence_as_failure_not_crash()
    {
        // We can't assume a /dev/watchdog exists in CI; just confirm
        // it never panics and produces a message either way.
        let result = probe_watchdog();
        assert!(!result.message.is_empty());
    }

    #[test]
    fn probe_memory_reads_real_meminfo()
    {
        // /proc/meminfo is present on any Linux test host.
        let result = probe_memory(0).unwrap();
        assert!(result.ok);
        assert!(result.value > 0);
    }

    #[test]
    fn probe_memory_caps_message_length()
    {
        let long = "x".repeat(1000);
        let result = HealthCheckResult::fail(long);
        assert!(result.message.len() <= MAX_MESSAGE_LEN);
    }

    #[test]
    fn probe_storage_reads_real_root_fs()
    {
        let result = probe_storage(0);
        assert!(result.ok);
        assert!(result.value <= 100);
    }
}
