//! Structured health report and its text/JSON renderings.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use super::probes::HealthCheckResult;

/// The aggregate result of running all six health probes.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct HealthReport
{
    pub timestamp: u64,
    pub watchdog: HealthCheckResult,
    pub ecc: HealthCheckResult,
    pub storage: HealthCheckResult,
    pub network: HealthCheckResult,
    pub memory: HealthCheckResult,
    pub temperature: HealthCheckResult,
    pub overall_score: u8,
    pub max_score: u8,
    pub overall_status: String,
}

/// The legacy `0/1`-flag mirror of the six checks, kept for consumers
/// of the earlier wire format.
#[derive(Serialize)]
struct LegacyFlags
{
    wdt_ok: u8,
    ecc_ok: u8,
    storage_ok: u8,
    net_ok: u8,
    mem_ok: u8,
    temp_ok: u8,
}

#[derive(Serialize)]
struct Checks<'a>
{
    watchdog: &'a HealthCheckResult,
    ecc: &'a HealthCheckResult,
    storage: &'a HealthCheckResult,
    network: &'a HealthCheckResult,
    memory: &'a HealthCheckResult,
    temperature: &'a HealthCheckResult,
}

#[derive(Serialize)]
struct WireReport<'a>
{
    timestamp: u64,
    overall_score: u8,
    max_score: u8,
    overall_status: &'a str,
    checks: Checks<'a>,
    legacy_format: LegacyFlags,
}

impl HealthReport
{
    fn to_wire(&self) -> WireReport<'_>
    {
        WireReport {
            timestamp: self.timestamp,
            overall_score: self.overall_score,
            max_score: self.max_score,
            overall_status: &self.overall_status,
            checks: Checks {
                watchdog: &self.watchdog,
                ecc: &self.ecc,
                storage: &self.storage,
                network: &self.network,
                memory: &self.memory,
                temperature: &self.temperature,
            },
            legacy_format: LegacyFlags {
                wdt_ok: self.watchdog.ok as u8,
                ecc_ok: self.ecc.ok as u8,
                storage_ok: self.storage.ok as u8,
                net_ok: self.network.ok as u8,
                mem_ok: self.memory.ok as u8,
                temp_ok: self.temperature.ok as u8,
            },
        }
    }

    /// Renders the structured key-value document as JSON.
    pub fn to_json(&self) -> serde_json::Value
    {
        serde_json::to_value(self.to_wire()).expect("HealthReport always serializes")
    }

    /// The human-oriented text block printed to a console.
    fn human_text(&self) -> String
    {
        let mut out = String::new();
        out.push_str("PAC Health Check Report\n\n");
        out.push_str(&format!("Timestamp: {}\n", self.timestamp));
        out.push_str(&format!(
            "Overall Status: {} ({}/{} checks passed)\n\n",
            self.overall_status, self.overall_score, self.max_score
        ));
        out.push_str("Individual Checks:\n");
        for (name, check) in [
            ("Watchdog", &self.watchdog),
            ("ECC Memory", &self.ecc),
            ("Storage", &self.storage),
            ("Network", &self.network),
            ("Memory", &self.memory),
            ("Temperature", &self.temperature),
        ] {
            out.push_str(&format!(
                "  [{}] {:<11} {}\n",
                if check.ok { "OK" } else { "FAIL" },
                format!("{name}:"),
                check.message
            ));
        }
        out
    }
}

/// Writes the human-readable report to any `Write` stream.
pub fn report_to_text(report: &HealthReport, out: &mut impl Write) -> io::Result<()>
{
    out.write_all(report.human_text().as_bytes())
}

/// Writes the structured JSON document to `path`.
pub fn report_to_file(report: &HealthReport, path: impl AsRef<Path>) -> io::Result<()>
{
    let mut file = File::create(path)?;
    let json = serde_json::to_string_pretty(&report.to_wire())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    file.write_all(json.as_bytes())?;
    file.write_all(b"\n")
}
