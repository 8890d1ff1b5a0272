//! Score composition and verdict mapping.

use crate::logger::Logger;
use crate::record::now;

use super::config::HealthConfig;
use super::probes;
use super::probes::HealthCheckResult;
use super::report::HealthReport;

/// The automation-facing result of [`run`]. `Error` is kept for wire
/// parity with an external `-1` status code but is unreachable from
/// this crate's safe `run` signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict
{
    Ok,
    Degraded,
    Critical,
    Error,
}

impl Verdict
{
    /// The numeric status code: OK=0, DEGRADED=1, CRITICAL=2, ERROR=-1.
    pub fn as_code(self) -> i8
    {
        match self {
            Verdict::Ok => 0,
            Verdict::Degraded => 1,
            Verdict::Critical => 2,
            Verdict::Error => -1,
        }
    }

    /// The exit-code mapping a thin CLI collaborator should use:
    /// 0 healthy, 1 degraded, 2 critical, 255 internal error.
    pub fn as_exit_code(self) -> u8
    {
        match self {
            Verdict::Ok => 0,
            Verdict::Degraded => 1,
            Verdict::Critical => 2,
            Verdict::Error => 255,
        }
    }

    fn from_score(score: u8) -> Self
    {
        if score >= 5 {
            Verdict::Ok
        } else if score >= 3 {
            Verdict::Degraded
        } else {
            Verdict::Critical
        }
    }
}

/// Maps a score to the human-facing status string. Computed
/// independently of [`Verdict`], on a ratio rather than absolute
/// thresholds; the two can disagree at boundary scores by design.
pub fn score_to_status(score: u8, max: u8) -> &'static str
{
    if score as u32 >= (5 * max as u32) / 6 {
        "healthy"
    } else if score >= max / 2 {
        "degraded"
    } else {
        "critical"
    }
}

/// Invokes all six probes in a fixed order and composes the aggregate
/// report and verdict.
pub fn run(config: &HealthConfig, mut logger: Option<&mut Logger>) -> (HealthReport, Verdict)
{
    let mut report = HealthReport {
        timestamp: now(),
        watchdog: probes::probe_watchdog(),
        ecc: probes::probe_ecc(config.ecc_threshold),
        storage: probes::probe_storage(config.storage_min_free_pct),
        network: probes::probe_network(config.network_timeout_sec),
        memory: probes::probe_memory(config.mem_min_free_kb)
            .unwrap_or_else(|e| HealthCheckResult::fail(e.to_string())),
        temperature: probes::probe_temperature(config.temp_max_celsius),
        overall_score: 0,
        max_score: 6,
        overall_status: String::new(),
    };

    let score = [
        &report.watchdog,
        &report.ecc,
        &report.storage,
        &report.network,
        &report.memory,
        &report.temperature,
    ]
    .iter()
    .filter(|r| r.ok)
    .count() as u8;

    report.overall_score = score;
    report.overall_status = score_to_status(score, report.max_score).to_string();

    let verdict = Verdict::from_score(score);

    if let Some(logger) = logger.as_deref_mut() {
        logger.log(
            1,
            &format!(
                "health: score {}/{} -> {} ({:?})",
                score, report.max_score, report.overall_status, verdict
            ),
        );
    }

    (report, verdict)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn score_to_status_boundaries()
    {
        assert_eq!(score_to_status(6, 6), "healthy");
        assert_eq!(score_to_status(5, 6), "healthy");
        assert_eq!(score_to_status(4, 6), "degraded");
        assert_eq!(score_to_status(3, 6), "degraded");
        assert_eq!(score_to_status(2, 6), "critical");
        assert_eq!(score_to_status(0, 6), "critical");
    }

    #[test]
    fn verdict_uses_absolute_thresholds()
    {
        assert_eq!(Verdict::from_score(6).as_code(), 0);
        assert_eq!(Verdict::from_score(5).as_code(), 0);
        assert_eq!(Verdict::from_score(4).as_code(), 1);
        assert_eq!(Verdict::from_score(3).as_code(), 1);
        assert_eq!(Verdict::from_score(2).as_code(), 2);
    }

    #[test]
    fn status_and_verdict_can_diverge_at_four()
    {
        // score=4, max=6: status is "degraded" (4 < 5*6/6=5) and the
        // verdict is Degraded too here, but at score=5 status is
        // "healthy" while the verdict boundary is also 5 -- the
        // divergence shows up because status uses integer ratio
        // 5*max/6 while verdict uses the fixed literal 5.
        assert_eq!(score_to_status(5, 6), "healthy");
        assert_eq!(Verdict::from_score(5), Verdict::Ok);
    }

    #[test]
    fn run_produces_score_in_range_and_six_checks()
    {
        let cfg = HealthConfig::default();
        let (report, _verdict) = run(&cfg, None);
        assert!(report.overall_score <= report.max_score);
        assert_eq!(report.max_score, 6);

        let ok_count = [
            report.watchdog.ok,
            report.ecc.ok,
            report.storage.ok,
            report.network.ok,
            report.memory.ok,
            report.temperature.ok,
        ]
        .iter()
        .filter(|ok| **ok)
        .count() as u8;
        assert_eq!(ok_count, report.overall_score);
    }
}
