//! The health oracle: six probes plus score aggregation and
//! reporting.

pub mod aggregator;
pub mod config;
pub mod probes;
pub mod report;

pub use aggregator::{run, score_to_status, Verdict};
pub use config::HealthConfig;
pub use probes::{
    probe_ecc, probe_memory, probe_network, probe_storage, probe_temperature, probe_watchdog,
    HealthCheckResult,
};
pub use report::{report_to_file, report_to_text, HealthReport};
