//! Health probe configuration.

/// Tunables for the six health probes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HealthConfig
{
    /// Maximum tolerated correctable ECC error count.
    pub ecc_threshold: u32,
    /// Minimum free main memory, in KB.
    pub mem_min_free_kb: u32,
    /// Minimum free storage on `/`, as a percentage.
    pub storage_min_free_pct: u8,
    /// Per-target `ping` timeout, in seconds.
    pub network_timeout_sec: u8,
    /// Maximum tolerated temperature, in Celsius.
    pub temp_max_celsius: u8,
    /// Whether probes should log extra detail.
    pub verbose: bool,
}

impl Default for HealthConfig
{
    fn default() -> Self
    {
        Self {
            ecc_threshold: 10,
            mem_min_free_kb: 10240,
            storage_min_free_pct: 5,
            network_timeout_sec: 2,
            temp_max_celsius: 85,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn defaults_match_documented_values()
    {
        let cfg = HealthConfig::default();
        assert_eq!(cfg.ecc_threshold, 10);
        assert_eq!(cfg.mem_min_free_kb, 10240);
        assert_eq!(cfg.storage_min_free_pct, 5);
        assert_eq!(cfg.network_timeout_sec, 2);
        assert_eq!(cfg.temp_max_celsius, 85);
        assert!(!cfg.verbose);
    }
}
