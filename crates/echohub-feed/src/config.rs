use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Deadline for one hub's identity probe.
    pub probe_timeout: Duration,
    /// Echoes requested per hub page.
    pub page_size: usize,
    /// Echoes emitted by `drain_default`.
    pub batch_size: usize,
    /// A hub buffer shorter than this after a pop triggers a background prefetch.
    pub low_water_mark: usize,
    /// Selection attempts allowed per requested echo in one drain.
    pub attempt_factor: usize,
    /// Display name for hubs that report none.
    pub default_hub_name: String,
    /// Logo for hubs that report none.
    pub default_hub_logo: String,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(5000),
            page_size: 10,
            batch_size: 10,
            low_water_mark: 3,
            attempt_factor: 3,
            default_hub_name: "Ech0".to_string(),
            default_hub_logo: "/Ech0.svg".to_string(),
        }
    }
}

impl AggregatorConfig {
    /// Upper bound on selection attempts for one drain of `batch_size` echoes.
    pub fn max_attempts(&self, batch_size: usize) -> usize {
        batch_size.saturating_mul(self.attempt_factor)
    }

    /// Page size as sent on the wire.
    pub fn wire_page_size(&self) -> u32 {
        u32::try_from(self.page_size).unwrap_or(u32::MAX)
    }

    /// Clamps values that would stall the merge loop.
    pub(crate) fn sanitized(mut self) -> Self {
        self.page_size = self.page_size.max(1);
        self.attempt_factor = self.attempt_factor.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::AggregatorConfig;

    #[test]
    fn defaults_match_hub_protocol_expectations() {
        let cfg = AggregatorConfig::default();
        assert_eq!(cfg.probe_timeout, Duration::from_secs(5));
        assert_eq!(cfg.page_size, 10);
        assert_eq!(cfg.batch_size, 10);
        assert_eq!(cfg.low_water_mark, 3);
        assert_eq!(cfg.max_attempts(10), 30);
        assert_eq!(cfg.default_hub_name, "Ech0");
    }

    #[test]
    fn sanitized_rejects_zero_page_size_and_factor() {
        let cfg = AggregatorConfig {
            page_size: 0,
            attempt_factor: 0,
            ..AggregatorConfig::default()
        }
        .sanitized();
        assert_eq!(cfg.page_size, 1);
        assert_eq!(cfg.max_attempts(4), 4);
    }

    #[test]
    fn wire_page_size_saturates() {
        let cfg = AggregatorConfig {
            page_size: usize::MAX,
            ..AggregatorConfig::default()
        };
        assert_eq!(cfg.wire_page_size(), u32::MAX);
    }
}
