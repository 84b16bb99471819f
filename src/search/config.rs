//! Search configuration.

/// How the engine orders the values of a branching variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueHeuristic {
    /// Smallest value first. Deterministic; good default for mapping
    /// problems where low processor indices are interchangeable anyway.
    MinValue,
    /// Shuffled value order with a fixed seed, for diversification runs
    /// that must stay reproducible.
    Random { seed: u64 },
}

/// Configuration for the branch-and-bound engine.
///
/// # Examples
///
/// ```
/// use mapdse::search::{SearchConfig, ValueHeuristic};
///
/// let config = SearchConfig::default()
///     .with_time_limit_ms(5_000)
///     .with_value_heuristic(ValueHeuristic::Random { seed: 42 });
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Wall-clock budget in milliseconds. `None` = unlimited.
    pub time_limit_ms: Option<u64>,

    /// Maximum number of search nodes. `None` = unlimited.
    pub node_limit: Option<u64>,

    /// Value ordering at choice points.
    pub value_heuristic: ValueHeuristic,

    /// Stop at the first solution instead of proving optimality.
    pub stop_after_first: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            time_limit_ms: None,
            node_limit: None,
            value_heuristic: ValueHeuristic::MinValue,
            stop_after_first: false,
        }
    }
}

impl SearchConfig {
    /// Preset: stop at the first feasible mapping.
    pub fn first_solution() -> Self {
        Self::default().with_stop_after_first(true)
    }

    /// Preset: best solution found within the given wall-clock budget.
    pub fn anytime(time_limit_ms: u64) -> Self {
        Self::default().with_time_limit_ms(time_limit_ms)
    }

    pub fn with_time_limit_ms(mut self, limit: u64) -> Self {
        self.time_limit_ms = Some(limit);
        self
    }

    pub fn with_node_limit(mut self, limit: u64) -> Self {
        self.node_limit = Some(limit);
        self
    }

    pub fn with_value_heuristic(mut self, heuristic: ValueHeuristic) -> Self {
        self.value_heuristic = heuristic;
        self
    }

    pub fn with_stop_after_first(mut self, stop: bool) -> Self {
        self.stop_after_first = stop;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.time_limit_ms == Some(0) {
            return Err("time_limit_ms must be positive".into());
        }
        if self.node_limit == Some(0) {
            return Err("node_limit must be positive".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SearchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_limits_rejected() {
        assert!(SearchConfig::default()
            .with_time_limit_ms(0)
            .validate()
            .is_err());
        assert!(SearchConfig::default()
            .with_node_limit(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_presets() {
        assert!(SearchConfig::first_solution().stop_after_first);
        assert_eq!(SearchConfig::anytime(100).time_limit_ms, Some(100));
    }
}
