//! Actor runtime configuration.

use crate::machine::DEFAULT_MAX_ALWAYS_ITERATIONS;
use serde::{Deserialize, Serialize};

/// Tuning knobs shared by every actor spawned with them.
///
/// Missing fields fall back to their defaults when deserialized, so a
/// partial config file is valid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// Ceiling on always-transitions applied for a single commit.
    pub max_always_iterations: usize,
}

impl ActorConfig {
    pub fn with_max_always_iterations(mut self, max: usize) -> Self {
        self.max_always_iterations = max;
        self
    }
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            max_always_iterations: DEFAULT_MAX_ALWAYS_ITERATIONS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ceiling_is_one_hundred() {
        assert_eq!(ActorConfig::default().max_always_iterations, 100);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: ActorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ActorConfig::default());

        let config: ActorConfig = serde_json::from_str(r#"{"max_always_iterations": 7}"#).unwrap();
        assert_eq!(config.max_always_iterations, 7);
    }
}
