//! Sampling decisions for recorded events

use beacon_core::config::{SamplingConfig, SamplingRule};

/// Applies the base sampling rate with per-operation overrides. The first
/// rule whose `operation` is a prefix of the event name wins.
pub struct Sampler {
    rate: f64,
    rules: Vec<SamplingRule>,
}

impl Sampler {
    pub fn new(config: &SamplingConfig) -> Self {
        Self {
            rate: config.rate,
            rules: config.rules.clone(),
        }
    }

    pub fn rate_for(&self, operation: &str) -> f64 {
        self.rules
            .iter()
            .find(|rule| operation.starts_with(&rule.operation))
            .map(|rule| rule.rate)
            .unwrap_or(self.rate)
    }

    pub fn should_sample(&self, operation: &str) -> bool {
        let rate = self.rate_for(operation);
        if rate >= 1.0 {
            true
        } else if rate <= 0.0 {
            false
        } else {
            rand::random::<f64>() < rate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(rate: f64, rules: Vec<SamplingRule>) -> SamplingConfig {
        SamplingConfig { rate, rules }
    }

    #[test]
    fn base_rate_applies_without_rules() {
        let sampler = Sampler::new(&config(1.0, vec![]));
        assert!(sampler.should_sample("http.request"));

        let sampler = Sampler::new(&config(0.0, vec![]));
        assert!(!sampler.should_sample("http.request"));
    }

    #[test]
    fn first_matching_rule_wins() {
        let sampler = Sampler::new(&config(
            1.0,
            vec![
                SamplingRule {
                    operation: "health".to_string(),
                    rate: 0.0,
                },
                SamplingRule {
                    operation: "health.deep".to_string(),
                    rate: 1.0,
                },
            ],
        ));

        assert_eq!(sampler.rate_for("health.check"), 0.0);
        // Prefix match: the earlier, broader rule shadows the later one.
        assert_eq!(sampler.rate_for("health.deep"), 0.0);
        assert_eq!(sampler.rate_for("orders.placed"), 1.0);
    }

    #[test]
    fn rule_can_disable_noisy_operation() {
        let sampler = Sampler::new(&config(
            1.0,
            vec![SamplingRule {
                operation: "debug.".to_string(),
                rate: 0.0,
            }],
        ));

        assert!(!sampler.should_sample("debug.cache_hit"));
        assert!(sampler.should_sample("orders.placed"));
    }
}
