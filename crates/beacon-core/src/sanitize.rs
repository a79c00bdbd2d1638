//! Redaction of sensitive data before events leave the process
//!
//! Redaction runs directly over the structured event (message, names, and
//! attribute values) rather than through a serialize/regex/reparse round
//! trip, so there is no parse step that can fail and block delivery. The
//! fail-open contract is kept at the construction boundary instead: a
//! pattern that does not compile is a configuration error at startup, never
//! a runtime delivery blocker.

use crate::config::PrivacyConfig;
use crate::error::{BeaconError, Result};
use crate::event::{AttrMap, AttrValue, LogEvent, MetricEvent, TraceSpan};
use regex::Regex;

const REDACTED: &str = "[REDACTED]";

/// Applies the configured redaction patterns to telemetry events.
pub struct Sanitizer {
    enabled: bool,
    patterns: Vec<Regex>,
    redacted_fields: Vec<String>,
}

impl Sanitizer {
    /// Compile the configured redaction patterns.
    pub fn new(config: &PrivacyConfig) -> Result<Self> {
        let mut patterns = Vec::new();

        for pattern_str in &config.redaction_patterns {
            let regex = Regex::new(pattern_str).map_err(|e| BeaconError::Config {
                message: format!("Invalid redaction pattern '{}': {}", pattern_str, e),
            })?;
            patterns.push(regex);
        }

        Ok(Self {
            enabled: config.sanitize_enabled,
            patterns,
            redacted_fields: config.redacted_fields.clone(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sanitize a text string, applying each pattern in order.
    pub fn sanitize_text(&self, text: &str) -> String {
        let mut sanitized = text.to_string();

        for pattern in &self.patterns {
            sanitized = pattern
                .replace_all(&sanitized, |caps: &regex::Captures| {
                    let matched = &caps[0];
                    if caps.len() >= 3 && matched.contains('@') {
                        partially_redact_email(matched)
                    } else if caps.len() >= 2 {
                        // Keep the field name but redact the value
                        format!("{}={}", &caps[1], REDACTED)
                    } else {
                        REDACTED.to_string()
                    }
                })
                .to_string();
        }

        sanitized
    }

    /// Sanitize an attribute map in place.
    pub fn sanitize_attributes(&self, attributes: &mut AttrMap) {
        for (key, value) in attributes.iter_mut() {
            if self.should_redact_field(key) {
                *value = AttrValue::String(REDACTED.to_string());
            } else if let AttrValue::String(s) = value {
                *s = self.sanitize_text(s);
            }
        }
    }

    pub fn sanitize_metric(&self, metric: &mut MetricEvent) {
        if !self.enabled {
            return;
        }
        metric.name = self.sanitize_text(&metric.name);
        self.sanitize_attributes(&mut metric.attributes);
    }

    pub fn sanitize_log(&self, log: &mut LogEvent) {
        if !self.enabled {
            return;
        }
        log.message = self.sanitize_text(&log.message);
        self.sanitize_attributes(&mut log.attributes);
    }

    pub fn sanitize_span(&self, span: &mut TraceSpan) {
        if !self.enabled {
            return;
        }
        span.operation = self.sanitize_text(&span.operation);
        self.sanitize_attributes(&mut span.attributes);
    }

    /// Check if a field name should be redacted wholesale.
    fn should_redact_field(&self, field_name: &str) -> bool {
        let field_lower = field_name.to_lowercase();
        self.redacted_fields
            .iter()
            .any(|redacted_field| field_lower.contains(&redacted_field.to_lowercase()))
    }
}

/// Partially redact an email address (user@domain.com -> u***@d***.com)
fn partially_redact_email(email: &str) -> String {
    if let Some(at_pos) = email.find('@') {
        let (user, domain_part) = email.split_at(at_pos);
        let domain = &domain_part[1..];

        let redacted_user = if user.len() <= 1 {
            "*".to_string()
        } else {
            format!("{}***", &user[..1])
        };

        let redacted_domain = if let Some(dot_pos) = domain.find('.') {
            let (domain_name, tld) = domain.split_at(dot_pos);
            if domain_name.len() <= 1 {
                format!("*{}", tld)
            } else {
                format!("{}***{}", &domain_name[..1], tld)
            }
        } else {
            "***".to_string()
        };

        format!("{}@{}", redacted_user, redacted_domain)
    } else {
        "[REDACTED_EMAIL]".to_string()
    }
}

/// Pre-defined redaction patterns for common sensitive data types.
pub struct RedactionPatterns;

impl RedactionPatterns {
    /// Patterns for API keys, tokens, and other credentials.
    pub fn credential_patterns() -> Vec<String> {
        vec![
            // Generic key=value credentials
            r"(?i)(api_?key|token|secret|password)\s*[:=]\s*['\x22]?([a-zA-Z0-9_\-\.]{8,})['\x22]?"
                .to_string(),
            // Bearer tokens
            r"(?i)bearer\s+([a-zA-Z0-9_\-\.]+)".to_string(),
        ]
    }

    /// Patterns for personally identifiable information.
    pub fn pii_patterns() -> Vec<String> {
        vec![
            // Social Security Numbers
            r"\b\d{3}-\d{2}-\d{4}\b".to_string(),
            // Phone numbers
            r"\b\d{3}-\d{3}-\d{4}\b".to_string(),
            // Email addresses (partial redaction)
            r"\b([a-zA-Z0-9._%+-]+)@([a-zA-Z0-9.-]+\.[a-zA-Z]{2,})\b".to_string(),
        ]
    }

    /// Patterns for financial information.
    pub fn financial_patterns() -> Vec<String> {
        vec![
            // Credit card numbers
            r"\b\d{4}[\s\-]?\d{4}[\s\-]?\d{4}[\s\-]?\d{4}\b".to_string(),
        ]
    }

    /// All default patterns combined.
    pub fn all_default_patterns() -> Vec<String> {
        let mut patterns = Vec::new();
        patterns.extend(Self::credential_patterns());
        patterns.extend(Self::financial_patterns());
        patterns.extend(Self::pii_patterns());
        patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LogLevel;

    fn default_sanitizer() -> Sanitizer {
        let config = PrivacyConfig {
            sanitize_enabled: true,
            redaction_patterns: RedactionPatterns::all_default_patterns(),
            redacted_fields: vec!["password".to_string(), "token".to_string()],
        };
        Sanitizer::new(&config).unwrap()
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let config = PrivacyConfig {
            sanitize_enabled: true,
            redaction_patterns: vec!["[unclosed".to_string()],
            redacted_fields: vec![],
        };

        assert!(matches!(
            Sanitizer::new(&config),
            Err(BeaconError::Config { .. })
        ));
    }

    #[test]
    fn credit_card_digit_run_is_redacted() {
        let sanitizer = default_sanitizer();
        let mut log = LogEvent::new(LogLevel::Info, "call 4111111111111111 for support");

        sanitizer.sanitize_log(&mut log);

        assert!(!log.message.contains("4111111111111111"));
        assert!(log.message.contains(REDACTED));
    }

    #[test]
    fn credentials_keep_field_name() {
        let sanitizer = default_sanitizer();
        let sanitized = sanitizer.sanitize_text("login with api_key=sk-1234567890abcdef");

        assert!(!sanitized.contains("sk-1234567890abcdef"));
        assert!(sanitized.contains("api_key=[REDACTED]"));
    }

    #[test]
    fn email_is_partially_redacted() {
        let sanitizer = default_sanitizer();
        let sanitized = sanitizer.sanitize_text("contact user@example.com");

        assert!(!sanitized.contains("user@example.com"));
        assert!(sanitized.contains("u***@e***.com"));
    }

    #[test]
    fn ssn_is_redacted() {
        let sanitizer = default_sanitizer();
        let sanitized = sanitizer.sanitize_text("ssn 123-45-6789");

        assert!(!sanitized.contains("123-45-6789"));
    }

    #[test]
    fn sensitive_attribute_fields_are_redacted_wholesale() {
        let sanitizer = default_sanitizer();
        let mut metric = MetricEvent::new("auth.attempts", 1.0)
            .with_attribute("user_password", "hunter2")
            .with_attribute("region", "eu-west-1");

        sanitizer.sanitize_metric(&mut metric);

        assert_eq!(
            metric.attributes.get("user_password"),
            Some(&AttrValue::String(REDACTED.to_string()))
        );
        assert_eq!(
            metric.attributes.get("region"),
            Some(&AttrValue::String("eu-west-1".to_string()))
        );
    }

    #[test]
    fn disabled_sanitizer_passes_payload_through() {
        let config = PrivacyConfig {
            sanitize_enabled: false,
            redaction_patterns: RedactionPatterns::all_default_patterns(),
            redacted_fields: vec!["password".to_string()],
        };
        let sanitizer = Sanitizer::new(&config).unwrap();

        let mut log = LogEvent::new(LogLevel::Info, "card 4111111111111111");
        sanitizer.sanitize_log(&mut log);

        assert_eq!(log.message, "card 4111111111111111");
    }

    #[test]
    fn span_operation_and_attributes_are_sanitized() {
        let sanitizer = default_sanitizer();
        let mut span =
            TraceSpan::new("checkout for user@example.com").with_attributes(AttrMap::from([(
                "token".to_string(),
                AttrValue::String("abc123".to_string()),
            )]));

        sanitizer.sanitize_span(&mut span);

        assert!(!span.operation.contains("user@example.com"));
        assert_eq!(
            span.attributes.get("token"),
            Some(&AttrValue::String(REDACTED.to_string()))
        );
    }
}
