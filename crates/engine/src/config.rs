use serde::Deserialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub tolerance: ToleranceConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_name() -> String {
    "reconciliation".into()
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            tolerance: ToleranceConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tolerance + Retry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ToleranceConfig {
    /// Amount mismatches are flagged only when |settled − total| is strictly
    /// greater than this, in cents.
    #[serde(default = "default_amount_cents")]
    pub amount_cents: i64,
}

fn default_amount_cents() -> i64 {
    1
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            amount_cents: default_amount_cents(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// A later success counts as a retry of an earlier failure when the gap
    /// is 0..=window_days.
    #[serde(default = "default_window_days")]
    pub window_days: i64,
}

fn default_window_days() -> i64 {
    7
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconcileConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconcileConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.name.trim().is_empty() {
            return Err(ReconError::ConfigValidation("name must not be empty".into()));
        }
        if self.tolerance.amount_cents < 0 {
            return Err(ReconError::ConfigValidation(format!(
                "tolerance.amount_cents must be >= 0, got {}",
                self.tolerance.amount_cents
            )));
        }
        if self.retry.window_days < 0 {
            return Err(ReconError::ConfigValidation(format!(
                "retry.window_days must be >= 0, got {}",
                self.retry.window_days
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ReconcileConfig::default();
        assert_eq!(config.name, "reconciliation");
        assert_eq!(config.tolerance.amount_cents, 1);
        assert_eq!(config.retry.window_days, 7);
        config.validate().unwrap();
    }

    #[test]
    fn parse_full() {
        let config = ReconcileConfig::from_toml(
            r#"
name = "November close"

[tolerance]
amount_cents = 5

[retry]
window_days = 3
"#,
        )
        .unwrap();
        assert_eq!(config.name, "November close");
        assert_eq!(config.tolerance.amount_cents, 5);
        assert_eq!(config.retry.window_days, 3);
    }

    #[test]
    fn parse_empty_uses_defaults() {
        let config = ReconcileConfig::from_toml("").unwrap();
        assert_eq!(config.name, "reconciliation");
        assert_eq!(config.tolerance.amount_cents, 1);
        assert_eq!(config.retry.window_days, 7);
    }

    #[test]
    fn reject_negative_tolerance() {
        let err = ReconcileConfig::from_toml("[tolerance]\namount_cents = -1\n").unwrap_err();
        assert!(err.to_string().contains("amount_cents"));
    }

    #[test]
    fn reject_negative_window() {
        let err = ReconcileConfig::from_toml("[retry]\nwindow_days = -2\n").unwrap_err();
        assert!(err.to_string().contains("window_days"));
    }

    #[test]
    fn reject_bad_toml() {
        let err = ReconcileConfig::from_toml("name = [unterminated").unwrap_err();
        assert!(matches!(err, ReconError::ConfigParse(_)));
    }
}
