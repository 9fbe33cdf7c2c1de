//! Environment- and file-driven configuration.
//!
//! `GovernanceConfig` bundles the risk calculator's weights, the CGP
//! thresholds, and the default policy so a bare crate consumer gets the
//! reference risk and governance behavior without authoring a config file.
//! Its canonical-JSON digest is folded into every run's plan hash so a
//! configuration change is visible in a run's identity.

use serde::{Deserialize, Serialize};

use crate::digest::compute_digest;
use crate::error::Result;
use crate::governance::GovernanceThresholds;
use crate::policy::Policy;
use crate::risk::RiskWeights;

/// The release step plan's default ordering and kinds for a given repo,
/// expressed as bare step names + kinds. Full `StepPlan`
/// values (with computed idempotency keys) are built from this by the Bump
/// use case once the run's identity is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTemplate {
    pub name: String,
    pub kind: crate::run::StepKind,
    pub plugin_name: Option<String>,
    pub hook: Option<String>,
    pub unsafe_step: bool,
}

impl StepTemplate {
    pub fn new(name: impl Into<String>, kind: crate::run::StepKind) -> Self {
        Self {
            name: name.into(),
            kind,
            plugin_name: None,
            hook: None,
            unsafe_step: false,
        }
    }
}

fn default_step_templates() -> Vec<StepTemplate> {
    vec![
        StepTemplate::new("changelog", crate::run::StepKind::Changelog),
        StepTemplate::new("tag", crate::run::StepKind::Tag),
        StepTemplate::new("build", crate::run::StepKind::Build),
        StepTemplate::new("artifact", crate::run::StepKind::Artifact),
        StepTemplate::new("notify", crate::run::StepKind::Notify),
        StepTemplate::new("finalize", crate::run::StepKind::Finalize),
    ]
}

/// The whole of a repo's governance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    pub risk_weights: RiskWeights,
    pub thresholds: GovernanceThresholds,
    pub policy: Policy,
    pub step_templates: Vec<StepTemplate>,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            risk_weights: RiskWeights::default(),
            thresholds: GovernanceThresholds::default(),
            policy: Policy::new("default"),
            step_templates: default_step_templates(),
        }
    }
}

impl GovernanceConfig {
    /// Parse a `GovernanceConfig` from TOML, as loaded from a repo's config file.
    pub fn from_toml(input: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    /// The canonical-JSON SHA-256 digest of this config, folded into the plan
    /// hash.
    pub fn config_hash(&self) -> Result<String> {
        let value = serde_json::to_value(self)?;
        compute_digest(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_hash_is_deterministic() {
        let a = GovernanceConfig::default();
        let b = GovernanceConfig::default();
        assert_eq!(a.config_hash().unwrap(), b.config_hash().unwrap());
    }

    #[test]
    fn changing_a_threshold_changes_the_hash() {
        let a = GovernanceConfig::default();
        let mut b = GovernanceConfig::default();
        b.thresholds.auto_approve_threshold = 0.9;
        assert_ne!(a.config_hash().unwrap(), b.config_hash().unwrap());
    }

    #[test]
    fn default_step_templates_cover_the_publishing_phase() {
        let config = GovernanceConfig::default();
        assert!(config.step_templates.iter().any(|s| s.name == "tag"));
        assert!(config.step_templates.iter().any(|s| s.name == "finalize"));
    }
}
