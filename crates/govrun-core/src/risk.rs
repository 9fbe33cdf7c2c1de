//! CGP risk calculator: a pure, deterministic scoring function over a
//! change proposal and optional analysis, producing an [`Assessment`].
//!
//! The discrete [`Severity`] scale mirrors a tiered risk-level enum, kept as
//! its own copy here because severity is derived from a continuous score
//! rather than label-pattern rules.

use serde::{Deserialize, Serialize};

/// Discrete summary of a numeric risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

fn severity_for_score(score: f64) -> Severity {
    if score >= 0.75 {
        Severity::Critical
    } else if score >= 0.5 {
        Severity::High
    } else if score >= 0.25 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// The nature of the change initiator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Human,
    Ci,
    Agent,
}

/// The proposed change, as submitted for governance evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeProposal {
    pub actor_kind: ActorKind,
    pub actor_id: String,
    pub scope: String,
    pub intent: String,
    pub suggested_bump: crate::value_types::BumpKind,
    pub confidence: f64,
}

/// Upstream static/dynamic analysis of the change's actual impact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeAnalysis {
    pub features: usize,
    pub fixes: usize,
    pub breaking: usize,
    pub security: usize,
    pub files_changed: usize,
    pub lines_changed: usize,
    pub api_changes: Vec<String>,
}

/// A single weighted contribution to the final risk score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFactor {
    pub name: String,
    pub contribution: f64,
    pub severity: Severity,
    pub description: String,
}

/// The calculator's verdict: a score, a discrete severity, and the factors
/// that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub score: f64,
    pub severity: Severity,
    pub factors: Vec<RiskFactor>,
    pub summary: String,
}

/// Score-and-severity only, skipping factor breakdown and policy interaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuickAssessment {
    pub score: f64,
    pub severity: Severity,
}

/// Published, monotone weights for each scoring factor. Implementations
/// are required to keep these monotone in their respective inputs; changing a
/// weight here changes the risk calculator's behavior for every caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskWeights {
    pub breaking_per_change: f64,
    pub breaking_cap: f64,
    pub breaking_critical_above: usize,
    pub security_per_change: f64,
    pub security_cap: f64,
    pub blast_radius_files_critical_above: usize,
    pub blast_radius_lines_critical_above: usize,
    pub actor_agent: f64,
    pub actor_ci: f64,
    pub actor_human: f64,
    pub confidence_penalty_weight: f64,
    pub historical_rollback_threshold: f64,
    pub historical_risk_min: f64,
    pub historical_risk_max: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            breaking_per_change: 0.25,
            breaking_cap: 0.5,
            breaking_critical_above: 2,
            security_per_change: 0.2,
            security_cap: 0.4,
            blast_radius_files_critical_above: 1000,
            blast_radius_lines_critical_above: 50_000,
            actor_agent: 0.15,
            actor_ci: 0.05,
            actor_human: 0.0,
            confidence_penalty_weight: 0.1,
            historical_rollback_threshold: 0.1,
            historical_risk_min: 0.1,
            historical_risk_max: 0.3,
        }
    }
}

/// An optional rollback-rate input, supplied when a `HistoryProvider` port is
/// available. The calculator never calls the port itself — it stays
/// stateless — so this is a plain value threaded in by the caller.
#[derive(Debug, Clone, Copy)]
pub struct HistoricalRisk {
    pub rollback_rate: f64,
}

/// Compute the blast-radius contribution, piecewise-linear in files and lines
/// changed, saturating to `critical` past the configured thresholds.
fn blast_radius_factor(weights: &RiskWeights, analysis: &ChangeAnalysis) -> Option<RiskFactor> {
    if analysis.files_changed == 0 && analysis.lines_changed == 0 {
        return None;
    }
    let file_fraction = (analysis.files_changed as f64
        / weights.blast_radius_files_critical_above as f64)
        .min(1.0);
    let line_fraction = (analysis.lines_changed as f64
        / weights.blast_radius_lines_critical_above as f64)
        .min(1.0);
    let fraction = file_fraction.max(line_fraction);
    let contribution = fraction * 0.3;
    let critical = analysis.files_changed > weights.blast_radius_files_critical_above
        || analysis.lines_changed > weights.blast_radius_lines_critical_above;
    let severity = if critical {
        Severity::Critical
    } else {
        severity_for_score(contribution)
    };
    Some(RiskFactor {
        name: "blast_radius".to_string(),
        contribution,
        severity,
        description: format!(
            "{} files, {} lines changed",
            analysis.files_changed, analysis.lines_changed
        ),
    })
}

/// Run the full risk calculation, returning a detailed [`Assessment`].
pub fn calculate(
    weights: &RiskWeights,
    proposal: &ChangeProposal,
    analysis: Option<&ChangeAnalysis>,
    historical: Option<HistoricalRisk>,
) -> Assessment {
    let mut factors = Vec::new();
    let mut score = 0.0;

    if let Some(analysis) = analysis {
        if analysis.breaking > 0 {
            let contribution =
                (analysis.breaking as f64 * weights.breaking_per_change).min(weights.breaking_cap);
            let severity = if analysis.breaking > weights.breaking_critical_above {
                Severity::Critical
            } else {
                Severity::High
            };
            score += contribution;
            factors.push(RiskFactor {
                name: "breaking_changes".to_string(),
                contribution,
                severity,
                description: format!("{} breaking change(s)", analysis.breaking),
            });
        }

        if analysis.security > 0 {
            let contribution =
                (analysis.security as f64 * weights.security_per_change).min(weights.security_cap);
            score += contribution;
            factors.push(RiskFactor {
                name: "security_changes".to_string(),
                contribution,
                severity: Severity::High,
                description: format!("{} security-related change(s)", analysis.security),
            });
        }

        if let Some(factor) = blast_radius_factor(weights, analysis) {
            score += factor.contribution;
            factors.push(factor);
        }
    }

    let actor_contribution = match proposal.actor_kind {
        ActorKind::Agent => weights.actor_agent,
        ActorKind::Ci => weights.actor_ci,
        ActorKind::Human => weights.actor_human,
    };
    if actor_contribution > 0.0 {
        score += actor_contribution;
        factors.push(RiskFactor {
            name: "actor_kind".to_string(),
            contribution: actor_contribution,
            severity: severity_for_score(actor_contribution),
            description: format!("actor kind: {:?}", proposal.actor_kind),
        });
    }

    let confidence_penalty = (1.0 - proposal.confidence.clamp(0.0, 1.0))
        * weights.confidence_penalty_weight;
    if confidence_penalty > 0.0 {
        score += confidence_penalty;
        factors.push(RiskFactor {
            name: "confidence_penalty".to_string(),
            contribution: confidence_penalty,
            severity: severity_for_score(confidence_penalty),
            description: format!("confidence {:.2}", proposal.confidence),
        });
    }

    if let Some(hist) = historical {
        if hist.rollback_rate > weights.historical_rollback_threshold {
            let fraction = ((hist.rollback_rate - weights.historical_rollback_threshold)
                / (1.0 - weights.historical_rollback_threshold))
                .clamp(0.0, 1.0);
            let contribution = weights.historical_risk_min
                + fraction * (weights.historical_risk_max - weights.historical_risk_min);
            score += contribution;
            factors.push(RiskFactor {
                name: "historical_risk".to_string(),
                contribution,
                severity: severity_for_score(contribution),
                description: format!(
                    "historical rollback rate {:.2} exceeds threshold",
                    hist.rollback_rate
                ),
            });
        }
    }

    score = score.clamp(0.0, 1.0);
    let severity = severity_for_score(score);
    let has_high_or_critical = factors
        .iter()
        .any(|f| matches!(f.severity, Severity::High | Severity::Critical));

    let mut summary = format!("risk severity: {severity}");
    if has_high_or_critical {
        summary.push_str(" (high-severity factors present)");
    }

    Assessment {
        score,
        severity,
        factors,
        summary,
    }
}

/// Score-only variant that skips factor breakdown — used by callers that
/// only need a quick read of risk without full policy interaction.
pub fn quick_assess(
    weights: &RiskWeights,
    proposal: &ChangeProposal,
    analysis: Option<&ChangeAnalysis>,
    historical: Option<HistoricalRisk>,
) -> QuickAssessment {
    let full = calculate(weights, proposal, analysis, historical);
    QuickAssessment {
        score: full.score,
        severity: full.severity,
    }
}
