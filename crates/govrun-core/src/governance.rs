//! Change Governance Protocol evaluator: orchestrates the risk
//! calculator and the policy engine, then applies four
//! cross-cutting governance rules that can only escalate the decision.
//!
//! These cross-cutting rules are compiled into this evaluator rather than
//! expressed as data-driven policy rules because they must
//! run *after* the rule engine and be able to override its decision upward.

use serde::{Deserialize, Serialize};

use crate::policy::{self, Decision, Policy, PolicyResult};
use crate::risk::{self, ActorKind, Assessment, ChangeAnalysis, ChangeProposal, HistoricalRisk, RiskFactor, RiskWeights};

/// Thresholds governing the cross-cutting rules. Part of
/// [`crate::config::GovernanceConfig`]; kept as a standalone type here so the
/// evaluator can be exercised without the rest of the config surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceThresholds {
    pub max_auto_approve_risk: f64,
    pub require_human_for_breaking: bool,
    pub require_human_for_security: bool,
    pub auto_approve_threshold: f64,
    pub trusted_actor_kinds: Vec<ActorKind>,
}

impl Default for GovernanceThresholds {
    fn default() -> Self {
        Self {
            max_auto_approve_risk: 0.5,
            require_human_for_breaking: true,
            require_human_for_security: true,
            auto_approve_threshold: 0.25,
            trusted_actor_kinds: vec![ActorKind::Human, ActorKind::Ci],
        }
    }
}

/// The full governance verdict, including the audit trail of how it was reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceDecision {
    pub decision: Decision,
    pub risk_score: f64,
    pub risk_factors: Vec<RiskFactor>,
    pub rationale: Vec<String>,
    pub required_actions: Vec<(String, String)>,
    pub conditions: Vec<(String, String)>,
    pub recommended_version: Option<String>,
}

/// Escalation order: `approved < approval_required < rejected`. `deferred`
/// is treated as incomparable to `approved`/`approval_required` — it is
/// never produced by the cross-cutting rules, only by policy rules
/// themselves, so it passes through untouched.
fn decision_rank(decision: Decision) -> u8 {
    match decision {
        Decision::Approved => 0,
        Decision::ApprovalRequired => 1,
        Decision::Deferred => 1,
        Decision::Rejected => 2,
    }
}

/// Escalate `current` to `candidate` if `candidate` is strictly more
/// restrictive; never relax.
fn escalate(current: Decision, candidate: Decision) -> Decision {
    if decision_rank(candidate) > decision_rank(current) {
        candidate
    } else {
        current
    }
}

/// Evaluate the full CGP pipeline for one proposal: risk → policy → the four
/// cross-cutting rules, in order.
pub fn evaluate(
    weights: &RiskWeights,
    policy: &Policy,
    thresholds: &GovernanceThresholds,
    proposal: &ChangeProposal,
    analysis: Option<&ChangeAnalysis>,
    historical: Option<HistoricalRisk>,
) -> (GovernanceDecision, Assessment, PolicyResult) {
    let assessment = risk::calculate(weights, proposal, analysis, historical);
    let policy_result = policy::evaluate(policy, proposal, analysis, &assessment);

    let mut decision = policy_result.decision;
    let mut rationale = policy_result.rationale.clone();

    // Rule 1: agent actor with elevated risk.
    if proposal.actor_kind == ActorKind::Agent && assessment.score > thresholds.max_auto_approve_risk {
        decision = escalate(decision, Decision::ApprovalRequired);
        rationale.push("agent-initiated change with elevated risk requires human review".to_string());
    }

    // Rule 2: breaking changes present.
    let breaking_count = analysis.map(|a| a.breaking).unwrap_or(0);
    if breaking_count > 0 && thresholds.require_human_for_breaking {
        decision = escalate(decision, Decision::ApprovalRequired);
        rationale.push(format!("{breaking_count} breaking changes detected"));
    }

    // Rule 3: security changes present.
    let security_count = analysis.map(|a| a.security).unwrap_or(0);
    if security_count > 0 && thresholds.require_human_for_security {
        decision = escalate(decision, Decision::ApprovalRequired);
        rationale.push(format!("{security_count} security-related changes detected"));
    }

    // Rule 4: trusted actor under threshold may be auto-approved, provided no
    // rule demanded a human_approval required action.
    let has_human_approval_requirement = policy_result
        .required_actions
        .iter()
        .any(|(kind, _)| kind == "human_approval");
    let is_trusted = thresholds.trusted_actor_kinds.contains(&proposal.actor_kind);
    if decision == Decision::ApprovalRequired
        && is_trusted
        && assessment.score < thresholds.auto_approve_threshold
        && !has_human_approval_requirement
    {
        decision = Decision::Approved;
        rationale.push("low-risk change from trusted actor auto-approved".to_string());
    }

    let governance = GovernanceDecision {
        decision,
        risk_score: assessment.score,
        risk_factors: assessment.factors.clone(),
        rationale,
        required_actions: policy_result.required_actions.clone(),
        conditions: policy_result.conditions.clone(),
        recommended_version: None,
    };

    (governance, assessment, policy_result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_types::BumpKind;

    fn proposal(actor: ActorKind, confidence: f64) -> ChangeProposal {
        ChangeProposal {
            actor_kind: actor,
            actor_id: "id".to_string(),
            scope: "core".to_string(),
            intent: "change".to_string(),
            suggested_bump: BumpKind::Minor,
            confidence,
        }
    }

    #[test]
    fn low_risk_trusted_actor_auto_approves() {
        let weights = RiskWeights::default();
        let policy = Policy::new("default");
        let thresholds = GovernanceThresholds::default();
        let (decision, _, _) = evaluate(
            &weights,
            &policy,
            &thresholds,
            &proposal(ActorKind::Human, 1.0),
            None,
            None,
        );
        assert_eq!(decision.decision, Decision::Approved);
    }

    #[test]
    fn breaking_change_forces_approval_required_even_for_trusted_actor() {
        let weights = RiskWeights::default();
        let policy = Policy::new("default");
        let thresholds = GovernanceThresholds::default();
        let analysis = ChangeAnalysis {
            breaking: 1,
            ..Default::default()
        };
        let (decision, _, _) = evaluate(
            &weights,
            &policy,
            &thresholds,
            &proposal(ActorKind::Agent, 0.6),
            Some(&analysis),
            None,
        );
        assert_eq!(decision.decision, Decision::ApprovalRequired);
        assert!(decision
            .rationale
            .iter()
            .any(|r| r.contains("breaking changes detected")));
    }

    #[test]
    fn security_change_requires_approval() {
        let weights = RiskWeights::default();
        let policy = Policy::new("default");
        let thresholds = GovernanceThresholds::default();
        let analysis = ChangeAnalysis {
            security: 2,
            ..Default::default()
        };
        let (decision, assessment, _) = evaluate(
            &weights,
            &policy,
            &thresholds,
            &proposal(ActorKind::Human, 0.9),
            Some(&analysis),
            None,
        );
        assert_eq!(decision.decision, Decision::ApprovalRequired);
        assert!(assessment.severity >= crate::risk::Severity::High);
    }

    #[test]
    fn agent_above_max_auto_approve_risk_requires_review() {
        let weights = RiskWeights::default();
        let policy = Policy::new("default");
        let thresholds = GovernanceThresholds::default();
        let analysis = ChangeAnalysis {
            breaking: 3,
            security: 3,
            files_changed: 2000,
            lines_changed: 60_000,
            ..Default::default()
        };
        let (decision, _, _) = evaluate(
            &weights,
            &policy,
            &thresholds,
            &proposal(ActorKind::Agent, 0.4),
            Some(&analysis),
            None,
        );
        assert_eq!(decision.decision, Decision::ApprovalRequired);
    }

    #[test]
    fn escalation_never_relaxes_a_policy_rejection() {
        let weights = RiskWeights::default();
        let policy = Policy::new("default").with_rule(
            crate::policy::Rule::new("always-reject", 100)
                .with_condition(crate::policy::Condition::new(
                    "risk.score",
                    crate::policy::Operator::Gte,
                    serde_json::json!(0.0),
                ))
                .with_action(crate::policy::Action::SetDecision {
                    value: Decision::Rejected,
                }),
        );
        let thresholds = GovernanceThresholds::default();
        let (decision, _, _) = evaluate(
            &weights,
            &policy,
            &thresholds,
            &proposal(ActorKind::Human, 1.0),
            None,
            None,
        );
        assert_eq!(decision.decision, Decision::Rejected);
    }

    #[test]
    fn human_approval_required_action_blocks_auto_approve_promotion() {
        let weights = RiskWeights::default();
        let policy = Policy::new("default").with_rule(
            crate::policy::Rule::new("needs-human", 100)
                .with_condition(crate::policy::Condition::new(
                    "risk.score",
                    crate::policy::Operator::Gte,
                    serde_json::json!(0.0),
                ))
                .with_action(crate::policy::Action::AddRequiredAction {
                    kind: "human_approval".to_string(),
                    description: "manual sign-off".to_string(),
                }),
        );
        let thresholds = GovernanceThresholds::default();
        let (decision, _, _) = evaluate(
            &weights,
            &policy,
            &thresholds,
            &proposal(ActorKind::Human, 1.0),
            None,
            None,
        );
        assert_eq!(decision.decision, Decision::ApprovalRequired);
    }
}
