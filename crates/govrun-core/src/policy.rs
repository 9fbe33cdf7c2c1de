//! Rule-based policy engine: ordered, priority-scored rule evaluation
//! over a change's facts, producing a decision plus rationale.
//!
//! A named ordered list of rules, each independently checked against the
//! same facts, folding into one verdict rather than short-circuiting on
//! the first match.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;

use crate::risk::{ActorKind, Assessment, ChangeAnalysis, ChangeProposal};

/// The governance verdict for a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    ApprovalRequired,
    Rejected,
    Deferred,
}

/// A condition comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Nin,
    Contains,
    Matches,
}

/// `{ field-path, operator, value }` — the unit a rule's conditions are built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field_path: String,
    pub operator: Operator,
    pub value: serde_json::Value,
}

impl Condition {
    pub fn new(field_path: impl Into<String>, operator: Operator, value: serde_json::Value) -> Self {
        Self {
            field_path: field_path.into(),
            operator,
            value,
        }
    }

    fn evaluate(&self, facts: &serde_json::Value) -> bool {
        let Some(actual) = resolve_path(facts, &self.field_path) else {
            return false;
        };
        match self.operator {
            Operator::Eq => actual == &self.value,
            Operator::Ne => actual != &self.value,
            Operator::Lt => compare_numeric(actual, &self.value) == Some(CmpOrdering::Less),
            Operator::Lte => matches!(
                compare_numeric(actual, &self.value),
                Some(CmpOrdering::Less) | Some(CmpOrdering::Equal)
            ),
            Operator::Gt => compare_numeric(actual, &self.value) == Some(CmpOrdering::Greater),
            Operator::Gte => matches!(
                compare_numeric(actual, &self.value),
                Some(CmpOrdering::Greater) | Some(CmpOrdering::Equal)
            ),
            Operator::In => self
                .value
                .as_array()
                .map(|arr| arr.contains(actual))
                .unwrap_or(false),
            Operator::Nin => self
                .value
                .as_array()
                .map(|arr| !arr.contains(actual))
                .unwrap_or(true),
            Operator::Contains => match (actual.as_str(), self.value.as_str()) {
                (Some(haystack), Some(needle)) => haystack.contains(needle),
                _ => actual
                    .as_array()
                    .map(|arr| arr.contains(&self.value))
                    .unwrap_or(false),
            },
            Operator::Matches => match (actual.as_str(), self.value.as_str()) {
                (Some(haystack), Some(pattern)) => regex::Regex::new(pattern)
                    .map(|re| re.is_match(haystack))
                    .unwrap_or(false),
                _ => false,
            },
        }
    }
}

fn compare_numeric(a: &serde_json::Value, b: &serde_json::Value) -> Option<CmpOrdering> {
    let a = a.as_f64()?;
    let b = b.as_f64()?;
    a.partial_cmp(&b)
}

/// Resolve a dotted field path (`risk.score`, `actor.kind`, `change.breaking`)
/// against a facts object.
fn resolve_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split('.').try_fold(value, |acc, segment| acc.get(segment))
}

/// An action a matching rule applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    SetDecision { value: Decision },
    AddRationale { text: String },
    AddRequiredAction { kind: String, description: String },
    AddCondition { kind: String, value: String },
    Block { reason: String },
}

/// A single named, ordered rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub priority: i32,
    pub enabled: bool,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}

impl Rule {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            enabled: true,
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    fn matches(&self, facts: &serde_json::Value) -> bool {
        self.enabled && self.conditions.iter().all(|c| c.evaluate(facts))
    }
}

/// A named, ordered policy made of rules, evaluated highest-priority-first;
/// ties break by insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    pub rules: Vec<Rule>,
    pub default_decision: Decision,
}

impl Policy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            default_decision: Decision::ApprovalRequired,
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Rules in evaluation order: highest priority first, insertion order
    /// breaking ties (a stable sort over the original indices does this).
    fn ordered_rules(&self) -> Vec<&Rule> {
        let mut indexed: Vec<(usize, &Rule)> = self.rules.iter().enumerate().collect();
        indexed.sort_by(|(ia, a), (ib, b)| b.priority.cmp(&a.priority).then(ia.cmp(ib)));
        indexed.into_iter().map(|(_, r)| r).collect()
    }
}

/// The facts a policy is evaluated against — the proposal, the optional
/// analysis, and the risk assessment already computed by the risk calculator.
#[derive(Debug, Clone, Serialize)]
struct Facts<'a> {
    actor: ActorFacts,
    change: ChangeFacts,
    risk: RiskFacts,
    proposal: &'a ChangeProposal,
}

#[derive(Debug, Clone, Serialize)]
struct ActorFacts {
    kind: ActorKind,
}

#[derive(Debug, Clone, Serialize)]
struct ChangeFacts {
    breaking: usize,
    security: usize,
    features: usize,
    fixes: usize,
    files_changed: usize,
    lines_changed: usize,
}

#[derive(Debug, Clone, Serialize)]
struct RiskFacts {
    score: f64,
    severity: String,
}

fn build_facts<'a>(
    proposal: &'a ChangeProposal,
    analysis: Option<&ChangeAnalysis>,
    risk: &Assessment,
) -> serde_json::Value {
    let change = analysis
        .map(|a| ChangeFacts {
            breaking: a.breaking,
            security: a.security,
            features: a.features,
            fixes: a.fixes,
            files_changed: a.files_changed,
            lines_changed: a.lines_changed,
        })
        .unwrap_or(ChangeFacts {
            breaking: 0,
            security: 0,
            features: 0,
            fixes: 0,
            files_changed: 0,
            lines_changed: 0,
        });
    let facts = Facts {
        actor: ActorFacts {
            kind: proposal.actor_kind,
        },
        change,
        risk: RiskFacts {
            score: risk.score,
            severity: risk.severity.to_string(),
        },
        proposal,
    };
    serde_json::to_value(facts).expect("facts always serialize")
}

/// The outcome of evaluating a [`Policy`] against a proposal's facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyResult {
    pub decision: Decision,
    pub rationale: Vec<String>,
    pub required_actions: Vec<(String, String)>,
    pub conditions: Vec<(String, String)>,
    pub matched_rules: Vec<String>,
}

/// Evaluate every enabled rule against `facts` in priority order. Every
/// matching rule's non-decision actions apply; `set_decision`/`block` apply
/// only from the highest-priority match.
pub fn evaluate(
    policy: &Policy,
    proposal: &ChangeProposal,
    analysis: Option<&ChangeAnalysis>,
    risk: &Assessment,
) -> PolicyResult {
    let facts = build_facts(proposal, analysis, risk);

    let mut decision = policy.default_decision;
    let mut decision_set = false;
    let mut rationale = Vec::new();
    let mut required_actions = Vec::new();
    let mut conditions = Vec::new();
    let mut matched_rules = Vec::new();

    for rule in policy.ordered_rules() {
        if !rule.matches(&facts) {
            continue;
        }
        matched_rules.push(rule.name.clone());
        for action in &rule.actions {
            match action {
                Action::SetDecision { value } => {
                    if !decision_set {
                        decision = *value;
                        decision_set = true;
                    }
                }
                Action::AddRationale { text } => rationale.push(text.clone()),
                Action::AddRequiredAction { kind, description } => {
                    required_actions.push((kind.clone(), description.clone()))
                }
                Action::AddCondition { kind, value } => conditions.push((kind.clone(), value.clone())),
                Action::Block { reason } => {
                    if !decision_set {
                        decision = Decision::Rejected;
                        decision_set = true;
                    }
                    rationale.push(reason.clone());
                }
            }
        }
    }

    PolicyResult {
        decision,
        rationale,
        required_actions,
        conditions,
        matched_rules,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::{Severity, RiskWeights};
    use crate::value_types::BumpKind;
    use serde_json::json;

    fn proposal(actor: ActorKind) -> ChangeProposal {
        ChangeProposal {
            actor_kind: actor,
            actor_id: "a".to_string(),
            scope: "core".to_string(),
            intent: "x".to_string(),
            suggested_bump: BumpKind::Minor,
            confidence: 0.9,
        }
    }

    fn assessment(score: f64, severity: Severity) -> Assessment {
        Assessment {
            score,
            severity,
            factors: vec![],
            summary: String::new(),
        }
    }

    #[test]
    fn default_decision_applies_when_nothing_matches() {
        let policy = Policy::new("default-only");
        let result = evaluate(
            &policy,
            &proposal(ActorKind::Human),
            None,
            &assessment(0.0, Severity::Low),
        );
        assert_eq!(result.decision, Decision::ApprovalRequired);
        assert!(result.matched_rules.is_empty());
    }

    #[test]
    fn highest_priority_rule_wins_decision() {
        let policy = Policy::new("p")
            .with_rule(
                Rule::new("low-priority-approve", 1)
                    .with_condition(Condition::new("risk.score", Operator::Gte, json!(0.0)))
                    .with_action(Action::SetDecision {
                        value: Decision::Approved,
                    }),
            )
            .with_rule(
                Rule::new("high-priority-reject", 10)
                    .with_condition(Condition::new("risk.score", Operator::Gte, json!(0.0)))
                    .with_action(Action::SetDecision {
                        value: Decision::Rejected,
                    }),
            );
        let result = evaluate(
            &policy,
            &proposal(ActorKind::Human),
            None,
            &assessment(0.1, Severity::Low),
        );
        assert_eq!(result.decision, Decision::Rejected);
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let policy = Policy::new("p")
            .with_rule(
                Rule::new("first", 5)
                    .with_condition(Condition::new("risk.score", Operator::Gte, json!(0.0)))
                    .with_action(Action::SetDecision {
                        value: Decision::Approved,
                    }),
            )
            .with_rule(
                Rule::new("second", 5)
                    .with_condition(Condition::new("risk.score", Operator::Gte, json!(0.0)))
                    .with_action(Action::SetDecision {
                        value: Decision::Rejected,
                    }),
            );
        let result = evaluate(
            &policy,
            &proposal(ActorKind::Human),
            None,
            &assessment(0.1, Severity::Low),
        );
        assert_eq!(result.decision, Decision::Approved);
    }

    #[test]
    fn non_decision_actions_apply_from_every_match() {
        let policy = Policy::new("p")
            .with_rule(
                Rule::new("rationale-a", 10)
                    .with_condition(Condition::new("risk.score", Operator::Gte, json!(0.0)))
                    .with_action(Action::AddRationale {
                        text: "a fired".to_string(),
                    }),
            )
            .with_rule(
                Rule::new("rationale-b", 1)
                    .with_condition(Condition::new("risk.score", Operator::Gte, json!(0.0)))
                    .with_action(Action::AddRationale {
                        text: "b fired".to_string(),
                    }),
            );
        let result = evaluate(
            &policy,
            &proposal(ActorKind::Human),
            None,
            &assessment(0.1, Severity::Low),
        );
        assert_eq!(result.rationale, vec!["a fired", "b fired"]);
    }

    #[test]
    fn disabled_rule_never_matches() {
        let mut rule = Rule::new("disabled", 10).with_action(Action::Block {
            reason: "nope".to_string(),
        });
        rule.enabled = false;
        let policy = Policy::new("p").with_rule(rule);
        let result = evaluate(
            &policy,
            &proposal(ActorKind::Human),
            None,
            &assessment(0.1, Severity::Low),
        );
        assert_eq!(result.decision, Decision::ApprovalRequired);
    }

    #[test]
    fn field_path_traverses_actor_kind() {
        let policy = Policy::new("p").with_rule(
            Rule::new("agent-block", 10)
                .with_condition(Condition::new("actor.kind", Operator::Eq, json!("agent")))
                .with_action(Action::Block {
                    reason: "agent changes blocked".to_string(),
                }),
        );
        let result = evaluate(
            &policy,
            &proposal(ActorKind::Agent),
            None,
            &assessment(0.0, Severity::Low),
        );
        assert_eq!(result.decision, Decision::Rejected);

        let result = evaluate(
            &policy,
            &proposal(ActorKind::Human),
            None,
            &assessment(0.0, Severity::Low),
        );
        assert_eq!(result.decision, Decision::ApprovalRequired);
    }

    #[test]
    fn field_path_traverses_change_breaking_count() {
        let policy = Policy::new("p").with_rule(
            Rule::new("breaking", 10)
                .with_condition(Condition::new("change.breaking", Operator::Gt, json!(0)))
                .with_action(Action::AddRequiredAction {
                    kind: "human_approval".to_string(),
                    description: "breaking change".to_string(),
                }),
        );
        let analysis = ChangeAnalysis {
            breaking: 1,
            ..Default::default()
        };
        let result = evaluate(
            &policy,
            &proposal(ActorKind::Human),
            Some(&analysis),
            &assessment(0.3, Severity::Medium),
        );
        assert_eq!(result.required_actions.len(), 1);
    }

    #[test]
    fn quick_assess_weights_are_exposed_for_policy_inputs() {
        // sanity: RiskWeights default is reachable from this module's tests too
        let weights = RiskWeights::default();
        assert!(weights.breaking_cap > 0.0);
    }
}
