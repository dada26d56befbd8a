//! Specialist agents
//!
//! Five fixed roles behind one `analyze(query, profile)` contract. Each role
//! computes its figures in code first; generated prose may illustrate them
//! but never overrides them.

pub mod cash_flow;
pub mod debt;
pub mod health;
pub mod investment;
pub mod routing;
pub mod wealth;

pub use routing::route_query;

use crate::llm::{GeneratedText, TextGenerator};
use crate::models::{AgentMessage, ConfidenceLevel, MessageType};
use crate::profile::FinancialProfile;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Confidence recorded on templated fallback messages.
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Specialist {
    CashFlow,
    Investment,
    Debt,
    Wealth,
    Health,
}

impl Specialist {
    pub const ROSTER: [Specialist; 5] = [
        Specialist::CashFlow,
        Specialist::Investment,
        Specialist::Debt,
        Specialist::Wealth,
        Specialist::Health,
    ];

    pub fn agent_id(&self) -> &'static str {
        match self {
            Specialist::CashFlow => "cash_flow_agent",
            Specialist::Investment => "investment_agent",
            Specialist::Debt => "debt_agent",
            Specialist::Wealth => "wealth_agent",
            Specialist::Health => "health_agent",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Specialist::CashFlow => "Cash Flow Analyst",
            Specialist::Investment => "Investment Analyst",
            Specialist::Debt => "Debt and Credit Analyst",
            Specialist::Wealth => "Wealth Planner",
            Specialist::Health => "Financial Health Monitor",
        }
    }

    pub fn capabilities(&self) -> &'static [&'static str] {
        match self {
            Specialist::CashFlow => &[
                "income_analysis",
                "expense_categorization",
                "savings_rate",
                "emergency_fund_planning",
            ],
            Specialist::Investment => &[
                "portfolio_analysis",
                "sip_planning",
                "asset_allocation",
            ],
            Specialist::Debt => &[
                "debt_analysis",
                "credit_score_review",
                "repayment_planning",
            ],
            Specialist::Wealth => &[
                "net_worth_tracking",
                "retirement_planning",
                "wealth_projection",
            ],
            Specialist::Health => &[
                "financial_health_scoring",
                "anomaly_detection",
            ],
        }
    }

    /// Roles whose analysis this one semantically builds on. Also the
    /// roles eligible to challenge this role's proposals.
    pub fn dependencies(&self) -> &'static [Specialist] {
        match self {
            Specialist::CashFlow => &[],
            Specialist::Investment => &[Specialist::CashFlow, Specialist::Debt],
            Specialist::Debt => &[Specialist::CashFlow],
            Specialist::Wealth => &[Specialist::Investment, Specialist::CashFlow],
            Specialist::Health => &[
                Specialist::CashFlow,
                Specialist::Debt,
                Specialist::Investment,
            ],
        }
    }

    pub fn from_agent_id(agent_id: &str) -> Option<Specialist> {
        Self::ROSTER.into_iter().find(|s| s.agent_id() == agent_id)
    }

    pub fn instructions(&self) -> &'static str {
        match self {
            Specialist::CashFlow => cash_flow::INSTRUCTIONS,
            Specialist::Investment => investment::INSTRUCTIONS,
            Specialist::Debt => debt::INSTRUCTIONS,
            Specialist::Wealth => wealth::INSTRUCTIONS,
            Specialist::Health => health::INSTRUCTIONS,
        }
    }

    pub fn precompute(&self, profile: &FinancialProfile) -> Precomputed {
        match self {
            Specialist::CashFlow => cash_flow::precompute(profile),
            Specialist::Investment => investment::precompute(profile),
            Specialist::Debt => debt::precompute(profile),
            Specialist::Wealth => wealth::precompute(profile),
            Specialist::Health => health::precompute(profile),
        }
    }

    /// Collaboration-phase proposal, if this role has one.
    pub fn propose(&self, profile: &FinancialProfile) -> Option<Proposal> {
        match self {
            Specialist::Investment => investment::propose(profile),
            Specialist::Debt => debt::propose(profile),
            _ => None,
        }
    }

    /// Objection to another role's proposal, if this role has one.
    pub fn challenge(&self, proposal: &Proposal, profile: &FinancialProfile) -> Option<Challenge> {
        match (self, proposal.kind) {
            (Specialist::CashFlow, ProposalKind::IncreaseSip) => {
                cash_flow::challenge_growth(profile)
            }
            (Specialist::CashFlow, ProposalKind::AccelerateDebtRepayment) => {
                cash_flow::challenge_repayment(profile)
            }
            (Specialist::Debt, ProposalKind::IncreaseSip) => debt::challenge_growth(profile),
            _ => None,
        }
    }
}

impl fmt::Display for Specialist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.agent_id())
    }
}

/// Deterministic output of a role's pre-computation.
#[derive(Debug, Clone, Default)]
pub struct Precomputed {
    /// Authoritative numeric figures
    pub calculations: Map<String, Value>,
    pub recommendations: Vec<String>,
    pub risks: Vec<String>,
    pub opportunities: Vec<String>,
    /// Templated analysis text citing the figures above
    pub summary: String,
}

impl Precomputed {
    pub fn figure(&self, key: &str) -> Option<f64> {
        self.calculations.get(key).and_then(Value::as_f64)
    }

    fn into_supporting_data(self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("calculations".into(), Value::Object(self.calculations));
        data.insert("recommendations".into(), json!(self.recommendations));
        data.insert("risks".into(), json!(self.risks));
        data.insert("opportunities".into(), json!(self.opportunities));
        data
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    IncreaseSip,
    AccelerateDebtRepayment,
}

impl ProposalKind {
    /// Growth proposals yield to risk mitigation under the default policy.
    pub fn is_growth(&self) -> bool {
        matches!(self, ProposalKind::IncreaseSip)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalKind::IncreaseSip => "increase_sip",
            ProposalKind::AccelerateDebtRepayment => "accelerate_debt_repayment",
        }
    }

    pub fn parse(value: &str) -> Option<ProposalKind> {
        match value {
            "increase_sip" => Some(ProposalKind::IncreaseSip),
            "accelerate_debt_repayment" => Some(ProposalKind::AccelerateDebtRepayment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Proposal {
    pub proposer: Specialist,
    pub kind: ProposalKind,
    /// Monthly amount proposed
    pub amount: f64,
    pub content: String,
    pub data: Map<String, Value>,
}

impl Proposal {
    pub fn into_message(self) -> AgentMessage {
        AgentMessage::new(
            self.proposer.agent_id(),
            MessageType::Proposal,
            self.content,
            ConfidenceLevel::Medium,
        )
        .with_supporting_data(self.data)
        .with_data("proposal_kind", json!(self.kind.as_str()))
        .with_data("proposed_amount", json!(self.amount))
    }
}

#[derive(Debug, Clone)]
pub struct Challenge {
    pub content: String,
    /// Monthly amount the challenger wants directed elsewhere first
    pub amount: f64,
    pub duration_months: u32,
    pub action: String,
}

impl Challenge {
    pub fn into_message(self, challenger: Specialist, proposal: &Proposal) -> AgentMessage {
        AgentMessage::new(
            challenger.agent_id(),
            MessageType::Challenge,
            self.content,
            ConfidenceLevel::High,
        )
        .citing(proposal.proposer.agent_id())
        .with_data("challenged_proposal", json!(proposal.kind.as_str()))
        .with_data("action", json!(self.action))
        .with_data("amount", json!(self.amount))
        .with_data("duration_months", json!(self.duration_months))
    }
}

/// One role bound to a text generator.
#[derive(Clone)]
pub struct SpecialistAgent {
    kind: Specialist,
    generator: Arc<dyn TextGenerator>,
}

impl SpecialistAgent {
    pub fn new(kind: Specialist, generator: Arc<dyn TextGenerator>) -> Self {
        Self { kind, generator }
    }

    pub fn kind(&self) -> Specialist {
        self.kind
    }

    /// Produce this role's ANALYSIS message. Never fails: unusable
    /// generation degrades to the templated low-confidence message.
    pub async fn analyze(&self, query: &str, profile: &FinancialProfile) -> AgentMessage {
        let precomputed = self.kind.precompute(profile);
        let prompt = build_prompt(query, &precomputed);

        let generated = self
            .generator
            .generate(self.kind.instructions(), &prompt)
            .await;

        match generated.as_ref().and_then(parse_generated) {
            Some(parsed) => {
                debug!(agent_id = self.kind.agent_id(), "Using generated analysis");
                let confidence = generated.map(|g| g.confidence).unwrap_or(0.5);
                self.generated_message(parsed, precomputed, confidence)
            }
            None => {
                if generated.is_some() {
                    warn!(agent_id = self.kind.agent_id(), "Unparsable generation, using fallback");
                }
                self.fallback_message(precomputed)
            }
        }
    }

    fn generated_message(
        &self,
        parsed: ParsedAnalysis,
        precomputed: Precomputed,
        confidence: f64,
    ) -> AgentMessage {
        let mut precomputed = precomputed;
        merge_unique(&mut precomputed.recommendations, parsed.recommendations);
        merge_unique(&mut precomputed.risks, parsed.risks);
        merge_unique(&mut precomputed.opportunities, parsed.opportunities);

        let mut message = AgentMessage::new(
            self.kind.agent_id(),
            MessageType::Analysis,
            parsed.analysis,
            ConfidenceLevel::from_score(confidence),
        )
        .with_supporting_data(precomputed.into_supporting_data())
        .with_data("confidence_score", json!(confidence));

        if let Some(metrics) = parsed.key_metrics {
            message = message.with_data("generated_metrics", Value::Object(metrics));
        }
        if let Some(market_data) = parsed.market_data {
            message = message.with_data("market_data", market_data);
        }
        message
    }

    fn fallback_message(&self, precomputed: Precomputed) -> AgentMessage {
        let summary = precomputed.summary.clone();
        AgentMessage::new(
            self.kind.agent_id(),
            MessageType::Analysis,
            summary,
            ConfidenceLevel::from_score(FALLBACK_CONFIDENCE),
        )
        .with_supporting_data(precomputed.into_supporting_data())
        .with_data("confidence_score", json!(FALLBACK_CONFIDENCE))
        .with_data("fallback", json!(true))
    }
}

fn build_prompt(query: &str, precomputed: &Precomputed) -> String {
    let figures = serde_json::to_string_pretty(&precomputed.calculations)
        .unwrap_or_else(|_| "{}".to_string());

    format!(
        "User question:\n{}\n\n\
         Verified figures (quote them exactly, never invent other numbers):\n{}\n\n\
         Respond with a single JSON object:\n\
         {{\"analysis\": string, \"recommendations\": [string], \"risks\": [string], \
         \"opportunities\": [string], \"key_metrics\": {{name: number}}}}",
        query, figures
    )
}

struct ParsedAnalysis {
    analysis: String,
    recommendations: Vec<String>,
    risks: Vec<String>,
    opportunities: Vec<String>,
    key_metrics: Option<Map<String, Value>>,
    market_data: Option<Value>,
}

/// Parse the largest `{ ... }` block of the generated text.
fn parse_generated(generated: &GeneratedText) -> Option<ParsedAnalysis> {
    let text = &generated.text;
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }

    let value: Value = serde_json::from_str(&text[start..=end]).ok()?;
    let object = value.as_object()?;

    let analysis = object
        .get("analysis")
        .or_else(|| object.get("summary"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())?
        .to_string();

    let strings = |key: &str| -> Vec<String> {
        object
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    Some(ParsedAnalysis {
        analysis,
        recommendations: strings("recommendations"),
        risks: strings("risks"),
        opportunities: strings("opportunities"),
        key_metrics: object.get("key_metrics").and_then(Value::as_object).cloned(),
        market_data: object.get("market_data").cloned(),
    })
}

fn merge_unique(into: &mut Vec<String>, extra: Vec<String>) {
    for item in extra {
        if !into.iter().any(|existing| existing.eq_ignore_ascii_case(&item)) {
            into.push(item);
        }
    }
}

/// Round down to a multiple of 100 rupees.
pub(crate) fn floor_hundred(amount: f64) -> f64 {
    (amount.max(0.0) / 100.0).floor() * 100.0
}

/// Two-decimal rounding for reported percentages.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{DisabledGenerator, ScriptedGenerator};
    use crate::profile::ProfileInputs;

    fn profile() -> FinancialProfile {
        FinancialProfile::from_inputs(ProfileInputs {
            monthly_income: 80935.0,
            monthly_expenses: 65000.0,
            liquid_assets: 150000.0,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_fallback_when_generation_unavailable() {
        let agent = SpecialistAgent::new(Specialist::CashFlow, Arc::new(DisabledGenerator));
        let message = agent.analyze("how can I save more", &profile()).await;

        assert_eq!(message.agent_id, "cash_flow_agent");
        assert_eq!(message.message_type, MessageType::Analysis);
        assert_eq!(message.confidence_level, ConfidenceLevel::Low);
        assert_eq!(message.supporting_data["fallback"], json!(true));
        assert!(message.content.contains("₹15,935"));
        assert!(message.dependencies.is_empty());
    }

    #[tokio::test]
    async fn test_unparsable_generation_falls_back() {
        let generator = ScriptedGenerator::fixed("I think you should save more.");
        let agent = SpecialistAgent::new(Specialist::CashFlow, Arc::new(generator));
        let message = agent.analyze("how can I save more", &profile()).await;

        assert_eq!(message.confidence_level, ConfidenceLevel::Low);
        assert_eq!(message.supporting_data["fallback"], json!(true));
    }

    #[tokio::test]
    async fn test_generated_analysis_keeps_precomputed_figures() {
        let generator = ScriptedGenerator::fixed(
            r#"Here you go: {"analysis": "Your surplus is healthy.",
                "recommendations": ["Automate a transfer of ₹5,000 on payday"],
                "key_metrics": {"savings_rate": 42.0}}"#,
        );
        let agent = SpecialistAgent::new(Specialist::CashFlow, Arc::new(generator));
        let message = agent.analyze("how can I save more", &profile()).await;

        assert_eq!(message.content, "Your surplus is healthy.");
        assert_eq!(message.confidence_level, ConfidenceLevel::High);
        let rate = message.supporting_data["calculations"]["savings_rate"]
            .as_f64()
            .unwrap();
        assert!((rate - 19.69).abs() < 0.01);
        assert_eq!(message.supporting_data["generated_metrics"]["savings_rate"], json!(42.0));
        assert!(message
            .data_list("recommendations")
            .contains(&"Automate a transfer of ₹5,000 on payday"));
    }

    #[test]
    fn test_roster_ids_unique() {
        let ids: std::collections::HashSet<_> =
            Specialist::ROSTER.iter().map(|s| s.agent_id()).collect();
        assert_eq!(ids.len(), 5);
        assert_eq!(Specialist::from_agent_id("debt_agent"), Some(Specialist::Debt));
    }

    #[test]
    fn test_floor_hundred() {
        assert_eq!(floor_hundred(7967.5), 7900.0);
        assert_eq!(floor_hundred(-20.0), 0.0);
    }
}
