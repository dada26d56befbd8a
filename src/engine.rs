//! Collaboration engine
//!
//! COMPILE → ROUTE → ORCHESTRATE → GUARD → VALIDATE → ASSEMBLE
//!
//! `process_user_query` is the single entry point. Everything below it
//! degrades to data; only an invalid request surfaces as `success: false`.

use crate::agents::{route_query, Specialist};
use crate::config::{EngineConfig, DEFAULT_MAX_ITERATIONS};
use crate::critic::{create_default_critic, CriticValidator, CRITIC_ID};
use crate::error::CollaborationError;
use crate::llm::TextGenerator;
use crate::loop_guard::LoopGuard;
use crate::models::{
    AgentDescriptor, AgentInsight, AgentMessage, CollaborationResponse, CollaborativeSession,
    MessageType, QueryRequest, RisksAndOpportunities, SessionContext, ValidationStatus,
};
use crate::orchestrator::{CoordinatorOrchestrator, ResolutionPolicy, COORDINATOR_ID};
use crate::profile::{
    assess_data_quality, format_currency, DataProvider, FinancialProfile, FinancialProfileCompiler,
};
use crate::Result;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Weight of the critic's confidence in the overall score; data quality takes the rest.
const CRITIC_WEIGHT: f64 = 0.7;

pub struct CollaborationEngine {
    compiler: FinancialProfileCompiler,
    orchestrator: CoordinatorOrchestrator,
    critic: CriticValidator,
    loop_guard: LoopGuard,
    max_iterations: u32,
}

impl CollaborationEngine {
    pub fn new(provider: Arc<dyn DataProvider>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            compiler: FinancialProfileCompiler::new(provider),
            orchestrator: CoordinatorOrchestrator::new(generator),
            critic: create_default_critic(),
            loop_guard: LoopGuard::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn from_config(
        config: &EngineConfig,
        provider: Arc<dyn DataProvider>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self::new(provider, generator)
            .with_policy(config.resolution_policy)
            .with_max_iterations(config.max_iterations)
    }

    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.orchestrator = self.orchestrator.with_policy(policy);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_critic(mut self, critic: CriticValidator) -> Self {
        self.critic = critic;
        self
    }

    pub async fn process_user_query(&self, request: QueryRequest) -> CollaborationResponse {
        let started = Instant::now();
        let session_id = request
            .session_id
            .clone()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(new_session_id);

        match self.try_process(&request, &session_id, started).await {
            Ok(response) => response,
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Query processing failed");
                failure_response(session_id, &e)
            }
        }
    }

    async fn try_process(
        &self,
        request: &QueryRequest,
        session_id: &str,
        started: Instant,
    ) -> Result<CollaborationResponse> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(CollaborationError::InvalidQuery("query is empty".to_string()));
        }
        if request.user_identifier.trim().is_empty() {
            return Err(CollaborationError::InvalidQuery(
                "user identifier is empty".to_string(),
            ));
        }

        info!(session_id = %session_id, query = %query, "Processing query");

        // === COMPILE ===
        let profile = Arc::new(self.compiler.compile(request.user_identifier.trim()).await);

        // === ROUTE ===
        let primary = route_query(query);
        info!(session_id = %session_id, primary = %primary, "Query routed");

        // === ORCHESTRATE ===
        let mut session = CollaborativeSession::new(
            session_id,
            query,
            SessionContext {
                profile: profile.clone(),
                primary_specialist: primary,
                prior_turns: request.prior_turns.clone(),
            },
            self.max_iterations,
        );
        self.orchestrator.run(&mut session).await;

        // === GUARD ===
        if !session.is_resolved() {
            let report = self.loop_guard.inspect(&session);
            if report.has_loop || session.final_recommendation().is_none() {
                warn!(
                    session_id = %session_id,
                    reasons = ?report.reasons,
                    iteration = session.current_iteration(),
                    "Forcing resolution"
                );
                self.loop_guard.resolve(&mut session);
            }
        }
        let loop_detected = session.is_resolved();

        // === VALIDATE ===
        let validation = self.critic.validate(session.messages(), &profile);

        let final_recommendation = if validation.validation_status
            == ValidationStatus::RequiresRevision
        {
            warn!(
                session_id = %session_id,
                critical = validation.critical_errors.len(),
                "Recommendation failed validation, using conservative summary"
            );
            safe_recommendation(&profile)
        } else {
            session
                .final_recommendation()
                .map(str::to_string)
                .unwrap_or_else(|| safe_recommendation(&profile))
        };

        // === ASSEMBLE ===
        let quality = assess_data_quality(&profile);
        let overall_confidence = overall_confidence(validation.confidence_score, quality.score);

        let mut statistics = extract_statistics(&session, &profile);
        statistics.insert(
            "processing_time_ms".into(),
            json!(started.elapsed().as_millis() as u64),
        );

        info!(
            session_id = %session_id,
            status = ?validation.validation_status,
            overall_confidence = overall_confidence,
            loop_detected = loop_detected,
            messages = session.messages().len(),
            "Query complete"
        );

        Ok(CollaborationResponse {
            success: true,
            session_id: session_id.to_string(),
            final_recommendation,
            statistics,
            agent_insights: agent_insights(session.messages()),
            recommendations: collect_unique(session.messages(), "recommendations", &[
                MessageType::Analysis,
                MessageType::Consensus,
            ]),
            risks_and_opportunities: RisksAndOpportunities {
                risks: collect_unique(session.messages(), "risks", &[MessageType::Analysis]),
                opportunities: collect_unique(
                    session.messages(),
                    "opportunities",
                    &[MessageType::Analysis],
                ),
            },
            validation: Some(validation),
            overall_confidence,
            data_quality: Some(quality),
            loop_detected,
            error: None,
            timestamp: Utc::now(),
        })
    }

    /// Every role taking part in a session.
    pub fn agent_roster(&self) -> Vec<AgentDescriptor> {
        let mut roster: Vec<AgentDescriptor> = Specialist::ROSTER
            .iter()
            .map(|s| AgentDescriptor {
                agent_id: s.agent_id(),
                name: s.display_name(),
                capabilities: s.capabilities().to_vec(),
                dependencies: s.dependencies().iter().map(|d| d.agent_id()).collect(),
            })
            .collect();

        roster.push(AgentDescriptor {
            agent_id: COORDINATOR_ID,
            name: "Coordinator",
            capabilities: vec!["conflict_resolution", "consensus_building", "final_synthesis"],
            dependencies: Specialist::ROSTER.iter().map(|s| s.agent_id()).collect(),
        });
        roster.push(AgentDescriptor {
            agent_id: CRITIC_ID,
            name: "Critic",
            capabilities: vec![
                "data_consistency",
                "contradiction_detection",
                "hallucination_detection",
            ],
            dependencies: Vec::new(),
        });
        roster
    }
}

fn new_session_id() -> String {
    format!("session_{}", Uuid::new_v4())
}

/// 0.7 × critic confidence + 0.3 × data quality, within 0-100, one decimal.
pub fn overall_confidence(critic_confidence: u8, data_quality: f64) -> f64 {
    let blended = CRITIC_WEIGHT * critic_confidence as f64 + (1.0 - CRITIC_WEIGHT) * data_quality;
    (blended.clamp(0.0, 100.0) * 10.0).round() / 10.0
}

/// Conservative text built only from profile figures.
pub fn safe_recommendation(profile: &FinancialProfile) -> String {
    if profile.monthly_income() <= 0.0 {
        return "We could not verify enough of your financial data to give a specific plan. \
                Keep essential spending and existing repayments unchanged, and connect your \
                bank and investment accounts so a full review can be done."
            .to_string();
    }
    format!(
        "We could not confirm every detail of the specialists' plan, so here is a conservative \
         view of your verified figures. Monthly income is {}, expenses are {}, leaving {}. Your \
         emergency reserve covers {:.1} months of expenses against a six-month target of {}. \
         Until the flagged issues are reviewed, keep existing commitments as they are and put \
         any surplus toward the emergency reserve first.",
        format_currency(profile.monthly_income()),
        format_currency(profile.monthly_expenses()),
        format_currency(profile.discretionary_income()),
        profile.emergency_fund_months,
        format_currency(profile.emergency_fund_target())
    )
}

fn failure_response(session_id: String, e: &CollaborationError) -> CollaborationResponse {
    CollaborationResponse {
        success: false,
        session_id,
        final_recommendation: "We could not process this question. Please check it and try \
                               again; no changes to your finances are suggested."
            .to_string(),
        validation: None,
        statistics: Map::new(),
        agent_insights: Vec::new(),
        recommendations: Vec::new(),
        risks_and_opportunities: RisksAndOpportunities::default(),
        overall_confidence: 0.0,
        data_quality: None,
        loop_detected: false,
        error: Some(e.to_string()),
        timestamp: Utc::now(),
    }
}

//
// ================= Extraction =================
//

fn agent_insights(messages: &[AgentMessage]) -> Vec<AgentInsight> {
    messages
        .iter()
        .filter(|m| m.message_type == MessageType::Analysis)
        .map(|m| AgentInsight {
            agent_id: m.agent_id.clone(),
            insight: m.content.clone(),
            confidence: m.confidence_level,
        })
        .collect()
}

/// List entries under `key`, first occurrence kept, log order preserved.
fn collect_unique(messages: &[AgentMessage], key: &str, types: &[MessageType]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for message in messages.iter().filter(|m| types.contains(&m.message_type)) {
        for item in message.data_list(key) {
            if !out.iter().any(|existing| existing.eq_ignore_ascii_case(item)) {
                out.push(item.to_string());
            }
        }
    }
    out
}

fn extract_statistics(session: &CollaborativeSession, profile: &FinancialProfile) -> Map<String, Value> {
    let mut financial_metrics = Map::new();
    for message in session
        .messages()
        .iter()
        .filter(|m| m.message_type == MessageType::Analysis)
    {
        if let Some(calculations) = message.supporting_data.get("calculations") {
            financial_metrics.insert(message.agent_id.clone(), calculations.clone());
        }
    }

    let figure = |agent: Specialist, key: &str| -> Value {
        financial_metrics
            .get(agent.agent_id())
            .and_then(|c| c.get(key))
            .cloned()
            .unwrap_or(Value::Null)
    };

    let performance_indicators = json!({
        "health_score": figure(Specialist::Health, "health_score"),
        "savings_rate": figure(Specialist::CashFlow, "savings_rate"),
        "investment_ratio": figure(Specialist::Investment, "investment_ratio"),
        "retirement_readiness": figure(Specialist::Wealth, "retirement_readiness"),
        "stability_score": profile.stability_score,
    });

    let risk_metrics = json!({
        "debt_to_income_ratio": profile.debt_to_income_ratio,
        "emergency_fund_months": profile.emergency_fund_months,
        "emergency_fund_tier": profile.emergency_fund_tier,
        "credit_score": profile.credit_score,
        "portfolio_performance": profile.portfolio_performance,
    });

    let collaboration = json!({
        "message_count": session.messages().len(),
        "iterations": session.current_iteration(),
        "phase": session.phase(),
        "primary_specialist": session.context().primary_specialist.agent_id(),
    });

    let mut statistics = Map::new();
    statistics.insert("financial_metrics".into(), Value::Object(financial_metrics));
    statistics.insert("performance_indicators".into(), performance_indicators);
    statistics.insert("risk_metrics".into(), risk_metrics);
    statistics.insert("collaboration".into(), collaboration);
    statistics.insert("profile_fingerprint".into(), json!(profile.fingerprint()));
    statistics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::DisabledGenerator;
    use crate::profile::{DataSource, StaticDataProvider};

    fn engine() -> CollaborationEngine {
        CollaborationEngine::new(
            Arc::new(StaticDataProvider::sample()),
            Arc::new(DisabledGenerator),
        )
    }

    #[tokio::test]
    async fn test_sample_query_end_to_end() {
        let response = engine()
            .process_user_query(QueryRequest::new("9999999999", "how can I save more"))
            .await;

        assert!(response.success);
        assert!(response.session_id.starts_with("session_"));
        assert!(!response.loop_detected);
        assert!(response.final_recommendation.starts_with("Savings and growth plan"));
        assert!(response.final_recommendation.contains("₹15,935"));

        let validation = response.validation.unwrap();
        assert_eq!(validation.validation_status, ValidationStatus::Approved);
        assert_eq!(validation.confidence_score, 80);
        assert!(response.overall_confidence > 80.0);

        assert_eq!(response.agent_insights.len(), 5);
        assert_eq!(response.agent_insights[0].agent_id, "cash_flow_agent");

        let savings_rate = response.statistics["performance_indicators"]["savings_rate"]
            .as_f64()
            .unwrap();
        assert!((savings_rate - 19.69).abs() < 0.01);
        assert!(response
            .recommendations
            .iter()
            .any(|r| r.starts_with("Prioritize the emergency fund")));
    }

    #[tokio::test]
    async fn test_same_data_same_fingerprint() {
        let engine = engine();
        let first = engine
            .process_user_query(QueryRequest::new("9999999999", "how can I save more"))
            .await;
        let second = engine
            .process_user_query(QueryRequest::new("9999999999", "how can I save more"))
            .await;
        assert_eq!(
            first.statistics["profile_fingerprint"],
            second.statistics["profile_fingerprint"]
        );
        assert_ne!(first.session_id, second.session_id);
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let response = engine()
            .process_user_query(QueryRequest::new("9999999999", "   "))
            .await;

        assert!(!response.success);
        assert!(response.error.unwrap().contains("query is empty"));
        assert!(!response.final_recommendation.is_empty());
    }

    #[tokio::test]
    async fn test_provided_session_id_is_kept() {
        let mut request = QueryRequest::new("9999999999", "Should I increase my SIP?");
        request.session_id = Some("chat-42".to_string());

        let response = engine().process_user_query(request).await;
        assert_eq!(response.session_id, "chat-42");
        assert_eq!(response.agent_insights[0].agent_id, "investment_agent");
    }

    #[tokio::test]
    async fn test_iteration_cap_forces_resolution() {
        let response = engine()
            .with_max_iterations(2)
            .process_user_query(QueryRequest::new("9999999999", "how can I save more"))
            .await;

        assert!(response.success);
        assert!(response.loop_detected);

        // proposal and challenge were never reconciled
        let validation = response.validation.unwrap();
        assert_eq!(validation.validation_status, ValidationStatus::RequiresRevision);
        assert!(response.final_recommendation.contains("₹80,935"));
        assert!(response.final_recommendation.starts_with("We could not confirm"));
    }

    #[tokio::test]
    async fn test_growth_first_policy_override() {
        let response = engine()
            .with_policy(ResolutionPolicy::GrowthFirst)
            .process_user_query(QueryRequest::new("9999999999", "Should I increase my SIP?"))
            .await;

        assert!(response.success);
        assert!(response
            .recommendations
            .iter()
            .any(|r| r.starts_with("Increase the monthly SIP by ₹7,500 now")));
    }

    #[tokio::test]
    async fn test_partial_provider_failure_still_answers() {
        let provider = StaticDataProvider::sample().failing(DataSource::CreditReport);
        let engine = CollaborationEngine::new(Arc::new(provider), Arc::new(DisabledGenerator));

        let response = engine
            .process_user_query(QueryRequest::new("9999999999", "how can I save more"))
            .await;

        assert!(response.success);
        let quality = response.data_quality.unwrap();
        assert!(quality.score < 100.0);
    }

    #[test]
    fn test_overall_confidence_blend() {
        assert_eq!(overall_confidence(80, 100.0), 86.0);
        assert_eq!(overall_confidence(0, 10.0), 3.0);
    }

    #[test]
    fn test_roster_lists_every_role() {
        let roster = engine().agent_roster();
        assert_eq!(roster.len(), 7);
        assert!(roster.iter().any(|a| a.agent_id == COORDINATOR_ID));
        assert!(roster.iter().any(|a| a.agent_id == CRITIC_ID));
    }
}
