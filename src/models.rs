//! Core data models for the collaboration pipeline

use crate::agents::Specialist;
use crate::error::CollaborationError;
use crate::profile::{DataQualityReport, FinancialProfile};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    Analysis,
    Proposal,
    Challenge,
    Consensus,
    Validation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    fn rank(&self) -> u8 {
        match self {
            ConfidenceLevel::Low => 0,
            ConfidenceLevel::Medium => 1,
            ConfidenceLevel::High => 2,
        }
    }

    /// Bucket a 0-1 confidence score.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.75 {
            ConfidenceLevel::High
        } else if score >= 0.5 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

impl PartialOrd for ConfidenceLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ConfidenceLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    InitialAnalysis,
    Collaboration,
    ConsensusBuilding,
    FinalSynthesis,
}

impl SessionPhase {
    pub const ORDER: [SessionPhase; 4] = [
        SessionPhase::InitialAnalysis,
        SessionPhase::Collaboration,
        SessionPhase::ConsensusBuilding,
        SessionPhase::FinalSynthesis,
    ];

    pub fn next(&self) -> Option<SessionPhase> {
        match self {
            SessionPhase::InitialAnalysis => Some(SessionPhase::Collaboration),
            SessionPhase::Collaboration => Some(SessionPhase::ConsensusBuilding),
            SessionPhase::ConsensusBuilding => Some(SessionPhase::FinalSynthesis),
            SessionPhase::FinalSynthesis => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::InitialAnalysis => "initial_analysis",
            SessionPhase::Collaboration => "collaboration",
            SessionPhase::ConsensusBuilding => "consensus_building",
            SessionPhase::FinalSynthesis => "final_synthesis",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ================= Agent Messages =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub agent_id: String,
    pub message_type: MessageType,
    pub content: String,
    /// Numeric claims, recommendation/risk/opportunity lists
    pub supporting_data: Map<String, Value>,
    pub confidence_level: ConfidenceLevel,
    /// Agent ids this message cites
    pub dependencies: Vec<String>,
    pub timestamp: DateTime<Utc>,
    /// Stamped by the session when the message is recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<SessionPhase>,
}

impl AgentMessage {
    pub fn new(
        agent_id: impl Into<String>,
        message_type: MessageType,
        content: impl Into<String>,
        confidence_level: ConfidenceLevel,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            message_type,
            content: content.into(),
            supporting_data: Map::new(),
            confidence_level,
            dependencies: Vec::new(),
            timestamp: Utc::now(),
            phase: None,
        }
    }

    pub fn with_data(mut self, key: &str, value: Value) -> Self {
        self.supporting_data.insert(key.to_string(), value);
        self
    }

    pub fn with_supporting_data(mut self, data: Map<String, Value>) -> Self {
        self.supporting_data.extend(data);
        self
    }

    pub fn citing(mut self, agent_id: impl Into<String>) -> Self {
        self.dependencies.push(agent_id.into());
        self
    }

    /// String entries of a list-valued supporting-data key.
    pub fn data_list(&self, key: &str) -> Vec<&str> {
        self.supporting_data
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Numeric claim by key, looked up at the top level and then under `calculations`.
    pub fn numeric_claim(&self, key: &str) -> Option<f64> {
        self.supporting_data
            .get(key)
            .and_then(Value::as_f64)
            .or_else(|| {
                self.supporting_data
                    .get("calculations")
                    .and_then(|c| c.get(key))
                    .and_then(Value::as_f64)
            })
    }

    /// Every value claimed for `key`: top level, `calculations` and `generated_metrics`.
    pub fn numeric_claims(&self, key: &str) -> Vec<f64> {
        let top = self.supporting_data.get(key).and_then(Value::as_f64);
        let nested = ["calculations", "generated_metrics"].iter().map(|section| {
            self.supporting_data
                .get(*section)
                .and_then(|c| c.get(key))
                .and_then(Value::as_f64)
        });
        std::iter::once(top).chain(nested).flatten().collect()
    }

    /// Content plus recommendation text, lowercased.
    pub fn searchable_text(&self) -> String {
        let mut text = self.content.to_lowercase();
        for item in self.data_list("recommendations") {
            text.push('\n');
            text.push_str(&item.to_lowercase());
        }
        text
    }
}

//
// ================= Session =================
//

/// Read-only context shared by every phase of one query.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub profile: Arc<FinancialProfile>,
    pub primary_specialist: Specialist,
    pub prior_turns: Vec<String>,
}

/// Iteration value marking a session the loop guard has resolved.
pub const RESOLVED_ITERATION: u32 = u32::MAX;

/// Working state of one query. Single writer: the orchestrator during the
/// four phases, then the loop guard if it has to force a resolution.
#[derive(Debug, Clone)]
pub struct CollaborativeSession {
    pub session_id: String,
    pub query: String,
    messages: Vec<AgentMessage>,
    phase: SessionPhase,
    current_iteration: u32,
    max_iterations: u32,
    final_recommendation: Option<String>,
    context: SessionContext,
}

impl CollaborativeSession {
    pub fn new(
        session_id: impl Into<String>,
        query: impl Into<String>,
        context: SessionContext,
        max_iterations: u32,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            query: query.into(),
            messages: Vec::new(),
            phase: SessionPhase::InitialAnalysis,
            current_iteration: 0,
            max_iterations,
            final_recommendation: None,
            context,
        }
    }

    pub fn messages(&self) -> &[AgentMessage] {
        &self.messages
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn current_iteration(&self) -> u32 {
        self.current_iteration
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn final_recommendation(&self) -> Option<&str> {
        self.final_recommendation.as_deref()
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn profile(&self) -> &FinancialProfile {
        &self.context.profile
    }

    pub fn is_resolved(&self) -> bool {
        self.current_iteration == RESOLVED_ITERATION
    }

    /// Append a message, stamping it with the current phase.
    pub fn record(&mut self, mut message: AgentMessage) {
        message.phase = Some(self.phase);
        self.messages.push(message);
    }

    /// Enter `phase`. Phases run strictly forward, one step at a time, and
    /// every entry counts one iteration against the cap.
    pub fn begin_phase(&mut self, phase: SessionPhase) -> Result<()> {
        if self.is_resolved() {
            return Err(CollaborationError::Protocol(
                "session already resolved".to_string(),
            ));
        }

        let expected = if self.current_iteration == 0 {
            Some(SessionPhase::InitialAnalysis)
        } else {
            self.phase.next()
        };

        if expected != Some(phase) {
            return Err(CollaborationError::Protocol(format!(
                "cannot enter {} from {} (iteration {})",
                phase, self.phase, self.current_iteration
            )));
        }

        if self.current_iteration >= self.max_iterations {
            return Err(CollaborationError::IterationCapReached(self.current_iteration));
        }

        self.phase = phase;
        self.current_iteration += 1;
        Ok(())
    }

    pub fn set_final_recommendation(&mut self, text: String) {
        self.final_recommendation = Some(text);
    }

    /// Terminal resolution: no further phases may run.
    pub fn mark_resolved(&mut self, text: String) {
        self.final_recommendation = Some(text);
        self.current_iteration = RESOLVED_ITERATION;
    }

    #[cfg(test)]
    pub(crate) fn force_iteration(&mut self, iteration: u32) {
        self.current_iteration = iteration;
    }
}

//
// ================= Validation =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Approved,
    NeedsClarification,
    RequiresRevision,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum IssueCategory {
    #[serde(rename = "Data Inconsistency")]
    DataInconsistency,
    #[serde(rename = "Logical Contradiction")]
    LogicalContradiction,
    #[serde(rename = "Unrealistic Assumption")]
    UnrealisticAssumption,
    #[serde(rename = "Missing Risk Assessment")]
    MissingRiskAssessment,
    #[serde(rename = "Lack of Specificity")]
    LackOfSpecificity,
    #[serde(rename = "Missing Timeline")]
    MissingTimeline,
    #[serde(rename = "Validation Error")]
    ValidatorFailure,
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IssueCategory::DataInconsistency => "Data Inconsistency",
            IssueCategory::LogicalContradiction => "Logical Contradiction",
            IssueCategory::UnrealisticAssumption => "Unrealistic Assumption",
            IssueCategory::MissingRiskAssessment => "Missing Risk Assessment",
            IssueCategory::LackOfSpecificity => "Lack of Specificity",
            IssueCategory::MissingTimeline => "Missing Timeline",
            IssueCategory::ValidatorFailure => "Validation Error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationError {
    pub category: IssueCategory,
    pub description: String,
    /// Agent id the issue was found in
    pub location: String,
    pub impact: Severity,
    pub suggested_correction: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HallucinationKind {
    UnsupportedMarketClaim,
    UnrealisticProjection,
    MissingDomainData,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HallucinationFlag {
    #[serde(rename = "type")]
    pub kind: HallucinationKind,
    pub description: String,
    pub severity: Severity,
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub validation_status: ValidationStatus,
    pub confidence_score: u8,
    pub critical_errors: Vec<ValidationError>,
    pub moderate_concerns: Vec<ValidationError>,
    pub minor_suggestions: Vec<ValidationError>,
    pub hallucination_flags: Vec<HallucinationFlag>,
    pub overall_assessment: String,
}

impl ValidationResult {
    pub fn is_approved(&self) -> bool {
        self.validation_status == ValidationStatus::Approved
    }
}

//
// ================= Query / Response =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub user_identifier: String,
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Earlier turns of the same conversation, oldest first
    #[serde(default)]
    pub prior_turns: Vec<String>,
}

impl QueryRequest {
    pub fn new(user_identifier: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            user_identifier: user_identifier.into(),
            query: query.into(),
            session_id: None,
            prior_turns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInsight {
    pub agent_id: String,
    pub insight: String,
    pub confidence: ConfidenceLevel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RisksAndOpportunities {
    pub risks: Vec<String>,
    pub opportunities: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollaborationResponse {
    pub success: bool,
    pub session_id: String,
    pub final_recommendation: String,
    pub validation: Option<ValidationResult>,
    pub statistics: Map<String, Value>,
    pub agent_insights: Vec<AgentInsight>,
    pub recommendations: Vec<String>,
    pub risks_and_opportunities: RisksAndOpportunities,
    /// 0-100 blend of critic confidence and data quality
    pub overall_confidence: f64,
    pub data_quality: Option<DataQualityReport>,
    pub loop_detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Roster entry describing one agent role.
#[derive(Debug, Clone, Serialize)]
pub struct AgentDescriptor {
    pub agent_id: &'static str,
    pub name: &'static str,
    pub capabilities: Vec<&'static str>,
    pub dependencies: Vec<&'static str>,
}
