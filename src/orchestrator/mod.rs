//! Coordinator orchestrator
//!
//! Drives one session through initial analysis, collaboration, consensus
//! building and final synthesis. Phase errors stay local: the phase falls
//! back to the best content already on the log and the protocol moves on.

pub mod policy;
pub mod synthesis;

pub use policy::{Conflict, Resolution, ResolutionOutcome, ResolutionPolicy};

use crate::agents::{ProposalKind, Specialist, SpecialistAgent};
use crate::error::CollaborationError;
use crate::llm::TextGenerator;
use crate::loop_guard::{best_message, LoopGuard};
use crate::models::{AgentMessage, CollaborativeSession, ConfidenceLevel, MessageType, SessionPhase};
use crate::Result;
use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const COORDINATOR_ID: &str = "coordinator_agent";

pub struct CoordinatorOrchestrator {
    specialists: Vec<SpecialistAgent>,
    policy: ResolutionPolicy,
    loop_guard: LoopGuard,
}

impl CoordinatorOrchestrator {
    /// Full five-role roster sharing one generator.
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        let specialists = Specialist::ROSTER
            .iter()
            .map(|kind| SpecialistAgent::new(*kind, generator.clone()))
            .collect();
        Self::with_specialists(specialists)
    }

    pub fn with_specialists(specialists: Vec<SpecialistAgent>) -> Self {
        Self {
            specialists,
            policy: ResolutionPolicy::default(),
            loop_guard: LoopGuard::default(),
        }
    }

    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ResolutionPolicy {
        self.policy
    }

    fn has_specialist(&self, kind: Specialist) -> bool {
        self.specialists.iter().any(|s| s.kind() == kind)
    }

    pub async fn run(&self, session: &mut CollaborativeSession) {
        for phase in SessionPhase::ORDER {
            if let Err(e) = session.begin_phase(phase) {
                warn!(
                    session_id = %session.session_id,
                    phase = %phase,
                    iteration = session.current_iteration(),
                    error = %e,
                    "Stopping protocol"
                );
                return;
            }

            info!(
                session_id = %session.session_id,
                phase = %phase,
                iteration = session.current_iteration(),
                "Entering phase"
            );

            let outcome = match phase {
                SessionPhase::InitialAnalysis => self.initial_analysis(session).await,
                SessionPhase::Collaboration => self.collaborate(session),
                SessionPhase::ConsensusBuilding => self.build_consensus(session),
                SessionPhase::FinalSynthesis => self.final_synthesis(session),
            };

            if let Err(e) = outcome {
                warn!(
                    session_id = %session.session_id,
                    phase = %phase,
                    error = %e,
                    "Phase failed, falling back to prior content"
                );
                self.fall_back(session, phase);
            }

            if phase == SessionPhase::Collaboration {
                let report = self.loop_guard.inspect(session);
                if report.has_loop {
                    warn!(
                        session_id = %session.session_id,
                        reasons = ?report.reasons,
                        "Loop detected during collaboration"
                    );
                    self.loop_guard.resolve(session);
                    return;
                }
            }
        }
    }

    //
    // ================= Phase 1 =================
    //

    async fn initial_analysis(&self, session: &mut CollaborativeSession) -> Result<()> {
        if self.specialists.is_empty() {
            return Err(CollaborationError::Protocol(
                "no specialists registered".to_string(),
            ));
        }

        let profile = session.context().profile.clone();
        let primary = session.context().primary_specialist;
        let query = agent_query(session);

        // primary first, the rest in roster order
        let mut ordered: Vec<&SpecialistAgent> = self
            .specialists
            .iter()
            .filter(|s| s.kind() == primary)
            .collect();
        ordered.extend(self.specialists.iter().filter(|s| s.kind() != primary));

        let messages = join_all(
            ordered
                .iter()
                .map(|agent| agent.analyze(&query, profile.as_ref())),
        )
        .await;

        for message in messages {
            debug!(
                session_id = %session.session_id,
                agent_id = %message.agent_id,
                confidence = ?message.confidence_level,
                "Analysis recorded"
            );
            session.record(message);
        }
        Ok(())
    }

    //
    // ================= Phase 2 =================
    //

    fn collaborate(&self, session: &mut CollaborativeSession) -> Result<()> {
        let analysed = session
            .messages()
            .iter()
            .any(|m| m.message_type == MessageType::Analysis);
        if !analysed {
            return Err(CollaborationError::Protocol(
                "no analyses to collaborate on".to_string(),
            ));
        }

        let profile = session.context().profile.clone();

        for agent in &self.specialists {
            let Some(proposal) = agent.kind().propose(&profile) else {
                continue;
            };

            let challenge = proposal
                .proposer
                .dependencies()
                .iter()
                .filter(|c| self.has_specialist(**c))
                .find_map(|c| {
                    c.challenge(&proposal, &profile)
                        .map(|ch| ch.into_message(*c, &proposal))
                });

            info!(
                session_id = %session.session_id,
                agent_id = %proposal.proposer,
                proposal = proposal.kind.as_str(),
                challenged = challenge.is_some(),
                "Proposal raised"
            );

            session.record(proposal.into_message());
            if let Some(message) = challenge {
                session.record(message);
            }
        }
        Ok(())
    }

    //
    // ================= Phase 3 =================
    //

    fn build_consensus(&self, session: &mut CollaborativeSession) -> Result<()> {
        let conflicts = conflicts_from(session.messages())?;
        let challenged: Vec<(String, ProposalKind)> = conflicts
            .iter()
            .map(|c| (c.proposer.clone(), c.proposal_kind))
            .collect();

        let accepted: Vec<String> = session
            .messages()
            .iter()
            .filter(|m| m.message_type == MessageType::Proposal)
            .filter(|m| {
                let kind = proposal_kind_of(m);
                !challenged
                    .iter()
                    .any(|(proposer, k)| *proposer == m.agent_id && Some(*k) == kind)
            })
            .map(|m| m.content.clone())
            .collect();

        let resolutions: Vec<Resolution> =
            conflicts.iter().map(|c| self.policy.resolve(c)).collect();

        let mut plan: Vec<String> = resolutions.iter().map(|r| r.plan_step.clone()).collect();
        plan.extend(accepted.iter().cloned());

        let content = if resolutions.is_empty() {
            if accepted.is_empty() {
                format!(
                    "Resolution policy: {}. No proposals were raised; the specialist analyses \
                     stand as written.",
                    self.policy.statement()
                )
            } else {
                format!(
                    "Resolution policy: {}. No conflicting proposals. Agreed: {}",
                    self.policy.statement(),
                    accepted.join(" ")
                )
            }
        } else {
            let steps: Vec<&str> = plan.iter().map(|s| s.trim_end_matches('.')).collect();
            format!(
                "Resolution policy: {}. {}.",
                self.policy.statement(),
                steps.join(". ")
            )
        };

        let resolved: Vec<Value> = resolutions
            .iter()
            .zip(&conflicts)
            .map(|(r, c)| {
                json!({
                    "proposer": r.proposer,
                    "challenger": r.challenger,
                    "proposal": c.proposal_kind.as_str(),
                    "outcome": r.outcome,
                })
            })
            .collect();

        let priority_order = match self.policy {
            ResolutionPolicy::RiskMitigationFirst => json!(["risk_mitigation", "growth"]),
            ResolutionPolicy::GrowthFirst => json!(["growth", "risk_mitigation"]),
        };

        let confidence = if resolutions.is_empty() {
            ConfidenceLevel::High
        } else {
            ConfidenceLevel::Medium
        };

        info!(
            session_id = %session.session_id,
            policy = self.policy.as_str(),
            conflicts = resolutions.len(),
            accepted = accepted.len(),
            "Consensus formed"
        );

        session.record(
            AgentMessage::new(COORDINATOR_ID, MessageType::Consensus, content, confidence)
                .with_data("policy", json!(self.policy.statement()))
                .with_data("resolved_conflicts", Value::Array(resolved))
                .with_data("priority_order", priority_order)
                .with_data("recommendations", json!(plan)),
        );
        Ok(())
    }

    //
    // ================= Phase 4 =================
    //

    fn final_synthesis(&self, session: &mut CollaborativeSession) -> Result<()> {
        let text = synthesis::synthesize(session)?;
        session.set_final_recommendation(text);
        Ok(())
    }

    fn fall_back(&self, session: &mut CollaborativeSession, phase: SessionPhase) {
        match phase {
            SessionPhase::InitialAnalysis | SessionPhase::Collaboration => {}
            SessionPhase::ConsensusBuilding => {
                if let Some(best) = best_message(session.messages()) {
                    let message = AgentMessage::new(
                        COORDINATOR_ID,
                        MessageType::Consensus,
                        format!(
                            "Resolution policy: {}. No consensus could be formed; carrying \
                             forward the strongest analysis ({}): {}",
                            self.policy.statement(),
                            best.agent_id,
                            best.content
                        ),
                        ConfidenceLevel::Low,
                    )
                    .with_data("policy", json!(self.policy.statement()))
                    .with_data("fallback", json!(true));
                    session.record(message);
                }
            }
            SessionPhase::FinalSynthesis => {
                if let Some(best) = best_message(session.messages()) {
                    let text = format!("Based on the available analysis: {}", best.content);
                    session.set_final_recommendation(text);
                }
            }
        }
    }
}

/// The query as specialists see it, with earlier turns folded in.
fn agent_query(session: &CollaborativeSession) -> String {
    let prior = &session.context().prior_turns;
    if prior.is_empty() {
        return session.query.clone();
    }
    format!(
        "Earlier in this conversation:\n{}\n\nCurrent question: {}",
        prior.join("\n"),
        session.query
    )
}

fn proposal_kind_of(message: &AgentMessage) -> Option<ProposalKind> {
    message
        .supporting_data
        .get("proposal_kind")
        .and_then(Value::as_str)
        .and_then(ProposalKind::parse)
}

/// Pair every CHALLENGE with the PROPOSAL it cites.
fn conflicts_from(messages: &[AgentMessage]) -> Result<Vec<Conflict>> {
    let mut conflicts = Vec::new();

    for challenge in messages
        .iter()
        .filter(|m| m.message_type == MessageType::Challenge)
    {
        let proposer = challenge.dependencies.first().ok_or_else(|| {
            CollaborationError::Protocol(format!(
                "challenge from {} cites no proposer",
                challenge.agent_id
            ))
        })?;

        let kind = challenge
            .supporting_data
            .get("challenged_proposal")
            .and_then(Value::as_str)
            .and_then(ProposalKind::parse)
            .ok_or_else(|| {
                CollaborationError::Protocol(format!(
                    "challenge from {} names no proposal",
                    challenge.agent_id
                ))
            })?;

        let proposal = messages
            .iter()
            .find(|m| {
                m.message_type == MessageType::Proposal
                    && &m.agent_id == proposer
                    && proposal_kind_of(m) == Some(kind)
            })
            .ok_or_else(|| {
                CollaborationError::Protocol(format!(
                    "challenge from {} targets a missing {} proposal",
                    challenge.agent_id,
                    kind.as_str()
                ))
            })?;

        conflicts.push(Conflict {
            proposer: proposer.clone(),
            proposal_kind: kind,
            proposal_amount: proposal.numeric_claim("proposed_amount").unwrap_or(0.0),
            challenger: challenge.agent_id.clone(),
            action: challenge
                .supporting_data
                .get("action")
                .and_then(Value::as_str)
                .unwrap_or("risk_mitigation")
                .to_string(),
            challenge_amount: challenge.numeric_claim("amount").unwrap_or(0.0),
            duration_months: challenge
                .supporting_data
                .get("duration_months")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32,
        });
    }
    Ok(conflicts)
}
