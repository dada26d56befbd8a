//! Loop guard
//!
//! Inspects a session's message log for runaway repetition and forces a
//! terminal resolution built from the strongest message recorded so far.

use crate::models::{AgentMessage, CollaborativeSession};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

pub const MAX_MESSAGES_PER_AGENT: usize = 3;
pub const MAX_ITERATIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum LoopReason {
    RepeatedAuthor { agent_id: String, count: usize },
    DuplicateDependencies { distinct: usize, total: usize },
    IterationOverrun { iteration: u32 },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoopReport {
    pub has_loop: bool,
    pub reasons: Vec<LoopReason>,
}

#[derive(Debug, Clone)]
pub struct LoopGuard {
    max_messages_per_agent: usize,
    max_iterations: u32,
}

impl Default for LoopGuard {
    fn default() -> Self {
        Self {
            max_messages_per_agent: MAX_MESSAGES_PER_AGENT,
            max_iterations: MAX_ITERATIONS,
        }
    }
}

impl LoopGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inspect(&self, session: &CollaborativeSession) -> LoopReport {
        let messages = session.messages();
        let mut reasons = Vec::new();

        let mut authored: HashMap<&str, usize> = HashMap::new();
        for message in messages {
            *authored.entry(message.agent_id.as_str()).or_insert(0) += 1;
        }
        let mut repeated: Vec<_> = authored
            .into_iter()
            .filter(|(_, count)| *count > self.max_messages_per_agent)
            .collect();
        repeated.sort();
        for (agent_id, count) in repeated {
            reasons.push(LoopReason::RepeatedAuthor {
                agent_id: agent_id.to_string(),
                count,
            });
        }

        let references: Vec<&str> = messages
            .iter()
            .flat_map(|m| m.dependencies.iter().map(String::as_str))
            .collect();
        let distinct: HashSet<&str> = references.iter().copied().collect();
        if distinct.len() < references.len() {
            reasons.push(LoopReason::DuplicateDependencies {
                distinct: distinct.len(),
                total: references.len(),
            });
        }

        // a resolved session carries the sentinel, not a real count
        if !session.is_resolved() && session.current_iteration() > self.max_iterations {
            reasons.push(LoopReason::IterationOverrun {
                iteration: session.current_iteration(),
            });
        }

        LoopReport {
            has_loop: !reasons.is_empty(),
            reasons,
        }
    }

    /// Write the fallback recommendation and mark the session resolved.
    pub fn resolve(&self, session: &mut CollaborativeSession) {
        let text = match best_message(session.messages()) {
            Some(best) => {
                info!(
                    session_id = %session.session_id,
                    agent_id = %best.agent_id,
                    confidence = ?best.confidence_level,
                    "Resolving session from strongest message"
                );
                format!("Based on the available analysis: {}", best.content)
            }
            None => {
                warn!(session_id = %session.session_id, "Resolving session with no messages");
                "Based on the available analysis, no specialist produced a recommendation for \
                 this question. Keep essential spending and existing commitments unchanged, and \
                 ask again once your financial data is available."
                    .to_string()
            }
        };
        session.mark_resolved(text);
    }
}

/// Highest confidence wins; among equals the most recent.
pub fn best_message(messages: &[AgentMessage]) -> Option<&AgentMessage> {
    // max_by_key returns the last of several equal maxima
    messages.iter().max_by_key(|m| m.confidence_level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Specialist;
    use crate::models::{ConfidenceLevel, MessageType, SessionContext, RESOLVED_ITERATION};
    use crate::profile::FinancialProfile;
    use std::sync::Arc;

    fn session() -> CollaborativeSession {
        CollaborativeSession::new(
            "session_test",
            "how can I save more",
            SessionContext {
                profile: Arc::new(FinancialProfile::unknown()),
                primary_specialist: Specialist::CashFlow,
                prior_turns: vec![],
            },
            4,
        )
    }

    fn message(agent_id: &str, content: &str, confidence: ConfidenceLevel) -> AgentMessage {
        AgentMessage::new(agent_id, MessageType::Analysis, content, confidence)
    }

    #[test]
    fn test_repeated_author_is_a_loop() {
        let mut s = session();
        for i in 0..4 {
            s.record(message("cash_flow_agent", &format!("pass {}", i), ConfidenceLevel::Medium));
        }

        let guard = LoopGuard::new();
        let report = guard.inspect(&s);
        assert!(report.has_loop);
        assert_eq!(
            report.reasons,
            vec![LoopReason::RepeatedAuthor {
                agent_id: "cash_flow_agent".to_string(),
                count: 4
            }]
        );

        guard.resolve(&mut s);
        assert!(s.final_recommendation().is_some());
        assert_eq!(s.current_iteration(), RESOLVED_ITERATION);
    }

    #[test]
    fn test_three_messages_per_agent_is_fine() {
        let mut s = session();
        for _ in 0..3 {
            s.record(message("debt_agent", "ok", ConfidenceLevel::Medium));
        }
        assert!(!LoopGuard::new().inspect(&s).has_loop);
    }

    #[test]
    fn test_duplicate_dependencies() {
        let mut s = session();
        s.record(message("cash_flow_agent", "a", ConfidenceLevel::High).citing("investment_agent"));
        s.record(message("debt_agent", "b", ConfidenceLevel::High).citing("investment_agent"));

        let report = LoopGuard::new().inspect(&s);
        assert!(report.has_loop);
        assert_eq!(
            report.reasons,
            vec![LoopReason::DuplicateDependencies { distinct: 1, total: 2 }]
        );
    }

    #[test]
    fn test_iteration_overrun() {
        let mut s = session();
        s.force_iteration(6);
        let report = LoopGuard::new().inspect(&s);
        assert_eq!(report.reasons, vec![LoopReason::IterationOverrun { iteration: 6 }]);
    }

    #[test]
    fn test_resolved_sentinel_is_not_an_overrun() {
        let mut s = session();
        LoopGuard::new().resolve(&mut s);
        assert!(!LoopGuard::new().inspect(&s).has_loop);
    }

    #[test]
    fn test_best_message_prefers_most_recent_on_tie() {
        let messages = vec![
            message("cash_flow_agent", "first", ConfidenceLevel::High),
            message("debt_agent", "low", ConfidenceLevel::Low),
            message("wealth_agent", "second", ConfidenceLevel::High),
        ];
        assert_eq!(best_message(&messages).unwrap().content, "second");
    }

    #[test]
    fn test_resolve_without_messages() {
        let mut s = session();
        LoopGuard::new().resolve(&mut s);
        assert!(s
            .final_recommendation()
            .unwrap()
            .starts_with("Based on the available analysis"));
    }
}
