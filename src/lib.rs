//! Financial Collaboration Engine
//!
//! Five specialist agents analyse one compiled financial profile, challenge
//! each other's proposals and converge on a single recommendation that a
//! rule-based critic scores before it leaves the engine.
//!
//! PIPELINE:
//! COMPILE → ANALYZE → COLLABORATE → CONSENSUS → SYNTHESIZE → GUARD → VALIDATE

pub mod agents;
pub mod api;
pub mod config;
pub mod critic;
pub mod engine;
pub mod error;
pub mod llm;
pub mod loop_guard;
pub mod memory;
pub mod models;
pub mod orchestrator;
pub mod profile;

pub use error::Result;
pub use engine::CollaborationEngine;

// Re-export common types
pub use models::*;
