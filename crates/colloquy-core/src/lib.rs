//! Agents, self-correcting generation, and the evidentiary gate for
//! colloquy.
//!
//! The memory tiers live in `colloquy-memory`; this crate owns everything
//! that decides what gets generated and what gets committed.

pub mod citation;
pub mod claims;
pub mod design;
pub mod error;
pub mod extract;
pub mod protocol;
pub mod researcher;
pub mod runtime;
pub mod state;
pub mod verdict;

/// Boundary-normalized paper and citation values.
pub use citation::{Citation, Paper};
/// Structured claim extraction with deterministic severity enforcement.
pub use claims::{Claim, ClaimExtractor, EpistemicCheck};
/// Study protocol designer.
pub use design::ProtocolDesigner;
/// Core error type.
pub use error::CoreError;
/// Tolerant structured-output extraction.
pub use extract::extract_json_list;
/// Draft/audit/refine state machine.
pub use protocol::{AttemptStatus, GenerationAttempt, critique_passes, self_correct};
/// Researcher agent.
pub use researcher::{
    BIBLIOGRAPHY_KEY, DISCUSSIONS_KEY, DiscussionOutcome, KNOWLEDGE_GRAPH_KEY, Researcher,
};
/// Simulation clock, checkpoints, and batch processing.
pub use runtime::{
    CHECKPOINT_KEY, Checkpoint, SimulationClock, build_team, load_checkpoint, process_batch,
    reflect_and_discuss, run_simulation, save_checkpoint,
};
/// Shared-state accessor and implementations.
pub use state::{JsonFileStateStore, MemoryStateStore, StateStore};
/// Evidentiary gate.
pub use verdict::{VerificationStatus, VerificationVerdict, parse_verdict};
