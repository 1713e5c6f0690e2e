//! Conversation phase state machine
//!
//! Pure decision logic with no I/O: given the current phase and the
//! accumulated context, decide the next phase and whether the conversation
//! has gathered enough to trigger content generation.

pub mod context;
pub mod phase;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use context::{AppendOnlySet, ContextDelta, ConversationContext, SkillLevel, TargetAudience};
pub use phase::Phase;
pub use transition::{next_phase, upstream_failure, PhaseDecision};
