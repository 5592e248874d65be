//! Agent logic for toolpilot
//!
//! This crate provides the skill catalog and router, context assembly, the
//! streaming tool-calling loop and the chat service that ties them together.

pub mod agent_loop;
pub mod context;
pub mod router;
pub mod service;
pub mod sink;
pub mod skills;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use agent_loop::{
    AgentLoop, LoopConfig, LoopOutcome, LoopState, LoopStatus, ToolCallAccumulator,
    NO_ANSWER_MESSAGE,
};
pub use context::{ContextAssembler, DEFAULT_INSTRUCTIONS};
pub use router::SkillRouter;
pub use service::ChatService;
pub use sink::{EventSink, NullSink, RecordingSink};
pub use skills::{Skill, SkillCatalog};
pub use toolpilot_core::AgentEvent;
