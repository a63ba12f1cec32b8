pub mod context;
pub mod conversation;
pub mod cost;
pub mod loop_;
pub mod registry;
pub mod retry;

pub use context::ContextBuilder;
pub use conversation::{ConversationState, UsageTally};
pub use cost::{CostEstimate, CostTracker};
pub use loop_::{AgentLoop, DEFAULT_MAX_ITERATIONS, QueryOutcome};
pub use registry::{ToolRegistry, ValidatedArgs};
pub use retry::RetryPolicy;
