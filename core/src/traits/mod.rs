pub mod data;
pub mod provider;
pub mod tool;

pub use data::DataSource;
pub use provider::{ChatMessage, ChatRequest, ChatResponse, Provider, ToolCall};
pub use tool::{ParamKind, ParamSpec, ToolResult, ToolSpec};
