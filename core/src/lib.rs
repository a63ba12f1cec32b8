pub mod agent;
pub mod config;
pub mod data;
pub mod error;
pub mod providers;
pub mod table;
pub mod tools;
pub mod traits;

pub use agent::{
    AgentLoop, ContextBuilder, ConversationState, CostEstimate, CostTracker, QueryOutcome,
    RetryPolicy, ToolRegistry, UsageTally, ValidatedArgs,
};
pub use config::*;
pub use data::{LocalDataSource, MemoryDataSource, TableCache};
pub use error::{AgentError, DataAccessError, ProviderError, ValidationError};
pub use providers::*;
pub use table::{CellValue, ColumnType, Table};
pub use tools::{ToolArgs, ToolExecutor};
pub use traits::*;
