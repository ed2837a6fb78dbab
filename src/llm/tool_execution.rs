mod agent_loop;
mod dispatch;

pub use agent_loop::{AgentError, AgentEvent, ChatAgent, DEFAULT_MAX_TOOL_ROUNDS, TurnOutcome};
pub use dispatch::{ToolInvoker, ToolResult};
