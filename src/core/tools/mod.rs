//! Function-calling tools exposed to the realtime model.

pub mod calc_sum;
pub mod registry;

pub use calc_sum::{CALC_SUM_NAME, CalcSum};
pub use registry::{
    ToolDefinition, ToolError, ToolHandler, ToolInvocation, ToolOutcome, ToolRegistry, ToolResult,
};
