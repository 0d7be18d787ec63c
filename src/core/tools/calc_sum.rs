//! `calc_sum`: adds two integers supplied as strings.

use serde_json::json;

use super::registry::{ToolDefinition, ToolError, ToolHandler, ToolInvocation, ToolOutcome};

pub const CALC_SUM_NAME: &str = "calc_sum";

const FOLLOW_UP: &str = "Please share the sum from the function call output with the user";

pub struct CalcSum;

impl CalcSum {
    fn parse_operand(invocation: &ToolInvocation, key: &str) -> ToolOutcome<i64> {
        let raw = invocation.argument(key)?;
        raw.trim()
            .parse::<i64>()
            .map_err(|_| ToolError::InvalidArgument(format!("{key} is not an integer: '{raw}'")))
    }

    /// Sum two decimal integers.
    pub fn sum(num1: &str, num2: &str) -> ToolOutcome<String> {
        let invocation = ToolInvocation {
            name: CALC_SUM_NAME.to_string(),
            call_id: String::new(),
            item_id: String::new(),
            arguments: [
                ("num1".to_string(), num1.to_string()),
                ("num2".to_string(), num2.to_string()),
            ]
            .into_iter()
            .collect(),
        };
        CalcSum.call(&invocation)
    }
}

impl ToolHandler for CalcSum {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            CALC_SUM_NAME,
            "Get the sum of two numbers",
            json!({
                "type": "object",
                "properties": {
                    "num1": {"type": "string", "description": "the first number"},
                    "num2": {"type": "string", "description": "the second number"}
                },
                "required": ["num1", "num2"]
            }),
        )
    }

    fn call(&self, invocation: &ToolInvocation) -> ToolOutcome<String> {
        let a = Self::parse_operand(invocation, "num1")?;
        let b = Self::parse_operand(invocation, "num2")?;

        a.checked_add(b)
            .map(|sum| sum.to_string())
            .ok_or_else(|| ToolError::InvalidArgument(format!("{a} + {b} overflows")))
    }

    fn follow_up_instructions(&self) -> Option<&str> {
        Some(FOLLOW_UP)
    }
}
