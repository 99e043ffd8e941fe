//! Clock lookup tool

use super::{Tool, ToolContext, ToolOutput};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// Reports the current UTC date, e.g. "Monday, October 19, 2026"
pub struct CurrentDateTool;

pub(crate) fn long_date(now: DateTime<Utc>) -> String {
    now.format("%A, %B %-d, %Y").to_string()
}

#[async_trait]
impl Tool for CurrentDateTool {
    fn name(&self) -> &'static str {
        "current_date"
    }

    fn description(&self) -> String {
        "Get the current UTC date".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn run(&self, _input: Value, _ctx: ToolContext) -> ToolOutput {
        ToolOutput::success(long_date(Utc::now()))
    }
}
