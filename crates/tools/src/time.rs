//! Current-time tool.

use async_trait::async_trait;
use chrono::Utc;
use confide_core::error::ToolError;
use confide_core::tool::{Tool, ToolContext};
use serde_json::json;

pub struct GetTimeTool;

#[async_trait]
impl Tool for GetTimeTool {
    fn name(&self) -> &str {
        "get_time"
    }

    fn description(&self) -> &str {
        "Get the current server time or a specific timezone."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "timezone": {"type": "string"}
            }
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<serde_json::Value, ToolError> {
        let tz = arguments["timezone"].as_str().filter(|s| !s.is_empty()).unwrap_or("UTC");
        let now = Utc::now();
        Ok(json!({
            "timezone": tz,
            "epoch": now.timestamp(),
            "utc": now.to_rfc3339(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn defaults_to_utc() {
        let out = GetTimeTool
            .execute(json!({}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(out["timezone"], "UTC");
        assert!(out["epoch"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn echoes_requested_timezone() {
        let out = GetTimeTool
            .execute(json!({"timezone": "Europe/Berlin"}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(out["timezone"], "Europe/Berlin");
    }
}
