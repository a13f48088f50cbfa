//! Result helpers for MCP tool responses

use rmcp::{
    model::{CallToolResult, Content},
    ErrorData as McpError,
};
use serde::Serialize;

/// Create a successful response holding `data` as pretty-printed JSON
///
/// Two-space indentation, as produced by `serde_json::to_string_pretty`.
pub fn json_success<T: Serialize>(data: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Create a tool-level error result
///
/// The call itself succeeds at the protocol level; the client sees
/// `isError: true` with `message` as the text payload.
pub fn tool_error(message: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(message.into())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::RawContent;

    fn first_text(result: &CallToolResult) -> &str {
        match &result.content[0].raw {
            RawContent::Text(t) => t.text.as_str(),
            _ => panic!("expected text content"),
        }
    }

    #[derive(Serialize)]
    struct TestData {
        name: String,
        value: i32,
    }

    #[test]
    fn test_json_success() {
        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };
        let result = json_success(&data).unwrap();
        assert!(!result.is_error.unwrap_or(false));
        assert_eq!(result.content.len(), 1);
        assert_eq!(first_text(&result), "{\n  \"name\": \"test\",\n  \"value\": 42\n}");
    }

    #[test]
    fn test_tool_error() {
        let result = tool_error("SQL query is required");
        assert_eq!(result.is_error, Some(true));
        assert_eq!(first_text(&result), "SQL query is required");
    }
}
