//! Branch condition after a model call

use crate::llm::ModelResponse;

/// Where the graph goes after the MODEL node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The model requested tools
    Tools,
    /// The model produced a final answer
    Finish,
}

/// Route on the most recent model response
pub fn route(response: &ModelResponse) -> Route {
    if response.has_tool_calls() {
        Route::Tools
    } else {
        Route::Finish
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ToolCallRequest;
    use serde_json::json;

    #[test]
    fn test_route() {
        assert_eq!(route(&ModelResponse::text("4")), Route::Finish);

        let response = ModelResponse::tool_calls(
            "",
            vec![ToolCallRequest::new("call_1", "weather", json!({}))],
        );
        assert_eq!(route(&response), Route::Tools);
    }

    #[test]
    fn test_empty_text_without_calls_finishes() {
        assert_eq!(route(&ModelResponse::text("")), Route::Finish);
    }
}
