#![cfg(feature = "mcp-server")]

use rmcp::model::{CallToolRequestParam, CallToolResult, Tool, ToolAnnotations};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use crate::batch::Pipeline;
use crate::mcp::types::SummarizeWebParams;

pub const SUMMARIZE_WEB_TOOL: &str = "summarize_web";

pub fn tool_catalog() -> Vec<Tool> {
    vec![summarize_web_tool()]
}

fn summarize_web_tool() -> Tool {
    Tool::new(
        SUMMARIZE_WEB_TOOL,
        "Crawl each URL, extract the readable text and summarize it with Gemini. \
         URLs are processed in parallel under the configured rate limits. Returns per-URL \
         summaries (status success, partial or failed), batch metadata, per-URL errors and \
         current rate limit usage.",
        rmcp::object!({"type": "object"}),
    )
    .with_input_schema::<SummarizeWebParams>()
    .annotate(
        ToolAnnotations::new()
            .read_only(true)
            .destructive(false)
            .idempotent(false)
            .open_world(true),
    )
}

pub async fn handle_call(
    pipeline: &Pipeline,
    ct: &CancellationToken,
    request: CallToolRequestParam,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let CallToolRequestParam { name, arguments } = request;
    match name.as_ref() {
        SUMMARIZE_WEB_TOOL => summarize_web(pipeline, ct, arguments).await,
        _ => Err(rmcp::ErrorData::invalid_params(
            format!("unknown tool: {}", name),
            None,
        )),
    }
}

async fn summarize_web(
    pipeline: &Pipeline,
    ct: &CancellationToken,
    arguments: Option<rmcp::model::JsonObject>,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let args_map = arguments.unwrap_or_else(Map::new);
    let params: SummarizeWebParams = serde_json::from_value(Value::Object(args_map)).map_err(|err| {
        rmcp::ErrorData::invalid_params(
            format!("invalid summarize_web parameters: {}", err),
            None,
        )
    })?;

    let outcome = tokio::select! {
        _ = ct.cancelled() => {
            return Err(rmcp::ErrorData::internal_error("summarize_web cancelled", None));
        }
        res = pipeline.summarize_batch(params.into()) => res,
    };

    // invalid input is reported in-band, like any other outcome
    let encoded = match outcome {
        Ok(report) => serde_json::to_value(&report),
        Err(invalid) => serde_json::to_value(&invalid),
    };
    let response = encoded.map_err(|err| {
        rmcp::ErrorData::internal_error(
            "failed to encode summarize_web response",
            Some(json!({ "reason": err.to_string() })),
        )
    })?;

    Ok(CallToolResult::structured(response))
}
