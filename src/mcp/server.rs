#![cfg(feature = "mcp-server")]

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use rmcp::{
    ErrorData as McpError,
    ServiceExt,
    handler::server::ServerHandler,
    model::{
        CallToolRequestParam,
        CallToolResult,
        Implementation,
        ListToolsResult,
        PaginatedRequestParam,
        ProtocolVersion,
        ServerCapabilities,
        ServerInfo,
    },
    service::{QuitReason, RequestContext, RoleServer},
};
use tokio::io::{stdin, stdout};
use tokio::sync::Semaphore;
use tracing::Instrument;

use crate::batch::Pipeline;
use crate::mcp::tools;
use crate::telemetry;
use crate::telemetry::ops::serve::Phase;

const DEFAULT_MAX_CONCURRENCY: usize = 2;

#[derive(Clone)]
struct SummarizerMcpServer {
    pipeline: Arc<Pipeline>,
    info: ServerInfo,
    semaphore: Arc<Semaphore>,
}

impl SummarizerMcpServer {
    fn new(pipeline: Arc<Pipeline>, semaphore: Arc<Semaphore>) -> Self {
        let capabilities = ServerCapabilities::builder().enable_tools().build();
        let max_urls = pipeline.config().max_urls_per_request;
        let info = ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities,
            server_info: Implementation {
                name: "web-summarizer".to_string(),
                title: Some("Web summarizer MCP server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(format!(
                "Use summarize_web to crawl and summarize up to {max_urls} URLs per call. \
                 Failed URLs are reported per entry; partial entries carry raw page text."
            )),
        };

        Self { pipeline, info, semaphore }
    }
}

impl ServerHandler for SummarizerMcpServer {
    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        async move { Ok(ListToolsResult::with_all_items(tools::tool_catalog())) }
    }

    fn get_info(&self) -> ServerInfo { self.info.clone() }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        let pipeline = self.pipeline.clone();
        let ct = context.ct.clone();
        let permits = self.semaphore.clone();
        let span = telemetry::serve().span_kv(&Phase::Call, [("tool", request.name.to_string())]);
        async move {
            let permit = permits
                .acquire_owned()
                .await
                .map_err(|err| rmcp::ErrorData::internal_error(
                    "failed to acquire concurrency permit",
                    Some(json!({ "reason": err.to_string() })),
                ))?;
            let result = tools::handle_call(&pipeline, &ct, request).await;
            if let Err(err) = &result {
                tracing::warn!(target = "web_summarizer::mcp", error = %err.message, "tool call failed");
            }
            drop(permit);
            result
        }
        .instrument(span)
    }
}

fn resolve_max_concurrency(flag: Option<usize>) -> usize {
    flag
        .or_else(|| std::env::var("MCP_MAX_CONCURRENCY").ok().and_then(|s| s.parse().ok()))
        .unwrap_or(DEFAULT_MAX_CONCURRENCY)
        .max(1)
}

pub async fn run_server(pipeline: Pipeline, max_concurrency: Option<usize>) -> Result<()> {
    let log = telemetry::serve();
    let max_concurrency = resolve_max_concurrency(max_concurrency);
    let server = {
        let _s = log.span(&Phase::Start).entered();
        log.info_kv("starting rmcp server over stdio", [("max_concurrency", max_concurrency.to_string())]);
        SummarizerMcpServer::new(Arc::new(pipeline), Arc::new(Semaphore::new(max_concurrency)))
    };

    let transport = (stdin(), stdout());
    let running = server
        .serve(transport)
        .await
        .context("failed to initialize MCP server")?;

    match running.waiting().await {
        Ok(QuitReason::Closed) => {
            log.info("MCP transport closed by peer");
            Ok(())
        }
        Ok(QuitReason::Cancelled) => {
            log.info("MCP server cancelled by request");
            Ok(())
        }
        Ok(QuitReason::JoinError(err)) => {
            log.error(format!("MCP server task aborted: {err}"));
            Err(err.into())
        }
        Err(err) => {
            log.error(format!("MCP server join failure: {err}"));
            Err(err.into())
        }
    }
}
