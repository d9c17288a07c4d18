//! MCP server handler implementation.
//!
//! Routes tool calls to the implementations in [`crate::tools`].

use crate::state::AppState;
use crate::tools::cache::{CacheDeleteParams, CacheExportParams, clear_impl, delete_impl, export_impl, stats_impl};
use crate::tools::{WebAnalyzeParams, analyze_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The MCP server handler for linkdigest.
#[derive(Clone)]
pub struct LinkDigestServer {
    state: AppState,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl LinkDigestServer {
    pub fn new(state: AppState) -> Self {
        Self { state, tool_router: Self::tool_router() }
    }

    /// Analyze every link in a message or list.
    #[tool(
        description = "Analyze web pages. Pass free text containing links and/or a list of URLs. Returns one result per unique URL (fresh, cached or failed), skipped URLs, and whether the batch is worth delivering."
    )]
    async fn web_analyze(&self, params: Parameters<WebAnalyzeParams>) -> Result<CallToolResult, McpError> {
        analyze_impl(&self.state, params.0).await
    }

    #[tool(description = "Report cache entry counts (total, valid, expired) and configured limits.")]
    async fn web_cache_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(&self.state).await
    }

    #[tool(description = "Remove every cached analysis from memory and disk.")]
    async fn web_cache_clear(&self) -> Result<CallToolResult, McpError> {
        clear_impl(&self.state).await
    }

    #[tool(description = "Remove the cached analysis for one URL. The URL is normalized first.")]
    async fn web_cache_delete(&self, params: Parameters<CacheDeleteParams>) -> Result<CallToolResult, McpError> {
        delete_impl(&self.state, params.0).await
    }

    #[tool(
        description = "Export cached analyses as one document. Target is a URL (analyzed first if not cached) or \"all\"; format is md, json or txt."
    )]
    async fn web_cache_export(&self, params: Parameters<CacheExportParams>) -> Result<CallToolResult, McpError> {
        export_impl(&self.state, params.0).await
    }
}

impl ServerHandler for LinkDigestServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "linkdigest".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
