use crate::app::dto::*;
use crate::app::engine::LineageEngine;
use rmcp::{
    Json, ServerHandler, ServiceExt, handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters, model::*, tool, tool_handler, tool_router,
    transport::stdio,
};
use tokio::task::spawn_blocking;

#[derive(Clone)]
pub struct LineageMcpServer {
    engine: LineageEngine,
    tool_router: ToolRouter<Self>,
}

impl LineageMcpServer {
    pub fn new(engine: LineageEngine) -> Self {
        Self {
            engine,
            tool_router: Self::tool_router(),
        }
    }

    pub async fn serve_stdio(self) -> anyhow::Result<()> {
        let service = self.serve(stdio()).await?;
        service.waiting().await?;
        Ok(())
    }
}

#[tool_router]
impl LineageMcpServer {
    #[tool(
        description = "Resolve the upstream lineage graph of a node: every node and derivation edge it was built from."
    )]
    async fn resolve_upstream(
        &self,
        params: Parameters<LineageRequest>,
    ) -> Result<Json<LineageResponse>, String> {
        let engine = self.engine.clone();
        let req = params.0;
        spawn_blocking(move || engine.resolve(req))
            .await
            .map_err(|e| format!("task join error: {e}"))?
            .map(Json)
            .map_err(|e| e.to_string())
    }

    #[tool(description = "Search lineage nodes by table, column or procedure name.")]
    async fn search_nodes(
        &self,
        params: Parameters<SearchRequest>,
    ) -> Result<Json<SearchResponse>, String> {
        let engine = self.engine.clone();
        let req = params.0;
        spawn_blocking(move || engine.search(req))
            .await
            .map_err(|e| format!("task join error: {e}"))?
            .map(Json)
            .map_err(|e| e.to_string())
    }

    #[tool(
        description = "Record lineage facts: new nodes (optionally keyed) and edges between existing ids or batch keys."
    )]
    async fn ingest_facts(
        &self,
        params: Parameters<IngestRequest>,
    ) -> Result<Json<IngestResponse>, String> {
        let engine = self.engine.clone();
        let req = params.0;
        spawn_blocking(move || engine.ingest(req))
            .await
            .map_err(|e| format!("task join error: {e}"))?
            .map(Json)
            .map_err(|e| e.to_string())
    }
}

#[tool_handler]
impl ServerHandler for LineageMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Trace column-level data lineage: resolve upstream derivation graphs, search nodes, record new facts."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
