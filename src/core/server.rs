/// Server composition root and lifecycle.
///
/// Grounded on this module's own `run_server_stdio` loop shape (buffered
/// line-oriented stdio, one response per request) generalized to the full
/// component set of spec.md §4.K: config load, backend client connect,
/// metrics collector, webhook dispatcher, health checks, and tool
/// registration, followed by a read/handle/write loop and ordered shutdown.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::cache::Cache;
use crate::client::VerisClient;
use crate::config::{self, Config};
use crate::health::{CacheCheck, HealthChecker, ServerCheck, VerisConnectionCheck};
use crate::logging;
use crate::metrics::MetricsCollector;
use crate::protocol::engine::{ProtocolEngine, ToolRegistry};
use crate::protocol::transport::{Incoming, StdioTransport};
use crate::protocol::schemas::{RpcResponse, PARSE_ERROR};
use crate::streaming::StreamingEngine;
use crate::tools::analytics_tools::{AnalyticsTool, MetricsTool};
use crate::tools::delete_context::DeleteContextTool;
use crate::tools::forget_context::ForgetContextTool;
use crate::tools::get_user_facts::GetUserFactsTool;
use crate::tools::health_tool::HealthCheckTool;
use crate::tools::list_context_types::ListContextTypesTool;
use crate::tools::query_graph::QueryGraphTool;
use crate::tools::retrieve_context::RetrieveContextTool;
use crate::tools::scratchpad::{GetAgentStateTool, UpdateScratchpadTool};
use crate::tools::search_context::SearchContextTool;
use crate::tools::store_context::StoreContextTool;
use crate::tools::streaming_tools::{BatchOperationsTool, StreamingSearchTool};
use crate::tools::upsert_fact::UpsertFactTool;
use crate::tools::webhook_tools::{EventNotificationTool, WebhookManagementTool};
use crate::webhooks::events::{create_system_event, EventType};
use crate::webhooks::manager::WebhookManager;

/// Every long-lived component the tools and health checks share.
pub struct AppContext {
    pub config: Config,
    pub client: Arc<VerisClient>,
    pub cache: Arc<RwLock<Cache>>,
    pub metrics: Arc<MetricsCollector>,
    pub webhooks: Arc<WebhookManager>,
    pub streaming: Arc<StreamingEngine>,
    pub health: Arc<HealthChecker>,
}

impl AppContext {
    pub async fn build(config: Config) -> std::io::Result<Self> {
        let client = Arc::new(
            VerisClient::new(
                config.veris_memory.api_url.clone(),
                config.veris_memory.api_key.clone(),
                config.veris_memory.user_id.clone(),
                config.veris_memory.timeout_ms,
                config.veris_memory.max_retries,
            )
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))?,
        );

        if let Err(err) = client.connect().await {
            warn!(error = %err, "initial backend connection attempt failed; will keep retrying on demand");
        }

        let cache = Arc::new(RwLock::new(Cache::new(1_000, config.server.cache_ttl_seconds)));
        let metrics = Arc::new(MetricsCollector::new());
        let webhooks = WebhookManager::new(reqwest::Client::new());
        let streaming = Arc::new(StreamingEngine::new());
        let health = Arc::new(HealthChecker::new());

        health
            .register_check(
                "server",
                Arc::new(ServerCheck),
                Duration::from_secs(5),
                true,
            )
            .await;
        health
            .register_check(
                "veris_connection",
                Arc::new(VerisConnectionCheck::new(Arc::clone(&client))),
                Duration::from_secs(5),
                true,
            )
            .await;
        health
            .register_check(
                "cache",
                Arc::new(CacheCheck::new(Arc::clone(&cache), 1_000)),
                Duration::from_secs(2),
                false,
            )
            .await;

        Ok(Self {
            config,
            client,
            cache,
            metrics,
            webhooks,
            streaming,
            health,
        })
    }

    /// Register every tool whose `ToolConfig` has `enabled = true`.
    pub fn build_registry(&self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        let tools = &self.config.tools;
        let client = &self.client;
        let cache = &self.cache;

        registry.register(Arc::new(StoreContextTool::new(Arc::clone(client), Arc::clone(cache), tools.store_context.clone())));
        registry.register(Arc::new(RetrieveContextTool::new(Arc::clone(client), Arc::clone(cache), tools.retrieve_context.clone())));
        registry.register(Arc::new(SearchContextTool::new(Arc::clone(client), Arc::clone(cache), tools.search_context.clone())));
        registry.register(Arc::new(DeleteContextTool::new(Arc::clone(client), Arc::clone(cache), tools.delete_context.clone())));
        registry.register(Arc::new(ListContextTypesTool::new(Arc::clone(client), tools.list_context_types.clone())));
        registry.register(Arc::new(UpsertFactTool::new(Arc::clone(client), Arc::clone(cache), tools.upsert_fact.clone())));
        registry.register(Arc::new(GetUserFactsTool::new(Arc::clone(client), tools.get_user_facts.clone())));
        registry.register(Arc::new(ForgetContextTool::new(Arc::clone(client), Arc::clone(cache), tools.forget_context.clone())));
        registry.register(Arc::new(QueryGraphTool::new(Arc::clone(client), tools.query_graph.clone())));
        registry.register(Arc::new(UpdateScratchpadTool::new(Arc::clone(client), tools.update_scratchpad.clone())));
        registry.register(Arc::new(GetAgentStateTool::new(Arc::clone(client), tools.get_agent_state.clone())));

        let server_default = crate::config::ToolConfig::default();
        registry.register(Arc::new(StreamingSearchTool::new(Arc::clone(client), Arc::clone(&self.streaming), server_default.clone())));
        registry.register(Arc::new(BatchOperationsTool::new(Arc::clone(client), Arc::clone(&self.streaming), server_default.clone())));
        registry.register(Arc::new(WebhookManagementTool::new(Arc::clone(&self.webhooks), server_default.clone())));
        registry.register(Arc::new(EventNotificationTool::new(Arc::clone(&self.webhooks), server_default.clone())));
        registry.register(Arc::new(AnalyticsTool::new(Arc::clone(client), server_default.clone())));
        registry.register(Arc::new(MetricsTool::new(Arc::clone(&self.metrics), server_default.clone())));
        registry.register(Arc::new(HealthCheckTool::new(Arc::clone(&self.health), server_default)));

        registry
    }
}

/// Load config, wire up components, then run the stdio request loop until
/// EOF or a termination signal, shutting components down in reverse
/// dependency order (webhooks, metrics, nothing to do for the client).
pub async fn run_server_stdio(name: String, version: String) -> std::io::Result<()> {
    let config = config::load_config(None).map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))?;
    logging::init(&config.server.log_level);
    info!(server = %name, version = %version, "starting MCP server");

    let ctx = AppContext::build(config).await?;
    ctx.metrics.start().await;
    ctx.webhooks.start().await;

    let registry = ctx.build_registry();
    let engine = ProtocolEngine::new(Arc::new(registry), name, version);
    let mut transport = StdioTransport::new();

    let startup_event = create_system_event(EventType::ServerStarted, serde_json::json!({}), "server");
    ctx.webhooks.publish(startup_event);

    loop {
        tokio::select! {
            incoming = transport.next_incoming() => {
                match incoming? {
                    None => {
                        info!("stdin closed, shutting down");
                        break;
                    }
                    Some(Incoming::Blank) => continue,
                    Some(Incoming::ParseError { id, error }) => {
                        let response = RpcResponse::failure(Some(id), PARSE_ERROR, format!("Parse error: {error}"), None);
                        transport.write_response(&response).await?;
                    }
                    Some(Incoming::Message(request)) => {
                        if request.is_notification() {
                            continue;
                        }
                        let response = engine.handle(request).await;
                        transport.write_response(&response).await?;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received interrupt, shutting down");
                break;
            }
        }
    }

    let stop_event = create_system_event(EventType::ServerStopped, serde_json::json!({}), "server");
    ctx.webhooks.publish(stop_event);
    ctx.webhooks.stop().await;
    ctx.metrics.stop().await;

    Ok(())
}
