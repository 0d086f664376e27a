mod compatibility;
mod config;
mod errors;
mod llm_client;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::compatibility::cache::{AnalysisCache, RedisAnalysisCache};
use crate::compatibility::cascade::{Cascade, CompatibilityEngine};
use crate::compatibility::service::CompatibilityService;
use crate::config::Config;
use crate::llm_client::{AnthropicInvoker, ModelInvoker, ModelRouter, ModelTier, OpenAiInvoker};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on unparseable env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting JobMatch API v{}", env!("CARGO_PKG_VERSION"));

    // Model backends. Tiers whose backend has no credentials fail engine construction.
    let invoker: Arc<dyn ModelInvoker> = Arc::new(build_router_invoker(&config));

    // Optional Redis analysis cache, shared by the primary and escalation engines
    let cache: Option<Arc<dyn AnalysisCache>> = match &config.redis_url {
        Some(redis_url) => {
            let client = redis::Client::open(redis_url.clone())?;
            info!(
                "Analysis cache enabled (ttl {}s, op timeout {}ms)",
                config.analysis_cache_ttl.as_secs(),
                config.analysis_cache_timeout.as_millis()
            );
            let redis_cache: Arc<dyn AnalysisCache> = Arc::new(
                RedisAnalysisCache::new(client, config.analysis_cache_ttl)
                    .with_op_timeout(config.analysis_cache_timeout),
            );
            Some(redis_cache)
        }
        None => {
            warn!("REDIS_URL not set, analysis cache disabled");
            None
        }
    };

    let compatibility = build_compatibility(&config, invoker, cache)?;

    // Build app state
    let state = AppState { compatibility };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client's domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Routes `claude-*` models to Anthropic and everything else to the
/// OpenAI-compatible backend, direct or through the AI gateway.
fn build_router_invoker(config: &Config) -> ModelRouter {
    let mut router = ModelRouter::new();

    if let Some(key) = &config.openai_api_key {
        let openai = match &config.ai_gateway_url {
            Some(url) => {
                info!("OpenAI-compatible backend routed through gateway");
                OpenAiInvoker::gateway(key.clone(), url.clone(), config.ai_gateway_token.clone())
            }
            None => OpenAiInvoker::direct(key.clone()),
        };
        router = router.with_openai(Arc::new(openai));
    }

    if let Some(key) = &config.anthropic_api_key {
        router = router.with_anthropic(Arc::new(AnthropicInvoker::new(key.clone())));
    }

    router
}

/// Primary engine over the configured cascade, plus the optional single-tier
/// escalation engine. Both engines read and write the same cache.
fn build_compatibility(
    config: &Config,
    invoker: Arc<dyn ModelInvoker>,
    cache: Option<Arc<dyn AnalysisCache>>,
) -> Result<CompatibilityService> {
    let cascade = Cascade::new(config.cascade.clone())?;
    let mut primary = CompatibilityEngine::new(cascade, invoker.clone())?
        .with_backoff_base(config.retry_base_delay);
    if let Some(cache) = &cache {
        primary = primary.with_cache(cache.clone());
    }

    let models: Vec<&str> = primary
        .cascade()
        .tiers()
        .iter()
        .map(|t| t.model.as_str())
        .collect();
    info!("Compatibility cascade: {}", models.join(" -> "));

    let mut compatibility = CompatibilityService::new(Arc::new(primary));

    if let Some(model) = &config.escalation_model {
        let mut escalation =
            CompatibilityEngine::new(Cascade::single(ModelTier::new(model.clone()))?, invoker)?
                .with_backoff_base(config.retry_base_delay);
        if let Some(cache) = &cache {
            escalation = escalation.with_cache(cache.clone());
        }
        compatibility = compatibility.with_escalation(Arc::new(escalation));
        info!("Escalation model: {model}");
    }

    Ok(compatibility)
}
