//! Reel Orchestrator
//!
//! Turns natural-language animation requests into rendered videos.
//!
//! Architecture:
//! - API: axum handlers for job submission, status, videos and render callbacks
//! - Services: job lifecycle orchestration, completion inbox, stale sweeper
//! - Generation: code-generation providers (OpenAI, Gemini)
//! - Render: dispatch of generated code to the external render service
//! - Repository: job store on PostgreSQL or in memory
//!
//! A submitted job is generated and dispatched in the background; the render
//! service reports the outcome through a webhook, and failed renders are
//! retried with the error fed back into the prompt until the budget runs out.

pub mod api;
pub mod config;
pub mod db;
pub mod generation;
pub mod render;
pub mod repository;
pub mod service;
pub mod storage;

use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;
use crate::config::Config;
use crate::generation::{GeminiProvider, MultiBackendGenerator, OpenAiProvider};
use crate::render::HttpRenderDispatcher;
use crate::repository::{InMemoryJobStore, JobStore, PgJobStore};
use crate::service::{CompletionNotifier, JobOrchestrator, OrchestratorSettings, WorkerPool};
use crate::storage::S3Presigner;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reel_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Reel Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;

    let store = open_store(&config).await?;

    let settings = config
        .artifacts
        .s3_settings()
        .context("Artifact store credentials are missing")?;
    let signer = S3Presigner::new(settings);

    let llm_http = Client::builder()
        .timeout(config.generation_timeout)
        .build()
        .context("Failed to build generation HTTP client")?;
    let generator = build_generator(&config, &llm_http);
    let dispatcher = Arc::new(HttpRenderDispatcher::new(
        Client::new(),
        config.render_service_url.clone(),
    ));

    let orchestrator = JobOrchestrator::new(
        Arc::clone(&store),
        Arc::new(generator),
        dispatcher,
        WorkerPool::new(config.max_concurrent_attempts),
        OrchestratorSettings {
            initial_retry_budget: config.initial_retry_budget,
            preferred_backend: config.preferred_backend,
            retry_backend: config.retry_backend,
            generation_timeout: config.generation_timeout,
        },
    );

    let resumed = orchestrator
        .resume_unfinished()
        .await
        .context("Failed to resume unfinished jobs")?;
    if resumed > 0 {
        info!("Resumed {} unfinished job(s)", resumed);
    }

    let (notifier, inbox) = CompletionNotifier::new();
    let consumer = service::notifier::spawn_consumer(orchestrator.clone(), inbox);

    let sweeper = config.processing_timeout.map(|timeout| {
        service::sweeper::spawn_sweeper(
            Arc::clone(&store),
            notifier.clone(),
            timeout,
            config.sweep_interval,
        )
    });

    if config.webhook_api_key.is_none() {
        warn!("WEBHOOK_API_KEY is not set; render callbacks will be refused");
    }

    // Build router with all API endpoints
    let app = api::create_router(AppState {
        orchestrator: orchestrator.clone(),
        notifier,
        signer: Arc::new(signer),
        webhook_key: config.webhook_api_key.clone(),
        download_ttl: config.artifacts.url_ttl,
    })
    .layer(api::cors_layer(&config.allowed_origins));

    info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down");
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    consumer.abort();

    let in_flight = orchestrator.workers().in_flight();
    if in_flight > 0 {
        info!("Abandoning {} in-flight attempt(s)", in_flight);
    }

    Ok(())
}

/// PostgreSQL when `DATABASE_URL` is set, process memory otherwise
async fn open_store(config: &Config) -> Result<Arc<dyn JobStore>> {
    let Some(database_url) = &config.database_url else {
        warn!("DATABASE_URL is not set; jobs are kept in memory and lost on restart");
        return Ok(Arc::new(InMemoryJobStore::new()));
    };

    info!("Connecting to database...");

    let pool = db::create_pool(database_url)
        .await
        .context("Failed to create database pool")?;

    info!("Database connection pool created");

    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(Arc::new(PgJobStore::new(pool)))
}

/// Registers every provider that has an API key
fn build_generator(config: &Config, http: &Client) -> MultiBackendGenerator {
    let mut generator = MultiBackendGenerator::new(config.preferred_backend);

    if let Some(api_key) = &config.openai.api_key {
        generator = generator.with_provider(Arc::new(OpenAiProvider::new(
            http.clone(),
            api_key.clone(),
            config.openai.model.clone(),
            config.openai.base_url.clone(),
        )));
    }

    if let Some(api_key) = &config.gemini.api_key {
        generator = generator.with_provider(Arc::new(GeminiProvider::new(
            http.clone(),
            api_key.clone(),
            config.gemini.model.clone(),
            config.gemini.base_url.clone(),
        )));
    }

    let backends = generator.backends();
    if backends.is_empty() {
        warn!("No generation provider configured; every job will fail generation");
    } else {
        info!("Generation backends: {:?}", backends);
    }

    generator
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
