//! Consultation orchestrator CLI
//!
//! Runs one consultation through the orchestration manager and prints the
//! routing decision and the response as JSON.

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

use consult_orchestrator::audit::{AuditTrail, TracingAuditSink};
use consult_orchestrator::config::{AppConfig, Cli};
use consult_orchestrator::domain::{Handler, Request, SecurityContext, TechnicalDomain};
use consult_orchestrator::handlers::{StaticHandler, builtin_handlers};
use consult_orchestrator::routing::IntelligentRouter;
use consult_orchestrator::runtime::{FallbackSupplier, spawn_session_sweeper};
use consult_orchestrator::security::gate_from_config;
use consult_orchestrator::session::SessionStore;
use consult_orchestrator::{HandlerRegistry, OrchestrationManager, telemetry};

const FALLBACK_GUIDANCE: &str = "No specialized handler answered in time. \
    Start from the service's existing conventions and ask again with more context.";

fn consultation(cli: &Cli) -> Request {
    let security = SecurityContext::new(cli.token.clone(), cli.user.clone())
        .with_roles(cli.roles.iter().cloned())
        .with_permissions(cli.permissions.iter().cloned());

    let mut builder =
        Request::builder(cli.request_type.clone(), cli.description.clone()).security(security);
    if let Some(target) = &cli.target_service {
        builder = builder.target_service(target.clone());
    }
    if let Some(session) = &cli.session {
        builder = builder.session(session.clone());
    }
    for (key, value) in &cli.context {
        builder = builder.context(key.clone(), value.clone());
    }
    builder.build()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::from_cli(&cli)?;
    telemetry::init(&config.telemetry)?;

    let sessions = SessionStore::with_timeout(config.orchestration.session_timeout());
    let registry = HandlerRegistry::new();
    for handler in builtin_handlers(&sessions) {
        registry.register(handler);
    }
    info!(handlers = registry.len(), "Registry ready");

    let fallback: FallbackSupplier = Arc::new(|| {
        Arc::new(
            StaticHandler::new("general-consultation", TechnicalDomain::Implementation)
                .with_output(FALLBACK_GUIDANCE, 0.3),
        ) as Arc<dyn Handler>
    });

    let (audit, audit_task) = AuditTrail::with_sink(Arc::new(TracingAuditSink));
    let manager = OrchestrationManager::new(registry, gate_from_config(&config.security), fallback)
        .with_router(
            IntelligentRouter::default().with_max_suggestions(config.orchestration.max_suggestions),
        )
        .with_sessions(sessions.clone())
        .with_audit(audit)
        .with_discovery_timeout(config.orchestration.discovery_timeout());

    let shutdown = CancellationToken::new();
    let sweeper = spawn_session_sweeper(
        sessions,
        config.orchestration.cleanup_interval(),
        shutdown.clone(),
    );

    let request = consultation(&cli);
    let routing = manager.route(&request);
    let response = manager.process_request(&request).await;
    info!(status = ?response.status(), "Consultation finished");

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "routing": routing, "response": response }))?
    );

    shutdown.cancel();
    sweeper.await?;
    // The audit task drains once the last trail handle is gone.
    drop(manager);
    audit_task.await?;
    Ok(())
}
