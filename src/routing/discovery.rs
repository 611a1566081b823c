use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::router::IntelligentRouter;
use crate::domain::{Handler, Request, RoutingStage};

/// Handler chosen by discovery and the cascade stage that chose it.
#[derive(Debug, Clone)]
pub struct Discovered {
    pub handler: Arc<dyn Handler>,
    pub stage: RoutingStage,
}

/// Asynchronous handler discovery.
///
/// Implementations must stop promptly once `cancel` fires; the caller has
/// already moved on to its fallback handler by then.
#[async_trait]
pub trait HandlerDiscovery: Send + Sync + fmt::Debug {
    async fn discover_best_handler(
        &self,
        request: &Request,
        handlers: &[Arc<dyn Handler>],
        cancel: CancellationToken,
    ) -> Option<Discovered>;
}

/// Discovery backed by the routing cascade.
#[derive(Debug, Clone, Default)]
pub struct RouterDiscovery {
    router: IntelligentRouter,
}

impl RouterDiscovery {
    pub fn new(router: IntelligentRouter) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &IntelligentRouter {
        &self.router
    }
}

#[async_trait]
impl HandlerDiscovery for RouterDiscovery {
    async fn discover_best_handler(
        &self,
        request: &Request,
        handlers: &[Arc<dyn Handler>],
        cancel: CancellationToken,
    ) -> Option<Discovered> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(request_id = %request.id(), "Discovery cancelled");
                None
            }
            decision = async { self.router.route(request, handlers) } => {
                let stage = decision.result.stage;
                decision.handler.map(|handler| Discovered { handler, stage })
            }
        }
    }
}
