//! Handler selection.
//!
//! The [`IntelligentRouter`] composes the [`ServiceDetector`],
//! [`ContextSelector`] and [`RoutingRules`] into one cascade;
//! [`HandlerDiscovery`] is the asynchronous, cancellable seam the
//! orchestration manager calls through.

pub mod detector;
pub mod discovery;
pub mod router;
pub mod rules;
pub mod selector;

pub use detector::{DEFAULT_TAG, Detection, ServiceDetector};
pub use discovery::{Discovered, HandlerDiscovery, RouterDiscovery};
pub use router::{DEFAULT_MAX_SUGGESTIONS, IntelligentRouter, RouteDecision};
pub use rules::{RoutingPriority, RoutingRule, RoutingRules, ServiceMapping};
pub use selector::{ContextAnalysis, ContextSelector, TagScore};
