//! Core data model shared by every stage of a consultation.
//!
//! - [`handler`]: the [`Handler`](handler::Handler) contract and its descriptor
//! - [`request`]: inbound requests and the caller's security context
//! - [`response`]: handler and manager responses
//! - [`routing`]: the outcome of one routing cascade
//! - [`audit`]: append-only audit records

pub mod audit;
pub mod handler;
pub mod request;
pub mod response;
pub mod routing;

pub use audit::{AuditAction, AuditEntry};
pub use handler::{Handler, HandlerDescriptor, HandlerStatus, TechnicalDomain};
pub use request::{Request, RequestBuilder, SecurityContext};
pub use response::{Response, ResponseBuilder, ResponseStatus};
pub use routing::{RoutingResult, RoutingStage};
