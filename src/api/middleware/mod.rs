//! API middleware components

pub mod authorize;
pub mod logging;
pub mod metrics;

pub use authorize::{authorize, GateContext, RouteAccess};
pub use logging::logging_middleware;
pub use metrics::metrics_middleware;
