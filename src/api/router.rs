//! Router assembly

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::admin;
use super::gate;
use super::health;
use super::middleware::{authorize, logging_middleware, metrics_middleware, RouteAccess};
use super::state::{DirectoryState, HealthState};
use crate::infrastructure::access_key::AccessGate;
use crate::infrastructure::observability::{create_metrics_router, PrometheusMetrics};

/// Everything a process exposes over HTTP; absent parts are not routed
#[derive(Debug, Clone, Default)]
pub struct ApiComponents {
    pub directory: Option<DirectoryState>,
    pub gate: Option<Arc<AccessGate>>,
    pub health: HealthState,
    pub metrics: Option<MetricsEndpoint>,
}

#[derive(Clone)]
pub struct MetricsEndpoint {
    pub metrics: PrometheusMetrics,
    pub path: String,
}

impl std::fmt::Debug for MetricsEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsEndpoint").field("path", &self.path).finish()
    }
}

/// Tag a route group with its access requirement
fn guarded(router: Router, access: RouteAccess) -> Router {
    router.route_layer(middleware::from_fn_with_state(access, authorize))
}

/// Build the process router
pub fn create_router(components: ApiComponents) -> Router {
    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::live_check))
        .route("/ready", get(health::ready_check))
        .with_state(components.health);

    let mut router = guarded(health_routes, RouteAccess::Public);

    if let Some(state) = components.directory {
        let access = RouteAccess::Operator(state.operator_auth.clone());
        router = router.merge(guarded(admin::create_admin_router().with_state(state), access));
    }

    if let Some(gate) = components.gate {
        router = router.merge(guarded(gate::create_gate_router(), RouteAccess::AccessKey(gate)));
    }

    if let Some(endpoint) = components.metrics {
        router = router.merge(guarded(
            create_metrics_router(endpoint.metrics, &endpoint.path),
            RouteAccess::Public,
        ));
    }

    router
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}
