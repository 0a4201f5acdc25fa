//! API layer - HTTP endpoints and middleware

pub mod admin;
pub mod gate;
pub mod health;
pub mod middleware;
pub mod router;
pub mod state;
pub mod types;

pub use router::{create_router, ApiComponents, MetricsEndpoint};
pub use state::{CacheProbe, DirectoryState, HealthState, ReadinessProbe, SubscriptionCheck};
