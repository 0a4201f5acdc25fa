//! Directory command - admin API plus the message responder

use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{ApiComponents, CacheProbe, DirectoryState, HealthState, SubscriptionCheck};
use crate::config::{AppConfig, TransportBackend};
use crate::infrastructure::access_key::{AccessKeyDirectory, DirectoryResponder};
use crate::infrastructure::auth::JwtValidator;
use crate::infrastructure::transport::{RedisListener, TransportHealth};

use super::{bootstrap, build_app, serve_http, Shutdown};

/// Run the directory process
pub async fn run() -> anyhow::Result<()> {
    let config = bootstrap()?;

    let backends = crate::connect_backends(&config).await?;
    let directory = crate::create_directory(&config, &backends).await?;
    let shutdown = Shutdown::new();
    let mut health = HealthState::new()
        .with_probe(directory.clone())
        .with_probe(Arc::new(CacheProbe(backends.cache.clone())));

    match config.transport.backend {
        TransportBackend::Redis => {
            let listener = spawn_redis_responder(&config, directory.clone(), &shutdown).await?;
            health = health
                .with_probe(Arc::new(SubscriptionCheck::new("redis_requests", listener)));
        }
        TransportBackend::InProcess => {
            warn!("In-process transport has no remote gates to answer; responder disabled");
        }
    }

    let components = ApiComponents {
        directory: Some(directory_state(&config, directory)?),
        health,
        ..Default::default()
    };

    info!("Starting directory");
    serve_http(&config, build_app(&config, components), shutdown).await
}

pub(crate) fn directory_state(
    config: &AppConfig,
    directory: Arc<AccessKeyDirectory>,
) -> anyhow::Result<DirectoryState> {
    Ok(DirectoryState {
        directory,
        operator_auth: Arc::new(JwtValidator::new(&config.auth.jwt_config())?),
    })
}

/// Answer gate requests over Redis until shutdown
///
/// Returns the subscription health for the readiness endpoint; the responder
/// resubscribes on its own after a dropped connection.
pub(crate) async fn spawn_redis_responder(
    config: &AppConfig,
    directory: Arc<AccessKeyDirectory>,
    shutdown: &Shutdown,
) -> anyhow::Result<TransportHealth> {
    let listener = RedisListener::connect(&config.transport.redis_config()).await?;
    let health = listener.health();
    let responder = Arc::new(DirectoryResponder::new(directory));

    tokio::spawn(listener.serve(responder, shutdown.wait()));

    Ok(health)
}
