//! Serve command - directory and gate in one process

use std::sync::Arc;

use tracing::info;

use crate::api::{ApiComponents, CacheProbe, HealthState, SubscriptionCheck};
use crate::config::{DirectoryMode, TransportBackend};
use crate::domain::access_key::AccessKeyResolver;
use crate::infrastructure::access_key::DirectoryResponder;
use crate::infrastructure::transport::{in_process_channel, RedisTransport};

use super::directory::{directory_state, spawn_redis_responder};
use super::{bootstrap, build_app, serve_http, Shutdown};

const IN_PROCESS_BUFFER: usize = 256;

/// Run directory and gate together
pub async fn run() -> anyhow::Result<()> {
    let config = bootstrap()?;

    let backends = crate::connect_backends(&config).await?;
    let directory = crate::create_directory(&config, &backends).await?;
    let shutdown = Shutdown::new();
    let mut health = HealthState::new()
        .with_probe(directory.clone())
        .with_probe(Arc::new(CacheProbe(backends.cache.clone())));

    let resolver: Arc<dyn AccessKeyResolver> = match (config.gate.directory, config.transport.backend) {
        (DirectoryMode::Local, _) => directory.clone(),
        (DirectoryMode::Remote, TransportBackend::InProcess) => {
            let (transport, listener) = in_process_channel(IN_PROCESS_BUFFER);
            let responder = Arc::new(DirectoryResponder::new(directory.clone()));
            tokio::spawn(listener.serve(responder, shutdown.wait()));
            crate::create_remote_resolver(&config, &backends, Arc::new(transport))
        }
        (DirectoryMode::Remote, TransportBackend::Redis) => {
            let listener = spawn_redis_responder(&config, directory.clone(), &shutdown).await?;
            let transport =
                Arc::new(RedisTransport::connect(&config.transport.redis_config()).await?);
            let replies = transport.health();
            health = health
                .with_probe(Arc::new(SubscriptionCheck::new("redis_requests", listener)))
                .with_probe(Arc::new(SubscriptionCheck::new("redis_replies", replies)));
            crate::create_remote_resolver(&config, &backends, transport)
        }
    };

    let components = ApiComponents {
        directory: Some(directory_state(&config, directory)?),
        gate: Some(crate::create_gate(&config, &backends, resolver)),
        health,
        ..Default::default()
    };

    info!(
        "Starting directory and gate: directory={:?}, transport={:?}",
        config.gate.directory, config.transport.backend
    );
    serve_http(&config, build_app(&config, components), shutdown).await
}
