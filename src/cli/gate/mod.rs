//! Gate command - token-info API resolving keys through the directory

use std::sync::Arc;

use tracing::info;

use crate::api::{ApiComponents, CacheProbe, HealthState, SubscriptionCheck};
use crate::config::{DirectoryMode, TransportBackend};
use crate::domain::access_key::AccessKeyResolver;
use crate::infrastructure::transport::RedisTransport;

use super::{bootstrap, build_app, serve_http, Shutdown};

/// Run the gate process
pub async fn run() -> anyhow::Result<()> {
    let config = bootstrap()?;

    let backends = crate::connect_backends(&config).await?;
    let mut health = HealthState::new();

    let resolver: Arc<dyn AccessKeyResolver> = match config.gate.directory {
        DirectoryMode::Local => {
            let directory = crate::create_directory(&config, &backends).await?;
            health = health
                .with_probe(directory.clone())
                .with_probe(Arc::new(CacheProbe(backends.cache.clone())));
            directory
        }
        DirectoryMode::Remote => {
            if config.transport.backend == TransportBackend::InProcess {
                anyhow::bail!(
                    "gate with a remote directory needs the redis transport; use `serve` for in-process"
                );
            }

            let transport =
                Arc::new(RedisTransport::connect(&config.transport.redis_config()).await?);
            health = health.with_probe(Arc::new(SubscriptionCheck::new(
                "redis_replies",
                transport.health(),
            )));
            if config.gate.cache_remote_lookups {
                health = health.with_probe(Arc::new(CacheProbe(backends.cache.clone())));
            }
            crate::create_remote_resolver(&config, &backends, transport)
        }
    };

    let components = ApiComponents {
        gate: Some(crate::create_gate(&config, &backends, resolver)),
        health,
        ..Default::default()
    };

    info!("Starting gate: directory={:?}", config.gate.directory);
    serve_http(&config, build_app(&config, components), Shutdown::new()).await
}
