//! Integration tests running whole discovery runs against loopback backends.
//!
//! Every 127.x.y.z address routes to loopback on Linux, so sweeping
//! `127.0.1.*` and `127.0.0.*` exercises real connection refusals next to a
//! real backend.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use netguardian_discovery::{
    DiscoveryConfig, DiscoveryController, DiscoveryError, EndpointCache, FileEndpointCache,
    HttpProbe,
};
use netguardian_types::{CandidateEndpoint, DiscoveryState, PersistedEndpoint, SubnetPrefix};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn spawn_backend() -> SocketAddr {
    let app = Router::new().route("/api/health", get(|| async { "{\"status\":\"Good\"}" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn loopback_config(port: u16, prefixes: &[SubnetPrefix]) -> DiscoveryConfig {
    DiscoveryConfig {
        port,
        prefixes: prefixes.to_vec(),
        first_host: 1,
        last_host: 4,
        batch_size: 2,
        sweep_timeout_ms: 500,
        reconnect_timeout_ms: 1000,
        ..DiscoveryConfig::default()
    }
}

fn controller(config: DiscoveryConfig, cache: &FileEndpointCache) -> DiscoveryController {
    let probe = HttpProbe::new(config.health_path.clone()).unwrap();
    DiscoveryController::new(config, Arc::new(probe), Arc::new(cache.clone()))
}

#[tokio::test]
async fn cached_backend_is_reused_without_sweeping() {
    init_tracing();
    let addr = spawn_backend().await;
    let endpoint = CandidateEndpoint::parse(&format!("http://{addr}")).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let cache = FileEndpointCache::new(dir.path().join("endpoint.toml"));
    cache
        .store(&PersistedEndpoint {
            base_url: endpoint.clone(),
            verified_at: 42,
        })
        .unwrap();

    // The sweep config points at a dead port, so only the cache can succeed.
    let config = loopback_config(unused_port(), &[SubnetPrefix::new(127, 0, 0)]);
    let controller = controller(config, &cache);
    let mut transitions = controller.transitions();

    let found = controller.run().await.unwrap();
    assert_eq!(found, endpoint);

    let mut states = Vec::new();
    while let Ok(state) = transitions.try_recv() {
        states.push(state);
    }
    assert_eq!(
        states,
        vec![
            DiscoveryState::ReconnectingCache,
            DiscoveryState::Found { endpoint },
        ]
    );
    // Not rewritten
    assert_eq!(cache.load().unwrap().unwrap().verified_at, 42);
}

#[tokio::test]
async fn sweep_finds_backend_on_second_subnet_and_persists_it() {
    init_tracing();
    let addr = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let cache = FileEndpointCache::new(dir.path().join("endpoint.toml"));

    let config = loopback_config(
        addr.port(),
        &[SubnetPrefix::new(127, 0, 1), SubnetPrefix::new(127, 0, 0)],
    );
    let controller = controller(config, &cache);

    let found = controller.run().await.unwrap();
    let expected = CandidateEndpoint::parse(&format!("http://127.0.0.1:{}", addr.port())).unwrap();
    assert_eq!(found, expected);
    assert_eq!(cache.read().unwrap(), Some(expected.clone()));

    // A second run reconnects straight from the file.
    let mut transitions = controller.transitions();
    assert_eq!(controller.run().await.unwrap(), expected);
    assert_eq!(
        transitions.try_recv().unwrap(),
        DiscoveryState::ReconnectingCache
    );
    assert!(matches!(
        transitions.try_recv().unwrap(),
        DiscoveryState::Found { .. }
    ));
}

#[tokio::test]
async fn stale_cache_and_no_backend_fails_then_retries() {
    init_tracing();
    let port = unused_port();
    let dir = tempfile::tempdir().unwrap();
    let cache = FileEndpointCache::new(dir.path().join("endpoint.toml"));
    let stale = CandidateEndpoint::parse(&format!("http://127.0.0.1:{port}")).unwrap();
    cache.write(&stale).unwrap();

    let config = loopback_config(port, &[SubnetPrefix::new(127, 0, 0)]);
    let controller = controller(config, &cache);

    let result = controller.run().await;
    assert!(matches!(result, Err(DiscoveryError::Exhausted(_))));
    assert!(matches!(controller.state(), DiscoveryState::Failed { .. }));

    let mut transitions = controller.transitions();
    let result = tokio::time::timeout(Duration::from_secs(10), controller.retry())
        .await
        .unwrap();
    assert!(matches!(result, Err(DiscoveryError::Exhausted(_))));
    assert_eq!(
        transitions.try_recv().unwrap(),
        DiscoveryState::ReconnectingCache
    );
    // The stale entry is left alone; only successes write.
    assert_eq!(cache.read().unwrap(), Some(stale));
}
