//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fabric_gateway::config::GatewayConfig;
use fabric_gateway::fabric::SimNetwork;
use fabric_gateway::lifecycle::{bootstrap, Shutdown};
use fabric_gateway::HttpServer;
use tokio::net::TcpListener;

/// A gateway serving on a loopback port, backed by a simulated network.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub sim: SimNetwork,
    pub shutdown: Arc<Shutdown>,
}

#[allow(dead_code)]
impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn socket_url(&self) -> String {
        format!("ws://{}/socket", self.addr)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config with short back-off so retry scenarios finish quickly.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.invoke.retry_delay_ms = 10;
    config.invoke.commit_timeout_ms = 2_000;
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config
}

/// Start a gateway with `channels` created on a fresh simulated network.
pub async fn start_gateway(config: GatewayConfig, channels: &[&str]) -> TestGateway {
    let sim = SimNetwork::new(&config.network);
    for channel in channels {
        sim.add_channel(channel);
    }

    let shutdown = Arc::new(Shutdown::new());
    let ctx = bootstrap(config, Arc::new(sim.clone()), shutdown.clone())
        .await
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(Arc::new(ctx));
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    TestGateway {
        addr,
        sim,
        shutdown,
    }
}

/// Poll `condition` until it holds or a second has passed.
#[allow(dead_code)]
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
