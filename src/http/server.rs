//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with every gateway handler
//! - Wire up middleware (tracing, request timeout, CORS)
//! - Serve plain TCP or TLS until shutdown is triggered

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::http::{handlers, websocket};
use crate::lifecycle::GatewayContext;

/// Application state injected into handlers.
pub type AppState = Arc<GatewayContext>;

/// How long in-flight TLS connections may drain after shutdown.
const TLS_DRAIN: Duration = Duration::from_secs(10);

/// Headroom over the invoke budget for proposals and broadcasts.
const INVOKE_MARGIN: Duration = Duration::from_secs(5);

/// Per-request timeout. Never shorter than a fully retried invoke, so the
/// retry loop always reports its own outcome.
pub fn request_timeout(config: &GatewayConfig) -> Duration {
    let configured = Duration::from_secs(config.listener.request_timeout_secs);
    let invoke = Duration::from_millis(config.invoke.worst_case_ms()) + INVOKE_MARGIN;
    configured.max(invoke)
}

/// HTTP server for the gateway API and block socket.
pub struct HttpServer {
    router: Router,
    ctx: AppState,
}

impl HttpServer {
    pub fn new(ctx: AppState) -> Self {
        let router = Self::build_router(ctx.clone());
        Self { router, ctx }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(ctx: AppState) -> Router {
        let timeout = request_timeout(&ctx.config);
        tracing::debug!(timeout_ms = timeout.as_millis() as u64, "Request timeout");
        Router::new()
            .route("/health", get(handlers::health))
            .route("/users", post(handlers::register_user))
            .route("/channels", get(handlers::list_channels))
            .route(
                "/channels/{channel}",
                get(handlers::channel_info).post(handlers::create_channel),
            )
            .route("/channels/{channel}/orgs", get(handlers::channel_orgs))
            .route("/channels/{channel}/peers", get(handlers::channel_peers))
            .route(
                "/channels/{channel}/chaincodes",
                get(handlers::instantiated_chaincodes),
            )
            .route(
                "/channels/{channel}/chaincodes/{chaincode}",
                get(handlers::query).post(handlers::invoke),
            )
            .route(
                "/channels/{channel}/blocks/{number}",
                get(handlers::block_by_number),
            )
            .route(
                "/channels/{channel}/transactions/{txid}",
                get(handlers::transaction_by_id),
            )
            .route("/chaincodes", get(handlers::installed_chaincodes))
            .route("/socket", get(websocket::socket_handler))
            .with_state(ctx)
            .layer(TimeoutLayer::new(timeout))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Serve on `listener` until shutdown is triggered.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let shutdown = self.ctx.shutdown.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until shutdown is triggered.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: axum_server::tls_rustls::RustlsConfig,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let shutdown = self.ctx.shutdown.clone();
        let drain = handle.clone();
        tokio::spawn(async move {
            shutdown.wait().await;
            drain.graceful_shutdown(Some(TLS_DRAIN));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    pub fn context(&self) -> &AppState {
        &self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::fabric::SimNetwork;
    use crate::lifecycle::{bootstrap, Shutdown};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn router() -> (SimNetwork, Router) {
        let (sim, _ctx, app) = router_with(GatewayConfig::default()).await;
        (sim, app)
    }

    async fn router_with(config: GatewayConfig) -> (SimNetwork, AppState, Router) {
        let sim = SimNetwork::new(&config.network);
        sim.add_channel("common");
        let ctx = bootstrap(config, Arc::new(sim.clone()), Arc::new(Shutdown::new()))
            .await
            .unwrap();
        let ctx = Arc::new(ctx);
        (sim, ctx.clone(), HttpServer::build_router(ctx))
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (_sim, app) = router().await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let value = json(response).await;
        assert_eq!(value["identity"], "admin");
        assert_eq!(value["relayed_channels"], 1);
    }

    #[tokio::test]
    async fn test_invoke_then_query() {
        let (_sim, app) = router().await;

        let response = app
            .clone()
            .oneshot(
                Request::post("/channels/common/chaincodes/kv")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"fcn":"put","args":["k","v"],"waitForTransactionEvent":true}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let value = json(response).await;
        assert_eq!(value["status"], "VALID");
        assert!(value["blockNumber"].is_u64());

        let response = app
            .oneshot(
                Request::get("/channels/common/chaincodes/kv?fcn=get&args=%5B%22k%22%5D")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await, serde_json::json!(["v"]));
    }

    #[tokio::test]
    async fn test_missing_block_is_404() {
        let (_sim, app) = router().await;
        let response = app
            .oneshot(
                Request::get("/channels/common/blocks/42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_channel_peers() {
        let (_sim, app) = router().await;
        let response = app
            .oneshot(
                Request::get("/channels/common/peers")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let value = json(response).await;
        assert_eq!(value[0]["name"], "peer0.org1.example.com");
        assert_eq!(value[0]["msp_id"], "org1MSP");
    }

    #[tokio::test]
    async fn test_duplicate_user_is_conflict() {
        let (sim, app) = router().await;
        let register = || {
            Request::post("/users")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"username":"alice","password":"pw"}"#))
                .unwrap()
        };

        let response = app.clone().oneshot(register()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(sim.is_registered("alice"));

        let response = app.oneshot(register()).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_bad_query_args() {
        let (_sim, app) = router().await;
        let response = app
            .oneshot(
                Request::get("/channels/common/chaincodes/kv?fcn=get&args=k")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_request_timeout_covers_invoke_budget() {
        let config = GatewayConfig::default();
        assert_eq!(request_timeout(&config), Duration::from_millis(186_000) + INVOKE_MARGIN);

        let mut config = GatewayConfig::default();
        config.invoke.retry_count = 1;
        config.invoke.commit_timeout_ms = 1000;
        assert_eq!(request_timeout(&config), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_short_request_timeout_does_not_cut_invoke() {
        let mut config = GatewayConfig::default();
        config.listener.request_timeout_secs = 1;
        config.invoke.commit_timeout_ms = 600;
        config.invoke.retry_delay_ms = 30;
        let (sim, _ctx, app) = router_with(config).await;
        sim.set_commit_delay(Duration::from_secs(10));

        let response = app
            .oneshot(
                Request::post("/channels/common/chaincodes/kv")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"fcn":"put","args":["k","v"],"waitForTransactionEvent":true}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(sim.proposal_tx_ids().len(), 3);
        let value = json(response).await;
        assert!(value["error"].as_str().unwrap().contains("3 attempts"));
    }

    #[tokio::test]
    async fn test_unknown_channels_are_404_and_not_cached() {
        let (_sim, ctx, app) = router_with(GatewayConfig::default()).await;
        let before = ctx.channels.len();

        for i in 0..20 {
            let response = app
                .clone()
                .oneshot(
                    Request::get(format!("/channels/nope{}", i))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
        assert_eq!(ctx.channels.len(), before);
    }
}
