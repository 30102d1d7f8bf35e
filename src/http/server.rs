//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the admin API
//! - Wire up middleware (request spans, timeout, access logs)
//! - Own the collector/analyzer/tracer lifecycle: the collector's flush
//!   task starts with the server and drains on shutdown
//!
//! The tracing pipeline instruments its own inbound requests through
//! `instrument::http`, so the admin API shows up in its own data.

use axum::{middleware, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin;
use crate::analyzer::Analyzer;
use crate::collector::{Collector, FileStore};
use crate::config::ServiceConfig;
use crate::instrument;
use crate::lifecycle::Shutdown;
use crate::tracer::Tracer;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<Collector>,
    pub analyzer: Arc<Analyzer>,
    pub tracer: Arc<Tracer>,
    pub config: Arc<ServiceConfig>,
}

/// HTTP server for the tracing pipeline.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
    collector: Arc<Collector>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServiceConfig) -> Self {
        let store = FileStore::new(&config.storage.data_dir);
        let collector = Arc::new(Collector::new(config.collector.clone(), store));
        let analyzer = Arc::new(Analyzer::new(
            Arc::clone(&collector),
            config.analyzer.clone(),
        ));
        let tracer = Arc::new(Tracer::new(
            config.server.service_name.clone(),
            Arc::clone(&collector),
        ));

        let state = AppState {
            collector: Arc::clone(&collector),
            analyzer,
            tracer,
            config: Arc::new(config.clone()),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            collector,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        let tracer = Arc::clone(&state.tracer);
        admin::setup_admin_router(state)
            .layer(middleware::from_fn_with_state(
                tracer,
                instrument::http::trace_request,
            ))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.server.request_timeout_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            service_name = %self.config.server.service_name,
            "HTTP server starting"
        );

        // The flush task lives exactly as long as the server.
        let collector = Arc::clone(&self.collector);
        let flush_shutdown = shutdown.subscribe();
        let flush_task = tokio::spawn(async move {
            collector.run(flush_shutdown).await;
        });

        let mut rx = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = rx.recv().await;
            })
            .await?;

        // Make sure the final flush finished before reporting shutdown.
        let _ = flush_task.await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The collector owned by this server. Host-service code hands its
    /// tracer flows this collector via [`AppState`] or this accessor.
    pub fn collector(&self) -> Arc<Collector> {
        Arc::clone(&self.collector)
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}
