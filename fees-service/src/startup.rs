//! Application startup and lifecycle management.
//!
//! Builds the HTTP server: binds the listener (port 0 picks a random port
//! for testing), runs migrations, and assembles the router with the
//! tracing, request-id and metrics layers.

use crate::config::FeesConfig;
use crate::handlers;
use crate::services::{get_metrics, Database};
use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use service_core::error::AppError;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: FeesConfig,
}

/// Health check endpoint for liveness probes.
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "fees-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Readiness check endpoint; verifies the database answers.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Prometheus metrics endpoint.
async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: FeesConfig) -> Result<Self, AppError> {
        let db = Database::new(&config.database.url, config.database.max_connections).await?;
        db.run_migrations().await?;

        let state = AppState {
            db,
            config: config.clone(),
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Fees service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a handle to the database.
    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);
        axum::serve(self.listener, router).await
    }
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_endpoint))
        // Directory
        .route("/students", post(handlers::students::create_student))
        .route("/students/:id", get(handlers::students::get_student))
        .route(
            "/students/:id/dues",
            get(handlers::students::get_student_dues),
        )
        .route("/staff", post(handlers::staff::create_staff))
        .route("/staff/:id", get(handlers::staff::get_staff))
        // Invoice ledger
        .route(
            "/invoices",
            get(handlers::invoices::list_invoices).post(handlers::invoices::create_invoice),
        )
        .route(
            "/invoices/:id",
            get(handlers::invoices::get_invoice).delete(handlers::invoices::delete_invoice),
        )
        .route(
            "/invoices/:id/items",
            post(handlers::invoices::add_invoice_item),
        )
        .route(
            "/invoices/:id/items/:item_id",
            delete(handlers::invoices::remove_invoice_item),
        )
        .route(
            "/invoices/:id/dues",
            get(handlers::invoices::list_invoice_dues).post(handlers::invoices::create_invoice_due),
        )
        // Receipts
        .route("/receipts", post(handlers::receipts::record_payment))
        .route(
            "/receipts/:id",
            get(handlers::receipts::get_receipt).put(handlers::receipts::update_receipt),
        )
        // Dues
        .route("/dues", get(handlers::dues::list_dues))
        .route(
            "/dues/:id",
            axum::routing::put(handlers::dues::update_due).delete(handlers::dues::delete_due),
        )
        .route("/dues/:id/extend", post(handlers::dues::extend_due))
        // Reporting and admin
        .route("/dashboard/summary", get(handlers::dashboard::dashboard_summary))
        .route(
            "/billing/sequence",
            get(handlers::billing::get_bill_sequence).put(handlers::billing::set_bill_sequence),
        )
        .layer(from_fn(crate::services::metrics::http_metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
