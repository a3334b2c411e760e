//! Application startup and lifecycle management.

use crate::config::BillingConfig;
use crate::handlers::{bills, customers, jobs, notifications, packages, payments, reports, settings};
use crate::services::{
    get_metrics, init_metrics, BillingStore, Database, InMemoryStore, PushSender, WebPushSender,
};
use crate::workers::LifecycleJobRunner;
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: BillingConfig,
    pub store: Arc<dyn BillingStore>,
    pub push: Arc<dyn PushSender>,
}

/// Health check endpoint for Docker/K8s liveness probes.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(_) => {
            tracing::debug!("Health check passed");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "service": state.config.service_name,
                    "version": state.config.service_version
                })),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": state.config.service_name,
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Readiness check endpoint for K8s readiness probes.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Metrics endpoint for Prometheus scraping.
async fn metrics_handler() -> impl IntoResponse {
    let metrics = get_metrics();
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        metrics,
    )
}

/// Build the HTTP router: business API under `/v1` plus operational endpoints.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/v1/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        .route(
            "/v1/packages",
            post(packages::create_package).get(packages::list_packages),
        )
        .route("/v1/packages/:package_id", get(packages::get_package))
        .route(
            "/v1/customers",
            post(customers::create_customer).get(customers::list_customers),
        )
        .route("/v1/customers/:customer_id", get(customers::get_customer))
        .route(
            "/v1/customers/:customer_id/status",
            put(customers::set_customer_status),
        )
        .route(
            "/v1/customers/:customer_id/balances/refresh",
            post(customers::refresh_balances),
        )
        .route(
            "/v1/customers/:customer_id/push-subscriptions",
            post(customers::register_push_subscription),
        )
        .route(
            "/v1/push-subscriptions/:subscription_id",
            delete(customers::deactivate_push_subscription),
        )
        .route("/v1/bills", get(bills::list_bills))
        .route("/v1/bills/generate", post(bills::generate_bills))
        .route("/v1/bills/:bill_id", get(bills::get_bill))
        .route(
            "/v1/payments",
            post(payments::record_payment).get(payments::list_payments),
        )
        .route("/v1/notifications", get(notifications::list_notifications))
        .route("/v1/jobs/overdue-sweep", post(jobs::run_overdue))
        .route("/v1/jobs/suspension-sweep", post(jobs::run_suspension))
        .route("/v1/jobs/billing-reminders", post(jobs::run_reminders))
        .route("/v1/reports/due-summary", get(reports::due_summary))
        .route("/v1/reports/collections", get(reports::collection_summary))
        .route("/v1/reports/revenue", get(reports::revenue))
        .route("/v1/reports/packages", get(reports::package_distribution));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .merge(api)
        .route_layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
    shutdown_token: CancellationToken,
}

impl Application {
    /// Build the application with the given configuration.
    ///
    /// Connects to PostgreSQL and runs migrations when a database is
    /// configured, otherwise serves from the in-memory store.
    pub async fn build(config: BillingConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build the application without running migrations.
    /// Use this in tests when migrations are already applied by the test harness.
    pub async fn build_without_migrations(config: BillingConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(config: BillingConfig, run_migrations: bool) -> Result<Self, AppError> {
        let store: Arc<dyn BillingStore> = match &config.database {
            Some(database) => {
                let db = Database::new(
                    &database.url,
                    database.max_connections,
                    database.min_connections,
                )
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                    e
                })?;

                if run_migrations {
                    db.run_migrations().await.map_err(|e| {
                        tracing::error!(error = %e, "Failed to run migrations");
                        e
                    })?;
                }

                Arc::new(db)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using the in-memory store");
                Arc::new(InMemoryStore::new())
            }
        };

        let push = WebPushSender::new(&config.push).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("Failed to build push sender: {}", e))
        })?;

        Self::with_components(config, store, Arc::new(push)).await
    }

    /// Build the application around an existing store and push sender.
    pub async fn with_components(
        config: BillingConfig,
        store: Arc<dyn BillingStore>,
        push: Arc<dyn PushSender>,
    ) -> Result<Self, AppError> {
        init_metrics();

        let addr = config.common.socket_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Billing service listener bound");

        Ok(Self {
            port,
            listener,
            state: AppState {
                config,
                store,
                push,
            },
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a handle to the store.
    pub fn store(&self) -> Arc<dyn BillingStore> {
        self.state.store.clone()
    }

    /// Cancelling this token stops the background job runner.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let runner = LifecycleJobRunner::new(
            self.state.config.jobs.clone(),
            self.state.store.clone(),
            self.state.push.clone(),
            self.state.config.push.max_elapsed,
        );
        let runner_token = runner.shutdown_token();
        let app_token = self.shutdown_token.clone();
        tokio::spawn(async move {
            app_token.cancelled().await;
            runner_token.cancel();
        });
        runner.start();

        tracing::info!(
            service = %self.state.config.service_name,
            version = %self.state.config.service_version,
            port = self.port,
            "Service ready to accept connections"
        );

        let app = router(self.state);
        axum::serve(self.listener, app).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
