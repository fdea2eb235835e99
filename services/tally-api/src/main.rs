//! Tally API
//!
//! Entitlement, usage-limit and billing-reconciliation service.
//!
//! ## REST Endpoints
//!
//! Caller identity arrives as `x-account-id` / `x-account-role` /
//! `x-account-plan` headers from the identity gateway.
//!
//! - `GET /api/v1/entitlement` - Effective plan and limits
//! - `GET /api/v1/usage` - Usage summary for the current period
//! - `POST /api/v1/usage/{kind}/check` - Check a resource limit
//! - `POST /api/v1/usage/{kind}/consume` - Consume one unit
//! - `POST /api/v1/subscription/init` - Ensure a subscription row exists
//! - `POST /api/v1/subscription/cancel` - Cancel at period end
//! - `POST /admin/accounts/{id}/plan` - Force a plan (admin only)
//! - `POST /admin/accounts/{id}/reset` - Reset to free (admin only)
//! - `POST /webhooks/stripe` - Stripe webhook handler
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `GET /metrics` - Prometheus metrics

mod config;
mod error;
mod extractors;
mod handlers;
mod rate_limit;
mod state;

use std::net::SocketAddr;

use axum::extract::connect_info::IntoMakeServiceWithConnectInfo;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tally_core::RateLimiter;
use tally_db::pg::Repositories;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::handlers::{health, ready};
use crate::rate_limit::{purge_loop, rate_limit};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("tally_api=debug".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Tally API");

    let config = Config::from_env()?;
    tracing::info!(
        http_port = config.http_port,
        rate_limit_requests = config.rate_limit_requests,
        rate_limit_window_ms = config.rate_limit_window.as_millis() as u64,
        admin_ids = config.entitlement.admin_account_ids.len(),
        "Configuration loaded"
    );

    let metrics_handle = if config.metrics_enabled {
        Some(setup_metrics()?)
    } else {
        None
    };

    let pool = tally_db::create_pool_with_options(&config.database_url, config.pool).await?;
    tally_db::run_migrations(&pool).await?;
    tracing::info!("Database pool created, migrations applied");

    let repos = Repositories::new(pool.clone());

    // One limiter for the lifetime of the process
    let limiter = RateLimiter::new();
    tokio::spawn(purge_loop(limiter.clone(), config.rate_limit_window));

    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let state = AppState::new(repos, pool, limiter, config);
    let app = build_router(state, metrics_handle);

    run_http_server(app, http_addr).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();

    // Rate limited per account (or client address when anonymous)
    let api_v1 = Router::new()
        .route("/entitlement", get(handlers::get_entitlement))
        .route("/usage", get(handlers::get_usage))
        .route("/usage/{kind}/check", post(handlers::check_usage))
        .route("/usage/{kind}/consume", post(handlers::consume_usage))
        .route("/subscription/init", post(handlers::init_subscription))
        .route("/subscription/cancel", post(handlers::cancel_subscription))
        .route_layer(from_fn_with_state(state.rate_limit.clone(), rate_limit));

    let admin_routes = Router::new()
        .route("/accounts/{id}/plan", post(handlers::set_plan))
        .route("/accounts/{id}/reset", post(handlers::reset_plan));

    // Raw body, signature verified in the handler
    let webhook_routes = Router::new().route("/webhooks/stripe", post(handlers::stripe_webhook));

    // Health routes (no timeout)
    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Outermost first
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .nest("/api/v1", api_v1)
        .nest("/admin", admin_routes)
        .merge(webhook_routes)
        .layer(middleware)
        .merge(health_routes)
        .merge(metrics_route)
        .with_state(state)
}

async fn run_http_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Peer address feeds the rate-limit key for anonymous callers
    let service: IntoMakeServiceWithConnectInfo<Router, SocketAddr> =
        app.into_make_service_with_connect_info();

    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    // Store round trip dominates; most ops finish well under 100ms
    let latency_buckets = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.2, 0.5, 1.0, 2.5];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("tally_operation_duration_seconds".to_string()),
            latency_buckets,
        )?
        .install_recorder()?;

    metrics::describe_counter!(
        "tally_usage_consumed_total",
        "Resource units consumed by kind"
    );
    metrics::describe_counter!(
        "tally_usage_denied_total",
        "Consume attempts refused at the period limit"
    );
    metrics::describe_counter!(
        "tally_rate_limited_total",
        "Requests rejected by the rate limiter"
    );
    metrics::describe_counter!(
        "tally_webhooks_processed_total",
        "Billing webhooks processed by outcome"
    );
    metrics::describe_counter!(
        "tally_cancellations_scheduled_total",
        "Subscriptions scheduled to cancel at period end"
    );
    metrics::describe_histogram!(
        "tally_operation_duration_seconds",
        "Handler latency in seconds by operation"
    );

    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
