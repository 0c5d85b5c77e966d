//! # recapctl: Control Layer for the Recap Platform
//!
//! `recapctl` is the entitlement and billing-synchronization backend for
//! Recap, a video summarization service. It decides whether a user may
//! produce another summary, and keeps each user's plan tier in lockstep
//! with the billing provider.
//!
//! ## Overview
//!
//! Users produce **summaries** - the unit of billable work. Their **plan
//! tier** (ANONYMOUS, FREE, PRO, ENTERPRISE) grants an **entitlement**: a
//! usage limit counted over either the user's lifetime or the current
//! calendar month. The summarization pipeline itself, the web frontend, and
//! the authentication protocol live elsewhere; this service owns the
//! decision-making in between.
//!
//! ### Request Flow
//!
//! A request creating a summary first passes the usage gate: the user's
//! plan resolves to an entitlement, their current usage is counted fresh
//! from the store (archived summaries never count), and the write proceeds
//! only if usage is below the limit. The check and the write are two
//! separate store round-trips; concurrent requests can overshoot the limit
//! by at most the number of in-flight requests, a deliberate trade of
//! exactness for availability.
//!
//! Independently, the billing provider delivers signed webhook events to
//! `/webhooks/billing`. After HMAC verification, subscription events flow
//! into the plan synchronizer, which writes plan tier, provider IDs and
//! billing period end onto the user record with set semantics - replayed
//! deliveries are harmless, so no event-ID bookkeeping is needed.
//!
//! ### Core Components
//!
//! The **API layer** ([`api`]) exposes the summary resource, a usage
//! endpoint for the frontend's quota banner, and the webhook endpoint. The
//! **entitlement layer** ([`entitlements`]) holds the policy table, the
//! usage gate and the plan synchronizer. The **database layer** ([`db`])
//! puts PostgreSQL behind store traits so the logic can be exercised
//! against in-memory fakes. The **billing layer** ([`billing`]) verifies
//! webhook signatures and speaks the one provider API call the dispatcher
//! needs.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use recapctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = recapctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     recapctl::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! The application requires a PostgreSQL database and automatically runs
//! migrations on startup:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
//! recapctl::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod billing;
pub mod config;
pub mod db;
pub mod entitlements;
pub mod errors;
pub mod openapi;
pub mod telemetry;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use bon::Builder;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::billing::provider::{BillingApi, HttpBillingApi};
use crate::db::handlers::{PgSummaries, PgUsers};
use crate::db::store::{SummaryStore, UserStore};
use crate::openapi::ApiDoc;

pub use config::Config;
pub use types::{SummaryId, UserId, abbrev_uuid};

/// Application state shared across all request handlers.
///
/// Stores and the provider API are held as trait objects: handlers and the
/// entitlement components are constructed per request from these, so tests
/// can substitute fakes and several isolated instances can coexist in one
/// process. Deliberately absent: any cache of plan tiers or usage counts -
/// stale entitlement reads are a correctness bug, not a performance
/// trade-off.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn UserStore>,
    pub summaries: Arc<dyn SummaryStore>,
    /// Provider API access; `None` disables checkout resolution
    pub billing: Option<Arc<dyn BillingApi>>,
}

/// Get the recapctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Build the main application router with all endpoints and middleware.
///
/// This constructs the complete Axum router with:
/// - Summary, usage and profile routes under `/api/v1`
/// - The billing webhook endpoint
/// - API docs at `/docs`
/// - Tracing middleware
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> Router {
    // API routes
    let api_routes = Router::new()
        .route("/usage", get(api::handlers::usage::get_usage))
        .route("/users/me", get(api::handlers::users::get_current_user))
        // Summaries management
        .route(
            "/summaries",
            get(api::handlers::summaries::list_summaries).post(api::handlers::summaries::create_summary),
        )
        .route(
            "/summaries/{id}",
            get(api::handlers::summaries::get_summary)
                .patch(api::handlers::summaries::update_summary)
                .delete(api::handlers::summaries::delete_summary),
        )
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        // Webhook routes (external services, not part of client API docs)
        .route("/webhooks/billing", post(api::handlers::billing::webhook))
        .with_state(state)
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    // Add tracing layer
    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// Setup the database connection pool and run migrations
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool_settings = &config.database.pool;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(pool_settings.max_connections)
        .min_connections(pool_settings.min_connections)
        .acquire_timeout(Duration::from_secs(pool_settings.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(pool_settings.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(pool_settings.max_lifetime_secs))
        .connect(&config.database.url)
        .await?;

    migrator().run(&pool).await?;

    Ok(pool)
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs
///    migrations, and wires stores into the router
/// 2. **Serve**: [`Application::serve`] binds a TCP port and handles
///    requests until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = setup_database(&config).await?;

        let users: Arc<dyn UserStore> = Arc::new(PgUsers::new(pool.clone()));
        let summaries: Arc<dyn SummaryStore> = Arc::new(PgSummaries::new(pool.clone()));

        // Provider API access is optional; without it, checkout-completed
        // events are logged and dropped instead of resolved
        let billing_api: Option<Arc<dyn BillingApi>> = match config.billing.as_ref() {
            Some(billing) => match (billing.api_url.clone(), billing.api_key.clone()) {
                (Some(url), Some(key)) => Some(Arc::new(HttpBillingApi::new(url, key, billing.api_timeout)?)),
                _ => {
                    info!("Billing provider API not configured; checkout resolution disabled");
                    None
                }
            },
            None => None,
        };

        let state = AppState::builder()
            .config(config.clone())
            .users(users)
            .summaries(summaries)
            .maybe_billing(billing_api)
            .build();

        let router = build_router(state);

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Control layer listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        // Run the server with graceful shutdown
        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        // Close database connections
        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
