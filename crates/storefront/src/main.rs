//! Corner Shop Storefront - catalog, cart and order JSON API.
//!
//! This binary serves the storefront on port 3000.
//!
//! # Architecture
//!
//! - Axum JSON API over the library's stores
//! - Hosted document API for products and orders, polled for snapshots
//! - In-memory collections (optionally seeded) when no remote is configured
//! - On-disk mirror for offline reads when a mirror directory is configured

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use corner_shop_storefront::config::StorefrontConfig;
use corner_shop_storefront::mirror::{FileMirror, LocalMirror};
use corner_shop_storefront::remote::{MemoryCollection, RemoteCollection, RestCollection};
use corner_shop_storefront::routes;
use corner_shop_storefront::seed::Seed;
use corner_shop_storefront::state::{AppState, Remotes};
use sentry::integrations::tracing as sentry_tracing;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Build the product and order collections from configuration.
async fn build_remotes(config: &StorefrontConfig) -> Remotes {
    if let Some(remote) = &config.remote {
        tracing::info!(base_url = %remote.base_url, "Using hosted document API");
        let products = RestCollection::new(remote, "products")
            .expect("Invalid products collection URL");
        let orders =
            RestCollection::new(remote, "orders").expect("Invalid orders collection URL");
        return Remotes {
            products: Arc::new(products),
            orders: Arc::new(orders),
        };
    }

    let seed = match &config.seed_file {
        Some(path) => Seed::load(path).await.expect("Failed to load seed file"),
        None => Seed::default(),
    };
    tracing::warn!("No remote configured, using in-memory collections");
    let products: Arc<dyn RemoteCollection> =
        Arc::new(MemoryCollection::with_records("products", seed.products));
    let orders: Arc<dyn RemoteCollection> =
        Arc::new(MemoryCollection::with_records("orders", seed.orders));
    Remotes { products, orders }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Initialize tracing with EnvFilter and Sentry integration
    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "corner_shop_storefront=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let remotes = build_remotes(&config).await;

    let mirror: Option<Arc<dyn LocalMirror>> = match &config.mirror_dir {
        Some(dir) => {
            let mirror = FileMirror::open(dir)
                .await
                .expect("Failed to open mirror directory");
            tracing::info!(dir = %mirror.dir().display(), "Local mirror enabled");
            Some(Arc::new(mirror))
        }
        None => None,
    };

    // Build application state and start the subscriptions
    let state = AppState::new(config.clone(), remotes, mirror);
    let _attached = state.attach();

    // Build router
    let app = routes::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    // Start server
    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
