//! HTTP adapter for the Mu site/item directory.
//!
//! # Responsibility
//! - Map REST routes onto `ItemDirectory` operations.
//! - Apply the fixed, global cross-origin policy to every response.
//! - Seed sites from `MU_API_SEED_FILE`, since no route creates them.
//!
//! # Invariants
//! - Handlers hold no business logic; identity and merge rules live in
//!   `mu_core`.
//! - Every response carries `Access-Control-Allow-Origin: *`, methods
//!   `GET,PUT,POST,DELETE` and header `Content-Type`.

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE,
};
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use log::{error, info, warn};
use mu_core::{
    Config, ItemDirectory, MemorySiteRepository, NewSite, SiteRepository, SqliteSiteRepository,
};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

pub mod error;
pub mod routes;

pub use error::{ApiError, ServerError};

pub type Directory = ItemDirectory<Box<dyn SiteRepository>>;
pub type SharedDirectory = Arc<Directory>;

/// Builds the router over a shared directory.
pub fn app(directory: SharedDirectory) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::PUT, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/", get(routes::index))
        .route("/{reference}", get(routes::get_site).put(routes::update_site))
        .route(
            "/{reference}/items",
            get(routes::list_items).post(routes::add_item),
        )
        .route(
            "/{reference}/items/{type}/{title}",
            get(routes::get_item)
                .put(routes::update_item)
                .delete(routes::delete_item),
        )
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET,PUT,POST,DELETE"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .with_state(directory)
}

/// Opens the configured repository (SQLite when `db_path` is set, else
/// memory) and applies the seed file, if any.
pub fn build_directory(config: &Config) -> Result<SharedDirectory, ServerError> {
    let repo: Box<dyn SiteRepository> = match &config.db_path {
        Some(path) => {
            info!(
                "event=store_select module=http status=ok store=sqlite path={}",
                path.display()
            );
            Box::new(SqliteSiteRepository::open(path)?)
        }
        None => {
            info!("event=store_select module=http status=ok store=memory");
            if config.seed_file.is_none() {
                warn!(
                    "event=store_select module=http status=degraded store=memory reason=no_seed_file"
                );
            }
            Box::new(MemorySiteRepository::new())
        }
    };
    let directory = ItemDirectory::new(repo, config.merge_policy);
    if let Some(path) = &config.seed_file {
        directory.seed_sites(read_seed_file(path)?)?;
    }
    Ok(Arc::new(directory))
}

/// Reads a JSON array of site seeds.
pub fn read_seed_file(path: &Path) -> Result<Vec<NewSite>, ServerError> {
    let seed_error = |reason: String| ServerError::SeedFile {
        path: path.to_path_buf(),
        reason,
    };
    let raw = std::fs::read_to_string(path).map_err(|err| seed_error(err.to_string()))?;
    serde_json::from_str(&raw).map_err(|err| seed_error(err.to_string()))
}

/// Serves the API until Ctrl+C or SIGTERM.
pub async fn start_server(config: Config) -> Result<(), ServerError> {
    let directory = build_directory(&config)?;
    let address = format!("0.0.0.0:{}", config.port);

    let listener = TcpListener::bind(&address).await.map_err(|err| {
        error!("event=http_bind module=http status=error address={address} error={err}");
        err
    })?;
    info!(
        "event=http_start module=http status=ok address={address} merge_policy={}",
        config.merge_policy.as_str()
    );

    axum::serve(listener, app(directory))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("event=http_stop module=http status=ok");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("event=shutdown module=http status=start signal=ctrl_c"),
            Err(err) => {
                error!("event=shutdown module=http status=error signal=ctrl_c error={err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("event=shutdown module=http status=start signal=terminate");
            }
            Err(err) => {
                error!("event=shutdown module=http status=error signal=terminate error={err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
