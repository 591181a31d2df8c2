//! Documentation of Rango, a small directory of categorised web pages.
//!
//!
//!
//! # General Infrastructure
//! - One process serving server-rendered HTML under `/rango/`
//! - SQLite file next to the binary, see [`database`]
//! - Outbound calls only to the web search API, see [`search`]
//! - Uploaded profile pictures written to `MEDIA_ROOT` and served under `/media/`
//!
//!
//!
//! # Requests
//!
//! Every handler is a function of request, store and session, see [`routes`].
//!
//! - Anonymous users can browse, search and get autocomplete suggestions
//! - Adding categories or pages, liking, the profile and the restricted page need a login
//! - Anonymous requests to those are redirected to the login page with `next` set
//!
//!
//!
//! # Notes
//!
//! ## Counters
//! Page views, category views and likes are bumped by the store in a single
//! statement. Two people clicking the same link at the same moment both count.
//!
//! ## Slugs
//! Category names travel in URLs through [`directory::slug`]. Spaces show up as
//! underscores, a literal underscore is escaped, so every slug maps back to
//! exactly one name.
//!
//!
//!
//! # Setup
//!
//! Seed a database.
//! ```sh
//! cargo run -p populate -- --database-url sqlite://rango.db
//! ```
//!
//! Run the server.
//! ```sh
//! RUST_LOG=info BING_API_KEY=... cargo run -p rango
//! ```
use std::sync::Arc;

use axum::{Router, response::Redirect, routing::get};
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio::{net::TcpListener, signal::ctrl_c};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod forms;
pub mod routes;
pub mod search;
pub mod session;
pub mod state;
pub mod templates;
pub mod utils;

use routes::{
    about, add_category, add_category_form, add_page, add_page_form, category, category_search,
    index, like_category, login, login_form, logout, profile, register, register_form, restricted,
    run_search, search_form, suggest_category, suggest_category_post, track_url,
};
use state::AppState;
use utils::HOME_PATH;

pub fn router(state: Arc<AppState>) -> Router {
    let media = ServeDir::new(&state.config.media_root);

    Router::new()
        .route("/", get(|| async { Redirect::to(HOME_PATH) }))
        .route("/rango/", get(index))
        .route("/rango/about/", get(about))
        .route("/rango/category/{slug}/", get(category).post(category_search))
        .route(
            "/rango/category/{slug}/add_page/",
            get(add_page_form).post(add_page),
        )
        .route(
            "/rango/add_category/",
            get(add_category_form).post(add_category),
        )
        .route("/rango/register/", get(register_form).post(register))
        .route("/rango/login/", get(login_form).post(login))
        .route("/rango/logout/", get(logout))
        .route("/rango/restricted/", get(restricted))
        .route("/rango/profile/", get(profile))
        .route("/rango/search/", get(search_form).post(run_search))
        .route("/rango/goto/", get(track_url))
        .route("/rango/like_category/", get(like_category))
        .route(
            "/rango/suggest_category/",
            get(suggest_category).post(suggest_category_post),
        )
        .nest_service("/media", media)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await?;
    tokio::spawn(database::prune_sessions(state.pool.clone()));

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    let app = router(state);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
