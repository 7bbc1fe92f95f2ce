//! ABC Ledger API Gateway
//!
//! HTTP surface over the common domain services.
//! Handles:
//! - Authentication (bearer tokens)
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics, request ids)

pub mod extract;
pub mod handlers;
pub mod middleware;

use axum::{
    extract::{FromRef, Request},
    middleware::Next,
    routing::get,
    Extension, Router,
};
use abcledger_common::{
    auth::JwtManager,
    catalog::CatalogKind,
    config::AppConfig,
    errors::{AppError, Result},
    notes::{NarrativeGenerator, NotesMode},
    store::Store,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub generator: Arc<dyn NarrativeGenerator>,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        generator: Arc<dyn NarrativeGenerator>,
    ) -> Result<Self> {
        let secret = config
            .auth
            .jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "auth.jwt_secret must be set".to_string(),
            })?;
        let jwt = Arc::new(JwtManager::new(secret, config.auth.jwt_expiration_secs));

        Ok(Self {
            config: Arc::new(config),
            store,
            generator,
            jwt,
        })
    }

    pub fn notes_mode(&self) -> NotesMode {
        self.config.generation.notes_mode
    }
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

/// Routes shared by every catalog kind
fn catalog_routes(kind: CatalogKind) -> Router<AppState> {
    use handlers::catalog;

    Router::new()
        .route("/", get(catalog::list).post(catalog::create))
        .route(
            "/{id}",
            get(catalog::get)
                .put(catalog::update)
                .patch(catalog::update)
                .delete(catalog::delete),
        )
        .layer(Extension(kind))
}

fn client_routes() -> Router<AppState> {
    use handlers::{clients, notes, sessions};

    Router::new()
        .route("/", get(clients::list).post(clients::create))
        .route(
            "/{client_id}",
            get(clients::get).patch(clients::update).delete(clients::delete),
        )
        .route(
            "/{client_id}/sessions",
            get(sessions::list).post(sessions::create),
        )
        .route(
            "/{client_id}/sessions/{session_id}",
            get(sessions::get).put(sessions::update).delete(sessions::delete),
        )
        .route(
            "/{client_id}/sessions/{session_id}/notes",
            get(notes::latest).post(notes::generate).put(notes::edit),
        )
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut api_routes = Router::new().nest("/client", client_routes());
    for kind in CatalogKind::ALL {
        api_routes = api_routes.nest(&format!("/{}", kind.path_segment()), catalog_routes(kind));
    }

    let mut app = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes)
        .fallback(handlers::not_found)
        .layer(axum::middleware::from_fn(middleware::metrics::track_metrics));

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        app = app.layer(axum::middleware::from_fn(move |request: Request, next: Next| {
            middleware::rate_limit::rate_limit_middleware(request, next, limiter.clone())
        }));
    }

    // Compose the app
    app.layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}
