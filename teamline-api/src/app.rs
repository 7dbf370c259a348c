/// Application state and router builder
///
/// Defines the shared application state and assembles the axum router
/// with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use teamline_api::{app::AppState, config::Config};
/// use teamline_shared::events::EventBus;
///
/// # async fn example(
/// #     pool: sqlx::PgPool,
/// #     storage: Arc<dyn teamline_shared::storage::ObjectStore>,
/// #     identity: Arc<dyn teamline_shared::identity::IdentityProvider>,
/// #     assistant: Arc<dyn teamline_shared::assistant::GenerationClient>,
/// # ) -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let (events, _rx) = EventBus::new();
/// let state = AppState::new(pool, config, events, storage, identity, assistant);
/// let app = teamline_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer, routes};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use teamline_shared::assistant::GenerationClient;
use teamline_shared::auth::{jwt, middleware::AuthContext};
use teamline_shared::events::EventBus;
use teamline_shared::identity::IdentityProvider;
use teamline_shared::models::user::User;
use teamline_shared::storage::ObjectStore;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned into every request handler via axum's `State` extractor;
/// everything inside is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Domain-event publishing handle
    pub events: EventBus,

    /// Object store for attachment blobs
    pub storage: Arc<dyn ObjectStore>,

    /// Identity-provider admin client
    pub identity: Arc<dyn IdentityProvider>,

    /// Text-generation client for the chat assistant
    pub assistant: Arc<dyn GenerationClient>,
}

impl AppState {
    /// Creates new application state
    pub fn new(
        db: PgPool,
        config: Config,
        events: EventBus,
        storage: Arc<dyn ObjectStore>,
        identity: Arc<dyn IdentityProvider>,
        assistant: Arc<dyn GenerationClient>,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            events,
            storage,
            identity,
            assistant,
        }
    }
}

/// Builds the complete axum router
///
/// ```text
/// /
/// ├── /health                       # public
/// └── /api/v1/                      # bearer-token protected
///     ├── /projects[...]            # CRUD + members
///     ├── /tasks[...]               # CRUD + by-status + subresources
///     ├── /comments[...]            # CRUD
///     ├── /attachments[...]         # upload, download-url, delete
///     ├── /users[...]               # CRUD + profile + notifications
///     └── /chat/...                 # sessions + messages
/// ```
///
/// Middleware, outermost first: security headers, CORS, request
/// tracing; authentication wraps everything under `/api/v1`.
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let project_routes = Router::new()
        .route("/", get(routes::projects::list_projects).post(routes::projects::create_project))
        .route(
            "/:id",
            get(routes::projects::get_project)
                .put(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        .route(
            "/:id/members",
            get(routes::projects::list_members).post(routes::projects::add_member),
        );

    let task_routes = Router::new()
        .route("/", get(routes::tasks::list_tasks).post(routes::tasks::create_task))
        .route(
            "/:id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/status/:status", get(routes::tasks::list_tasks_by_status))
        .route("/:id/comments", get(routes::comments::list_for_task))
        .route("/:id/attachments", get(routes::attachments::list_for_task));

    let comment_routes = Router::new()
        .route("/", get(routes::comments::list_comments).post(routes::comments::create_comment))
        .route(
            "/:id",
            get(routes::comments::get_comment)
                .put(routes::comments::update_comment)
                .delete(routes::comments::delete_comment),
        )
        .route("/:id/attachments", get(routes::attachments::list_for_comment));

    let attachment_routes = Router::new()
        .route("/", post(routes::attachments::upload_attachment))
        .route(
            "/:id",
            get(routes::attachments::get_attachment).delete(routes::attachments::delete_attachment),
        )
        .route("/:id/download-url", get(routes::attachments::download_url));

    let user_routes = Router::new()
        .route("/", get(routes::users::list_users).post(routes::users::create_user))
        .route("/profile", get(routes::users::profile))
        .route("/notifications", get(routes::users::notifications))
        .route(
            "/:id",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        );

    let chat_routes = Router::new()
        .route(
            "/sessions",
            get(routes::chat::list_sessions).post(routes::chat::create_session),
        )
        .route(
            "/sessions/:id",
            get(routes::chat::get_session).delete(routes::chat::delete_session),
        )
        .route("/messages", post(routes::chat::send_message));

    let v1_routes = Router::new()
        .nest("/projects", project_routes)
        .nest("/tasks", task_routes)
        .nest("/comments", comment_routes)
        .nest("/attachments", attachment_routes)
        .nest("/users", user_routes)
        .nest("/chat", chat_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_layer,
        ));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.contains(&"*".to_string()) {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Bearer-token authentication layer
///
/// Validates the token against the identity provider's shared secret
/// and issuer, resolves the token subject to a local user row, and
/// injects [`AuthContext`] into request extensions.
async fn auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::BadRequest("Expected Bearer token".to_string()))?;

    let claims = jwt::validate_token(token, &state.config.auth.secret, &state.config.auth.issuer)?;

    // The token subject is the identity-provider user id; the acting
    // user is the local row mirroring it.
    let user = User::find_by_identity_id(&state.db, claims.sub)
        .await
        .map_err(|e| ApiError::Internal(format!("Principal lookup failed: {}", e)))?
        .ok_or_else(|| ApiError::Unauthorized("Unknown principal".to_string()))?;

    req.extensions_mut().insert(AuthContext::from_user(&user));

    Ok(next.run(req).await)
}
