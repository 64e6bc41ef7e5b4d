use anyhow::Result;
use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use tracing::{debug, error, info};

use axum_extra::extract::cookie::{Cookie, SameSite};
use tower_http::services::ServeDir;

use axum::{
    body::Body,
    extract::State,
    http::{response, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::catalog_routes::make_catalog_routes;
use super::engagement_routes::make_engagement_routes;
use super::session::{Session, COOKIE_SESSION_TOKEN_KEY};
use super::{log_requests, state::*, ServerConfig};
use crate::engagement::EngagementError;
use crate::spotify::Catalog;
use crate::store::FullStore;
use crate::user::auth::{AuthToken, AuthTokenValue, PasswordCredentials};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub authenticated: bool,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        authenticated: session.is_some(),
    };
    Json(stats)
}

#[derive(Deserialize, Debug)]
struct SignupBody {
    pub handle: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
struct LoginBody {
    pub handle: String,
    pub password: String,
}

#[derive(Serialize)]
struct AuthSuccessResponse {
    token: String,
}

const MIN_PASSWORD_LEN: usize = 8;

fn session_response(status: StatusCode, token: &str) -> Response {
    let response_body = serde_json::to_string(&AuthSuccessResponse {
        token: token.to_string(),
    })
    .unwrap();
    let cookie_value = HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly",
        COOKIE_SESSION_TOKEN_KEY, token
    ))
    .unwrap();
    response::Builder::new()
        .status(status)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .header(axum::http::header::SET_COOKIE, cookie_value)
        .body(Body::from(response_body))
        .unwrap()
}

fn open_session(store: &dyn FullStore, user_id: i64) -> Result<AuthToken> {
    let token = AuthToken {
        user_id,
        value: AuthTokenValue::generate(),
        created: now(),
        last_used: None,
    };
    store.add_auth_token(token.clone())?;
    Ok(token)
}

async fn signup(
    State(state): State<ServerState>,
    Json(body): Json<SignupBody>,
) -> Response {
    let handle = body.handle.trim();
    if handle.is_empty() {
        return (StatusCode::BAD_REQUEST, "handle must not be empty").into_response();
    }
    if body.password.len() < MIN_PASSWORD_LEN {
        return (
            StatusCode::BAD_REQUEST,
            format!("password must be at least {} characters", MIN_PASSWORD_LEN),
        )
            .into_response();
    }

    let user_id = match state.store.create_user(handle) {
        Ok(id) => id,
        Err(EngagementError::Conflict(_)) => {
            return (StatusCode::CONFLICT, "handle already taken").into_response();
        }
        Err(err) => {
            error!("Failed to create user: {}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let credentials = match PasswordCredentials::from_plain_password(user_id, &body.password) {
        Ok(x) => x,
        Err(err) => {
            error!("Failed to hash password: {}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if let Err(err) = state.store.set_password_credentials(credentials) {
        error!("Failed to store credentials: {}", err);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    match open_session(state.store.as_ref(), user_id) {
        Ok(token) => session_response(StatusCode::CREATED, &token.value.0),
        Err(err) => {
            error!("Error with auth token generation: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn login(State(state): State<ServerState>, Json(body): Json<LoginBody>) -> Response {
    debug!("login() called for handle {}", body.handle);
    let user_id = match state.store.get_user_id(body.handle.trim()) {
        Some(id) => id,
        None => return StatusCode::FORBIDDEN.into_response(),
    };
    let credentials = match state.store.get_password_credentials(user_id) {
        Some(x) => x,
        None => return StatusCode::FORBIDDEN.into_response(),
    };
    if !matches!(
        credentials.hasher.verify(&body.password, &credentials.hash),
        Ok(true)
    ) {
        return StatusCode::FORBIDDEN.into_response();
    }

    match open_session(state.store.as_ref(), user_id) {
        Ok(token) => session_response(StatusCode::CREATED, &token.value.0),
        Err(err) => {
            error!("Error with auth token generation: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn logout(State(state): State<ServerState>, session: Session) -> Response {
    match state
        .store
        .delete_auth_token(&AuthTokenValue(session.token))
    {
        Some(_) => {
            let cookie_value = Cookie::build(Cookie::new(COOKIE_SESSION_TOKEN_KEY, ""))
                .path("/")
                .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1))
                .same_site(SameSite::Lax)
                .build();

            response::Builder::new()
                .status(StatusCode::OK)
                .header(axum::http::header::SET_COOKIE, cookie_value.to_string())
                .body(Body::empty())
                .unwrap()
        }
        None => StatusCode::BAD_REQUEST.into_response(),
    }
}

impl ServerState {
    fn new(
        config: ServerConfig,
        store: Arc<dyn FullStore>,
        catalog: Option<Arc<dyn Catalog>>,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            store,
            catalog,
        }
    }
}

pub fn make_app(
    config: ServerConfig,
    store: Arc<dyn FullStore>,
    catalog: Option<Arc<dyn Catalog>>,
) -> Result<Router> {
    let state = ServerState::new(config.clone(), store, catalog);

    let auth_routes: Router = Router::new()
        .route("/auth/signup", axum::routing::post(signup))
        .route("/auth/login", axum::routing::post(login))
        .route("/auth/logout", axum::routing::get(logout))
        .with_state(state.clone());

    let api_routes: Router = auth_routes
        .merge(make_engagement_routes(state.clone()))
        .merge(make_catalog_routes(state.clone()));

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", axum::routing::get(home))
            .with_state(state.clone()),
    };

    let app: Router = home_router
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

pub async fn run_server(
    config: ServerConfig,
    store: Arc<dyn FullStore>,
    catalog: Option<Arc<dyn Catalog>>,
) -> Result<()> {
    let port = config.port;
    let app = make_app(config, store, catalog)?;

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Listening on port {}", port);

    Ok(axum::serve(listener, app).await?)
}
