mod acl;
pub mod auth;
mod config;
pub mod family;
mod kids;

use std::sync::Arc;

use crate::server::auth::AuthCtx;
use crate::server::family::{FamilyAccess, FamilyError, FieldErrors};
use crate::storage::{Store, StorageError};
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware;
use axum::response::Response as AxumResponse;
use axum::{
    Json, Router,
    extract::State,
    http::{Method, StatusCode, header},
    routing::{get, post},
};
use bcrypt::verify;
pub use config::{AppConfig, ConfigError, UserConfig};
use jirafa_shared::api;
use jirafa_shared::auth::Role;
use jirafa_shared::growth::GrowthStandards;
use jirafa_shared::path::kid_username_from_path;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Span, info_span};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_USERNAME_LEN: usize = 150;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Store,
    pub standards: Arc<GrowthStandards>,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: AppConfig, store: Store, standards: GrowthStandards) -> Self {
        Self {
            config,
            store,
            standards: Arc::new(standards),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn family(&self) -> FamilyAccess<'_, Store> {
        FamilyAccess::new(&self.store, &self.standards)
    }
}

#[derive(Clone, Debug)]
struct ReqId(pub String);

pub fn router(state: AppState) -> Router {
    let private = Router::new()
        .route(
            "/api/v1/families/{username}",
            get(kids::api_list_family).post(kids::api_create_kid),
        )
        .route(
            "/api/v1/kids/{username}",
            get(kids::api_get_kid)
                .patch(kids::api_update_kid)
                .put(kids::api_replace_kid)
                .delete(kids::api_delete_kid),
        )
        .route("/api/v1/kids/{username}/height", post(kids::api_add_height))
        .route(
            "/api/v1/kids/{username}/height/{id}",
            axum::routing::patch(kids::api_update_height).delete(kids::api_delete_height),
        )
        .route("/api/v1/kids/{username}/history", get(kids::api_history))
        .route("/api/v1/kids/{username}/session", post(api_kid_session))
        .with_state(state.clone())
        // Layers run bottom-up: bearer check, then ACL, then span fields.
        .layer(middleware::from_fn(set_auth_span_fields))
        .layer(middleware::from_fn(acl::enforce_acl))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    // Trace with request context (method, path, request_id)
    let trace = TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
        let request_id = req
            .extensions()
            .get::<ReqId>()
            .map(|r| r.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %request_id,
            username = tracing::field::Empty,
            role = tracing::field::Empty,
            kid = tracing::field::Empty
        )
    });

    let app = Router::new()
        .route("/healthz", get(health))
        .route("/api/v1/auth/login", post(api_auth_login))
        .route("/api/v1/users", post(api_signup))
        .merge(private)
        .with_state(state.clone())
        .layer(trace)
        .layer(middleware::from_fn(add_security_headers))
        .layer(middleware::from_fn(add_request_id));

    if let Some(origin) = &state.config.dev_cors_origin {
        let hv = header::HeaderValue::from_str(origin)
            .unwrap_or(header::HeaderValue::from_static("http://localhost:5173"));
        let cors = CorsLayer::new()
            .allow_origin(hv)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
        app.layer(cors)
    } else {
        app
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn add_request_id(
    mut req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let hdr = HeaderName::from_static("x-request-id");
    // Use provided x-request-id if present, else generate
    let rid = req
        .headers()
        .get(&hdr)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(ReqId(rid.clone()));
    let mut resp = next.run(req).await;
    if let Ok(hv) = HeaderValue::from_str(&rid) {
        resp.headers_mut().insert(hdr, hv);
    }
    Ok(resp)
}

async fn add_security_headers(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let path = req.uri().path().to_string();
    let mut resp = next.run(req).await;

    let headers = resp.headers_mut();
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("no-referrer"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("same-origin"),
    );

    // Measurements are personal data; never cache API or health responses.
    if path == "/healthz" || path.starts_with("/api/") {
        headers.insert(
            HeaderName::from_static("cache-control"),
            HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
        );
        headers.insert(
            HeaderName::from_static("pragma"),
            HeaderValue::from_static("no-cache"),
        );
    }

    Ok(resp)
}

async fn set_auth_span_fields(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    if let Some(auth) = req.extensions().get::<AuthCtx>() {
        let span = Span::current();
        span.record("username", tracing::field::display(&auth.claims.sub));
        span.record("role", tracing::field::debug(&auth.claims.role));
        if let Some(kid) = kid_username_from_path(req.uri().path()) {
            span.record("kid", tracing::field::display(kid));
        }
    }
    Ok(next.run(req).await)
}

async fn api_auth_login(
    State(state): State<AppState>,
    body: Result<Json<api::AuthReq>, JsonRejection>,
) -> Result<Json<api::AuthResp>, AppError> {
    let Json(body) = body?;
    let user = state
        .store
        .get_user(&body.username)
        .await
        .map_err(|e| {
            tracing::error!(username = %body.username, error=%e, "login: get_user failed");
            AppError::internal(e)
        })?
        .ok_or_else(|| {
            tracing::warn!(username = %body.username, "login: unknown user");
            AppError::unauthorized()
        })?;
    let ok = verify(&body.password, &user.password_hash).map_err(|e| {
        tracing::error!(username = %user.username, error=%e, "login: bcrypt verify failed");
        AppError::internal(e)
    })?;
    if !ok {
        tracing::warn!(username = %user.username, "login: invalid password");
        return Err(AppError::unauthorized());
    }

    let token = auth::issue_jwt(&state, &user.username, Role::Parent).await?;
    tracing::info!(username = %user.username, "login: issued token");
    Ok(Json(api::AuthResp { token }))
}

async fn api_signup(
    State(state): State<AppState>,
    body: Result<Json<api::SignupReq>, JsonRejection>,
) -> Result<(StatusCode, Json<api::SignupResp>), AppError> {
    let Json(body) = body?;
    let username = body.username.trim().to_string();
    validate_signup(&username, &body.password)?;

    let hash = bcrypt::hash(&body.password, bcrypt::DEFAULT_COST).map_err(AppError::internal)?;
    match state.store.create_user(&username, &hash).await {
        Ok(user) => {
            tracing::info!(username = %user.username, "signup: account created");
            Ok((
                StatusCode::CREATED,
                Json(api::SignupResp {
                    username: user.username,
                }),
            ))
        }
        Err(StorageError::Conflict(_)) => Err(AppError::Validation(FieldErrors::single(
            "username",
            "A user with that username already exists.",
        ))),
        Err(e) => Err(AppError::internal(e)),
    }
}

fn validate_signup(username: &str, password: &str) -> Result<(), AppError> {
    let mut errors = FieldErrors::default();
    if username.is_empty() {
        errors.add("username", "This field may not be blank.");
    } else if username.chars().count() > MAX_USERNAME_LEN {
        errors.add(
            "username",
            format!("Ensure this field has no more than {MAX_USERNAME_LEN} characters."),
        );
    } else if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    } else if username.starts_with("kid_") {
        // Generated kid usernames live in this namespace.
        errors.add("username", "This username is reserved.");
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("Ensure this field has at least {MIN_PASSWORD_LEN} characters."),
        );
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

async fn api_kid_session(
    State(state): State<AppState>,
    axum::extract::Extension(ctx): axum::extract::Extension<AuthCtx>,
    axum::extract::Path(username): axum::extract::Path<String>,
) -> Result<Json<api::KidSessionResp>, AppError> {
    let caller = family::Caller::from(&ctx.claims);
    let kid = state.family().load_owned_kid(&caller, &username).await?;
    let token = auth::issue_jwt(&state, &kid.username, Role::Kid).await?;
    tracing::info!(kid = %kid.username, parent = %caller.username, "kid session issued");
    Ok(Json(api::KidSessionResp {
        token,
        username: kid.username,
    }))
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<FieldErrors>,
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Validation(FieldErrors),
    Unauthorized,
    Forbidden,
    NotFound(String),
    MethodNotAllowed(Method),
    Internal(String),
}

impl AppError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        Self::BadRequest(msg.into())
    }
    fn unauthorized() -> Self {
        Self::Unauthorized
    }
    fn forbidden() -> Self {
        Self::Forbidden
    }
    fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<FamilyError> for AppError {
    fn from(value: FamilyError) -> Self {
        match value {
            FamilyError::Validation(fields) => AppError::Validation(fields),
            FamilyError::Forbidden => AppError::Forbidden,
            FamilyError::NotFound(m) => AppError::NotFound(m),
            FamilyError::Corrupt(m) => AppError::Internal(m),
            FamilyError::Storage(e) => AppError::internal(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(value: JsonRejection) -> Self {
        AppError::bad_request(value.body_text())
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let mut fields = None;
        let (status, msg, kind, detail) = match self {
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m, "bad_request", None),
            AppError::Validation(f) => {
                let msg = f.to_string();
                fields = Some(f);
                (StatusCode::BAD_REQUEST, msg, "validation", None)
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized".into(),
                "unauthorized",
                None,
            ),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden".into(), "forbidden", None),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m, "not_found", None),
            AppError::MethodNotAllowed(method) => (
                StatusCode::METHOD_NOT_ALLOWED,
                format!("Method \"{method}\" not allowed."),
                "method_not_allowed",
                None,
            ),
            // Do not leak internal error details to clients, but log them
            AppError::Internal(m) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".into(),
                "internal",
                Some(m),
            ),
        };
        if let Some(detail) = detail {
            tracing::error!(status = %status, kind = kind, message = %msg, detail = %detail, "request failed");
        } else {
            tracing::error!(status = %status, kind = kind, message = %msg, "request failed");
        }
        let body = axum::Json(ErrorBody { error: msg, fields });
        (status, body).into_response()
    }
}
