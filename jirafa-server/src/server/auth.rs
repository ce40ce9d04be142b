use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{Duration, Utc};
use jirafa_shared::auth::Role;
use jirafa_shared::jwt::{self, JwtClaims};
use tracing::{error, warn};

use super::{AppError, AppState};

/// How many days of inactivity before a parent session is considered expired.
const USER_SESSION_IDLE_DAYS: i64 = 14;
/// How many days before mandatory re-login for parents.
const USER_TOKEN_TTL_DAYS: i64 = 30;
/// How many days of inactivity before a kid session is considered expired.
const KID_SESSION_IDLE_DAYS: i64 = 30;
/// How many days before a kid token has to be reissued.
const KID_TOKEN_TTL_DAYS: i64 = 2 * KID_SESSION_IDLE_DAYS;

#[derive(Clone, Debug)]
pub struct AuthCtx {
    pub claims: JwtClaims,
}

pub async fn require_bearer(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let unauthorized = || Err(AppError::unauthorized());
    let header_val = match req.headers().get(header::AUTHORIZATION) {
        Some(v) => v,
        None => return unauthorized(),
    };
    let header_str = header_val.to_str().map_err(|_| AppError::unauthorized())?;
    let Some(token) = header_str.strip_prefix("Bearer ") else {
        return unauthorized();
    };

    let claims = match jwt::decode_and_verify(token, state.config.jwt_secret.as_bytes()) {
        Ok(c) => c,
        Err(e) => {
            warn!(error=%e, "auth: jwt decode failed");
            return unauthorized();
        }
    };
    if claims.sub.trim().is_empty() {
        warn!(jti = %claims.jti, "auth: token without subject");
        return unauthorized();
    }

    let idle_days = match claims.role {
        Role::Parent => USER_SESSION_IDLE_DAYS,
        Role::Kid => KID_SESSION_IDLE_DAYS,
    };
    let cutoff = Utc::now() - Duration::days(idle_days);
    match state
        .store
        .touch_session_with_cutoff(&claims.jti, cutoff.naive_utc())
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            warn!(
                jti = %claims.jti,
                username = %claims.sub,
                cutoff = %cutoff,
                idle_days = idle_days,
                "auth: session missing or expired (last_used_at < cutoff)"
            );
            return unauthorized();
        }
        Err(e) => {
            error!(jti = %claims.jti, error=%e, "auth: touch_session_with_cutoff failed");
            return Err(AppError::internal(e));
        }
    }
    req.extensions_mut().insert(AuthCtx { claims });
    Ok(next.run(req).await)
}

/// Creates a session row and signs a token for it. Callers must have
/// established that `username` may act as `role`.
pub async fn issue_jwt(state: &AppState, username: &str, role: Role) -> Result<String, AppError> {
    let jti = uuid::Uuid::new_v4().to_string();
    let ttl_days = match role {
        Role::Parent => USER_TOKEN_TTL_DAYS,
        Role::Kid => KID_TOKEN_TTL_DAYS,
    };
    let exp = (Utc::now() + Duration::days(ttl_days)).timestamp();
    let claims = JwtClaims {
        sub: username.to_string(),
        jti: jti.clone(),
        exp,
        role,
    };

    state
        .store
        .create_session(&jti, username)
        .await
        .map_err(|e| {
            error!(username, error=%e, "issue_jwt: create_session failed");
            AppError::internal(e)
        })?;
    let token = jwt::encode(&claims, state.config.jwt_secret.as_bytes()).map_err(|e| {
        error!(username, error=%e, "issue_jwt: jwt encode failed");
        AppError::internal(e)
    })?;
    Ok(token)
}
