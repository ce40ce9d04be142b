use super::{AppError, auth::AuthCtx};
use axum::response::Response;
use axum::{
    extract::OriginalUri,
    http::{Method, Request},
    middleware::Next,
};
use jirafa_shared::auth::Role;
use jirafa_shared::jwt::JwtClaims;
use jirafa_shared::path::api_segments;

/// Route-level gate run before any handler. Decides from method, path and
/// token role alone; per-kid ownership is checked later against the store.
pub async fn enforce_acl(req: Request<axum::body::Body>, next: Next) -> Result<Response, AppError> {
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|orig| orig.0.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let method = req.method().clone();
    let Some(auth) = req.extensions().get::<AuthCtx>() else {
        return Err(AppError::unauthorized());
    };
    let claims = &auth.claims;

    let Some(segs) = api_segments(&path) else {
        tracing::warn!(%path, "ACL: path outside API scope");
        return Err(AppError::forbidden());
    };
    let rest: Vec<&str> = segs.iter().map(String::as_str).collect();

    let decision = match claims.role {
        Role::Parent => allow_parent(&method, &rest),
        Role::Kid => allow_kid(&method, &rest, claims),
    };

    if let Err(err) = decision {
        tracing::warn!(
            method = %method,
            path = %path,
            username = %claims.sub,
            role = ?claims.role,
            "ACL: no rule matched; denying"
        );
        return Err(err);
    }

    Ok(next.run(req).await)
}

fn allow_parent(method: &Method, rest: &[&str]) -> Result<(), AppError> {
    match rest {
        ["families", _] if *method == Method::GET || *method == Method::POST => Ok(()),
        ["kids", _]
            if *method == Method::GET
                || *method == Method::PATCH
                || *method == Method::PUT
                || *method == Method::DELETE =>
        {
            Ok(())
        }
        ["kids", _, "height"] if *method == Method::POST => Ok(()),
        ["kids", _, "height", id]
            if (*method == Method::PATCH || *method == Method::DELETE)
                && id.parse::<i32>().is_ok() =>
        {
            Ok(())
        }
        ["kids", _, "history"] if *method == Method::GET => Ok(()),
        ["kids", _, "session"] if *method == Method::POST => Ok(()),
        _ => Err(AppError::forbidden()),
    }
}

/// Kid tokens only reach their own profile; they never see a family listing
/// and cannot mint further tokens.
fn allow_kid(method: &Method, rest: &[&str], claims: &JwtClaims) -> Result<(), AppError> {
    match rest {
        ["kids", kid]
            if *method == Method::GET
                || *method == Method::PATCH
                || *method == Method::PUT
                || *method == Method::DELETE =>
        {
            ensure_self(claims, kid)
        }
        ["kids", kid, "height"] if *method == Method::POST => ensure_self(claims, kid),
        ["kids", kid, "height", id]
            if (*method == Method::PATCH || *method == Method::DELETE)
                && id.parse::<i32>().is_ok() =>
        {
            ensure_self(claims, kid)
        }
        ["kids", kid, "history"] if *method == Method::GET => ensure_self(claims, kid),
        _ => Err(AppError::forbidden()),
    }
}

fn ensure_self(claims: &JwtClaims, kid: &str) -> Result<(), AppError> {
    if claims.sub == kid {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}
