//! Kid and height handlers. Each one resolves the caller from the token and
//! hands off to [`FamilyAccess`](super::family::FamilyAccess).

use axum::{
    Json,
    extract::{Extension, Path, Query, State, rejection::JsonRejection},
    http::{Method, StatusCode},
};
use jirafa_shared::api::{
    CreateHeightReq, CreateKidReq, HeightDto, HistoryDto, KidDto, UpdateHeightReq, UpdateKidReq,
};
use serde::Deserialize;

use super::auth::AuthCtx;
use super::family::Caller;
use super::{AppError, AppState};
use crate::storage::Page;
use crate::storage::models::{Kid, KidHeight};

#[derive(Debug, Default, Deserialize)]
pub(super) struct PageOpts {
    page: Option<usize>,
    per_page: Option<usize>,
}

pub(super) async fn api_list_family(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(username): Path<String>,
    Query(opts): Query<PageOpts>,
) -> Result<Json<Vec<KidDto>>, AppError> {
    let caller = Caller::from(&auth.claims);
    let kids = state
        .family()
        .list_family(&caller, &username, Page::new(opts.page, opts.per_page))
        .await?;
    let items = kids.iter().map(kid_dto).collect::<Result<Vec<_>, _>>()?;
    Ok(Json(items))
}

pub(super) async fn api_create_kid(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(username): Path<String>,
    body: Result<Json<CreateKidReq>, JsonRejection>,
) -> Result<(StatusCode, Json<KidDto>), AppError> {
    let Json(body) = body?;
    let caller = Caller::from(&auth.claims);
    let kid = state.family().create_kid(&caller, &username, body).await?;
    Ok((StatusCode::CREATED, Json(kid_dto(&kid)?)))
}

pub(super) async fn api_get_kid(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(username): Path<String>,
) -> Result<Json<KidDto>, AppError> {
    let caller = Caller::from(&auth.claims);
    let kid = state.family().load_owned_kid(&caller, &username).await?;
    Ok(Json(kid_dto(&kid)?))
}

pub(super) async fn api_update_kid(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(username): Path<String>,
    body: Result<Json<UpdateKidReq>, JsonRejection>,
) -> Result<Json<KidDto>, AppError> {
    let Json(body) = body?;
    let caller = Caller::from(&auth.claims);
    let kid = state.family().update_kid(&caller, &username, body).await?;
    Ok(Json(kid_dto(&kid)?))
}

/// Full replacement is not offered; kids are changed with PATCH only.
pub(super) async fn api_replace_kid(Path(username): Path<String>) -> AppError {
    tracing::debug!(kid = %username, "PUT on kid rejected");
    AppError::MethodNotAllowed(Method::PUT)
}

pub(super) async fn api_delete_kid(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(username): Path<String>,
) -> Result<StatusCode, AppError> {
    let caller = Caller::from(&auth.claims);
    state.family().delete_kid(&caller, &username).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn api_add_height(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(username): Path<String>,
    body: Result<Json<CreateHeightReq>, JsonRejection>,
) -> Result<(StatusCode, Json<HistoryDto>), AppError> {
    let Json(body) = body?;
    let caller = Caller::from(&auth.claims);
    let (kid, heights) = state.family().add_height(&caller, &username, body).await?;
    Ok((StatusCode::CREATED, Json(history_dto(&kid, &heights)?)))
}

pub(super) async fn api_update_height(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path((username, id)): Path<(String, i32)>,
    body: Result<Json<UpdateHeightReq>, JsonRejection>,
) -> Result<Json<HeightDto>, AppError> {
    let Json(body) = body?;
    let caller = Caller::from(&auth.claims);
    let record = state
        .family()
        .update_height(&caller, &username, id, body)
        .await?;
    Ok(Json(height_dto(&record)))
}

pub(super) async fn api_delete_height(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path((username, id)): Path<(String, i32)>,
) -> Result<StatusCode, AppError> {
    let caller = Caller::from(&auth.claims);
    state.family().delete_height(&caller, &username, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn api_history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(username): Path<String>,
) -> Result<Json<HistoryDto>, AppError> {
    let caller = Caller::from(&auth.claims);
    let (kid, heights) = state.family().history(&caller, &username).await?;
    Ok(Json(history_dto(&kid, &heights)?))
}

fn kid_dto(kid: &Kid) -> Result<KidDto, AppError> {
    // The column carries a CHECK constraint, so a bad value means a broken row.
    let sex = kid.parsed_sex().map_err(AppError::internal)?;
    Ok(KidDto {
        username: kid.username.clone(),
        name: kid.name.clone(),
        birthdate: kid.birthdate,
        sex,
        premature_date: kid.premature_date,
    })
}

fn height_dto(h: &KidHeight) -> HeightDto {
    HeightDto {
        id: h.id,
        height: h.height,
        date_height: h.date_height,
        age_height: h.age_height,
        percentile_oms: h.percentile_oms.clone(),
        percentile_sap: h.percentile_sap.clone(),
    }
}

fn history_dto(kid: &Kid, heights: &[KidHeight]) -> Result<HistoryDto, AppError> {
    Ok(HistoryDto {
        kid: kid_dto(kid)?,
        data: heights.iter().map(height_dto).collect(),
    })
}
