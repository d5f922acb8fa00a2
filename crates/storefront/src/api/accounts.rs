//! Registration, login, users and profiles.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{check_password, ensure_email_free};
use crate::error::{Error, FoundExt};
use crate::media::PROFILE_PICTURES;
use crate::model::{NewUser, Profile, ProfilePatch, User, UserPatch};

use super::error::ApiResult;
use super::extract::{CurrentUser, Staff};
use super::state::{blocking, AppState};
use super::upload::UploadForm;

#[derive(Debug, Deserialize)]
pub(super) struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
pub(super) struct TokenResponse {
    token: String,
    user: User,
}

pub(super) async fn register(
    State(state): State<AppState>,
    Json(input): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    state.auth.check_registration(&input)?;
    state.db(|storage| ensure_email_free(storage, &input.email))?;

    let auth = state.auth.clone();
    let password = input.password.clone();
    let password_hash = blocking(move || auth.hash(&password)).await?;

    let user =
        state.db(|storage| state.auth.complete_registration(storage, &input, password_hash))?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub(super) async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user = state.db(|storage| state.auth.find_user(storage, &input.username, &input.password))?;
    let user = blocking(move || check_password(&user, &input.password).map(|()| user)).await?;
    let (user, token) = state.db(|storage| state.auth.issue_token(storage, user))?;
    Ok(Json(TokenResponse { token, user }))
}

pub(super) async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<StatusCode> {
    state.db(|storage| state.auth.logout(storage, user.id))?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn list_users(
    State(state): State<AppState>,
    Staff(_): Staff,
) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.db(|storage| storage.list_users(None))?))
}

pub(super) async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

pub(super) async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(patch): Json<UserPatch>,
) -> ApiResult<Json<User>> {
    let updated = state.db(|storage| {
        if let Some(email) = &patch.email {
            if storage.email_taken(email, Some(user.id))? {
                return Err(Error::field("email", "A user with this email already exists."));
            }
        }
        storage.update_user(user.id, &patch)
    })?;
    Ok(Json(updated))
}

pub(super) async fn get_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<User>> {
    if caller.id != id && !caller.is_staff {
        return Err(Error::permission_denied("you can only view your own account").into());
    }
    Ok(Json(state.db(|storage| storage.get_user(id).found("user"))?))
}

pub(super) async fn my_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Profile>> {
    Ok(Json(state.db(|storage| storage.profile(user.id))?))
}

pub(super) async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(patch): Json<ProfilePatch>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(
        state.db(|storage| storage.update_profile(user.id, &patch))?,
    ))
}

pub(super) async fn upload_picture(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> ApiResult<Json<Profile>> {
    let mut form = UploadForm::read(multipart, "profile_picture").await?;
    let file = form.take_file("profile_picture")?;
    let stored = state
        .media
        .save(PROFILE_PICTURES, &file.file_name, &file.bytes)?;

    let (previous, profile) = state.db(|storage| {
        let previous = storage.set_profile_picture(user.id, &stored)?;
        Ok((previous, storage.profile(user.id)?))
    })?;
    if let Some(previous) = previous.filter(|p| *p != stored) {
        state.media.remove(&previous);
    }
    Ok(Json(profile))
}
