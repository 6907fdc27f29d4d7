use crate::{
    auth::token::RequiredRolesLayer,
    error::{ApiError, ApiResult},
    repository_from_request,
    validate::Garde,
};
use lapangin_dal::{
    user::{CreateUser, UpdateUser, UserFilter, UserRepository},
    Caller,
};

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    routing::{get, post},
    Json,
};
use http::StatusCode;
use lapangin_types::claim::Role;

use crate::state::AppState;

repository_from_request!(UserRepository);

pub async fn create_user(
    user_registry: UserRepository,
    Garde(Json(payload)): Garde<Json<CreateUser>>,
) -> ApiResult<impl IntoResponse> {
    let user = user_registry.create(payload).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(
    user_registry: UserRepository,
    Garde(Query(filter)): Garde<Query<UserFilter>>,
) -> ApiResult<impl IntoResponse> {
    let users = user_registry.list(filter, 1000).await?;
    Ok((StatusCode::OK, Json(users)))
}

async fn get_user(
    Path(id): Path<i64>,
    user_registry: UserRepository,
) -> ApiResult<impl IntoResponse> {
    let user = user_registry.get(id).await?;
    Ok((StatusCode::OK, Json(user)))
}

async fn update_user(
    Path(id): Path<i64>,
    user_registry: UserRepository,
    Garde(Json(payload)): Garde<Json<UpdateUser>>,
) -> ApiResult<impl IntoResponse> {
    let user = user_registry.update(id, payload).await?;
    Ok((StatusCode::OK, Json(user)))
}

async fn delete_user(
    Path(id): Path<i64>,
    caller: Caller,
    user_registry: UserRepository,
) -> ApiResult<impl IntoResponse> {
    if caller.user_id == id {
        return Err(ApiError::InvalidInput(
            "You cannot delete your own account".to_string(),
        ));
    }
    user_registry.delete(id).await?;

    Ok((StatusCode::NO_CONTENT, ()))
}

async fn toggle_active(
    Path(id): Path<i64>,
    caller: Caller,
    user_registry: UserRepository,
) -> ApiResult<impl IntoResponse> {
    if caller.user_id == id {
        return Err(ApiError::InvalidInput(
            "You cannot deactivate your own account".to_string(),
        ));
    }
    let user = user_registry.toggle_active(id).await?;
    Ok((StatusCode::OK, Json(user)))
}

pub fn users_router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", post(create_user).get(list_users))
        .route(
            "/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/{id}/toggle-active", post(toggle_active))
        .layer(RequiredRolesLayer::new([Role::Admin]))
}
