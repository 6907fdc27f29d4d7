use crate::auth::token::RequiredRolesLayer;
use lapangin_dal::faq::FaqRepository;
use lapangin_types::claim::Role;

use crate::state::AppState;
#[allow(unused_imports)]
use axum::routing::{delete, get, post, put};

crate::repository_from_request!(FaqRepository);

mod crud_api {
    use super::*;
    use crate::error::ApiResult;
    use axum::{
        extract::{Path, Query},
        response::IntoResponse,
        Json,
    };
    use crate::validate::Garde;
    use http::StatusCode;
    use lapangin_dal::{
        faq::{CreateFaq, FaqFilter},
        Caller,
    };

    pub async fn list(
        repository: FaqRepository,
        Query(filter): Query<FaqFilter>,
    ) -> ApiResult<impl IntoResponse> {
        let records = repository.list(filter).await?;
        Ok((StatusCode::OK, Json(records)))
    }

    pub async fn get(
        Path(id): Path<i64>,
        repository: FaqRepository,
    ) -> ApiResult<impl IntoResponse> {
        let record = repository.get(id).await?;
        Ok((StatusCode::OK, Json(record)))
    }

    pub async fn create(
        caller: Caller,
        repository: FaqRepository,
        Garde(Json(payload)): Garde<Json<CreateFaq>>,
    ) -> ApiResult<impl IntoResponse> {
        let record = repository.create(payload, Some(caller.user_id)).await?;
        Ok((StatusCode::CREATED, Json(record)))
    }

    pub async fn update(
        Path(id): Path<i64>,
        repository: FaqRepository,
        Garde(Json(payload)): Garde<Json<CreateFaq>>,
    ) -> ApiResult<impl IntoResponse> {
        let record = repository.update(id, payload).await?;
        Ok((StatusCode::OK, Json(record)))
    }

    pub async fn delete(
        Path(id): Path<i64>,
        repository: FaqRepository,
    ) -> ApiResult<impl IntoResponse> {
        repository.delete(id).await?;
        Ok((StatusCode::NO_CONTENT, ()))
    }
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", post(crud_api::create))
        .route("/{id}", put(crud_api::update).delete(crud_api::delete))
        .layer(RequiredRolesLayer::new([Role::Admin]))
        .route("/", get(crud_api::list))
        .route("/{id}", get(crud_api::get))
}
