use lapangin_dal::review::ReviewRepository;

use crate::state::AppState;
#[allow(unused_imports)]
use axum::routing::{delete, get, post, put};

crate::repository_from_request!(ReviewRepository);

mod crud_api {
    use super::*;
    use crate::error::ApiResult;
    use axum::{extract::Path, response::IntoResponse, Json};
    use crate::validate::Garde;
    use http::StatusCode;
    use lapangin_dal::{
        review::{UpdateReview, UpsertReview},
        Caller,
    };

    /// Answers 201 for a new review, 200 when the existing one was replaced
    pub async fn upsert(
        caller: Caller,
        repository: ReviewRepository,
        Garde(Json(payload)): Garde<Json<UpsertReview>>,
    ) -> ApiResult<impl IntoResponse> {
        let outcome = repository.upsert(caller.user_id, payload).await?;
        let status = if outcome.created {
            StatusCode::CREATED
        } else {
            StatusCode::OK
        };
        Ok((status, Json(outcome)))
    }

    pub async fn update(
        Path(id): Path<i64>,
        caller: Caller,
        repository: ReviewRepository,
        Garde(Json(payload)): Garde<Json<UpdateReview>>,
    ) -> ApiResult<impl IntoResponse> {
        let record = repository.update(caller, id, payload).await?;
        Ok((StatusCode::OK, Json(record)))
    }

    pub async fn delete(
        Path(id): Path<i64>,
        caller: Caller,
        repository: ReviewRepository,
    ) -> ApiResult<impl IntoResponse> {
        repository.delete(caller, id).await?;
        Ok((StatusCode::NO_CONTENT, ()))
    }
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", post(crud_api::upsert))
        .route("/{id}", put(crud_api::update).delete(crud_api::delete))
}
