use lapangin_dal::booking::BookingRepository;

use crate::state::AppState;
#[allow(unused_imports)]
use axum::routing::{delete, get, post, put};

crate::repository_from_request!(BookingRepository);

mod crud_api {
    use super::*;
    use crate::error::ApiResult;
    use axum::{extract::Path, response::IntoResponse, Json};
    use crate::validate::Garde;
    use http::StatusCode;
    use lapangin_dal::{
        booking::{ChangeBooking, CreateBooking},
        Caller,
    };

    pub async fn create(
        caller: Caller,
        repository: BookingRepository,
        Garde(Json(payload)): Garde<Json<CreateBooking>>,
    ) -> ApiResult<impl IntoResponse> {
        let record = repository
            .create(caller.user_id, payload, lapangin_dal::today())
            .await?;
        Ok((StatusCode::CREATED, Json(record)))
    }

    pub async fn mine(
        caller: Caller,
        repository: BookingRepository,
    ) -> ApiResult<impl IntoResponse> {
        let records = repository
            .list_for_user(caller.user_id, lapangin_dal::today())
            .await?;
        Ok((StatusCode::OK, Json(records)))
    }

    pub async fn modify(
        Path(id): Path<i64>,
        caller: Caller,
        repository: BookingRepository,
        Garde(Json(change)): Garde<Json<ChangeBooking>>,
    ) -> ApiResult<impl IntoResponse> {
        let record = repository
            .modify(caller, id, change, lapangin_dal::today())
            .await?;
        Ok((StatusCode::OK, Json(record)))
    }

    pub async fn cancel(
        Path(id): Path<i64>,
        caller: Caller,
        repository: BookingRepository,
    ) -> ApiResult<impl IntoResponse> {
        repository
            .cancel(caller, id, lapangin_dal::today())
            .await?;
        Ok((StatusCode::NO_CONTENT, ()))
    }
}

/// All booking endpoints need authenticated user
pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", post(crud_api::create))
        .route("/mine", get(crud_api::mine))
        .route("/{id}", put(crud_api::modify).delete(crud_api::cancel))
}
