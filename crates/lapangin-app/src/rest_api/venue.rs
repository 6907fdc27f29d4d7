use crate::auth::token::RequiredRolesLayer;
use lapangin_dal::{
    booking::BookingRepository,
    review::{ReviewRepository, VenueReviews},
    venue::{CreateVenue, UpdateVenue, VenueFilter, VenueRepository},
};
use lapangin_types::claim::Role;

use crate::state::AppState;
#[allow(unused_imports)]
use axum::routing::{delete, get, post, put};

crate::repository_from_request!(VenueRepository);

mod crud_api {
    use super::*;
    use crate::{error::ApiResult, rest_api::LIST_LIMIT};
    use axum::{
        extract::{Path, Query},
        response::IntoResponse,
        Json,
    };
    use crate::validate::Garde;
    use http::StatusCode;
    use lapangin_dal::Caller;
    use lapangin_types::claim::ApiClaim;
    use tracing::debug;
    use uuid::Uuid;

    pub async fn search(
        repository: VenueRepository,
        Garde(Query(filter)): Garde<Query<VenueFilter>>,
    ) -> ApiResult<impl IntoResponse> {
        debug!("Venue filter: {:?}", filter);
        let venues = repository.search(filter, LIST_LIMIT).await?;
        Ok((StatusCode::OK, Json(venues)))
    }

    pub async fn get(
        Path(id): Path<Uuid>,
        repository: VenueRepository,
    ) -> ApiResult<impl IntoResponse> {
        let record = repository.get(id).await?;
        Ok((StatusCode::OK, Json(record)))
    }

    pub async fn create(
        caller: Caller,
        repository: VenueRepository,
        Garde(Json(payload)): Garde<Json<CreateVenue>>,
    ) -> ApiResult<impl IntoResponse> {
        let record = repository.create(payload, Some(caller.user_id)).await?;
        Ok((StatusCode::CREATED, Json(record)))
    }

    pub async fn update(
        Path(id): Path<Uuid>,
        caller: Caller,
        repository: VenueRepository,
        Garde(Json(payload)): Garde<Json<UpdateVenue>>,
    ) -> ApiResult<impl IntoResponse> {
        let record = repository.update(caller, id, payload).await?;
        Ok((StatusCode::OK, Json(record)))
    }

    pub async fn delete(
        Path(id): Path<Uuid>,
        caller: Caller,
        repository: VenueRepository,
    ) -> ApiResult<impl IntoResponse> {
        repository.delete(caller, id).await?;
        Ok((StatusCode::NO_CONTENT, ()))
    }

    /// Dates still relevant for availability
    pub async fn booked(
        Path(id): Path<Uuid>,
        bookings: BookingRepository,
    ) -> ApiResult<impl IntoResponse> {
        let ranges = bookings.booked_ranges(id, lapangin_dal::today()).await?;
        Ok((StatusCode::OK, Json(ranges)))
    }

    pub async fn reviews(
        Path(id): Path<Uuid>,
        claim: Option<ApiClaim>,
        reviews: ReviewRepository,
    ) -> ApiResult<impl IntoResponse> {
        let reviews = reviews.list_for_venue(id).await?;
        Ok((
            StatusCode::OK,
            Json(VenueReviews {
                reviews,
                current_user_id: claim.and_then(|c| c.user_id()),
            }),
        ))
    }
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", post(crud_api::create))
        .route("/{id}", put(crud_api::update).delete(crud_api::delete))
        .layer(RequiredRolesLayer::new([Role::Admin, Role::VenueProvider]))
        .route("/", get(crud_api::search))
        .route("/{id}", get(crud_api::get))
        .route("/{id}/booked", get(crud_api::booked))
        .route("/{id}/reviews", get(crud_api::reviews))
}
