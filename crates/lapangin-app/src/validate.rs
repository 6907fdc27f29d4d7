use std::fmt::Display;
use std::ops::{Deref, DerefMut};

use axum::extract::{FromRequest, FromRequestParts, Request};
use garde::Validate;
use http::request::Parts;
use tracing::debug;

use crate::{error::ApiError, state::AppState};

/// Extractor wrapper which validates the extracted payload with garde.
///
/// Both failed extraction and failed validation are reported as
/// `InvalidInput` error.
#[derive(Debug, Clone, Copy, Default)]
pub struct Garde<E>(pub E);

impl<E> Deref for Garde<E> {
    type Target = E;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<E> DerefMut for Garde<E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<E> Garde<E> {
    pub fn into_inner(self) -> E {
        self.0
    }
}

fn check<T>(value: &T) -> Result<(), ApiError>
where
    T: Validate<Context = ()>,
{
    value.validate().map_err(|report| {
        debug!("Validation failed: {report}");
        ApiError::InvalidInput(report.to_string().trim().to_string())
    })
}

fn rejected(rejection: impl Display) -> ApiError {
    debug!("Request rejected: {rejection}");
    ApiError::InvalidInput(rejection.to_string())
}

impl<Extractor, T> FromRequest<AppState> for Garde<Extractor>
where
    T: Validate<Context = ()>,
    Extractor: Deref<Target = T> + FromRequest<AppState>,
    <Extractor as FromRequest<AppState>>::Rejection: Display,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let inner = Extractor::from_request(req, state).await.map_err(rejected)?;
        check(inner.deref())?;
        Ok(Garde(inner))
    }
}

impl<Extractor, T> FromRequestParts<AppState> for Garde<Extractor>
where
    T: Validate<Context = ()>,
    Extractor: Deref<Target = T> + FromRequestParts<AppState>,
    <Extractor as FromRequestParts<AppState>>::Rejection: Display,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let inner = Extractor::from_request_parts(parts, state)
            .await
            .map_err(rejected)?;
        check(inner.deref())?;
        Ok(Garde(inner))
    }
}
