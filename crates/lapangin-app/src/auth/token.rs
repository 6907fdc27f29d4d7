use std::{
    collections::HashSet,
    convert::Infallible,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request},
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use headers::{authorization::Bearer, Authorization, HeaderMapExt as _};
use http::request::Parts;
use lapangin_dal::Caller;
use lapangin_types::claim::{ApiClaim, Authorization as _, Role};
use tower::{Layer, Service};
use tracing::debug;

use crate::{error::ApiError, state::AppState};

/// Validates bearer token, when present, and attaches its claim to the request.
///
/// Requests without a token pass through, handlers decide if they need one.
#[derive(Clone)]
pub struct TokenLayer {
    state: AppState,
}

impl TokenLayer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for TokenLayer {
    type Service = TokenService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TokenService {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TokenService<S> {
    inner: S,
    state: AppState,
}

impl<S> Service<Request> for TokenService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        if let Some(Authorization(bearer)) = request.headers().typed_get::<Authorization<Bearer>>()
        {
            match self.state.tokens().validate::<ApiClaim>(bearer.token()) {
                Ok(claim) => {
                    request.extensions_mut().insert(claim);
                }
                Err(e) => {
                    let msg = if e.is_expired() {
                        "Token expired"
                    } else {
                        "Invalid token"
                    };
                    let response = ApiError::Unauthenticated(msg.to_string()).into_response();
                    return Box::pin(async move { Ok(response) });
                }
            }
        }
        Box::pin(self.inner.call(request))
    }
}

/// Lets through only requests whose claim has at least one of the roles
#[derive(Clone)]
pub struct RequiredRolesLayer {
    roles: Arc<HashSet<Role>>,
}

impl RequiredRolesLayer {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: Arc::new(roles.into_iter().collect()),
        }
    }
}

impl<S> Layer<S> for RequiredRolesLayer {
    type Service = RequiredRolesService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequiredRolesService {
            inner,
            roles: self.roles.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RequiredRolesService<S> {
    inner: S,
    roles: Arc<HashSet<Role>>,
}

impl<S> Service<Request> for RequiredRolesService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let rejection = match request.extensions().get::<ApiClaim>() {
            None => Some(ApiError::unauthenticated()),
            Some(claim) if !claim.has_any_role(self.roles.iter().copied()) => {
                debug!("User {} lacks any of roles {:?}", claim.sub, self.roles);
                Some(ApiError::Forbidden("Insufficient role".to_string()))
            }
            Some(_) => None,
        };
        match rejection {
            Some(error) => {
                let response = error.into_response();
                Box::pin(async move { Ok(response) })
            }
            None => Box::pin(self.inner.call(request)),
        }
    }
}

impl FromRequestParts<AppState> for ApiClaim {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<ApiClaim>().cloned().ok_or_else(|| {
            debug!("No token found");
            ApiError::unauthenticated()
        })
    }
}

impl OptionalFromRequestParts<AppState> for ApiClaim {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<ApiClaim>().cloned())
    }
}

/// Converts claim to the identity used by ownership checks
pub fn caller_of(claim: &ApiClaim) -> Result<Caller, ApiError> {
    let user_id = claim.user_id().ok_or_else(|| {
        debug!("Token subject {} is not user id", claim.sub);
        ApiError::unauthenticated()
    })?;
    Ok(Caller::new(user_id, claim.is_admin()))
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claim = <ApiClaim as FromRequestParts<AppState>>::from_request_parts(parts, state).await?;
        caller_of(&claim)
    }
}
