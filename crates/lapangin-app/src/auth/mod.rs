use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json,
};
use http::StatusCode;
use lapangin_dal::user::{RegisterUser, UserRepository};
use lapangin_types::claim::{ApiClaim, Authorization as _, Role};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{error::ApiResult, state::AppState, validate::Garde};

pub mod token;

#[derive(Debug, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Me {
    pub is_authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub is_admin: bool,
}

pub async fn register(
    user_registry: UserRepository,
    Garde(Json(payload)): Garde<Json<RegisterUser>>,
) -> ApiResult<impl IntoResponse> {
    let user = user_registry.create(payload.into()).await?;
    info!("User {} registered", user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    user_registry: UserRepository,
    Json(credentials): Json<LoginCredentials>,
) -> ApiResult<impl IntoResponse> {
    let user = user_registry
        .check_password(&credentials.email, &credentials.password)
        .await?;
    let claim = ApiClaim::new_expired(user.id.to_string(), user.roles.iter().copied());
    let token = state.tokens().issue(claim)?;
    debug!("Issued token for user {}", user.id);
    Ok(Json(TokenResponse { token }))
}

pub async fn me(
    claim: Option<ApiClaim>,
    user_registry: UserRepository,
) -> ApiResult<impl IntoResponse> {
    let Some(user_id) = claim.as_ref().and_then(|c| c.user_id()) else {
        return Ok(Json(Me::default()));
    };
    let user = user_registry.get(user_id).await?;
    let is_admin = claim.as_ref().is_some_and(|c| c.is_admin());
    Ok(Json(Me {
        is_authenticated: true,
        user_id: Some(user.id),
        name: Some(user.name),
        email: Some(user.email),
        roles: user.roles,
        is_admin,
    }))
}

/// Builds authentication router - must be nested on /auth path!
pub fn auth_router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}
