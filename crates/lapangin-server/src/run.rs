use std::path::Path;

use crate::config::ServerConfig;
use crate::error::Result;
use axum::http::StatusCode;
use axum::{response::IntoResponse, routing::get, Router};
use futures::FutureExt;
use lapangin_app::state::AppState;
use lapangin_app::{
    auth::{auth_router, token::TokenLayer},
    rest_api,
    user::users_router,
};
use lapangin_auth::token::{TokenManager, MIN_SECRET_LEN};
use tokio::{fs, io::AsyncWriteExt as _};
use tracing::{debug, info};

pub async fn run(args: ServerConfig) -> Result<()> {
    let state = build_state(&args).await?;
    run_with_state(args, state).await
}

pub async fn run_with_state(args: ServerConfig, state: AppState) -> Result<()> {
    let shutdown = tokio::signal::ctrl_c().map(|_| ());
    run_graceful_with_state(args, state, shutdown).await
}

pub async fn run_graceful_with_state<S>(
    args: ServerConfig,
    state: AppState,
    shutdown_signal: S,
) -> Result<()>
where
    S: std::future::Future<Output = ()> + Send + 'static,
{
    let mut app = main_router(state);

    if !args.no_cors {
        app = app.layer(tower_http::cors::CorsLayer::very_permissive());
    }

    let ip: std::net::IpAddr = args.listen_address.parse()?;
    let addr = std::net::SocketAddr::from((ip, args.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server stopped");
    Ok(())
}

fn main_router(state: AppState) -> Router<()> {
    Router::new()
        .nest("/users", users_router())
        .nest("/api/venue", rest_api::venue::router())
        .nest("/api/booking", rest_api::booking::router())
        .nest("/api/review", rest_api::review::router())
        .nest("/api/faq", rest_api::faq::router())
        .nest("/auth", auth_router())
        // token is optional here, routes requiring it check for the claim
        .layer(TokenLayer::new(state.clone()))
        .with_state(state)
        .route("/health", get(health))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn build_state(config: &ServerConfig) -> Result<AppState> {
    let data_dir = config.data_dir();
    if !data_dir.is_dir() {
        fs::create_dir_all(&data_dir).await?;
        info!("Created data directory {}", data_dir.display());
    }

    let pool = lapangin_dal::new_pool(&config.database_url()).await?;
    lapangin_dal::migrate(&pool).await?;
    debug!("Database migrated");

    lapangin_dal::set_server_offset(config.server_offset());
    info!("Booking calendar offset is {}", lapangin_dal::server_offset());

    let secret = read_secret(&data_dir).await?;
    let tokens = TokenManager::new(&secret, config.token_validity)?;
    Ok(AppState::new(pool, tokens))
}

async fn read_secret(data_dir: &Path) -> Result<Vec<u8>, std::io::Error> {
    let secret_file = data_dir.join("secret");

    let secret = if fs::try_exists(&secret_file).await? {
        fs::read(&secret_file).await?
    } else {
        let random_bytes = rand::random::<[u8; MIN_SECRET_LEN]>();
        #[cfg(unix)]
        let mut file = {
            use std::fs::OpenOptions;
            use std::os::unix::fs::OpenOptionsExt;
            {
                // only current user can read it
                let _f = OpenOptions::new()
                    .mode(0o600)
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(&secret_file)?;
            }
            fs::File::options().write(true).open(&secret_file).await?
        };
        #[cfg(not(unix))]
        let mut file = fs::File::create(&secret_file).await?;

        file.write_all(&random_bytes).await?;
        info!("Generated new token secret");
        random_bytes.to_vec()
    };
    Ok(secret)
}
